//! POST /chat — the interactive dashboard/scripting entry into the
//! orchestrator. Configuration problems surface as 503 so the dashboard can
//! tell "fix your env" apart from "the turn blew up" (500).

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use anima_core::{AgentError, ChannelKind, IncomingTurn};

use crate::app::AppState;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_thread")]
    pub thread_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    /// "discord", "telegram", "local" or "internal".
    #[serde(default)]
    pub channel_type: Option<String>,
    #[serde(default)]
    pub is_group_chat: bool,
}

fn default_thread() -> String {
    "main".to_string()
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
}

pub type HandlerError = (StatusCode, Json<ApiError>);

pub fn error_response(status: StatusCode, message: impl Into<String>) -> HandlerError {
    (
        status,
        Json(ApiError {
            error: message.into(),
        }),
    )
}

pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, HandlerError> {
    if req.message.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "message cannot be empty",
        ));
    }

    let settings = state.orchestrator.settings();
    let channel = req
        .channel_type
        .as_deref()
        .and_then(|c| c.parse::<ChannelKind>().ok())
        .unwrap_or(settings.default_channel);

    info!(
        thread = %req.thread_id,
        %channel,
        preview = %req.message.chars().take(120).collect::<String>(),
        "POST /chat"
    );

    let turn = IncomingTurn {
        thread_id: req.thread_id,
        text: req.message,
        user_display: Some(state.config.agent.user_display_name.clone()),
        user_id: req.user_id.unwrap_or_default(),
        channel,
        is_group: req.is_group_chat,
        stored_content: None,
    };

    match state.orchestrator.chat(turn).await {
        Ok(response) => {
            info!(length = response.len(), "POST /chat complete");
            Ok(Json(ChatResponse { response }))
        }
        Err(AgentError::Configuration(msg)) => {
            error!(error = %msg, "POST /chat configuration error");
            Err(error_response(StatusCode::SERVICE_UNAVAILABLE, msg))
        }
        Err(e) => {
            error!(error = %e, "POST /chat failed");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Agent error: {e}"),
            ))
        }
    }
}
