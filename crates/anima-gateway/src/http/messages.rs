//! GET /messages — read-only recent history for the dashboard.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use anima_store::LoadOptions;

use crate::app::AppState;
use crate::http::chat::{error_response, HandlerError};

const DEFAULT_LIMIT: usize = 50;

#[derive(Deserialize)]
pub struct MessagesQuery {
    #[serde(default = "default_thread")]
    pub thread_id: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

fn default_thread() -> String {
    "main".to_string()
}

#[derive(Serialize)]
pub struct MessageRow {
    pub idx: i64,
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub created_at: String,
    pub metadata: serde_json::Value,
}

#[derive(Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<MessageRow>,
}

pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<MessagesResponse>, HandlerError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).max(1);
    let rows = state
        .store
        .load_messages(
            &query.thread_id,
            &LoadOptions {
                limit: Some(limit),
                ..LoadOptions::default()
            },
        )
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let messages = rows
        .into_iter()
        .map(|row| MessageRow {
            idx: row.idx,
            role: row.role.to_string(),
            content: row.content,
            reasoning: row.reasoning,
            created_at: row.created_at.to_rfc3339(),
            metadata: row.metadata,
        })
        .collect();

    Ok(Json(MessagesResponse { messages }))
}
