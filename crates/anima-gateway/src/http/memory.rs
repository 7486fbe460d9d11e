//! Core-memory dashboard endpoints. The user can edit every block here,
//! including the system instructions the agent itself may never touch.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use anima_store::BlockType;

use crate::app::AppState;
use crate::http::chat::{error_response, HandlerError};

#[derive(Serialize)]
pub struct CoreMemoryBlock {
    pub content: String,
    pub read_only: bool,
}

#[derive(Serialize)]
pub struct CoreMemoryResponse {
    pub blocks: BTreeMap<String, CoreMemoryBlock>,
}

#[derive(Deserialize)]
pub struct CoreMemoryUpdateRequest {
    pub content: String,
}

/// GET /core-memory — all four blocks.
pub async fn get_core_memory(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CoreMemoryResponse>, HandlerError> {
    let blocks = state
        .store
        .get_all_blocks()
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let mut out = BTreeMap::new();
    out.insert(
        "system_instructions".to_string(),
        CoreMemoryBlock {
            content: blocks.system_instructions,
            read_only: true,
        },
    );
    for (name, content) in [
        ("user", blocks.user),
        ("identity", blocks.identity),
        ("ideaspace", blocks.ideaspace),
    ] {
        out.insert(
            name.to_string(),
            CoreMemoryBlock {
                content,
                read_only: false,
            },
        );
    }
    Ok(Json(CoreMemoryResponse { blocks: out }))
}

/// POST /core-memory/{block_type} — overwrite one block.
pub async fn update_core_memory(
    State(state): State<Arc<AppState>>,
    Path(block_type): Path<String>,
    Json(req): Json<CoreMemoryUpdateRequest>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    if block_type == "system_instructions" {
        state
            .store
            .update_system_instructions(&req.content)
            .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        return Ok(Json(serde_json::json!({
            "success": true,
            "message": "Updated system_instructions",
        })));
    }

    let block: BlockType = block_type
        .parse()
        .map_err(|_| {
            error_response(
                StatusCode::BAD_REQUEST,
                format!("Block type '{block_type}' is invalid"),
            )
        })?;

    let version = state
        .store
        .update_block(block, &req.content)
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("Updated {block} (v{version})"),
    })))
}
