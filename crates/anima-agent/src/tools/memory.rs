//! Core memory tools: update, append, rollback. Append is the safe default;
//! rollback is the one-step undo.

use std::sync::Arc;

use async_trait::async_trait;

use anima_store::{BlockType, Store};

use super::{Tool, ToolResult};

fn parse_block(input: &serde_json::Value) -> Result<BlockType, ToolResult> {
    match input.get("block_type").and_then(|v| v.as_str()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ToolResult::error(format!("Error: {e}"))),
        None => Err(ToolResult::error("missing required parameter: block_type")),
    }
}

pub struct CoreMemoryUpdateTool {
    store: Arc<Store>,
}

impl CoreMemoryUpdateTool {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CoreMemoryUpdateTool {
    fn name(&self) -> &str {
        "core_memory_update"
    }

    fn description(&self) -> &str {
        "Replace the entire content of a core memory block. \
         Prefer core_memory_append when adding information; a full replace \
         risks dropping content you still need. The previous version is kept \
         for rollback."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "block_type": {
                    "type": "string",
                    "enum": ["user", "identity", "ideaspace"],
                    "description": "Which block to replace."
                },
                "content": {
                    "type": "string",
                    "description": "The new full content for the block."
                }
            },
            "required": ["block_type", "content"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let block = match parse_block(&input) {
            Ok(b) => b,
            Err(e) => return e,
        };
        let content = match input.get("content").and_then(|v| v.as_str()) {
            Some(c) => c,
            None => return ToolResult::error("missing required parameter: content"),
        };

        match self.store.update_block(block, content) {
            Ok(version) => ToolResult::success(format!("Updated {block} (v{version})")),
            Err(e) => ToolResult::error(format!("core_memory_update failed: {e}")),
        }
    }
}

pub struct CoreMemoryAppendTool {
    store: Arc<Store>,
}

impl CoreMemoryAppendTool {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CoreMemoryAppendTool {
    fn name(&self) -> &str {
        "core_memory_append"
    }

    fn description(&self) -> &str {
        "Append new content to a core memory block. \
         This preserves existing content and is the preferred way to record \
         new information."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "block_type": {
                    "type": "string",
                    "enum": ["user", "identity", "ideaspace"],
                    "description": "Which block to extend."
                },
                "addition": {
                    "type": "string",
                    "description": "Text appended after the existing content."
                }
            },
            "required": ["block_type", "addition"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let block = match parse_block(&input) {
            Ok(b) => b,
            Err(e) => return e,
        };
        let addition = match input.get("addition").and_then(|v| v.as_str()) {
            Some(a) if !a.trim().is_empty() => a,
            _ => return ToolResult::error("missing required parameter: addition"),
        };

        match self.store.append_to_block(block, addition) {
            Ok(version) => ToolResult::success(format!("Updated {block} (v{version})")),
            Err(e) => ToolResult::error(format!("core_memory_append failed: {e}")),
        }
    }
}

pub struct CoreMemoryRollbackTool {
    store: Arc<Store>,
}

impl CoreMemoryRollbackTool {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CoreMemoryRollbackTool {
    fn name(&self) -> &str {
        "core_memory_rollback"
    }

    fn description(&self) -> &str {
        "Restore a core memory block to its previous version. \
         Use immediately after an editing mistake; each call steps one \
         version further back."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "block_type": {
                    "type": "string",
                    "enum": ["user", "identity", "ideaspace"],
                    "description": "Which block to roll back."
                }
            },
            "required": ["block_type"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let block = match parse_block(&input) {
            Ok(b) => b,
            Err(e) => return e,
        };

        match self.store.rollback_block(block) {
            Ok(version) => {
                ToolResult::success(format!("Rolled back {block} to version {version}"))
            }
            Err(e) => ToolResult::error(format!("Error: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Arc<Store> {
        Arc::new(Store::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn append_then_rollback_round_trip() {
        let store = store();
        let append = CoreMemoryAppendTool::new(Arc::clone(&store));
        let rollback = CoreMemoryRollbackTool::new(Arc::clone(&store));

        let r = append
            .execute(serde_json::json!({"block_type": "user", "addition": "likes tea"}))
            .await;
        assert!(!r.is_error);
        let r = append
            .execute(serde_json::json!({"block_type": "user", "addition": "hates mornings"}))
            .await;
        assert!(r.content.contains("v2"));

        let r = rollback
            .execute(serde_json::json!({"block_type": "user"}))
            .await;
        assert!(!r.is_error);
        assert_eq!(store.get_block(BlockType::User).unwrap(), "likes tea");
    }

    #[tokio::test]
    async fn invalid_block_type_is_an_error_result() {
        let tool = CoreMemoryUpdateTool::new(store());
        let r = tool
            .execute(serde_json::json!({"block_type": "scratch", "content": "x"}))
            .await;
        assert!(r.is_error);
        assert!(r.content.contains("invalid block type"));
    }

    #[tokio::test]
    async fn rollback_without_history_reports_error() {
        let tool = CoreMemoryRollbackTool::new(store());
        let r = tool
            .execute(serde_json::json!({"block_type": "ideaspace"}))
            .await;
        assert!(r.is_error);
        assert!(r.content.contains("no previous version"));
    }
}
