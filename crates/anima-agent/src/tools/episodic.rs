//! Episodic memory tools: recall (semantic search) and reflect (synthesis).
//! Both soft-fail with explanatory text when the collaborator is away.

use std::sync::Arc;

use async_trait::async_trait;

use anima_episodic::EpisodicMemory;

use super::{Tool, ToolResult};

pub struct MemoryRecallTool {
    episodic: Arc<EpisodicMemory>,
}

impl MemoryRecallTool {
    pub fn new(episodic: Arc<EpisodicMemory>) -> Self {
        Self { episodic }
    }
}

#[async_trait]
impl Tool for MemoryRecallTool {
    fn name(&self) -> &str {
        "memory_recall"
    }

    fn description(&self) -> &str {
        "Search your deep episodic memory for past experiences. \
         Use when the user references a past event, project, or detail that is \
         not in core memory or the loaded history. The results are your own \
         recollections; speak of them in first person."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to search for (e.g. 'the sci-fi book we discussed')."
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let query = match input.get("query").and_then(|v| v.as_str()) {
            Some(q) if !q.trim().is_empty() => q,
            _ => return ToolResult::error("missing required parameter: query"),
        };
        ToolResult::success(self.episodic.recall(query).await)
    }
}

pub struct MemoryReflectTool {
    episodic: Arc<EpisodicMemory>,
}

impl MemoryReflectTool {
    pub fn new(episodic: Arc<EpisodicMemory>) -> Self {
        Self { episodic }
    }
}

#[async_trait]
impl Tool for MemoryReflectTool {
    fn name(&self) -> &str {
        "memory_reflect"
    }

    fn description(&self) -> &str {
        "Reflect deeply on your memories to synthesize patterns and insights. \
         Use for relational or pattern-based questions ('what are our recurring \
         themes?') rather than simple lookups."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The question or theme to reflect on."
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let query = match input.get("query").and_then(|v| v.as_str()) {
            Some(q) if !q.trim().is_empty() => q,
            _ => return ToolResult::error("missing required parameter: query"),
        };
        ToolResult::success(self.episodic.reflect(query).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anima_core::config::EpisodicConfig;

    #[tokio::test]
    async fn recall_soft_fails_when_collaborator_disabled() {
        let episodic = Arc::new(EpisodicMemory::new(&EpisodicConfig {
            enabled: false,
            ..Default::default()
        }));
        let tool = MemoryRecallTool::new(episodic);
        let r = tool.execute(serde_json::json!({"query": "our trip"})).await;
        assert!(!r.is_error, "unavailability is reported as content, not error");
        assert!(r.content.contains("not available"));
    }
}
