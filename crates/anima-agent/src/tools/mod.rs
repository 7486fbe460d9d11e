//! Tool system for the agent's tool-calling loop.
//!
//! The `Tool` trait is implemented by every capability the LLM can invoke;
//! the registry converts tools to API definitions and renders the live
//! manifest injected into the system prompt.

pub mod archival;
pub mod channel;
pub mod cron;
pub mod episodic;
pub mod memory;
pub mod search;
pub mod summary;
pub mod tool_loop;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use anima_cron::CronHandle;
use anima_episodic::EpisodicMemory;
use anima_store::Store;

use crate::outbound::OutboundRouter;
use crate::provider::ToolDefinition;

/// Result of executing a tool. Errors are data, not exceptions: the loop
/// feeds them back to the LLM as tool output so it can react.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            is_error: true,
        }
    }
}

/// Trait that all tools must implement.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name (e.g. "core_memory_append").
    fn name(&self) -> &str;
    /// Human-readable description. The first sentence is used in the manifest.
    fn description(&self) -> &str;
    /// JSON Schema for the tool's input parameters.
    fn input_schema(&self) -> serde_json::Value;
    /// Execute with the given input.
    async fn execute(&self, input: serde_json::Value) -> ToolResult;
}

/// Build the full tool set for a turn.
pub fn build_tools(
    store: Arc<Store>,
    episodic: Arc<EpisodicMemory>,
    cron: CronHandle,
    outbound: Arc<OutboundRouter>,
) -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(memory::CoreMemoryUpdateTool::new(Arc::clone(&store))),
        Box::new(memory::CoreMemoryAppendTool::new(Arc::clone(&store))),
        Box::new(memory::CoreMemoryRollbackTool::new(Arc::clone(&store))),
        Box::new(search::ConversationSearchTool::new(
            Arc::clone(&store),
            Arc::clone(&episodic),
        )),
        Box::new(episodic::MemoryRecallTool::new(Arc::clone(&episodic))),
        Box::new(episodic::MemoryReflectTool::new(Arc::clone(&episodic))),
        Box::new(archival::ArchivalStoreTool::new(Arc::clone(&store))),
        Box::new(archival::ArchivalQueryTool::new(Arc::clone(&store))),
        Box::new(summary::DailySummaryWriteTool::new(store)),
        Box::new(channel::ChannelSendTool::new(outbound)),
        Box::new(cron::CronListJobsTool::new(cron.clone())),
        Box::new(cron::CronCreateJobTool::new(cron.clone())),
        Box::new(cron::CronUpdateJobTool::new(cron.clone())),
        Box::new(cron::CronDeleteJobTool::new(cron.clone())),
        Box::new(cron::CronPauseJobTool::new(cron.clone())),
        Box::new(cron::CronResumeJobTool::new(cron)),
    ]
}

/// Convert tools to API-level definitions.
pub fn to_definitions(tools: &[Box<dyn Tool>]) -> Vec<ToolDefinition> {
    tools
        .iter()
        .map(|t| ToolDefinition {
            name: t.name().to_string(),
            description: t.description().to_string(),
            input_schema: t.input_schema(),
        })
        .collect()
}

/// One line per tool, first sentence of the description only. Regenerated
/// every turn so the prompt always matches the registered tool set.
pub fn tool_manifest(tools: &[Box<dyn Tool>]) -> String {
    tools
        .iter()
        .map(|t| {
            let first_line = t
                .description()
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .unwrap_or("");
            let sentence = match first_line.find('.') {
                Some(pos) => &first_line[..=pos],
                None => first_line,
            };
            format!("- **{}**: {}", t.name(), sentence)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeTool;

    #[async_trait]
    impl Tool for FakeTool {
        fn name(&self) -> &str {
            "fake_tool"
        }

        fn description(&self) -> &str {
            "Does the first thing. Also does a second thing nobody reads about.\nMore detail."
        }

        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, _input: serde_json::Value) -> ToolResult {
            ToolResult::success("ok")
        }
    }

    #[test]
    fn manifest_takes_first_sentence_only() {
        let tools: Vec<Box<dyn Tool>> = vec![Box::new(FakeTool)];
        assert_eq!(
            tool_manifest(&tools),
            "- **fake_tool**: Does the first thing."
        );
    }

    #[test]
    fn definitions_mirror_tool_metadata() {
        let tools: Vec<Box<dyn Tool>> = vec![Box::new(FakeTool)];
        let defs = to_definitions(&tools);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "fake_tool");
        assert!(defs[0].input_schema.is_object());
    }
}
