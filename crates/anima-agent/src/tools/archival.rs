//! Archival memory tools: store and query curated facts.

use std::sync::Arc;

use async_trait::async_trait;

use anima_store::Store;

use super::{Tool, ToolResult};

pub struct ArchivalStoreTool {
    store: Arc<Store>,
}

impl ArchivalStoreTool {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ArchivalStoreTool {
    fn name(&self) -> &str {
        "archival_store"
    }

    fn description(&self) -> &str {
        "Store a fact in your archival memory, separate from conversation history. \
         Use for facts, preferences, decisions, and key details you choose to \
         remember long-term. This is curated memory, not raw chat."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "The fact to store, clear and concise."
                },
                "category": {
                    "type": "string",
                    "description": "Optional category (e.g. 'preferences', 'projects', 'reflection_journal')."
                }
            },
            "required": ["content"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let content = match input.get("content").and_then(|v| v.as_str()) {
            Some(c) if !c.trim().is_empty() => c,
            _ => return ToolResult::error("missing required parameter: content"),
        };
        let category = input.get("category").and_then(|v| v.as_str());

        match self.store.store_fact(content, category) {
            Ok(()) => ToolResult::success("Stored in archival memory"),
            Err(e) => ToolResult::error(format!("archival_store failed: {e}")),
        }
    }
}

pub struct ArchivalQueryTool {
    store: Arc<Store>,
}

impl ArchivalQueryTool {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ArchivalQueryTool {
    fn name(&self) -> &str {
        "archival_query"
    }

    fn description(&self) -> &str {
        "Query your archival memory for facts you have stored. \
         Searches archived facts, not conversation history."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Keywords or phrase to search for."
                },
                "category": {
                    "type": "string",
                    "description": "Optional: limit results to one category."
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
        let category = input.get("category").and_then(|v| v.as_str());

        match self.store.query_facts(query, category, 20) {
            Ok(facts) if facts.is_empty() => {
                ToolResult::success("No matching facts in archival memory.")
            }
            Ok(facts) => {
                let lines: Vec<String> = facts
                    .iter()
                    .map(|f| match &f.category {
                        Some(cat) => format!("- {} [{cat}]", f.content),
                        None => format!("- {}", f.content),
                    })
                    .collect();
                ToolResult::success(lines.join("\n"))
            }
            Err(e) => ToolResult::error(format!("archival_query failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_then_query_round_trip() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let store_tool = ArchivalStoreTool::new(Arc::clone(&store));
        let query_tool = ArchivalQueryTool::new(store);

        let r = store_tool
            .execute(serde_json::json!({"content": "prefers window seats", "category": "travel"}))
            .await;
        assert!(!r.is_error);

        let r = query_tool
            .execute(serde_json::json!({"query": "window"}))
            .await;
        assert!(r.content.contains("prefers window seats"));
        assert!(r.content.contains("[travel]"));
    }

    #[tokio::test]
    async fn empty_query_result_is_not_an_error() {
        let query_tool = ArchivalQueryTool::new(Arc::new(Store::open_in_memory().unwrap()));
        let r = query_tool
            .execute(serde_json::json!({"query": "nothing here"}))
            .await;
        assert!(!r.is_error);
        assert!(r.content.contains("No matching facts"));
    }
}
