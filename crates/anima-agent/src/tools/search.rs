//! Conversation search: on-demand recall from the full persisted history,
//! beyond the sliding in-context window.

use std::sync::Arc;

use async_trait::async_trait;

use anima_episodic::EpisodicMemory;
use anima_store::{Store, StoredMessage};

use super::{Tool, ToolResult};

const MAX_RESULTS: usize = 20;
/// Below this many keyword hits, "both" mode also runs semantic recall.
const SEMANTIC_FALLBACK_THRESHOLD: usize = 3;

pub struct ConversationSearchTool {
    store: Arc<Store>,
    episodic: Arc<EpisodicMemory>,
}

impl ConversationSearchTool {
    pub fn new(store: Arc<Store>, episodic: Arc<EpisodicMemory>) -> Self {
        Self { store, episodic }
    }
}

#[async_trait]
impl Tool for ConversationSearchTool {
    fn name(&self) -> &str {
        "conversation_search"
    }

    fn description(&self) -> &str {
        "Search your full conversation history for messages matching a query. \
         Your active context only holds the most recent messages; use this when \
         the user references an older exchange or you need details outside the \
         current window."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Keywords, a phrase, or a topic."
                },
                "mode": {
                    "type": "string",
                    "enum": ["keyword", "semantic", "both"],
                    "description": "keyword: substring match in the database. semantic: episodic recall. both (default): keyword first, semantic when few results."
                },
                "limit": {
                    "type": "integer",
                    "description": "Max results (default 10, max 20)."
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let query = match input.get("query").and_then(|v| v.as_str()) {
            Some(q) if !q.trim().is_empty() => q.to_string(),
            _ => return ToolResult::error("missing required parameter: query"),
        };
        let mode = input
            .get("mode")
            .and_then(|v| v.as_str())
            .unwrap_or("both")
            .to_string();
        let limit = input
            .get("limit")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(10)
            .min(MAX_RESULTS);

        let mut sections: Vec<String> = Vec::new();
        let mut keyword_hits = 0usize;

        if mode == "keyword" || mode == "both" {
            match self.store.search_messages(&query, None, limit) {
                Ok(rows) if !rows.is_empty() => {
                    keyword_hits = rows.len();
                    sections.push("--- Keyword matches from conversation history ---".into());
                    sections.push(format_results(&rows));
                }
                Ok(_) => {}
                Err(e) => return ToolResult::error(format!("conversation_search failed: {e}")),
            }
        }

        let run_semantic =
            mode == "semantic" || (mode == "both" && keyword_hits < SEMANTIC_FALLBACK_THRESHOLD);
        if run_semantic {
            let semantic = self.episodic.recall(&query).await;
            if !semantic.contains("don't have any memories") && !semantic.contains("not available")
            {
                sections.push("--- Semantic recall from episodic memory ---".into());
                sections.push(semantic);
            }
        }

        if sections.is_empty() {
            return ToolResult::success(format!(
                "No conversation history found matching '{query}'."
            ));
        }
        ToolResult::success(sections.join("\n\n"))
    }
}

/// Readable snippets with role and date; long messages are truncated.
fn format_results(rows: &[StoredMessage]) -> String {
    rows.iter()
        .map(|row| {
            let role = capitalize(&row.role.to_string());
            let date = row.created_at.format("%Y-%m-%d %H:%M");
            let mut content = row.content.trim().to_string();
            if content.chars().count() > 500 {
                content = content.chars().take(500).collect::<String>() + "…";
            }
            format!("[{role} @ {date}]\n{content}")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().to_string() + c.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anima_core::config::EpisodicConfig;
    use anima_store::NewMessage;

    fn tool_with_history() -> ConversationSearchTool {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store
            .append_messages(
                "main",
                &[
                    NewMessage::user("we talked about the telescope project"),
                    NewMessage::assistant("the telescope needs a new mount"),
                ],
                None,
            )
            .unwrap();
        let episodic = Arc::new(EpisodicMemory::new(&EpisodicConfig {
            enabled: false,
            ..Default::default()
        }));
        ConversationSearchTool::new(store, episodic)
    }

    #[tokio::test]
    async fn keyword_mode_formats_role_and_date() {
        let tool = tool_with_history();
        let r = tool
            .execute(serde_json::json!({"query": "telescope", "mode": "keyword"}))
            .await;
        assert!(!r.is_error);
        assert!(r.content.contains("Keyword matches"));
        assert!(r.content.contains("[User @ "));
        assert!(r.content.contains("[Assistant @ "));
    }

    #[tokio::test]
    async fn no_hits_reports_politely() {
        let tool = tool_with_history();
        let r = tool
            .execute(serde_json::json!({"query": "zeppelin", "mode": "keyword"}))
            .await;
        assert!(!r.is_error);
        assert!(r.content.contains("No conversation history found"));
    }
}
