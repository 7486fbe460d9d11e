//! Daily summary tool: one agent-authored synopsis per date, upserted.

use std::sync::Arc;

use async_trait::async_trait;

use anima_store::Store;

use super::{Tool, ToolResult};

pub struct DailySummaryWriteTool {
    store: Arc<Store>,
}

impl DailySummaryWriteTool {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for DailySummaryWriteTool {
    fn name(&self) -> &str {
        "daily_summary_write"
    }

    fn description(&self) -> &str {
        "Write or update the daily summary for a specific date. \
         Use at the end of each day or during a heartbeat to record key \
         conversations, outcomes, and anything worth carrying forward. Recent \
         summaries are loaded into your context every session."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "date": {
                    "type": "string",
                    "description": "The date to summarise, YYYY-MM-DD (usually today)."
                },
                "summary": {
                    "type": "string",
                    "description": "A concise but meaningful summary of the day, 3-8 sentences."
                }
            },
            "required": ["date", "summary"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let date_str = match input.get("date").and_then(|v| v.as_str()) {
            Some(d) => d.trim(),
            None => return ToolResult::error("missing required parameter: date"),
        };
        let summary = match input.get("summary").and_then(|v| v.as_str()) {
            Some(s) if !s.trim().is_empty() => s,
            _ => return ToolResult::error("missing required parameter: summary"),
        };
        let date: chrono::NaiveDate = match date_str.parse() {
            Ok(d) => d,
            Err(_) => {
                return ToolResult::error(format!(
                    "invalid date '{date_str}', expected YYYY-MM-DD"
                ))
            }
        };

        match self.store.upsert_daily_summary(date, summary) {
            Ok(()) => ToolResult::success(format!("Daily summary saved for {date}.")),
            Err(e) => ToolResult::error(format!("Error saving daily summary: {e}")),
        }
    }
}
