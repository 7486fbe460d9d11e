//! Tool execution loop.
//!
//! Flow: messages → LLM → if tool calls → execute tools → append results →
//! LLM → repeat. Stops when the model returns a terminal assistant message
//! or the iteration guard trips.

use serde_json::json;
use tracing::{debug, info, warn};

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError, ToolCall};

use super::{Tool, ToolResult};

/// Recursion guard against runaway agents.
pub const MAX_ITERATIONS: usize = 25;

/// Run the full tool loop starting from `request`. Returns the terminal
/// response; when the guard trips, the content is the last non-empty
/// assistant text seen.
pub async fn run_tool_loop(
    provider: &dyn LlmProvider,
    mut request: ChatRequest,
    tools: &[Box<dyn Tool>],
) -> Result<ChatResponse, ProviderError> {
    let mut last_text = String::new();

    for iteration in 0..MAX_ITERATIONS {
        debug!(iteration, "tool loop iteration");
        let mut response = provider.send(&request).await?;

        if !response.content.is_empty() {
            last_text = response.content.clone();
        }

        if response.tool_calls.is_empty() || response.stop_reason != "tool_use" {
            info!(iteration, "tool loop complete");
            // A terminal turn can arrive with empty content after a pure
            // tool-call round; fall back to the last text the model produced.
            if response.content.is_empty() {
                response.content = last_text;
            }
            return Ok(response);
        }

        // Assistant turn carrying the tool calls.
        let tool_calls_json: Vec<serde_json::Value> = response
            .tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.name,
                        "arguments": call.input.to_string(),
                    }
                })
            })
            .collect();
        request.messages.push(json!({
            "role": "assistant",
            "content": if response.content.is_empty() {
                serde_json::Value::Null
            } else {
                json!(response.content)
            },
            "tool_calls": tool_calls_json,
        }));

        // Execute sequentially; each result becomes a tool-role message.
        for call in &response.tool_calls {
            let result = execute_tool(tools, call).await;
            request.messages.push(json!({
                "role": "tool",
                "tool_call_id": call.id,
                "content": result.content,
            }));
        }
    }

    warn!(max_iterations = MAX_ITERATIONS, "tool loop hit maximum iterations");
    Ok(ChatResponse {
        content: last_text,
        model: String::new(),
        tokens_in: 0,
        tokens_out: 0,
        stop_reason: "max_iterations".to_string(),
        tool_calls: Vec::new(),
    })
}

/// Find and execute the named tool. Tool panics are impossible by contract;
/// tool errors come back as error results for the LLM to react to.
async fn execute_tool(tools: &[Box<dyn Tool>], call: &ToolCall) -> ToolResult {
    match tools.iter().find(|t| t.name() == call.name) {
        Some(tool) => {
            debug!(tool = %call.name, "executing tool");
            tool.execute(call.input.clone()).await
        }
        None => ToolResult::error(format!("unknown tool: {}", call.name)),
    }
}
