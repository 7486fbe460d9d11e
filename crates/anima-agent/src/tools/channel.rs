//! Proactive cross-channel messaging: the agent can push a message to a
//! connected platform outside the current turn, e.g. pinging the user on
//! Telegram during a heartbeat.

use std::sync::Arc;

use async_trait::async_trait;

use crate::outbound::OutboundRouter;

use super::{Tool, ToolResult};

pub struct ChannelSendTool {
    router: Arc<OutboundRouter>,
}

impl ChannelSendTool {
    pub fn new(router: Arc<OutboundRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl Tool for ChannelSendTool {
    fn name(&self) -> &str {
        "channel_send"
    }

    fn description(&self) -> &str {
        "Send a message to the user on a connected channel (Discord or Telegram), \
         independent of the current conversation. Use to reach out proactively, \
         e.g. during a heartbeat, or to relay something to another platform. \
         Delivery respects each platform's message-length limits."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "channel": {
                    "type": "string",
                    "enum": ["discord", "telegram"],
                    "description": "Which connected channel to send on."
                },
                "recipient": {
                    "type": "string",
                    "description": "The destination id on that platform (Telegram chat id or Discord channel id)."
                },
                "message": {
                    "type": "string",
                    "description": "The message text to deliver."
                }
            },
            "required": ["channel", "recipient", "message"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let channel = match input.get("channel").and_then(|v| v.as_str()) {
            Some(c) if !c.trim().is_empty() => c.trim(),
            _ => return ToolResult::error("missing required parameter: channel"),
        };
        let recipient = match input.get("recipient").and_then(|v| v.as_str()) {
            Some(r) if !r.trim().is_empty() => r.trim(),
            _ => return ToolResult::error("missing required parameter: recipient"),
        };
        let message = match input.get("message").and_then(|v| v.as_str()) {
            Some(m) if !m.trim().is_empty() => m,
            _ => return ToolResult::error("missing required parameter: message"),
        };

        match self.router.dispatch(channel, recipient, message) {
            Ok(()) => ToolResult::success(format!("Message queued for delivery via {channel}")),
            Err(e) => ToolResult::error(format!("channel_send failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queues_for_a_connected_channel() {
        let router = Arc::new(OutboundRouter::new());
        let mut rx = router.register("telegram");
        let tool = ChannelSendTool::new(router);

        let r = tool
            .execute(serde_json::json!({
                "channel": "telegram",
                "recipient": "987",
                "message": "thinking of you"
            }))
            .await;
        assert!(!r.is_error, "{}", r.content);

        let out = rx.recv().await.unwrap();
        assert_eq!(out.recipient, "987");
        assert_eq!(out.message, "thinking of you");
    }

    #[tokio::test]
    async fn disconnected_channel_surfaces_as_tool_error() {
        let tool = ChannelSendTool::new(Arc::new(OutboundRouter::new()));
        let r = tool
            .execute(serde_json::json!({
                "channel": "discord",
                "recipient": "1",
                "message": "hi"
            }))
            .await;
        assert!(r.is_error);
        assert!(r.content.contains("not connected"));
    }
}
