//! Cross-channel outbound routing.
//!
//! Each connected platform adapter registers a bounded queue at startup and
//! drains it in a delivery task; the `channel_send` tool pushes into the
//! queue by channel name. Sends never block a turn: a full or disconnected
//! queue is an immediate error the LLM can react to.

use dashmap::DashMap;
use tokio::sync::mpsc;

use anima_core::ChannelOutbound;

/// Bounded so a dead adapter cannot buffer unbounded proactive messages.
const QUEUE_DEPTH: usize = 32;

/// Registry of connected outbound channels, keyed by channel name
/// ("discord", "telegram").
#[derive(Default)]
pub struct OutboundRouter {
    senders: DashMap<String, mpsc::Sender<ChannelOutbound>>,
}

impl OutboundRouter {
    pub fn new() -> Self {
        Self {
            senders: DashMap::new(),
        }
    }

    /// Register a channel and get the receiving end for its delivery task.
    /// Re-registering a name replaces the previous queue.
    pub fn register(&self, channel: &str) -> mpsc::Receiver<ChannelOutbound> {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        self.senders.insert(channel.to_string(), tx);
        rx
    }

    /// Names of the currently registered channels.
    pub fn connected(&self) -> Vec<String> {
        self.senders.iter().map(|e| e.key().clone()).collect()
    }

    /// Queue a message for delivery on `channel`.
    pub fn dispatch(
        &self,
        channel: &str,
        recipient: &str,
        message: &str,
    ) -> Result<(), String> {
        let sender = self.senders.get(channel).ok_or_else(|| {
            let connected = self.connected();
            if connected.is_empty() {
                format!("channel '{channel}' is not connected (no channels are connected)")
            } else {
                format!(
                    "channel '{channel}' is not connected (connected: {})",
                    connected.join(", ")
                )
            }
        })?;
        sender
            .try_send(ChannelOutbound {
                recipient: recipient.to_string(),
                message: message.to_string(),
            })
            .map_err(|e| format!("failed to queue message for '{channel}': {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatch_reaches_the_registered_receiver() {
        let router = OutboundRouter::new();
        let mut rx = router.register("telegram");

        router.dispatch("telegram", "12345", "hello there").unwrap();
        let out = rx.recv().await.unwrap();
        assert_eq!(out.recipient, "12345");
        assert_eq!(out.message, "hello there");
    }

    #[test]
    fn unknown_channel_reports_connected_set() {
        let router = OutboundRouter::new();
        let _rx = router.register("discord");

        let err = router.dispatch("telegram", "1", "x").unwrap_err();
        assert!(err.contains("not connected"));
        assert!(err.contains("discord"));
    }

    #[test]
    fn full_queue_fails_without_blocking() {
        let router = OutboundRouter::new();
        // Receiver kept alive but never drained.
        let _rx = router.register("discord");
        for i in 0..QUEUE_DEPTH {
            router.dispatch("discord", "1", &format!("m{i}")).unwrap();
        }
        assert!(router.dispatch("discord", "1", "overflow").is_err());
    }
}
