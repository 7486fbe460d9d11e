use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform a turn arrived on. `Internal` marks agent-initiated turns
/// (heartbeat, cron) that must not reset the activity sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Discord,
    Telegram,
    Local,
    Internal,
}

impl ChannelKind {
    pub fn is_external(&self) -> bool {
        !matches!(self, ChannelKind::Internal)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelKind::Discord => "discord",
            ChannelKind::Telegram => "telegram",
            ChannelKind::Local => "local",
            ChannelKind::Internal => "internal",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "discord" => Ok(ChannelKind::Discord),
            "telegram" => Ok(ChannelKind::Telegram),
            "local" => Ok(ChannelKind::Local),
            "internal" => Ok(ChannelKind::Internal),
            other => Err(format!("unknown channel kind: {other}")),
        }
    }
}

/// A message pushed to a platform outside the current turn. The recipient is
/// the platform's own id for the destination (Telegram chat id, Discord
/// channel id) encoded as a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelOutbound {
    pub recipient: String,
    pub message: String,
}

/// A normalised inbound turn. Every ingress adapter produces one of these
/// and hands it to the orchestrator.
#[derive(Debug, Clone)]
pub struct IncomingTurn {
    /// Conversation thread; `"main"` is the principal user's canonical thread.
    pub thread_id: String,
    /// Raw user text. This is what the LLM responds to.
    pub text: String,
    /// Display label stamped into `metadata.role_display` on the stored row.
    pub user_display: Option<String>,
    /// Stable per-platform identity (e.g. "discord:1234", "agent:cron").
    pub user_id: String,
    pub channel: ChannelKind,
    pub is_group: bool,
    /// When set, this is persisted instead of `text`. The heartbeat uses it
    /// to store a short placeholder while the LLM still sees the full prompt.
    pub stored_content: Option<String>,
}

impl IncomingTurn {
    pub fn new(thread_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            text: text.into(),
            user_display: None,
            user_id: String::new(),
            channel: ChannelKind::Local,
            is_group: false,
            stored_content: None,
        }
    }
}
