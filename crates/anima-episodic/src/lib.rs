//! `anima-episodic` — client for the external episodic-memory collaborator.
//!
//! Three operations: `retain` (fire-and-forget after each turn), `recall`
//! (semantic search) and `reflect` (deeper synthesis). The collaborator is
//! best-effort: when it is disabled or unreachable, retain reports `false`
//! and recall/reflect return an explanatory string. Nothing here ever fails
//! a chat turn.

use std::time::Duration;

use anima_core::config::EpisodicConfig;
use anima_core::{ChannelKind, IncomingTurn};
use serde::Deserialize;
use tracing::debug;

/// Round-trips to the collaborator are bounded so a hung service cannot pin
/// background tasks forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub struct EpisodicMemory {
    client: reqwest::Client,
    base_url: String,
    bank_id: String,
    enabled: bool,
    user_id: Option<String>,
}

impl EpisodicMemory {
    pub fn new(config: &EpisodicConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bank_id: config.bank_id.clone(),
            enabled: config.enabled,
            user_id: config.user_id.clone(),
        }
    }

    /// Retain one user/assistant exchange as lived experience. Returns
    /// whether the memory was accepted; failure is always soft.
    pub async fn retain_exchange(
        &self,
        turn: &IncomingTurn,
        assistant_content: Option<&str>,
    ) -> bool {
        if !self.enabled {
            return false;
        }

        let content = format_as_lived_experience(&turn.text, assistant_content);
        let tags = build_tags(&turn.user_id, self.user_id.as_deref(), turn.channel, turn.is_group);

        let body = serde_json::json!({
            "content": content,
            "context": "conversation",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "metadata": { "thread_id": turn.thread_id },
            "tags": tags,
        });

        let url = format!("{}/v1/banks/{}/retain", self.base_url, self.bank_id);
        match self.client.post(&url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                debug!(status = %resp.status(), "episodic retain rejected");
                false
            }
            Err(e) => {
                debug!(error = %e, "episodic retain unreachable");
                false
            }
        }
    }

    /// Semantic search over retained experiences, formatted as first-person
    /// recollection.
    pub async fn recall(&self, query: &str) -> String {
        if !self.enabled {
            return "Episodic memory is not available. Memory recall failed.".to_string();
        }

        let url = format!("{}/v1/banks/{}/recall", self.base_url, self.bank_id);
        let body = serde_json::json!({ "query": query });
        let resp = match self.client.post(&url).json(&body).send().await {
            Ok(r) => r,
            Err(_) => return "Episodic memory is not available. Memory recall failed.".to_string(),
        };
        if !resp.status().is_success() {
            return format!("Episodic recall failed: HTTP {}", resp.status());
        }

        let parsed: RecallResponse = match resp.json().await {
            Ok(p) => p,
            Err(e) => return format!("Episodic recall failed: {e}"),
        };

        let texts: Vec<String> = parsed
            .results
            .into_iter()
            .map(|r| r.text.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if texts.is_empty() {
            return "I don't have any memories that match that.".to_string();
        }

        format!("From my experience with the user:\n\n{}", texts.join("\n\n"))
    }

    /// Deeper synthesis over retained experiences.
    pub async fn reflect(&self, query: &str) -> String {
        if !self.enabled {
            return "Episodic memory is not available. Reflection failed.".to_string();
        }

        let url = format!("{}/v1/banks/{}/reflect", self.base_url, self.bank_id);
        let body = serde_json::json!({ "query": query });
        let resp = match self.client.post(&url).json(&body).send().await {
            Ok(r) => r,
            Err(_) => return "Episodic memory is not available. Reflection failed.".to_string(),
        };
        if !resp.status().is_success() {
            return format!("Episodic reflect failed: HTTP {}", resp.status());
        }

        let parsed: ReflectResponse = match resp.json().await {
            Ok(p) => p,
            Err(e) => return format!("Episodic reflect failed: {e}"),
        };

        let text = parsed.text.trim().to_string();
        if text.is_empty() {
            "I reflected but have nothing specific to share.".to_string()
        } else {
            text
        }
    }
}

#[derive(Deserialize)]
struct RecallResponse {
    #[serde(default)]
    results: Vec<RecallResult>,
}

#[derive(Deserialize)]
struct RecallResult {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ReflectResponse {
    #[serde(default)]
    text: String,
}

/// Serialise an exchange as the agent's lived experience. Narrative and
/// first-person, not a structured record.
fn format_as_lived_experience(user_content: &str, assistant_content: Option<&str>) -> String {
    let user_content = user_content.trim();
    match assistant_content.map(str::trim).filter(|s| !s.is_empty()) {
        Some(assistant) => format!(
            "The user and I were in conversation. They said to me: \"{user_content}\" \
             I responded from our shared context: \"{assistant}\""
        ),
        None => format!("The user reached out to me. They said: \"{user_content}\""),
    }
}

/// Tags for cross-platform continuity: a stable `user:` identity, the
/// channel, and `group` for group chats.
fn build_tags(
    turn_user_id: &str,
    configured_user_id: Option<&str>,
    channel: ChannelKind,
    is_group: bool,
) -> Vec<String> {
    let mut tags = Vec::new();

    let effective = if turn_user_id.trim().is_empty() {
        configured_user_id.unwrap_or("").trim()
    } else {
        turn_user_id.trim()
    };
    if !effective.is_empty() {
        if effective.contains(':') {
            tags.push(effective.to_string());
        } else {
            tags.push(format!("user:{effective}"));
        }
    }

    tags.push(format!("channel:{channel}"));
    if is_group {
        tags.push("group".to_string());
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_reads_as_first_person_narrative() {
        let text = format_as_lived_experience("how are you?", Some("doing well"));
        assert!(text.starts_with("The user and I were in conversation."));
        assert!(text.contains("\"how are you?\""));
        assert!(text.contains("\"doing well\""));
    }

    #[test]
    fn missing_reply_uses_reached_out_form() {
        let text = format_as_lived_experience("hello", None);
        assert!(text.starts_with("The user reached out to me."));
    }

    #[test]
    fn blank_reply_is_treated_as_missing() {
        let text = format_as_lived_experience("hello", Some("   "));
        assert!(text.starts_with("The user reached out to me."));
    }

    #[test]
    fn tags_carry_identity_channel_and_group() {
        let tags = build_tags("discord:42", None, ChannelKind::Discord, true);
        assert_eq!(tags, vec!["discord:42", "channel:discord", "group"]);
    }

    #[test]
    fn bare_identity_gets_user_prefix() {
        let tags = build_tags("alice", None, ChannelKind::Local, false);
        assert_eq!(tags, vec!["user:alice", "channel:local"]);
    }

    #[test]
    fn configured_identity_backfills_empty_turn_id() {
        let tags = build_tags("", Some("user:prime"), ChannelKind::Telegram, false);
        assert_eq!(tags, vec!["user:prime", "channel:telegram"]);
    }

    #[tokio::test]
    async fn disabled_collaborator_soft_fails() {
        let config = EpisodicConfig {
            enabled: false,
            ..Default::default()
        };
        let episodic = EpisodicMemory::new(&config);

        let turn = IncomingTurn::new("main", "hi");
        assert!(!episodic.retain_exchange(&turn, Some("hello")).await);
        assert!(episodic.recall("anything").await.contains("not available"));
        assert!(episodic.reflect("anything").await.contains("not available"));
    }
}
