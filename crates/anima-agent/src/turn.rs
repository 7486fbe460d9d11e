//! The turn orchestrator: one user-input-to-reply cycle.
//!
//! Load and trim history, assemble the system prompt, run the tool loop,
//! persist the exchange, touch the activity sentinel, and hand the raw
//! exchange to episodic memory in the background. State is reconstructed
//! from the store on every turn, so the freshly trimmed history is always
//! authoritative.

use std::sync::Arc;

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::json;
use tracing::{debug, info};

use anima_core::{ActivitySentinel, AgentError, AnimaConfig, ChannelKind, IncomingTurn, Result};
use anima_episodic::EpisodicMemory;
use anima_store::{LoadOptions, NewMessage, Role, Store, StoredMessage};

use crate::prompt::{build_system_prompt, format_current_time};
use crate::provider::{ChatRequest, LlmProvider, ProviderError};
use crate::tools::{self, tool_loop, Tool};

const REPLY_MAX_TOKENS: u32 = 4096;

const AUTH_HELP: &str = "LLM authentication failed (401). Check your environment: \
     OPENAI_API_KEY (no extra spaces), OPENAI_BASE_URL, and OPENAI_MODEL_NAME. \
     If they look correct, the key may be expired.";

const CAPACITY_HELP: &str =
    "LLM rate limit: the provider is temporarily at capacity. Please try again in a moment.";

/// Per-turn knobs, resolved once from config at startup.
#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub timezone: Tz,
    pub recent_messages_limit: usize,
    pub context_window_tokens: usize,
    pub summary_days: usize,
    pub model: String,
    pub default_user_id: String,
    pub default_channel: ChannelKind,
}

impl TurnSettings {
    pub fn from_config(config: &AnimaConfig) -> Self {
        Self {
            timezone: config.agent_tz(),
            recent_messages_limit: config.agent.recent_messages_limit,
            context_window_tokens: config.agent.context_window_tokens,
            summary_days: config.agent.summary_days,
            model: config.llm.model.clone(),
            default_user_id: config.agent.default_user_id.clone(),
            default_channel: config
                .agent
                .default_channel_type
                .parse()
                .unwrap_or(ChannelKind::Local),
        }
    }
}

pub struct Orchestrator {
    provider: Box<dyn LlmProvider>,
    tools: Vec<Box<dyn Tool>>,
    store: Arc<Store>,
    episodic: Arc<EpisodicMemory>,
    sentinel: ActivitySentinel,
    settings: TurnSettings,
}

impl Orchestrator {
    pub fn new(
        provider: Box<dyn LlmProvider>,
        tools: Vec<Box<dyn Tool>>,
        store: Arc<Store>,
        episodic: Arc<EpisodicMemory>,
        sentinel: ActivitySentinel,
        settings: TurnSettings,
    ) -> Self {
        Self {
            provider,
            tools,
            store,
            episodic,
            sentinel,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn settings(&self) -> &TurnSettings {
        &self.settings
    }

    pub fn sentinel(&self) -> &ActivitySentinel {
        &self.sentinel
    }

    /// Live manifest of the registered tools, for the prompt.
    pub fn manifest(&self) -> String {
        tools::tool_manifest(&self.tools)
    }

    /// Run one full turn and return the assistant reply.
    pub async fn chat(&self, mut turn: IncomingTurn) -> Result<String> {
        if turn.user_id.trim().is_empty() {
            turn.user_id = self.settings.default_user_id.clone();
        }

        // One consistent "now" for the whole turn.
        let now = Utc::now().with_timezone(&self.settings.timezone);
        let today_start = self.local_midnight(&now);

        let history = self
            .store
            .load_messages(
                &turn.thread_id,
                &LoadOptions {
                    limit: Some(self.settings.recent_messages_limit),
                    since: Some(today_start),
                    max_tokens: Some(self.settings.context_window_tokens),
                    ..LoadOptions::default()
                },
            )
            .map_err(|e| AgentError::Store(e.to_string()))?;

        let mut messages = materialize(&history);

        // The in-context copy gets a salient timestamp prefix; the stored
        // row keeps the raw text.
        messages.push(json!({
            "role": "user",
            "content": format!("[{}]\n{}", format_current_time(&now), turn.text),
        }));

        let blocks = self
            .store
            .get_all_blocks()
            .map_err(|e| AgentError::Store(e.to_string()))?;
        let summaries = self
            .store
            .load_daily_summaries(self.settings.summary_days)
            .map_err(|e| AgentError::Store(e.to_string()))?;
        let system = build_system_prompt(&now, &self.manifest(), &blocks, &summaries);

        let request = ChatRequest {
            model: self.settings.model.clone(),
            system,
            messages,
            max_tokens: REPLY_MAX_TOKENS,
            tools: tools::to_definitions(&self.tools),
        };

        info!(
            thread = %turn.thread_id,
            channel = %turn.channel,
            history = history.len(),
            "running turn"
        );

        let response = tool_loop::run_tool_loop(self.provider.as_ref(), request, &self.tools)
            .await
            .map_err(classify_provider_error)?;
        let reply = response.content;

        // Persist the raw exchange in one write; losing it invalidates the turn.
        let mut rows = vec![NewMessage::user(
            turn.stored_content
                .clone()
                .unwrap_or_else(|| turn.text.clone()),
        )];
        if !reply.is_empty() {
            rows.push(NewMessage::assistant(reply.clone()));
        }
        self.store
            .append_messages(&turn.thread_id, &rows, turn.user_display.as_deref())
            .map_err(|e| AgentError::Store(e.to_string()))?;

        // Heartbeats and cron turns must not suppress future heartbeats.
        if turn.channel.is_external() {
            self.sentinel.touch();
        }

        // Fire-and-forget retain; the collaborator round-trip never blocks
        // the reply.
        let episodic = Arc::clone(&self.episodic);
        let retained_turn = turn.clone();
        let assistant = (!reply.is_empty()).then(|| reply.clone());
        tokio::spawn(async move {
            if !episodic
                .retain_exchange(&retained_turn, assistant.as_deref())
                .await
            {
                debug!(thread = %retained_turn.thread_id, "episodic retain not stored");
            }
        });

        Ok(reply)
    }

    /// Midnight today in the agent timezone, as a UTC instant.
    fn local_midnight(&self, now: &DateTime<Tz>) -> DateTime<Utc> {
        let midnight = now.date_naive().and_time(NaiveTime::MIN);
        self.settings
            .timezone
            .from_local_datetime(&midnight)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| now.with_timezone(&Utc))
    }
}

/// Persisted rows in the LLM's native message shape. Assistant reasoning is
/// folded in as a `<think>` prefix; stray tool rows get synthetic call ids.
fn materialize(history: &[StoredMessage]) -> Vec<serde_json::Value> {
    history
        .iter()
        .enumerate()
        .map(|(i, row)| match row.role {
            Role::User => json!({"role": "user", "content": row.content}),
            Role::Assistant => {
                let content = match row.reasoning.as_deref().map(str::trim) {
                    Some(reasoning) if !reasoning.is_empty() => {
                        format!("<think>\n{reasoning}\n</think>\n\n{}", row.content)
                    }
                    _ => row.content.clone(),
                };
                json!({"role": "assistant", "content": content})
            }
            Role::Tool => json!({
                "role": "tool",
                "tool_call_id": format!("imported-{i}"),
                "content": row.content,
            }),
        })
        .collect()
}

/// Map provider failures onto the turn-level taxonomy: credential problems
/// become configuration errors, capacity problems become transient errors,
/// anything else propagates as-is.
fn classify_provider_error(err: ProviderError) -> AgentError {
    if let ProviderError::RateLimited { .. } = err {
        return AgentError::Transient(CAPACITY_HELP.to_string());
    }
    if let ProviderError::Api { status: 401, .. } = err {
        return AgentError::Configuration(AUTH_HELP.to_string());
    }

    let text = err.to_string().to_lowercase();
    if text.contains("401") || text.contains("authentication") || text.contains("invalid token") {
        AgentError::Configuration(AUTH_HELP.to_string())
    } else if text.contains("429") || text.contains("rate limit") || text.contains("capacity") {
        AgentError::Transient(CAPACITY_HELP.to_string())
    } else {
        AgentError::Provider(err.to_string())
    }
}
