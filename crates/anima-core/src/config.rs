use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Top-level config: `anima.toml` base with the canonical environment keys
/// (`OPENAI_API_KEY`, `DATABASE_URL`, `AGENT_TIMEZONE`, ...) applied on top.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimaConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub episodic: EpisodicConfig,
}

impl Default for AnimaConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            llm: LlmConfig::default(),
            database: DatabaseConfig::default(),
            agent: AgentConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            channels: ChannelsConfig::default(),
            episodic: EpisodicConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Extra CORS origins on top of the local dashboard origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub api_key: String,
    /// Custom OpenAI-compatible endpoint. `None` means api.openai.com.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
            model: default_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file. `DATABASE_URL` overrides this.
    #[serde(default = "default_db_path")]
    pub url: String,
    /// Directory for the activity sentinel and rotating logs.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_db_path(),
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// IANA timezone the agent thinks in (timestamps, day boundaries).
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Floor for the sliding history window.
    #[serde(default = "default_recent_limit")]
    pub recent_messages_limit: usize,
    /// Token-budget safety cap applied after the window.
    #[serde(default = "default_context_tokens")]
    pub context_window_tokens: usize,
    /// Number of daily summaries injected into the prompt.
    #[serde(default = "default_summary_days")]
    pub summary_days: usize,
    #[serde(default = "default_user_id")]
    pub default_user_id: String,
    #[serde(default = "default_channel_type")]
    pub default_channel_type: String,
    #[serde(default = "default_display_name")]
    pub user_display_name: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            recent_messages_limit: default_recent_limit(),
            context_window_tokens: default_context_tokens(),
            summary_days: default_summary_days(),
            default_user_id: default_user_id(),
            default_channel_type: default_channel_type(),
            user_display_name: default_display_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_interval")]
    pub interval_minutes: u64,
    /// Waking-hours window in the agent timezone: [wake_hour, sleep_hour).
    #[serde(default = "default_wake_hour")]
    pub wake_hour: u32,
    #[serde(default = "default_sleep_hour")]
    pub sleep_hour: u32,
    /// Skip a heartbeat if the user was active within this many minutes.
    #[serde(default = "default_skip_window")]
    pub skip_window_minutes: u64,
    /// Custom heartbeat prompt file; built-in default when unset.
    #[serde(default)]
    pub prompt_path: Option<String>,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_heartbeat_interval(),
            wake_hour: default_wake_hour(),
            sleep_hour: default_sleep_hour(),
            skip_window_minutes: default_skip_window(),
            prompt_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelsConfig {
    pub discord: Option<DiscordChannelConfig>,
    pub telegram: Option<TelegramChannelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordChannelConfig {
    pub bot_token: String,
    /// The single channel the agent listens on.
    pub channel_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChannelConfig {
    pub bot_token: String,
    /// The single chat the agent listens on.
    pub chat_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodicConfig {
    #[serde(default = "default_episodic_url")]
    pub base_url: String,
    #[serde(default = "default_episodic_bank")]
    pub bank_id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Identity tag attached to retained memories.
    #[serde(default)]
    pub user_id: Option<String>,
}

impl Default for EpisodicConfig {
    fn default() -> Self {
        Self {
            base_url: default_episodic_url(),
            bank_id: default_episodic_bank(),
            enabled: default_true(),
            user_id: None,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_db_path() -> String {
    "data/anima.db".to_string()
}
fn default_data_dir() -> String {
    "data".to_string()
}
fn default_timezone() -> String {
    "America/New_York".to_string()
}
fn default_recent_limit() -> usize {
    30
}
fn default_context_tokens() -> usize {
    200_000
}
fn default_summary_days() -> usize {
    7
}
fn default_user_id() -> String {
    "local:user".to_string()
}
fn default_channel_type() -> String {
    "local".to_string()
}
fn default_display_name() -> String {
    "User".to_string()
}
fn default_heartbeat_interval() -> u64 {
    60
}
fn default_wake_hour() -> u32 {
    5
}
fn default_sleep_hour() -> u32 {
    22
}
fn default_skip_window() -> u64 {
    5
}
fn default_episodic_url() -> String {
    "http://localhost:8888".to_string()
}
fn default_episodic_bank() -> String {
    "anima".to_string()
}
fn default_true() -> bool {
    true
}

impl AnimaConfig {
    /// Load config: defaults < `anima.toml` (or explicit path) < env keys.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.unwrap_or("anima.toml");
        let config: AnimaConfig = Figment::from(Serialized::defaults(AnimaConfig::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| crate::error::AgentError::Configuration(e.to_string()))?;
        Ok(config.with_env_overrides())
    }

    /// Apply the canonical environment keys on top of the file config.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_var("OPENAI_API_KEY") {
            self.llm.api_key = v;
        }
        if let Some(v) = env_var("OPENAI_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Some(v) = env_var("OPENAI_MODEL_NAME") {
            self.llm.model = v;
        }
        if let Some(v) = env_var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = env_var("AGENT_TIMEZONE") {
            self.agent.timezone = v;
        }
        if let Some(v) = env_parse("RECENT_MESSAGES_LIMIT") {
            self.agent.recent_messages_limit = v;
        }
        if let Some(v) = env_parse("CONTEXT_WINDOW_TOKENS") {
            self.agent.context_window_tokens = v;
        }
        if let Some(v) = env_parse("HEARTBEAT_INTERVAL_MINUTES") {
            self.heartbeat.interval_minutes = v;
        }
        if let Some(v) = env_parse("HEARTBEAT_WAKE_HOUR") {
            self.heartbeat.wake_hour = v;
        }
        if let Some(v) = env_parse("HEARTBEAT_SLEEP_HOUR") {
            self.heartbeat.sleep_hour = v;
        }
        if let Some(v) = env_parse("HEARTBEAT_SKIP_WINDOW_MINUTES") {
            self.heartbeat.skip_window_minutes = v;
        }
        if let Some(v) = env_var("HEARTBEAT_PROMPT_PATH") {
            self.heartbeat.prompt_path = Some(v);
        }
        if let Some(v) = env_var("DEFAULT_USER_ID") {
            self.agent.default_user_id = v;
        }
        if let Some(v) = env_var("DEFAULT_CHANNEL_TYPE") {
            self.agent.default_channel_type = v;
        }
        if let Some(v) = env_var("USER_DISPLAY_NAME") {
            self.agent.user_display_name = v;
        }
        if let Some(v) = env_var("HINDSIGHT_BASE_URL") {
            self.episodic.base_url = v;
        }
        if let Some(v) = env_var("HINDSIGHT_BANK_ID") {
            self.episodic.bank_id = v;
        }
        if let Some(v) = env_var("HINDSIGHT_ENABLED") {
            self.episodic.enabled = matches!(v.to_lowercase().as_str(), "true" | "1" | "yes");
        }
        if let Some(v) = env_var("HINDSIGHT_USER_ID") {
            self.episodic.user_id = Some(v);
        }
        if let Some(v) = env_var("CORS_ORIGINS") {
            self.gateway
                .cors_origins
                .extend(v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from));
        }

        if let (Some(token), Some(raw_id)) = (env_var("TELEGRAM_BOT_TOKEN"), env_var("TELEGRAM_CHAT_ID")) {
            match raw_id.parse::<i64>() {
                Ok(chat_id) => {
                    self.channels.telegram = Some(TelegramChannelConfig {
                        bot_token: token,
                        chat_id,
                    })
                }
                Err(_) => warn!(chat_id = %raw_id, "TELEGRAM_CHAT_ID is not a valid integer, Telegram disabled"),
            }
        }
        if let (Some(token), Some(raw_id)) = (env_var("DISCORD_BOT_TOKEN"), env_var("DISCORD_CHANNEL_ID")) {
            match raw_id.parse::<u64>() {
                Ok(channel_id) => {
                    self.channels.discord = Some(DiscordChannelConfig {
                        bot_token: token,
                        channel_id,
                    })
                }
                Err(_) => warn!(channel_id = %raw_id, "DISCORD_CHANNEL_ID is not a valid integer, Discord disabled"),
            }
        }

        // The episodic identity doubles as the default user id when one was
        // never configured, so memories line up across platforms.
        if self.agent.default_user_id == default_user_id() {
            if let Some(ref uid) = self.episodic.user_id {
                self.agent.default_user_id = uid.clone();
            }
        }

        self
    }

    /// The agent timezone, falling back to the default when unparseable.
    pub fn agent_tz(&self) -> chrono_tz::Tz {
        self.agent.timezone.parse().unwrap_or_else(|_| {
            warn!(timezone = %self.agent.timezone, "unknown AGENT_TIMEZONE, falling back to America/New_York");
            chrono_tz::America::New_York
        })
    }

    /// Location of the activity sentinel file.
    pub fn sentinel_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.database.data_dir).join("last_active.txt")
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_var(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(%key, value = %raw, "ignoring unparseable env override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AnimaConfig::default();
        assert_eq!(cfg.agent.recent_messages_limit, 30);
        assert_eq!(cfg.agent.context_window_tokens, 200_000);
        assert_eq!(cfg.heartbeat.interval_minutes, 60);
        assert_eq!(cfg.heartbeat.wake_hour, 5);
        assert_eq!(cfg.heartbeat.sleep_hour, 22);
        assert_eq!(cfg.heartbeat.skip_window_minutes, 5);
        assert!(cfg.channels.discord.is_none());
        assert!(cfg.channels.telegram.is_none());
    }

    #[test]
    fn timezone_parses() {
        let cfg = AnimaConfig::default();
        assert_eq!(cfg.agent_tz(), chrono_tz::America::New_York);
    }

    #[test]
    fn bad_timezone_falls_back() {
        let mut cfg = AnimaConfig::default();
        cfg.agent.timezone = "Nowhere/Invalid".into();
        assert_eq!(cfg.agent_tz(), chrono_tz::America::New_York);
    }

    #[test]
    fn sentinel_lives_in_data_dir() {
        let cfg = AnimaConfig::default();
        assert_eq!(
            cfg.sentinel_path(),
            std::path::PathBuf::from("data/last_active.txt")
        );
    }
}
