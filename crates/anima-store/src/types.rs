use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamps are stored as RFC 3339 UTC with fixed precision so string
/// comparisons in SQL agree with chronological order.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn to_rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "tool" => Ok(Role::Tool),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A persisted row on a conversation thread.
#[derive(Debug, Clone, Serialize)]
pub struct StoredMessage {
    pub id: i64,
    pub thread_id: String,
    pub idx: i64,
    pub role: Role,
    pub content: String,
    pub reasoning: Option<String>,
    pub created_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

impl StoredMessage {
    /// The `role_display` attribution tag, when present ("heartbeat", "cron",
    /// or a user display name).
    pub fn role_display(&self) -> Option<&str> {
        self.metadata.get("role_display").and_then(|v| v.as_str())
    }
}

/// A row to append. `metadata` is merged with the attribution tag at insert.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    pub reasoning: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            reasoning: None,
            metadata: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            reasoning: None,
            metadata: None,
        }
    }
}

/// The three agent-editable core memory blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    User,
    Identity,
    Ideaspace,
}

impl BlockType {
    pub const ALL: [BlockType; 3] = [BlockType::User, BlockType::Identity, BlockType::Ideaspace];
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BlockType::User => "user",
            BlockType::Identity => "identity",
            BlockType::Ideaspace => "ideaspace",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for BlockType {
    type Err = crate::error::StoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(BlockType::User),
            "identity" => Ok(BlockType::Identity),
            "ideaspace" => Ok(BlockType::Ideaspace),
            other => Err(crate::error::StoreError::InvalidBlock(other.to_string())),
        }
    }
}

/// All four blocks as injected into the system prompt. `system_instructions`
/// is the read-only singleton.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CoreBlocks {
    pub system_instructions: String,
    pub user: String,
    pub identity: String,
    pub ideaspace: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchivalFact {
    pub content: String,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub summary_date: NaiveDate,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Active,
    Paused,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Active => "active",
            JobStatus::Paused => "paused",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(JobStatus::Active),
            "paused" => Ok(JobStatus::Paused),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// Outcome of one cron job execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
    Skipped,
    Aborted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Success => "success",
            RunStatus::Error => "error",
            RunStatus::Skipped => "skipped",
            RunStatus::Aborted => "aborted",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "success" => Ok(RunStatus::Success),
            "error" => Ok(RunStatus::Error),
            "skipped" => Ok(RunStatus::Skipped),
            "aborted" => Ok(RunStatus::Aborted),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// A persisted cron job. Exactly one of `schedule_days` / `run_date` is set,
/// indicated by `is_one_time`; both shapes require `schedule_time`.
#[derive(Debug, Clone, Serialize)]
pub struct CronJob {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub instructions: String,
    pub timezone: String,
    /// Weekdays 0=Monday .. 6=Sunday. `None` for one-time jobs.
    pub schedule_days: Option<Vec<u8>>,
    pub schedule_time: Option<String>,
    pub run_date: Option<NaiveDate>,
    pub is_one_time: bool,
    pub status: JobStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_run_status: Option<RunStatus>,
    pub last_run_error: Option<String>,
    pub run_count: i64,
}

/// Fields for job creation. The one-time/recurring shape is derived from
/// which of `run_date` / `schedule_days` is present.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCronJob {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub instructions: String,
    #[serde(default = "default_job_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub schedule_days: Option<Vec<u8>>,
    #[serde(default)]
    pub schedule_time: Option<String>,
    #[serde(default)]
    pub run_date: Option<NaiveDate>,
    #[serde(default = "default_created_by")]
    pub created_by: String,
}

fn default_job_timezone() -> String {
    "America/New_York".to_string()
}

fn default_created_by() -> String {
    "user".to_string()
}

/// Field-mask update for an existing job. Absent fields are left untouched.
/// Setting `run_date` switches the job to one-time (clearing the day set);
/// setting `schedule_days` switches it to recurring (clearing the date).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CronJobUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub timezone: Option<String>,
    pub schedule_days: Option<Vec<u8>>,
    pub schedule_time: Option<String>,
    pub run_date: Option<NaiveDate>,
    pub status: Option<JobStatus>,
}
