use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid block type: {0} (expected user, identity, or ideaspace)")]
    InvalidBlock(String),

    #[error("no previous version of {0} to roll back to")]
    NoHistory(String),

    #[error("content cannot be empty")]
    EmptyContent,

    #[error("cron job not found: {id}")]
    JobNotFound { id: i64 },

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
