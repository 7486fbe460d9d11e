use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("store error: {0}")]
    Store(#[from] anima_store::StoreError),

    #[error("invalid schedule time: {0}")]
    InvalidTime(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
