use thiserror::Error;

/// Turn-level error taxonomy shared across the workspace.
///
/// The HTTP layer maps `Configuration` to 503, `InvalidInput` to 400 and
/// everything else to 500.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transient provider error: {0}")]
    Transient(String),

    #[error("storage error: {0}")]
    Store(String),

    #[error("LLM provider error: {0}")]
    Provider(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
