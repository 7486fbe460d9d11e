pub mod config;
pub mod error;
pub mod sentinel;
pub mod types;

pub use config::AnimaConfig;
pub use error::{AgentError, Result};
pub use sentinel::ActivitySentinel;
pub use types::{ChannelKind, ChannelOutbound, IncomingTurn};
