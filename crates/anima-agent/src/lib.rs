//! `anima-agent` — the turn pipeline.
//!
//! Everything between an incoming message and its reply: the LLM provider,
//! deterministic system-prompt assembly, the tool registry, the ReAct tool
//! loop, and the orchestrator that loads and trims history, runs the loop,
//! and persists the exchange.

pub mod openai;
pub mod outbound;
pub mod prompt;
pub mod provider;
pub mod tools;
pub mod turn;

pub use outbound::OutboundRouter;
pub use provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError, ToolCall, ToolDefinition};
pub use turn::{Orchestrator, TurnSettings};
