//! LLM client module
//!
//! The vendor contract is a single blocking Messages call; resilience
//! (retry, breaker, timeouts) wraps it one layer up in [`crate::resilience`].

mod anthropic;
pub mod client;
mod error;
#[cfg(test)]
pub(crate) mod testutil;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use types::{CompletionRequest, CompletionResponse, TokenUsage};
