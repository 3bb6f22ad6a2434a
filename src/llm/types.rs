//! LLM request/response types
//!
//! These model the Anthropic Messages API surface the engine actually uses:
//! one system prompt, one user message, a max-token cap, and a temperature.

use serde::{Deserialize, Serialize};

/// Everything needed for one model call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model identifier, embedded verbatim in the vendor call
    pub model: String,

    pub system_prompt: String,

    pub user_message: String,

    pub max_tokens: u32,

    pub temperature: f64,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: String::new(),
            user_message: user_message.into(),
            max_tokens: 4096,
            temperature: 0.2,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Response from a completion request
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// All text content blocks, concatenated in order
    pub text: String,

    pub usage: TokenUsage,
}

/// Token usage for cost accounting
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}
