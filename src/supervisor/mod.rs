//! Supervisor - the engine that owns the LLM client, breaker, and store
//!
//! Every stage operation shares one skeleton: build prompt, call the model
//! through the resilient path, parse leniently, validate, record usage.
//! The stage operations live in sibling files; this module holds the shell
//! and the single model-call primitive they all flow through.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::{Config, DEFAULT_MODEL};
use crate::llm::{AnthropicClient, CompletionRequest, LlmClient, LlmError, TokenUsage};
use crate::resilience::{BreakerState, CircuitBreaker, RetryConfig, retry_with_backoff};
use crate::store::{IssueStore, UsageEvent};

mod analysis;
mod assessment;
mod completion;
mod diagnosis;
mod planning;
pub(crate) mod prompts;
mod text;

pub use diagnosis::{FailureType, TestDiagnosis};
pub use planning::StructureVerdict;
pub use text::ParsedDescription;

/// Actor string the engine passes to every store verb
pub const ACTOR: &str = "ai-supervisor";

/// The supervision engine.
///
/// Safe to share across tasks: the store and client are behind `Arc`, and
/// the breaker serializes its own transitions. No operation retains the
/// vendor client beyond the call scope.
pub struct Supervisor {
    llm: Arc<dyn LlmClient>,
    model: String,
    store: Arc<dyn IssueStore>,
    retry: RetryConfig,
    breaker: Option<CircuitBreaker>,
}

/// Text plus token accounting from one model call
pub(crate) struct ModelReply {
    pub text: String,
    pub usage: TokenUsage,
}

impl Supervisor {
    /// Construct with the Anthropic client from configuration.
    ///
    /// Fails when the configured API key environment variable is unset.
    pub fn new(store: Arc<dyn IssueStore>, config: &Config) -> Result<Self, LlmError> {
        let client = AnthropicClient::from_config(&config.llm)?;
        Ok(Self::with_client(Arc::new(client), store, config))
    }

    /// Construct with an injected client (tests, alternative vendors)
    pub fn with_client(llm: Arc<dyn LlmClient>, store: Arc<dyn IssueStore>, config: &Config) -> Self {
        let model = if config.llm.model.trim().is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            config.llm.model.clone()
        };

        let breaker = config
            .retry
            .circuit_breaker_enabled
            .then(|| CircuitBreaker::new(config.retry.breaker_config()));

        Self {
            llm,
            model,
            store,
            retry: config.retry.clone(),
            breaker,
        }
    }

    /// Use a non-default model for subsequent calls
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn store(&self) -> &Arc<dyn IssueStore> {
        &self.store
    }

    /// Ok while the breaker is closed or half-open (or disabled)
    pub fn health_check(&self) -> Result<(), LlmError> {
        match &self.breaker {
            Some(breaker) => breaker.health(),
            None => Ok(()),
        }
    }

    /// Breaker state for observability; None when disabled
    pub fn breaker_state(&self) -> Option<BreakerState> {
        self.breaker.as_ref().map(|b| b.state())
    }

    /// The one primitive every stage operation flows through: call the
    /// model under retry + breaker, concatenate text, record usage.
    pub(crate) async fn call_model(
        &self,
        activity: &str,
        issue_id: Option<&str>,
        system_prompt: &str,
        prompt: String,
        max_tokens: u32,
        temperature: f64,
    ) -> Result<ModelReply, LlmError> {
        let started = Instant::now();
        let request = CompletionRequest {
            model: self.model.clone(),
            system_prompt: system_prompt.to_string(),
            user_message: prompt,
            max_tokens,
            temperature,
        };

        debug!(activity, model = %self.model, max_tokens, "calling model");
        let response = retry_with_backoff(activity, &self.retry, self.breaker.as_ref(), || {
            self.llm.complete(request.clone())
        })
        .await?;

        if response.text.trim().is_empty() {
            return Err(LlmError::InvalidResponse(format!(
                "{}: model returned no text content",
                activity
            )));
        }

        let duration = started.elapsed();
        debug!(
            activity,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            duration_ms = duration.as_millis() as u64,
            "model call complete"
        );

        if let Some(id) = issue_id {
            let event = UsageEvent {
                issue_id: id.to_string(),
                activity: activity.to_string(),
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
                duration,
                model: self.model.clone(),
            };
            // Usage accounting must not fail the stage operation
            if let Err(e) = self.store.record_usage(ACTOR, &event).await {
                warn!(activity, issue_id = id, error = %e, "failed to record usage event");
            }
        }

        Ok(ModelReply {
            text: response.text,
            usage: response.usage,
        })
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::llm::testutil::ScriptedClient;
    use crate::store::MemoryStore;

    /// Supervisor wired to a scripted client and a fresh memory store
    pub(crate) fn scripted_supervisor() -> (Supervisor, Arc<ScriptedClient>, Arc<MemoryStore>) {
        let client = Arc::new(ScriptedClient::new());
        let store = Arc::new(MemoryStore::new());
        let config = Config {
            retry: RetryConfig {
                max_retries: 0,
                initial_backoff_ms: 1,
                ..RetryConfig::default()
            },
            ..Config::default()
        };
        let supervisor = Supervisor::with_client(client.clone(), store.clone(), &config);
        (supervisor, client, store)
    }
}
