//! Retry with exponential backoff around the model call

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::breaker::{BreakerConfig, CircuitBreaker};
use crate::llm::LlmError;

/// Policy for the resilient call path
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    #[serde(rename = "initial-backoff-ms")]
    pub initial_backoff_ms: u64,

    #[serde(rename = "max-backoff-ms")]
    pub max_backoff_ms: u64,

    #[serde(rename = "backoff-multiplier")]
    pub backoff_multiplier: f64,

    /// Deadline for each individual attempt
    #[serde(rename = "attempt-timeout-ms")]
    pub attempt_timeout_ms: u64,

    #[serde(rename = "circuit-breaker-enabled")]
    pub circuit_breaker_enabled: bool,

    #[serde(rename = "failure-threshold")]
    pub failure_threshold: u32,

    #[serde(rename = "success-threshold")]
    pub success_threshold: u32,

    #[serde(rename = "open-timeout-ms")]
    pub open_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 60_000,
            backoff_multiplier: 2.0,
            attempt_timeout_ms: 120_000,
            circuit_breaker_enabled: true,
            failure_threshold: 5,
            success_threshold: 2,
            open_timeout_ms: 30_000,
        }
    }
}

impl RetryConfig {
    /// Backoff before retry `attempt` (0-based): min(max, initial * mult^attempt)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let scaled = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis((scaled as u64).min(self.max_backoff_ms))
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            open_timeout: Duration::from_millis(self.open_timeout_ms),
        }
    }
}

/// Run `attempt_fn` under retry policy and optional circuit breaker.
///
/// Transient errors are retried with exponential backoff (honoring a
/// rate-limit hint when present); fatal errors return immediately without
/// touching the breaker; cancellation propagates without breaker
/// accounting. Each attempt runs under the per-attempt deadline.
pub async fn retry_with_backoff<T, F, Fut>(
    operation: &str,
    config: &RetryConfig,
    breaker: Option<&CircuitBreaker>,
    mut attempt_fn: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let attempts = config.max_retries.saturating_add(1);
    let mut last_error = LlmError::InvalidResponse(format!("{}: no attempts executed", operation));

    for attempt in 0..attempts {
        if let Some(b) = breaker {
            b.allow()?;
        }

        let timeout = config.attempt_timeout();
        let outcome = match tokio::time::timeout(timeout, attempt_fn()).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(timeout)),
        };

        match outcome {
            Ok(value) => {
                if let Some(b) = breaker {
                    b.record_success();
                }
                if attempt > 0 {
                    debug!(operation, attempt, "succeeded after retries");
                }
                return Ok(value);
            }
            Err(LlmError::Canceled) => return Err(LlmError::Canceled),
            Err(e) if !e.is_retryable() => {
                debug!(operation, error = %e, "fatal error, not retrying");
                return Err(e);
            }
            Err(e) => {
                if let Some(b) = breaker {
                    b.record_failure();
                }

                if attempt + 1 < attempts {
                    let backoff = e
                        .retry_after()
                        .unwrap_or_else(|| config.backoff_for(attempt))
                        .min(Duration::from_millis(config.max_backoff_ms));
                    warn!(
                        operation,
                        attempt,
                        error = %e,
                        backoff = ?backoff,
                        "transient error, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                } else {
                    warn!(operation, attempt, error = %e, "retries exhausted");
                }
                last_error = e;
            }
        }
    }

    Err(last_error)
}
