//! LLM error taxonomy
//!
//! Errors split into transient failures (retried, counted by the circuit
//! breaker) and fatal ones (returned immediately, breaker untouched).

use std::time::Duration;
use thiserror::Error;

/// Errors from the model call path
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Sentinel rejection while the circuit breaker is open
    #[error("Circuit breaker is open")]
    CircuitOpen,

    /// The caller's deadline was canceled
    #[error("Operation canceled")]
    Canceled,
}

impl LlmError {
    /// Transient failures worth another attempt.
    ///
    /// 5xx and 429 responses, network errors, and per-attempt timeouts are
    /// retryable. Auth and other client errors, parse failures, an open
    /// circuit, and cancellation are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } => true,
            LlmError::ApiError { status, message } => {
                *status >= 500 || *status == 429 || message.to_lowercase().contains("service unavailable")
            }
            LlmError::Network(_) => true,
            LlmError::Timeout(_) => true,
            LlmError::InvalidResponse(_) => false,
            LlmError::Json(_) => false,
            LlmError::CircuitOpen => false,
            LlmError::Canceled => false,
        }
    }

    /// Retry hint from a rate-limit response, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(
            LlmError::RateLimited {
                retry_after: Duration::from_secs(60)
            }
            .is_retryable()
        );
        assert!(
            LlmError::ApiError {
                status: 500,
                message: "server error".to_string()
            }
            .is_retryable()
        );
        assert!(
            LlmError::ApiError {
                status: 429,
                message: "too many requests".to_string()
            }
            .is_retryable()
        );
        assert!(
            LlmError::ApiError {
                status: 400,
                message: "Service Unavailable".to_string()
            }
            .is_retryable()
        );
        assert!(LlmError::Timeout(Duration::from_secs(30)).is_retryable());
    }

    #[test]
    fn test_fatal_errors_are_not_retryable() {
        assert!(
            !LlmError::ApiError {
                status: 401,
                message: "invalid api key".to_string()
            }
            .is_retryable()
        );
        assert!(
            !LlmError::ApiError {
                status: 403,
                message: "forbidden".to_string()
            }
            .is_retryable()
        );
        assert!(!LlmError::InvalidResponse("bad json".to_string()).is_retryable());
        assert!(!LlmError::CircuitOpen.is_retryable());
        assert!(!LlmError::Canceled.is_retryable());
    }

    #[test]
    fn test_retry_after() {
        let err = LlmError::RateLimited {
            retry_after: Duration::from_secs(42),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(42)));

        let err = LlmError::ApiError {
            status: 500,
            message: "server error".to_string(),
        };
        assert_eq!(err.retry_after(), None);
    }
}
