//! Circuit breaker in front of the model call path
//!
//! States:
//! - closed: requests allowed; consecutive retryable failures counted
//! - open: requests rejected with [`LlmError::CircuitOpen`] until the open
//!   timeout elapses
//! - half-open: probe requests admitted; successes close the circuit, any
//!   failure reopens it

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::llm::LlmError;

/// Breaker thresholds, derived from [`super::RetryConfig`]
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before opening
    pub failure_threshold: u32,

    /// Probe successes before closing from half-open
    pub success_threshold: u32,

    /// Time the circuit stays open before admitting a probe
    pub open_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_timeout: Duration::from_secs(30),
        }
    }
}

/// Breaker state, observable for tests and health checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    failures: u32,
    successes: u32,
    opened_at: Option<Instant>,
}

/// Fail-fast gate shared across all calls of one supervisor.
///
/// Transitions are serialized behind a mutex and logged. Only attempts that
/// completed with a definitive outcome are recorded; canceled attempts
/// leave the counters untouched.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failures: 0,
                successes: 0,
                opened_at: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock still holds consistent state; recover it
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Gate one request. Open circuits reject until the open timeout has
    /// elapsed; the first allow attempt after that transitions to half-open.
    pub fn allow(&self) -> Result<(), LlmError> {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
            BreakerState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or(Duration::ZERO);
                if elapsed >= self.config.open_timeout {
                    inner.state = BreakerState::HalfOpen;
                    inner.successes = 0;
                    info!(elapsed = ?elapsed, "circuit breaker: open -> half-open, admitting probe");
                    Ok(())
                } else {
                    Err(LlmError::CircuitOpen)
                }
            }
        }
    }

    /// Record a definitive success
    pub fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => {
                inner.failures = 0;
            }
            BreakerState::HalfOpen => {
                inner.successes += 1;
                if inner.successes >= self.config.success_threshold {
                    inner.state = BreakerState::Closed;
                    inner.failures = 0;
                    inner.successes = 0;
                    inner.opened_at = None;
                    info!("circuit breaker: half-open -> closed");
                }
            }
            BreakerState::Open => {}
        }
    }

    /// Record a definitive retryable failure
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => {
                inner.failures += 1;
                if inner.failures >= self.config.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                    warn!(failures = inner.failures, "circuit breaker: closed -> open");
                }
            }
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.successes = 0;
                warn!("circuit breaker: half-open -> open (probe failed)");
            }
            BreakerState::Open => {}
        }
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failures
    }

    pub fn success_count(&self) -> u32 {
        self.lock().successes
    }

    /// Ok while the circuit is closed or half-open
    pub fn health(&self) -> Result<(), LlmError> {
        match self.state() {
            BreakerState::Open => Err(LlmError::CircuitOpen),
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
        }
    }
}
