//! Iterative refinement framework
//!
//! Converges an artifact through repeated model calls until it stabilizes,
//! the iteration budget is spent, or the wall-clock budget elapses. The
//! driver produces at most `max_iterations` artifacts; it is a bounded
//! loop, never a stream.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::LlmError;
use crate::parse::ParseError;

mod assessment;
mod driver;
mod metrics;
mod plan;
mod selectivity;

pub(crate) use assessment::ASSESSMENT_SCHEMA_HINT;
pub use assessment::{AssessmentRefiner, render_assessment};
pub use driver::converge;
pub use metrics::{AggregateMetrics, ArtifactMetrics, InMemoryMetrics, MetricsSink, NullMetrics};
pub use plan::{PlanRefiner, render_plan};
pub use selectivity::{SelectivityDecision, assess_selectivity};

/// The unit of iterative refinement: a lossy textual serialization plus
/// free-text context carried across iterations.
///
/// The content is for diffing and prompting only; parsing it back into a
/// structured value is unsupported. When a structured value is needed the
/// supervisor re-asks the model for strict JSON.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Type tag, e.g. "assessment" or "mission_plan"
    pub artifact_type: String,

    pub content: String,

    pub context: String,
}

impl Artifact {
    pub fn new(artifact_type: impl Into<String>, content: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            artifact_type: artifact_type.into(),
            content: content.into(),
            context: context.into(),
        }
    }
}

/// Verdict from a convergence check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceDecision {
    pub converged: bool,

    #[serde(default)]
    pub confidence: f64,

    #[serde(default)]
    pub reasoning: String,

    /// What the next iteration should focus on, if any
    #[serde(default)]
    pub strategy: String,
}

/// Why a refinement run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceReason {
    Converged,
    MaxIterations,
    Timeout,
}

impl std::fmt::Display for ConvergenceReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Converged => write!(f, "converged"),
            Self::MaxIterations => write!(f, "max_iterations"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// Outcome of one bounded refinement run
#[derive(Debug)]
pub struct ConvergenceResult {
    pub artifact: Artifact,
    pub iterations: u32,
    pub converged: bool,
    pub reason: ConvergenceReason,
    pub elapsed: Duration,
}

/// Refinement failures
#[derive(Debug, Error)]
pub enum RefineError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Refinement validation failed: {0}")]
    Validation(String),
}

/// A component that can improve one artifact type and judge convergence.
///
/// `refine` must validate its result and propagate a failure on parse or
/// validation error rather than returning a degraded artifact.
#[async_trait]
pub trait Refiner: Send + Sync {
    fn artifact_type(&self) -> &str;

    async fn refine(&self, artifact: &Artifact) -> Result<Artifact, RefineError>;

    async fn check_convergence(
        &self,
        current: &Artifact,
        previous: &Artifact,
    ) -> Result<ConvergenceDecision, RefineError>;
}
