//! Vigil - AI-supervised work-item orchestration engine
//!
//! Vigil drives issues through a disciplined pipeline: an assessment forms
//! a strategy before execution, an analysis inspects the coding agent's
//! output afterwards, a completion judgment decides whether structural
//! parents may close, and discoveries reported along the way become new
//! issues under strict recursion guards. All four stages are model calls
//! whose free-form replies are parsed, validated, and composed into
//! durable, bounded workflow progress.
//!
//! # Core Concepts
//!
//! - **Resilient call path**: every model call runs under retry with
//!   backoff, a shared circuit breaker, and per-attempt deadlines
//! - **Lenient parsing**: one fallback chain recovers typed values from
//!   fenced, comma-ridden, or prose-wrapped replies
//! - **Bounded refinement**: artifacts iterate toward convergence under
//!   per-artifact budgets, and only when selectivity says it is worth it
//! - **Guarded discovery**: blocker bursts escalate, meta-issue recursion
//!   is cut off, and priorities follow deterministic arithmetic
//!
//! # Modules
//!
//! - [`supervisor`] - stage operations and the model-call shell
//! - [`domain`] - issues, assessments, analyses, plans
//! - [`parse`] - lenient JSON extraction
//! - [`resilience`] - retry, circuit breaker, health
//! - [`refine`] - refiner contract, convergence driver, metrics
//! - [`validation`] - mission-plan validator harness
//! - [`discovery`] - discovery pipeline and recursion guards
//! - [`decompose`] - decomposition engine
//! - [`store`] - issue store contract and in-memory implementation
//! - [`llm`] - vendor client trait and Anthropic implementation
//! - [`config`] - configuration types and loading

pub mod config;
pub mod decompose;
pub mod discovery;
pub mod domain;
pub mod llm;
pub mod parse;
pub mod refine;
pub mod resilience;
pub mod store;
pub mod supervisor;
pub mod validation;

// Re-export commonly used types
pub use config::{Config, LlmConfig, RefinementConfig};
pub use decompose::{DecomposeError, decompose_issue};
pub use discovery::{DiscoveryOutcome, process_discoveries};
pub use domain::{
    Analysis, Assessment, CompletionAssessment, DiscoveredIssue, DiscoveryKind, Issue, IssuePatch, IssueStatus,
    IssueSubtype, IssueType, MissionPlan, NewIssue, PlannedPhase, PlannedTask, Priority, discovered_priority,
};
pub use llm::{AnthropicClient, CompletionRequest, CompletionResponse, LlmClient, LlmError, TokenUsage};
pub use parse::{ParseError, ParseOptions, parse_lenient, parse_or_default, parse_with_validation};
pub use refine::{
    Artifact, ArtifactMetrics, AssessmentRefiner, ConvergenceDecision, ConvergenceReason, ConvergenceResult,
    InMemoryMetrics, MetricsSink, PlanRefiner, RefineError, Refiner, converge,
};
pub use resilience::{BreakerState, CircuitBreaker, RetryConfig, retry_with_backoff};
pub use store::{Dependency, DependencyKind, IssueQuery, IssueStore, MemoryStore, StoreError, UsageEvent};
pub use supervisor::{ACTOR, FailureType, ParsedDescription, StructureVerdict, Supervisor, TestDiagnosis};
pub use validation::{PlanValidationError, ValidatorLimits, validate_plan};
