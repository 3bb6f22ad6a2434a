//! Mission plan validation
//!
//! Every validator runs even when others fail, each inside its own safety
//! wrapper: a panic barrier, a per-validator timeout, and cancellation tied
//! to the caller deadline (the wrapper future drops with it). Failures
//! accumulate into one joined error so a single pass surfaces every
//! problem.

use std::collections::HashMap;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use std::panic::AssertUnwindSafe;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{MissionPlan, PlannedPhase};
use crate::supervisor::Supervisor;

mod checks;

use checks::{check_cycles, check_dependency_references, check_plan_size, check_task_counts};

/// Environment variable names for the validator limits
pub const ENV_VALIDATOR_TIMEOUT: &str = "VC_VALIDATOR_TIMEOUT";
pub const ENV_MAX_PLAN_PHASES: &str = "VC_MAX_PLAN_PHASES";
pub const ENV_MAX_PHASE_TASKS: &str = "VC_MAX_PHASE_TASKS";
pub const ENV_MAX_DEPENDENCY_DEPTH: &str = "VC_MAX_DEPENDENCY_DEPTH";

/// Hard caps preventing pathological plans from degenerating any validator
#[derive(Debug, Clone)]
pub struct ValidatorLimits {
    pub max_phases: usize,
    pub max_phase_tasks: usize,
    pub max_depth: usize,
    /// Per-validator deadline
    pub timeout: Duration,
}

impl Default for ValidatorLimits {
    fn default() -> Self {
        Self {
            max_phases: 20,
            max_phase_tasks: 30,
            max_depth: 10,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ValidatorLimits {
    /// Read limits from the environment, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_phases: env_usize(ENV_MAX_PLAN_PHASES).unwrap_or(defaults.max_phases),
            max_phase_tasks: env_usize(ENV_MAX_PHASE_TASKS).unwrap_or(defaults.max_phase_tasks),
            max_depth: env_usize(ENV_MAX_DEPENDENCY_DEPTH).unwrap_or(defaults.max_depth),
            timeout: env_usize(ENV_VALIDATOR_TIMEOUT)
                .map(|secs| Duration::from_secs(secs as u64))
                .unwrap_or(defaults.timeout),
        }
    }

    /// Upper bound on total tasks across the plan
    pub fn max_total_tasks(&self) -> usize {
        self.max_phases * self.max_phase_tasks
    }
}

fn env_usize(name: &str) -> Option<usize> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring unparseable validator limit");
            None
        }
    }
}

/// One validator's failure
#[derive(Debug, Clone)]
pub struct ValidatorFailure {
    pub validator: String,
    pub message: String,
}

/// Joined failures from one validation pass
#[derive(Debug, Clone, Error)]
#[error("plan validation failed: {}", join_failures(.failures))]
pub struct PlanValidationError {
    pub failures: Vec<ValidatorFailure>,
}

fn join_failures(failures: &[ValidatorFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("[{}] {}", f.validator, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate a mission plan.
///
/// Runs `plan_size`, `circular_dependencies`, `dependency_references`,
/// `task_counts`, and (when a supervisor is provided and the plan has more
/// than one phase) the advisory `phase_structure_ai` pass. All validators
/// run; all failures are reported together.
pub async fn validate_plan(
    plan: &MissionPlan,
    limits: &ValidatorLimits,
    ai: Option<&Supervisor>,
) -> Result<(), PlanValidationError> {
    let mut validators: Vec<(&'static str, BoxFuture<'_, Result<(), String>>)> = vec![
        ("plan_size", async { check_plan_size(plan, limits) }.boxed()),
        ("circular_dependencies", async { check_cycles(plan) }.boxed()),
        ("dependency_references", async { check_dependency_references(plan) }.boxed()),
        ("task_counts", async { check_task_counts(plan) }.boxed()),
    ];

    if let Some(supervisor) = ai {
        if plan.phases.len() > 1 {
            validators.push(("phase_structure_ai", structure_check(supervisor, plan).boxed()));
        } else {
            debug!("skipping phase_structure_ai for single-phase plan");
        }
    }

    let wrapped = validators
        .into_iter()
        .map(|(name, fut)| supervised(name, limits.timeout, fut));

    let failures: Vec<ValidatorFailure> = join_all(wrapped).await.into_iter().flatten().collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(PlanValidationError { failures })
    }
}

/// Run one validator under its safety wrapper
async fn supervised(
    name: &'static str,
    timeout: Duration,
    fut: BoxFuture<'_, Result<(), String>>,
) -> Option<ValidatorFailure> {
    let guarded = AssertUnwindSafe(fut).catch_unwind();
    match tokio::time::timeout(timeout, guarded).await {
        Err(_) => Some(ValidatorFailure {
            validator: name.to_string(),
            message: format!("{} validator timed out after {:?}", name, timeout),
        }),
        Ok(Err(panic)) => Some(ValidatorFailure {
            validator: name.to_string(),
            message: format!("{} validator panic: {}", name, panic_message(&panic)),
        }),
        Ok(Ok(Ok(()))) => None,
        Ok(Ok(Err(message))) => Some(ValidatorFailure {
            validator: name.to_string(),
            message,
        }),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    eprintln!(
        "is &str: {} is String: {} is Box<dyn Any+Send>: {} type_id: {:?}",
        panic.is::<&str>(),
        panic.is::<String>(),
        panic.is::<Box<dyn std::any::Any + Send>>(),
        (*panic).type_id()
    );
    if let Some(inner) = panic.downcast_ref::<Box<dyn std::any::Any + Send>>() {
        eprintln!("inner is &str: {} inner is String: {}", inner.is::<&str>(), inner.is::<String>());
    }
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// The advisory AI structural pass. Its own failures never block
/// validation; structural errors it finds do.
async fn structure_check(supervisor: &Supervisor, plan: &MissionPlan) -> Result<(), String> {
    match supervisor.validate_phase_structure(plan).await {
        Ok(verdict) => {
            for warning in &verdict.warnings {
                warn!(mission = %plan.mission_id, warning = %warning, "plan structure warning");
            }
            if verdict.errors.is_empty() {
                Ok(())
            } else {
                Err(format!("structural errors: {}", verdict.errors.join("; ")))
            }
        }
        Err(e) => {
            warn!(mission = %plan.mission_id, error = %e, "phase structure AI pass unavailable, skipping");
            Ok(())
        }
    }
}

/// Longest chain length in the phase dependency graph, memoized.
///
/// Nodes on a cycle contribute no additional depth here; the cycle
/// validator reports them.
pub(crate) fn phase_dependency_map(phases: &[PlannedPhase]) -> HashMap<u32, Vec<u32>> {
    phases
        .iter()
        .map(|p| (p.number, p.depends_on.iter().copied().collect()))
        .collect()
}
