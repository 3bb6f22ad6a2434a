//! Convergence driver

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::RefinementConfig;

use super::{Artifact, ConvergenceReason, ConvergenceResult, RefineError, Refiner};

/// Drive one refinement run to completion.
///
/// Iterations are strictly sequential. Each iteration refines once; the
/// convergence check runs only after `min_iterations` and while the
/// wall-clock budget holds.
pub async fn converge(
    refiner: &dyn Refiner,
    initial: Artifact,
    config: &RefinementConfig,
) -> Result<ConvergenceResult, RefineError> {
    let started = Instant::now();
    let budget = config.timeout_ms.map(Duration::from_millis);
    let max_iterations = config.max_iterations.max(1);

    let mut previous = initial;
    let mut iterations = 0u32;

    loop {
        iterations += 1;
        debug!(
            artifact_type = refiner.artifact_type(),
            iteration = iterations,
            "refining artifact"
        );
        let current = refiner.refine(&previous).await?;

        if budget.is_some_and(|b| started.elapsed() >= b) {
            info!(
                artifact_type = refiner.artifact_type(),
                iterations, "refinement budget elapsed"
            );
            return Ok(ConvergenceResult {
                artifact: current,
                iterations,
                converged: false,
                reason: ConvergenceReason::Timeout,
                elapsed: started.elapsed(),
            });
        }

        if iterations >= config.min_iterations {
            let decision = refiner.check_convergence(&current, &previous).await?;
            debug!(
                artifact_type = refiner.artifact_type(),
                iteration = iterations,
                converged = decision.converged,
                confidence = decision.confidence,
                "convergence check"
            );
            if decision.converged {
                return Ok(ConvergenceResult {
                    artifact: current,
                    iterations,
                    converged: true,
                    reason: ConvergenceReason::Converged,
                    elapsed: started.elapsed(),
                });
            }
        }

        if iterations >= max_iterations {
            info!(
                artifact_type = refiner.artifact_type(),
                iterations, "refinement iteration budget reached"
            );
            return Ok(ConvergenceResult {
                artifact: current,
                iterations,
                converged: false,
                reason: ConvergenceReason::MaxIterations,
                elapsed: started.elapsed(),
            });
        }

        previous = current;
    }
}
