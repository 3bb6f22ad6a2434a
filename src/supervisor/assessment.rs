//! Assessment stage: form a strategy before execution

use tracing::{debug, info};

use crate::domain::{Assessment, Issue};
use crate::parse::{ParseOptions, parse_lenient};
use crate::refine::{
    Artifact, AssessmentRefiner, ArtifactMetrics, MetricsSink, RefineError, assess_selectivity, converge,
    render_assessment,
};
use crate::config::RefinementConfig;

use super::{Supervisor, prompts};

impl Supervisor {
    /// Assess an issue and form an execution strategy.
    pub async fn assess_issue_state(&self, issue: &Issue) -> Result<Assessment, RefineError> {
        debug!(issue_id = %issue.id, priority = %issue.priority, "assessing issue");

        let prompt = prompts::assessment_prompt(issue);
        let reply = self
            .call_model("assess", Some(&issue.id), prompts::SYSTEM_ASSESS, prompt, 4096, 0.3)
            .await?;

        let assessment = parse_lenient::<Assessment>(
            &reply.text,
            &ParseOptions::new(format!("assessment for {}", issue.id)),
        )?;

        info!(
            issue_id = %issue.id,
            steps = assessment.steps.len(),
            risks = assessment.risks.len(),
            confidence = assessment.confidence,
            should_decompose = assessment.should_decompose,
            "assessment complete"
        );
        Ok(assessment)
    }

    /// Assess with selective iterative refinement.
    ///
    /// Routine issues return the single-pass assessment and a skip record;
    /// priority-0, mission/phase, and novel issues iterate until the
    /// assessment stabilizes, then a final strict-JSON re-emission call
    /// converts the refined text back into a structured value.
    pub async fn assess_issue_state_with_refinement(
        &self,
        issue: &Issue,
        config: &RefinementConfig,
        metrics: &dyn MetricsSink,
    ) -> Result<Assessment, RefineError> {
        let initial = self.assess_issue_state(issue).await?;

        let decision = assess_selectivity(issue);
        if config.skip_simple && !decision.should_refine {
            let skip_reason = decision.skip_reason.unwrap_or_else(|| "not selected".to_string());
            info!(issue_id = %issue.id, skip_reason = %skip_reason, "refinement skipped");
            metrics.record(ArtifactMetrics {
                artifact_type: "assessment".to_string(),
                priority: Some(issue.priority),
                iteration_skipped: true,
                skip_reason: Some(skip_reason),
                ..ArtifactMetrics::default()
            });
            return Ok(initial);
        }

        let refiner = AssessmentRefiner::new(self, issue);
        let artifact = Artifact::new(
            "assessment",
            render_assessment(&initial),
            format!("Issue {}: {}", issue.id, issue.title),
        );

        let result = converge(&refiner, artifact, config).await?;
        let (input_tokens, output_tokens) = refiner.token_totals();

        metrics.record(ArtifactMetrics {
            artifact_type: "assessment".to_string(),
            priority: Some(issue.priority),
            total_iterations: result.iterations,
            converged: result.converged,
            convergence_reason: result.reason.to_string(),
            total_duration: result.elapsed,
            iteration_skipped: false,
            skip_reason: None,
            selectivity_triggers: decision.triggers,
            total_input_tokens: input_tokens,
            total_output_tokens: output_tokens,
        });

        // The refined artifact is lossy text; re-ask for strict JSON
        self.reemit_assessment(issue, &result.artifact.content).await
    }

    async fn reemit_assessment(&self, issue: &Issue, content: &str) -> Result<Assessment, RefineError> {
        let prompt = prompts::reemit_prompt("assessment", content, crate::refine::ASSESSMENT_SCHEMA_HINT);
        let reply = self
            .call_model(
                "assessment_reemit",
                Some(&issue.id),
                prompts::SYSTEM_ASSESS,
                prompt,
                4096,
                0.0,
            )
            .await?;

        let assessment = parse_lenient::<Assessment>(
            &reply.text,
            &ParseOptions::new(format!("refined assessment for {}", issue.id)),
        )?;
        Ok(assessment)
    }
}
