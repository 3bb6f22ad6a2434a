//! Mission-plan refiner
//!
//! Unlike assessments, plan artifacts carry canonical JSON as content: each
//! refine step asks for a complete corrected plan, re-parses it with a
//! bounded retry loop, and re-validates before accepting.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::warn;

use crate::domain::MissionPlan;
use crate::parse::{ParseOptions, parse_lenient};
use crate::supervisor::Supervisor;
use crate::supervisor::prompts;
use crate::validation::{ValidatorLimits, validate_plan};

use super::{Artifact, ConvergenceDecision, RefineError, Refiner};

/// Parse attempts per refine step before giving up
const PARSE_ATTEMPTS: u32 = 3;

/// Canonical JSON serialization used as the plan artifact content
pub fn render_plan(plan: &MissionPlan) -> String {
    prompts::plan_json(plan)
}

/// Refiner for mission-plan artifacts
pub struct PlanRefiner<'a> {
    supervisor: &'a Supervisor,
    mission_id: String,
    limits: ValidatorLimits,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
}

impl<'a> PlanRefiner<'a> {
    pub fn new(supervisor: &'a Supervisor, mission_id: impl Into<String>, limits: ValidatorLimits) -> Self {
        Self {
            supervisor,
            mission_id: mission_id.into(),
            limits,
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
        }
    }

    pub fn token_totals(&self) -> (u64, u64) {
        (
            self.input_tokens.load(Ordering::Relaxed),
            self.output_tokens.load(Ordering::Relaxed),
        )
    }

    fn track(&self, usage: crate::llm::TokenUsage) {
        self.input_tokens.fetch_add(usage.input_tokens, Ordering::Relaxed);
        self.output_tokens.fetch_add(usage.output_tokens, Ordering::Relaxed);
    }
}

#[async_trait]
impl Refiner for PlanRefiner<'_> {
    fn artifact_type(&self) -> &str {
        "mission_plan"
    }

    async fn refine(&self, artifact: &Artifact) -> Result<Artifact, RefineError> {
        let base_prompt = prompts::refine_artifact_prompt("mission plan", &artifact.content, &artifact.context);
        let mut prompt = format!(
            "{}\n\nReply with the COMPLETE improved plan as strict JSON in the same schema.",
            base_prompt
        );

        let mut last_parse_error = None;
        for attempt in 1..=PARSE_ATTEMPTS {
            let reply = self
                .supervisor
                .call_model(
                    "plan_refine",
                    Some(&self.mission_id),
                    prompts::SYSTEM_REFINE,
                    prompt.clone(),
                    8192,
                    0.3,
                )
                .await?;
            self.track(reply.usage);

            match parse_lenient::<MissionPlan>(&reply.text, &ParseOptions::new("plan refinement")) {
                Ok(mut plan) => {
                    plan.mission_id = self.mission_id.clone();
                    validate_plan(&plan, &self.limits, None)
                        .await
                        .map_err(|e| RefineError::Validation(e.to_string()))?;
                    return Ok(Artifact::new("mission_plan", render_plan(&plan), artifact.context.clone()));
                }
                Err(e) => {
                    warn!(attempt, error = %e.diagnostic, "plan refinement parse failed");
                    prompt.push_str(&prompts::parse_retry_suffix(&e.diagnostic));
                    last_parse_error = Some(e);
                }
            }
        }

        Err(last_parse_error
            .map(RefineError::Parse)
            .unwrap_or_else(|| RefineError::Validation("plan refinement produced no output".to_string())))
    }

    async fn check_convergence(
        &self,
        current: &Artifact,
        previous: &Artifact,
    ) -> Result<ConvergenceDecision, RefineError> {
        let prompt = prompts::convergence_prompt("mission plan", &current.content, &previous.content);
        let reply = self
            .supervisor
            .call_model(
                "plan_converge",
                Some(&self.mission_id),
                prompts::SYSTEM_REFINE,
                prompt,
                1024,
                0.0,
            )
            .await?;
        self.track(reply.usage);

        let decision =
            parse_lenient::<ConvergenceDecision>(&reply.text, &ParseOptions::new("plan convergence check"))?;
        Ok(decision)
    }
}
