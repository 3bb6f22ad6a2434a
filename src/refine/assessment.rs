//! Assessment refiner
//!
//! Serializes assessments into a deterministic text form for diffing,
//! refines that text through the supervisor, and judges convergence with a
//! comparison call. The text form is lossy; it is never parsed back.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::domain::{Assessment, Issue};
use crate::parse::{ParseOptions, parse_lenient};
use crate::supervisor::Supervisor;
use crate::supervisor::prompts;

use super::{Artifact, ConvergenceDecision, RefineError, Refiner};

/// Schema hint for the strict-JSON re-emission call
pub(crate) const ASSESSMENT_SCHEMA_HINT: &str = r#"{
  "strategy": "",
  "steps": [""],
  "risks": [""],
  "confidence": 0.0,
  "reasoning": "",
  "should_decompose": false,
  "decomposition": null
}"#;

/// Deterministic text serialization of an assessment.
///
/// Ordered sections, counts in headings, two-decimal confidence. Empty
/// sections are omitted.
pub fn render_assessment(assessment: &Assessment) -> String {
    let mut out = String::from("# Assessment\n\n## Strategy\n");
    out.push_str(assessment.strategy.trim());
    out.push('\n');

    if !assessment.steps.is_empty() {
        out.push_str(&format!("\n## Steps ({})\n", assessment.steps.len()));
        for (i, step) in assessment.steps.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, step.trim()));
        }
    }

    if !assessment.risks.is_empty() {
        out.push_str(&format!("\n## Risks ({})\n", assessment.risks.len()));
        for risk in &assessment.risks {
            out.push_str(&format!("- {}\n", risk.trim()));
        }
    }

    out.push_str(&format!("\n## Confidence\n{:.2}\n", assessment.confidence));

    if !assessment.reasoning.trim().is_empty() {
        out.push_str(&format!("\n## Reasoning\n{}\n", assessment.reasoning.trim()));
    }

    if assessment.should_decompose
        && let Some(plan) = &assessment.decomposition
    {
        out.push_str(&format!("\n## Decomposition ({} children)\n", plan.child_issues.len()));
        if !plan.reasoning.trim().is_empty() {
            out.push_str(&format!("Reasoning: {}\n", plan.reasoning.trim()));
        }
        for (i, child) in plan.child_issues.iter().enumerate() {
            out.push_str(&format!("{}. [{}] {}", i + 1, child.priority, child.title.trim()));
            if let Some(minutes) = child.estimated_minutes {
                out.push_str(&format!(" (est {}m)", minutes));
            }
            out.push('\n');
        }
    }

    out
}

/// Refiner for assessment artifacts
pub struct AssessmentRefiner<'a> {
    supervisor: &'a Supervisor,
    issue: &'a Issue,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
}

impl<'a> AssessmentRefiner<'a> {
    pub fn new(supervisor: &'a Supervisor, issue: &'a Issue) -> Self {
        Self {
            supervisor,
            issue,
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
        }
    }

    /// Token totals accumulated across all refine and convergence calls
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
impl Refiner for AssessmentRefiner<'_> {
    fn artifact_type(&self) -> &str {
        "assessment"
    }

    async fn refine(&self, artifact: &Artifact) -> Result<Artifact, RefineError> {
        let prompt = prompts::refine_artifact_prompt("assessment", &artifact.content, &artifact.context);
        let reply = self
            .supervisor
            .call_model(
                "assessment_refine",
                Some(&self.issue.id),
                prompts::SYSTEM_REFINE,
                prompt,
                4096,
                0.4,
            )
            .await?;
        self.track(reply.usage);

        let content = reply.text.trim().to_string();
        if !content.contains("## Strategy") {
            return Err(RefineError::Validation(
                "refined assessment lost its Strategy section".to_string(),
            ));
        }

        Ok(Artifact::new("assessment", content, artifact.context.clone()))
    }

    async fn check_convergence(
        &self,
        current: &Artifact,
        previous: &Artifact,
    ) -> Result<ConvergenceDecision, RefineError> {
        let prompt = prompts::convergence_prompt("assessment", &current.content, &previous.content);
        let reply = self
            .supervisor
            .call_model(
                "assessment_converge",
                Some(&self.issue.id),
                prompts::SYSTEM_REFINE,
                prompt,
                1024,
                0.0,
            )
            .await?;
        self.track(reply.usage);

        let decision = parse_lenient::<ConvergenceDecision>(
            &reply.text,
            &ParseOptions::new("assessment convergence check"),
        )?;
        Ok(decision)
    }
}
