//! Planning stage: generate and refine mission plans

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{Issue, MissionPlan};
use crate::parse::{ParseOptions, parse_lenient};
use crate::refine::RefineError;
use crate::validation::{ValidatorLimits, validate_plan};

use super::{Supervisor, prompts};

/// Parse attempts before planning gives up; each retry appends the parse
/// diagnostic so the model can self-correct
const PLAN_PARSE_ATTEMPTS: u32 = 3;

/// Verdict from the AI structural pass over a plan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructureVerdict {
    #[serde(default)]
    pub errors: Vec<String>,

    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Supervisor {
    /// Generate a validated mission plan for a mission issue.
    pub async fn generate_plan(&self, mission: &Issue) -> Result<MissionPlan, RefineError> {
        debug!(mission_id = %mission.id, "generating mission plan");

        let mut plan = self
            .plan_with_parse_retries("plan", mission, prompts::plan_prompt(mission))
            .await?;
        plan.mission_id = mission.id.clone();
        plan.generated_by = self.model().to_string();

        let limits = ValidatorLimits::from_env();
        validate_plan(&plan, &limits, Some(self))
            .await
            .map_err(|e| RefineError::Validation(e.to_string()))?;

        info!(
            mission_id = %mission.id,
            phases = plan.phases.len(),
            tasks = plan.total_tasks(),
            "mission plan generated"
        );
        Ok(plan)
    }

    /// Refine one phase of an existing plan using feedback, re-validating
    /// the whole plan afterwards.
    pub async fn refine_phase(
        &self,
        plan: &MissionPlan,
        phase_number: u32,
        feedback: &str,
    ) -> Result<MissionPlan, RefineError> {
        if plan.phase(phase_number).is_none() {
            return Err(RefineError::Validation(format!(
                "plan has no phase {}",
                phase_number
            )));
        }

        let mission_id = plan.mission_id.clone();
        debug!(mission_id = %mission_id, phase_number, "refining plan phase");

        let prompt = prompts::refine_phase_prompt(plan, phase_number, feedback);
        let mut refined = self
            .plan_with_parse_retries_raw("plan_refine", Some(&mission_id), prompt)
            .await?;
        refined.mission_id = mission_id;
        refined.generated_by = self.model().to_string();

        let limits = ValidatorLimits::from_env();
        validate_plan(&refined, &limits, Some(self))
            .await
            .map_err(|e| RefineError::Validation(e.to_string()))?;

        Ok(refined)
    }

    /// Ask the model to judge a plan's phase ordering.
    ///
    /// Callers treat this as advisory: errors fail validation, warnings are
    /// logged, and a failed call skips the pass entirely.
    pub async fn validate_phase_structure(&self, plan: &MissionPlan) -> Result<StructureVerdict, RefineError> {
        let prompt = prompts::phase_structure_prompt(plan);
        let reply = self
            .call_model(
                "phase_structure",
                Some(&plan.mission_id),
                prompts::SYSTEM_PLAN,
                prompt,
                1024,
                0.0,
            )
            .await?;

        let verdict = parse_lenient::<StructureVerdict>(
            &reply.text,
            &ParseOptions::new(format!("phase structure verdict for {}", plan.mission_id)),
        )?;
        Ok(verdict)
    }

    async fn plan_with_parse_retries(
        &self,
        activity: &str,
        mission: &Issue,
        prompt: String,
    ) -> Result<MissionPlan, RefineError> {
        self.plan_with_parse_retries_raw(activity, Some(&mission.id), prompt).await
    }

    /// The bounded parse-retry loop shared by planning operations.
    ///
    /// Valid JSON on attempt k means no further prompts are constructed;
    /// the retry annotation appears only on attempts 2..k.
    async fn plan_with_parse_retries_raw(
        &self,
        activity: &str,
        issue_id: Option<&str>,
        mut prompt: String,
    ) -> Result<MissionPlan, RefineError> {
        let mut last_error: Option<crate::parse::ParseError> = None;

        for attempt in 1..=PLAN_PARSE_ATTEMPTS {
            let reply = self
                .call_model(activity, issue_id, prompts::SYSTEM_PLAN, prompt.clone(), 8192, 0.3)
                .await?;

            match parse_lenient::<MissionPlan>(&reply.text, &ParseOptions::new(activity.to_string())) {
                Ok(plan) => return Ok(plan),
                Err(e) => {
                    warn!(activity, attempt, error = %e.diagnostic, "plan parse failed");
                    prompt.push_str(&prompts::parse_retry_suffix(&e.diagnostic));
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .map(RefineError::Parse)
            .unwrap_or_else(|| RefineError::Validation("planning produced no parse attempts".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IssueSubtype, NewIssue};
    use crate::supervisor::ACTOR;
    use crate::store::IssueStore;
    use crate::supervisor::testutil::scripted_supervisor;

    fn plan_json(mission_id: &str) -> String {
        format!(
            r#"{{
                "mission_id": "{}",
                "strategy": "two waves",
                "estimated_effort": "1 week",
                "confidence": 0.8,
                "risks": [],
                "phases": [
                    {{"number": 1, "title": "Foundations", "tasks": [{{"title": "scaffold", "acceptance_criteria": "exists"}}], "depends_on": []}},
                    {{"number": 2, "title": "Core", "tasks": [{{"title": "engine", "acceptance_criteria": "works"}}], "depends_on": [1]}}
                ],
                "generated_by": "test"
            }}"#,
            mission_id
        )
    }

    const STRUCTURE_OK: &str = r#"{"errors": [], "warnings": []}"#;

    async fn mission(store: &crate::store::MemoryStore) -> crate::domain::Issue {
        store
            .create_issue(
                ACTOR,
                NewIssue::new("Ship v1", "the mission").with_subtype(IssueSubtype::Mission),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_generate_plan_first_attempt() {
        let (supervisor, client, store) = scripted_supervisor();
        let mission = mission(&store).await;

        client.push_text(plan_json(&mission.id));
        client.push_text(STRUCTURE_OK);

        let plan = supervisor.generate_plan(&mission).await.unwrap();
        assert_eq!(plan.phases.len(), 2);
        assert_eq!(plan.mission_id, mission.id);
        assert_eq!(plan.generated_by, supervisor.model());

        // No retry annotation on the first and only planning prompt
        let requests = client.requests();
        assert!(!requests[0].user_message.contains("could not be parsed"));
    }

    #[tokio::test]
    async fn test_generate_plan_retries_on_parse_failure() {
        let (supervisor, client, store) = scripted_supervisor();
        let mission = mission(&store).await;

        client.push_text("this is not a plan");
        client.push_text(plan_json(&mission.id));
        client.push_text(STRUCTURE_OK);

        let plan = supervisor.generate_plan(&mission).await.unwrap();
        assert_eq!(plan.phases.len(), 2);

        let requests = client.requests();
        // Attempt 1 carries no annotation; attempt 2 embeds the diagnostic
        assert!(!requests[0].user_message.contains("could not be parsed"));
        assert!(requests[1].user_message.contains("could not be parsed"));
    }

    #[tokio::test]
    async fn test_generate_plan_gives_up_after_three_attempts() {
        let (supervisor, client, store) = scripted_supervisor();
        let mission = mission(&store).await;

        for _ in 0..3 {
            client.push_text("still not json");
        }

        let result = supervisor.generate_plan(&mission).await;
        assert!(matches!(result, Err(RefineError::Parse(_))));
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_generate_plan_rejects_cyclic_plan() {
        let (supervisor, client, store) = scripted_supervisor();
        let mission = mission(&store).await;

        let cyclic = format!(
            r#"{{
                "mission_id": "{}",
                "phases": [
                    {{"number": 1, "title": "A", "tasks": [{{"title": "t"}}], "depends_on": [2]}},
                    {{"number": 2, "title": "B", "tasks": [{{"title": "t"}}], "depends_on": [1]}}
                ]
            }}"#,
            mission.id
        );
        client.push_text(cyclic);
        client.push_text(STRUCTURE_OK);

        let result = supervisor.generate_plan(&mission).await;
        match result {
            Err(RefineError::Validation(message)) => assert!(message.contains("circular")),
            other => panic!("expected validation error, got {:?}", other.map(|p| p.phases.len())),
        }
    }

    #[tokio::test]
    async fn test_structure_errors_block_plan() {
        let (supervisor, client, store) = scripted_supervisor();
        let mission = mission(&store).await;

        client.push_text(plan_json(&mission.id));
        client.push_text(r#"{"errors": ["phase 2 should precede phase 1"], "warnings": []}"#);

        let result = supervisor.generate_plan(&mission).await;
        match result {
            Err(RefineError::Validation(message)) => {
                assert!(message.contains("phase_structure_ai"));
            }
            other => panic!("expected validation error, got {:?}", other.map(|p| p.phases.len())),
        }
    }

    #[tokio::test]
    async fn test_structure_pass_failure_is_advisory() {
        let (supervisor, client, store) = scripted_supervisor();
        let mission = mission(&store).await;

        client.push_text(plan_json(&mission.id));
        // The structure call returns prose; its parse failure must not
        // block the plan
        client.push_text("cannot judge");

        let plan = supervisor.generate_plan(&mission).await.unwrap();
        assert_eq!(plan.phases.len(), 2);
    }

    #[tokio::test]
    async fn test_refine_phase_unknown_number() {
        let (supervisor, client, store) = scripted_supervisor();
        let mission = mission(&store).await;
        client.push_text(plan_json(&mission.id));
        client.push_text(STRUCTURE_OK);
        let plan = supervisor.generate_plan(&mission).await.unwrap();

        let result = supervisor.refine_phase(&plan, 9, "tighten").await;
        assert!(matches!(result, Err(RefineError::Validation(_))));
    }

    #[tokio::test]
    async fn test_refine_phase_revalidates() {
        let (supervisor, client, store) = scripted_supervisor();
        let mission = mission(&store).await;
        client.push_text(plan_json(&mission.id));
        client.push_text(STRUCTURE_OK);
        let plan = supervisor.generate_plan(&mission).await.unwrap();

        client.push_text(plan_json(&mission.id));
        client.push_text(STRUCTURE_OK);

        let refined = supervisor.refine_phase(&plan, 2, "add a rollout task").await.unwrap();
        assert_eq!(refined.phases.len(), 2);

        let refine_request = &client.requests()[2];
        assert!(refine_request.user_message.contains("Refine phase 2"));
        assert!(refine_request.user_message.contains("add a rollout task"));
    }
}
