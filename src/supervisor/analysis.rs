//! Analysis stage: inspect agent output after execution

use tracing::{debug, info};

use crate::domain::{Analysis, Issue};
use crate::parse::{ParseOptions, parse_lenient};
use crate::refine::RefineError;

use super::{Supervisor, prompts};

impl Supervisor {
    /// Analyze a coding agent's output for an issue.
    ///
    /// Output is truncated to the analysis budget preserving start, middle,
    /// and end. Discovered issues in the result feed the discovery
    /// pipeline; this operation itself only judges and records.
    pub async fn analyze_execution_result(
        &self,
        issue: &Issue,
        agent_output: &str,
        success: bool,
    ) -> Result<Analysis, RefineError> {
        debug!(
            issue_id = %issue.id,
            output_len = agent_output.len(),
            success,
            "analyzing execution result"
        );

        let prompt = prompts::analysis_prompt(issue, agent_output, success);
        let reply = self
            .call_model("analyze", Some(&issue.id), prompts::SYSTEM_ANALYZE, prompt, 4096, 0.2)
            .await?;

        let analysis = parse_lenient::<Analysis>(
            &reply.text,
            &ParseOptions::new(format!("analysis for {}", issue.id)),
        )?;

        info!(
            issue_id = %issue.id,
            completed = analysis.completed,
            on_task = analysis.scope.on_task,
            unmet = analysis.unmet_criteria(),
            discovered = analysis.discovered_issues.len(),
            "analysis complete"
        );
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewIssue;
    use crate::supervisor::ACTOR;
    use crate::store::IssueStore;
    use crate::supervisor::testutil::scripted_supervisor;

    const ANALYSIS_JSON: &str = r#"{
        "completed": true,
        "scope": {"on_task": true, "explanation": "in bounds"},
        "criteria": [{"criterion": "tests pass", "met": true, "evidence": "all green", "reason": ""}],
        "punted": [],
        "discovered_issues": [
            {"title": "Leaky connection pool", "type": "bug", "kind": "blocker", "priority_hint": "P0"}
        ],
        "quality_issues": [],
        "summary": "done",
        "confidence": 0.85
    }"#;

    #[tokio::test]
    async fn test_analyze_execution_result() {
        let (supervisor, client, store) = scripted_supervisor();
        let issue = store.create_issue(ACTOR, NewIssue::new("Task", "")).await.unwrap();
        client.push_text(ANALYSIS_JSON);

        let analysis = supervisor
            .analyze_execution_result(&issue, "agent ran fine", true)
            .await
            .unwrap();

        assert!(analysis.completed);
        assert_eq!(analysis.discovered_issues.len(), 1);
        assert_eq!(
            analysis.discovered_issues[0].kind,
            crate::domain::DiscoveryKind::Blocker
        );
    }

    #[tokio::test]
    async fn test_analyze_truncates_huge_output() {
        let (supervisor, client, store) = scripted_supervisor();
        let issue = store.create_issue(ACTOR, NewIssue::new("Task", "")).await.unwrap();
        client.push_text(ANALYSIS_JSON);

        let huge = "x".repeat(50_000);
        supervisor
            .analyze_execution_result(&issue, &huge, false)
            .await
            .unwrap();

        let request = &client.requests()[0];
        // The prompt embeds a bounded slice, not all 50k characters
        assert!(request.user_message.len() < 20_000);
        assert!(request.user_message.contains("[truncated]"));
        assert!(request.user_message.contains("reported failure"));
    }
}
