//! Completion stage: may a structural parent close?

use tracing::{debug, info};

use crate::domain::{CompletionAssessment, Issue};
use crate::parse::{ParseOptions, parse_lenient};
use crate::refine::RefineError;

use super::{Supervisor, prompts};

impl Supervisor {
    /// Judge whether a parent issue may close given its children.
    ///
    /// For structural containers the prompt carries the rule that all
    /// children closed strongly implies completion, rebuttable only by a
    /// concrete unmet criterion.
    pub async fn assess_completion(
        &self,
        parent: &Issue,
        children: &[Issue],
    ) -> Result<CompletionAssessment, RefineError> {
        debug!(
            parent_id = %parent.id,
            children = children.len(),
            "assessing completion"
        );

        let prompt = prompts::completion_prompt(parent, children);
        let reply = self
            .call_model(
                "completion",
                Some(&parent.id),
                prompts::SYSTEM_COMPLETION,
                prompt,
                1024,
                0.1,
            )
            .await?;

        let completion = parse_lenient::<CompletionAssessment>(
            &reply.text,
            &ParseOptions::new(format!("completion assessment for {}", parent.id)),
        )?;

        info!(
            parent_id = %parent.id,
            should_close = completion.should_close,
            confidence = completion.confidence,
            "completion assessment done"
        );
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IssueSubtype, NewIssue};
    use crate::supervisor::ACTOR;
    use crate::store::IssueStore;
    use crate::supervisor::testutil::scripted_supervisor;

    #[tokio::test]
    async fn test_assess_completion() {
        let (supervisor, client, store) = scripted_supervisor();
        let parent = store
            .create_issue(
                ACTOR,
                NewIssue::new("Mission", "").with_subtype(IssueSubtype::Mission),
            )
            .await
            .unwrap();
        let child = store.create_issue(ACTOR, NewIssue::new("Child", "")).await.unwrap();
        store.close_issue(ACTOR, &child.id).await.unwrap();
        let child = store.get_issue(ACTOR, &child.id).await.unwrap();

        client.push_text(r#"{"should_close": true, "reasoning": "all children closed", "confidence": 0.9, "caveats": []}"#);

        let completion = supervisor.assess_completion(&parent, &[child]).await.unwrap();
        assert!(completion.should_close);

        let request = &client.requests()[0];
        assert!(request.user_message.contains("1/1 closed"));
        assert!(request.user_message.contains("structural container"));
    }
}
