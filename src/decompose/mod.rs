//! Decomposition engine
//!
//! Splits an issue into child tasks with `blocks` dependencies and labels,
//! then marks the parent. Children created before a failure stay persisted;
//! the error carries their ids.

use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{DecompositionPlan, Issue, IssuePatch, IssueType, NewIssue};
use crate::store::{Dependency, IssueStore, StoreError};
use crate::supervisor::ACTOR;

/// Label on every child created by decomposition
pub const LABEL_DISCOVERED_DECOMPOSED: &str = "discovered:decomposed";

/// Label on a parent that has been decomposed
pub const LABEL_DECOMPOSED: &str = "decomposed";

/// Decomposition halted partway; earlier children remain persisted
#[derive(Debug, Error)]
#[error("decomposition of {parent_id} halted after {created_count} children: {source}", created_count = .created.len())]
pub struct DecomposeError {
    pub parent_id: String,

    /// Ids created before the failure, in plan order
    pub created: Vec<String>,

    #[source]
    pub source: StoreError,
}

/// Create child issues for a decomposition plan.
///
/// Each child becomes a task the parent `blocks`-depends on. After all
/// children, the parent gains the `decomposed` label and a notes summary
/// referencing every child id. Returns child ids in plan order.
pub async fn decompose_issue(
    store: &dyn IssueStore,
    parent: &Issue,
    plan: &DecompositionPlan,
) -> Result<Vec<String>, DecomposeError> {
    if plan.is_empty() {
        return Err(DecomposeError {
            parent_id: parent.id.clone(),
            created: Vec::new(),
            source: StoreError::InvalidState("decomposition plan has no children".to_string()),
        });
    }

    let mut created: Vec<String> = Vec::new();

    for child_spec in &plan.child_issues {
        let mut new = NewIssue::new(child_spec.title.clone(), child_spec.description.clone())
            .with_type(IssueType::Task)
            .with_priority(child_spec.priority)
            .with_acceptance_criteria(child_spec.acceptance_criteria.clone())
            .with_assignee(ACTOR);
        if let Some(minutes) = child_spec.estimated_minutes {
            new = new.with_estimated_minutes(minutes);
        }

        let child = match store.create_issue(ACTOR, new).await {
            Ok(child) => child,
            Err(e) => {
                warn!(parent_id = %parent.id, title = %child_spec.title, error = %e, "child creation failed");
                return Err(DecomposeError {
                    parent_id: parent.id.clone(),
                    created,
                    source: e,
                });
            }
        };

        if let Err(e) = store
            .add_dependency(ACTOR, &Dependency::blocks(&parent.id, &child.id))
            .await
        {
            created.push(child.id.clone());
            return Err(DecomposeError {
                parent_id: parent.id.clone(),
                created,
                source: e,
            });
        }
        if let Err(e) = store.add_label(ACTOR, &child.id, LABEL_DISCOVERED_DECOMPOSED).await {
            created.push(child.id.clone());
            return Err(DecomposeError {
                parent_id: parent.id.clone(),
                created,
                source: e,
            });
        }

        created.push(child.id);
    }

    finish_parent(store, parent, plan, &created)
        .await
        .map_err(|e| DecomposeError {
            parent_id: parent.id.clone(),
            created: created.clone(),
            source: e,
        })?;

    info!(parent_id = %parent.id, children = created.len(), "issue decomposed");
    Ok(created)
}

async fn finish_parent(
    store: &dyn IssueStore,
    parent: &Issue,
    plan: &DecompositionPlan,
    created: &[String],
) -> Result<(), StoreError> {
    store.add_label(ACTOR, &parent.id, LABEL_DECOMPOSED).await?;

    let mut notes = parent.notes.clone();
    if !notes.is_empty() {
        notes.push_str("\n\n");
    }
    notes.push_str(&format!(
        "Decomposed into {} children: {}.",
        created.len(),
        created.join(", ")
    ));
    if !plan.reasoning.trim().is_empty() {
        notes.push_str(&format!(" Reasoning: {}", plan.reasoning.trim()));
    }

    store
        .update_issue(ACTOR, &parent.id, IssuePatch::notes(notes))
        .await?;
    Ok(())
}
