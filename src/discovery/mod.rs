//! Discovery pipeline
//!
//! Turns LLM-reported discoveries into new issues, with layered recursion
//! guards: a burst breaker for blocker floods, state re-verification for
//! meta-issues (closing the analyze-then-create window), a circular-meta
//! guard, a meta-criteria requirement, and a blocker-depth cap. Guard
//! skips are not errors; the operation succeeds with fewer creations.
//!
//! The pipeline is deliberately not transactional: partial failures are
//! reported without undoing prior creations.

use tracing::{debug, info, warn};

use crate::domain::{
    DiscoveredIssue, DiscoveryKind, Issue, IssueType, NewIssue, discovered_priority,
};
use crate::store::{Dependency, DependencyKind, IssueStore, StoreError};
use crate::supervisor::ACTOR;

/// Label marking an issue whose purpose is to remedy a missing attribute of
/// another issue
pub const LABEL_META_ISSUE: &str = "meta-issue";

/// Label on the single issue created by the blocker-burst breaker
pub const LABEL_ESCALATED: &str = "escalated";

/// Label prefix recording how an issue was discovered
pub const LABEL_DISCOVERED_PREFIX: &str = "discovered:";

/// More blockers than this in one batch trips the escalation breaker
const BLOCKER_BURST_LIMIT: usize = 5;

/// Upward chain of blocker-labelled ancestors at or beyond this depth
/// suppresses further blocker creation
const BLOCKER_DEPTH_LIMIT: usize = 2;

/// Hop bound while walking provenance edges, guarding accidental cycles
const CHAIN_SAFETY_BOUND: usize = 10;

const ESCALATION_CRITERIA: &str = "Each suppressed blocker has been triaged: filed as its own issue \
or explicitly rejected with a reason. The parent work item is unblocked or re-planned.";

/// Parent attribute a meta-issue points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetaField {
    AcceptanceCriteria,
    Description,
    Design,
}

impl MetaField {
    fn is_present(self, issue: &Issue) -> bool {
        match self {
            Self::AcceptanceCriteria => !issue.acceptance_criteria.trim().is_empty(),
            Self::Description => !issue.description.trim().is_empty(),
            Self::Design => issue.design.as_deref().is_some_and(|d| !d.trim().is_empty()),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::AcceptanceCriteria => "acceptance criteria",
            Self::Description => "description",
            Self::Design => "design",
        }
    }
}

/// A discovery a guard filtered out
#[derive(Debug, Clone)]
pub struct SkippedDiscovery {
    pub title: String,
    pub reason: String,
}

/// A discovery whose creation failed at the store
#[derive(Debug, Clone)]
pub struct FailedDiscovery {
    pub title: String,
    pub error: String,
}

/// What the pipeline did with one batch of discoveries
#[derive(Debug, Default)]
pub struct DiscoveryOutcome {
    /// Ids of created issues, in discovery order
    pub created: Vec<String>,

    pub skipped: Vec<SkippedDiscovery>,

    pub failed: Vec<FailedDiscovery>,

    /// Set when the burst breaker replaced the batch with one escalation
    pub escalation: Option<String>,
}

/// Create issues for a batch of discoveries reported against `parent`.
///
/// Guards run in order per discovery; a failed creation is recorded and
/// the remaining discoveries still run.
pub async fn process_discoveries(
    store: &dyn IssueStore,
    parent: &Issue,
    discoveries: &[DiscoveredIssue],
) -> Result<DiscoveryOutcome, StoreError> {
    let mut outcome = DiscoveryOutcome::default();

    let blockers: Vec<&DiscoveredIssue> = discoveries
        .iter()
        .filter(|d| d.kind == DiscoveryKind::Blocker)
        .collect();
    if blockers.len() > BLOCKER_BURST_LIMIT {
        let id = escalate_blocker_burst(store, parent, &blockers).await?;
        outcome.created.push(id.clone());
        outcome.escalation = Some(id);
        return Ok(outcome);
    }

    for discovery in discoveries {
        match apply_guards(store, parent, discovery).await? {
            Some(reason) => {
                info!(parent_id = %parent.id, title = %discovery.title, reason = %reason, "discovery skipped");
                outcome.skipped.push(SkippedDiscovery {
                    title: discovery.title.clone(),
                    reason,
                });
            }
            None => match create_discovered_issue(store, parent, discovery).await {
                Ok(id) => outcome.created.push(id),
                Err(e) => {
                    warn!(parent_id = %parent.id, title = %discovery.title, error = %e, "discovery creation failed");
                    outcome.failed.push(FailedDiscovery {
                        title: discovery.title.clone(),
                        error: e.to_string(),
                    });
                }
            },
        }
    }

    info!(
        parent_id = %parent.id,
        created = outcome.created.len(),
        skipped = outcome.skipped.len(),
        failed = outcome.failed.len(),
        "discovery batch processed"
    );
    Ok(outcome)
}

/// Run guards (a) through (d); Some(reason) means skip
async fn apply_guards(
    store: &dyn IssueStore,
    parent: &Issue,
    discovery: &DiscoveredIssue,
) -> Result<Option<String>, StoreError> {
    // (a) State re-verification: a meta-issue observation may be stale by
    // the time creation runs; re-read the parent and check the field now.
    if looks_like_meta(discovery)
        && let Some(field) = meta_target(discovery)
    {
        let fresh = store.get_issue(ACTOR, &parent.id).await?;
        if field.is_present(&fresh) {
            return Ok(Some(format!(
                "stale observation: parent {} already has {}",
                parent.id,
                field.name()
            )));
        }
    }

    // (b) Circular-meta: a meta-issue about a meta-issue
    if parent.has_label(LABEL_META_ISSUE) && discovery.has_label(LABEL_META_ISSUE) {
        return Ok(Some("circular meta-issue".to_string()));
    }

    // (c) Meta-issues without criteria would themselves spawn meta-issues
    if discovery.has_label(LABEL_META_ISSUE)
        && discovery
            .acceptance_criteria
            .as_deref()
            .is_none_or(|c| c.trim().is_empty())
    {
        return Ok(Some("meta-issue without acceptance criteria".to_string()));
    }

    // (d) Blocker depth cap
    if discovery.kind == DiscoveryKind::Blocker {
        let depth = blocker_chain_depth(store, parent).await?;
        if depth >= BLOCKER_DEPTH_LIMIT {
            return Ok(Some(format!("blocker chain depth {} at cap", depth)));
        }
    }

    Ok(None)
}

fn looks_like_meta(discovery: &DiscoveredIssue) -> bool {
    discovery.has_label(LABEL_META_ISSUE) || meta_target(discovery).is_some()
}

/// Which parent field a meta-style discovery would remedy, if any.
///
/// Matches "acceptance criteria" / "description" / "design" mentioned in a
/// parent-pointing phrasing.
fn meta_target(discovery: &DiscoveredIssue) -> Option<MetaField> {
    let text = format!("{} {}", discovery.title, discovery.description).to_lowercase();
    // Whole-word matching; "redesign" is not a design meta-issue
    let words: Vec<&str> = text.split(|c: char| !c.is_alphanumeric()).collect();

    let field = if text.contains("acceptance criteria") {
        MetaField::AcceptanceCriteria
    } else if words.contains(&"design") {
        MetaField::Design
    } else if words.contains(&"description") {
        MetaField::Description
    } else {
        return None;
    };

    let parent_pointing = discovery.has_label(LABEL_META_ISSUE)
        || ["parent", "missing", "needs", "lacks", "add ", "no "]
            .iter()
            .any(|phrase| text.contains(phrase));

    parent_pointing.then_some(field)
}

/// Count consecutive blocker-labelled ancestors, walking `discovered-from`
/// provenance upward from the parent
async fn blocker_chain_depth(store: &dyn IssueStore, parent: &Issue) -> Result<usize, StoreError> {
    let blocker_label = format!("{}blocker", LABEL_DISCOVERED_PREFIX);
    let mut depth = 0;
    let mut current = parent.clone();

    for _ in 0..CHAIN_SAFETY_BOUND {
        if !current.has_label(&blocker_label) {
            break;
        }
        depth += 1;

        let deps = store.dependencies_of(ACTOR, &current.id).await?;
        let Some(up) = deps.into_iter().find(|d| d.kind == DependencyKind::DiscoveredFrom) else {
            break;
        };
        current = store.get_issue(ACTOR, &up.depends_on).await?;
    }

    Ok(depth)
}

/// Replace a blocker flood with one escalation issue carrying the list
async fn escalate_blocker_burst(
    store: &dyn IssueStore,
    parent: &Issue,
    blockers: &[&DiscoveredIssue],
) -> Result<String, StoreError> {
    warn!(
        parent_id = %parent.id,
        blockers = blockers.len(),
        "blocker burst exceeds limit, escalating instead of creating individually"
    );

    let new = NewIssue::new(
        format!("Escalation: {} blockers reported during {}", blockers.len(), parent.id),
        format!(
            "Execution of {} ({}) surfaced {} blockers at once, more than the per-batch limit of {}. \
             Individual creation was suppressed; triage the list in the comments.",
            parent.id,
            parent.title,
            blockers.len(),
            BLOCKER_BURST_LIMIT
        ),
    )
    .with_type(IssueType::Task)
    .with_priority(crate::domain::Priority::P0)
    .with_acceptance_criteria(ESCALATION_CRITERIA)
    .with_assignee(ACTOR)
    .with_label(LABEL_ESCALATED);

    let issue = store.create_issue(ACTOR, new).await?;

    let mut listing = String::from("Suppressed blockers:\n");
    for blocker in blockers {
        listing.push_str(&format!("- {}\n", blocker.title));
    }
    store.add_comment(ACTOR, &issue.id, &listing).await?;

    info!(escalation_id = %issue.id, "escalation issue created");
    Ok(issue.id)
}

/// Create one discovered issue with provenance, labels, and the
/// `discovered-from` edge
async fn create_discovered_issue(
    store: &dyn IssueStore,
    parent: &Issue,
    discovery: &DiscoveredIssue,
) -> Result<String, StoreError> {
    let priority = discovered_priority(parent.priority, discovery.kind);
    debug!(
        title = %discovery.title,
        kind = %discovery.kind,
        priority = %priority,
        advisory_hint = %discovery.priority_hint,
        "creating discovered issue"
    );

    let mut description = discovery.description.trim().to_string();
    if !description.is_empty() {
        description.push_str("\n\n");
    }
    description.push_str(&format!(
        "Discovered during execution of {}: {}",
        parent.id, parent.title
    ));

    let mut new = NewIssue::new(discovery.title.clone(), description)
        .with_type(IssueType::from_discovery(&discovery.r#type))
        .with_priority(priority)
        .with_assignee(ACTOR);
    if let Some(criteria) = &discovery.acceptance_criteria {
        new = new.with_acceptance_criteria(criteria.clone());
    }

    let issue = store.create_issue(ACTOR, new).await?;

    if let Some(suffix) = discovery.kind.label_suffix() {
        store
            .add_label(ACTOR, &issue.id, &format!("{}{}", LABEL_DISCOVERED_PREFIX, suffix))
            .await?;
    }
    for label in &discovery.labels {
        store.add_label(ACTOR, &issue.id, label).await?;
    }

    store
        .add_dependency(ACTOR, &Dependency::discovered_from(&issue.id, &parent.id))
        .await?;

    Ok(issue.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IssuePatch, Priority};
    use crate::store::MemoryStore;

    async fn parent_with(store: &MemoryStore, priority: Priority, labels: &[&str]) -> Issue {
        let mut new = NewIssue::new("Parent task", "parent work").with_priority(priority);
        for label in labels {
            new = new.with_label(*label);
        }
        store.create_issue(ACTOR, new).await.unwrap()
    }

    #[tokio::test]
    async fn test_priorities_follow_arithmetic() {
        let store = MemoryStore::new();
        let parent = parent_with(&store, Priority::P2, &[]).await;

        let discoveries = vec![
            DiscoveredIssue::new("A blocker", DiscoveryKind::Blocker),
            DiscoveredIssue::new("A related item", DiscoveryKind::Related),
            DiscoveredIssue::new("A background item", DiscoveryKind::Background),
            DiscoveredIssue::new("An unclassified item", DiscoveryKind::Unspecified),
        ];

        let outcome = process_discoveries(&store, &parent, &discoveries).await.unwrap();
        assert_eq!(outcome.created.len(), 4);

        let priorities: Vec<u8> = {
            let mut out = Vec::new();
            for id in &outcome.created {
                out.push(store.get_issue(ACTOR, id).await.unwrap().priority.as_u8());
            }
            out
        };
        assert_eq!(priorities, vec![0, 3, 2, 2]);
    }

    #[tokio::test]
    async fn test_created_issue_carries_provenance_and_labels() {
        let store = MemoryStore::new();
        let parent = parent_with(&store, Priority::P1, &[]).await;

        let discovery = DiscoveredIssue::new("Leaky pool", DiscoveryKind::Related)
            .with_description("connections leak under load")
            .with_label("performance");

        let outcome = process_discoveries(&store, &parent, &[discovery]).await.unwrap();
        let issue = store.get_issue(ACTOR, &outcome.created[0]).await.unwrap();

        assert!(issue.description.contains("connections leak under load"));
        assert!(
            issue
                .description
                .contains(&format!("Discovered during execution of {}", parent.id))
        );
        assert_eq!(issue.assignee.as_deref(), Some(ACTOR));
        assert!(issue.has_label("discovered:related"));
        assert!(issue.has_label("performance"));

        let deps = store.dependencies_of(ACTOR, &issue.id).await.unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].kind, DependencyKind::DiscoveredFrom);
        assert_eq!(deps[0].depends_on, parent.id);
    }

    #[tokio::test]
    async fn test_unspecified_kind_gets_no_discovered_label() {
        let store = MemoryStore::new();
        let parent = parent_with(&store, Priority::P1, &[]).await;

        let outcome = process_discoveries(
            &store,
            &parent,
            &[DiscoveredIssue::new("Odd thing", DiscoveryKind::Unspecified)],
        )
        .await
        .unwrap();

        let issue = store.get_issue(ACTOR, &outcome.created[0]).await.unwrap();
        assert!(!issue.labels.iter().any(|l| l.starts_with(LABEL_DISCOVERED_PREFIX)));
    }

    #[tokio::test]
    async fn test_circular_meta_skipped() {
        let store = MemoryStore::new();
        let parent = parent_with(&store, Priority::P1, &[LABEL_META_ISSUE]).await;

        let discovery = DiscoveredIssue::new("Add acceptance criteria to parent", DiscoveryKind::Related)
            .with_label(LABEL_META_ISSUE)
            .with_acceptance_criteria("criteria present");

        let outcome = process_discoveries(&store, &parent, &[discovery]).await.unwrap();
        assert!(outcome.created.is_empty());
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].reason, "circular meta-issue");
    }

    #[tokio::test]
    async fn test_meta_without_criteria_skipped() {
        let store = MemoryStore::new();
        let parent = parent_with(&store, Priority::P1, &[]).await;

        let discovery =
            DiscoveredIssue::new("Tighten input validation", DiscoveryKind::Related).with_label(LABEL_META_ISSUE);

        let outcome = process_discoveries(&store, &parent, &[discovery]).await.unwrap();
        assert!(outcome.created.is_empty());
        assert_eq!(outcome.skipped[0].reason, "meta-issue without acceptance criteria");
    }

    #[tokio::test]
    async fn test_stale_meta_observation_skipped() {
        let store = MemoryStore::new();
        let parent = parent_with(&store, Priority::P1, &[]).await;

        // Between analysis and creation the parent gained criteria
        store
            .update_issue(
                ACTOR,
                &parent.id,
                IssuePatch {
                    acceptance_criteria: Some("now present".to_string()),
                    ..IssuePatch::default()
                },
            )
            .await
            .unwrap();

        let discovery = DiscoveredIssue::new(
            "Parent issue is missing acceptance criteria",
            DiscoveryKind::Related,
        );

        let outcome = process_discoveries(&store, &parent, &[discovery]).await.unwrap();
        assert!(outcome.created.is_empty());
        assert!(outcome.skipped[0].reason.contains("stale observation"));
    }

    #[tokio::test]
    async fn test_meta_observation_still_valid_creates() {
        let store = MemoryStore::new();
        let parent = parent_with(&store, Priority::P1, &[]).await;

        let discovery = DiscoveredIssue::new(
            "Parent issue is missing acceptance criteria",
            DiscoveryKind::Related,
        );

        // Parent criteria still empty, so the observation holds
        let outcome = process_discoveries(&store, &parent, &[discovery]).await.unwrap();
        assert_eq!(outcome.created.len(), 1);
    }

    #[tokio::test]
    async fn test_blocker_depth_cap() {
        let store = MemoryStore::new();

        // Build a chain: grandparent <- parent <- current, every link a
        // discovered blocker
        let grandparent = parent_with(&store, Priority::P0, &["discovered:blocker"]).await;
        let parent = parent_with(&store, Priority::P0, &["discovered:blocker"]).await;
        store
            .add_dependency(ACTOR, &Dependency::discovered_from(&parent.id, &grandparent.id))
            .await
            .unwrap();
        let parent = store.get_issue(ACTOR, &parent.id).await.unwrap();

        let outcome = process_discoveries(
            &store,
            &parent,
            &[DiscoveredIssue::new("Yet another blocker", DiscoveryKind::Blocker)],
        )
        .await
        .unwrap();

        assert!(outcome.created.is_empty());
        assert!(outcome.skipped[0].reason.contains("blocker chain depth"));
    }

    #[tokio::test]
    async fn test_blocker_depth_one_still_creates() {
        let store = MemoryStore::new();
        let parent = parent_with(&store, Priority::P1, &["discovered:blocker"]).await;

        let outcome = process_discoveries(
            &store,
            &parent,
            &[DiscoveredIssue::new("Deeper blocker", DiscoveryKind::Blocker)],
        )
        .await
        .unwrap();

        assert_eq!(outcome.created.len(), 1);
    }

    #[tokio::test]
    async fn test_blocker_burst_escalates() {
        let store = MemoryStore::new();
        let parent = parent_with(&store, Priority::P2, &[]).await;

        let discoveries: Vec<DiscoveredIssue> = (0..10)
            .map(|i| DiscoveredIssue::new(format!("Blocker {}", i), DiscoveryKind::Blocker))
            .collect();

        let outcome = process_discoveries(&store, &parent, &discoveries).await.unwrap();

        assert_eq!(outcome.created.len(), 1);
        let escalation_id = outcome.escalation.clone().unwrap();
        assert_eq!(outcome.created[0], escalation_id);

        let escalation = store.get_issue(ACTOR, &escalation_id).await.unwrap();
        assert_eq!(escalation.r#type, IssueType::Task);
        assert_eq!(escalation.priority, Priority::P0);
        assert!(escalation.has_label(LABEL_ESCALATED));
        assert!(!escalation.acceptance_criteria.is_empty());

        let comments = store.comments_of(ACTOR, &escalation_id).await.unwrap();
        assert_eq!(comments.len(), 1);
        for i in 0..10 {
            assert!(comments[0].body.contains(&format!("Blocker {}", i)));
        }
    }

    #[tokio::test]
    async fn test_five_blockers_do_not_escalate() {
        let store = MemoryStore::new();
        let parent = parent_with(&store, Priority::P2, &[]).await;

        let discoveries: Vec<DiscoveredIssue> = (0..5)
            .map(|i| DiscoveredIssue::new(format!("Blocker {}", i), DiscoveryKind::Blocker))
            .collect();

        let outcome = process_discoveries(&store, &parent, &discoveries).await.unwrap();
        assert!(outcome.escalation.is_none());
        assert_eq!(outcome.created.len(), 5);
    }

    #[tokio::test]
    async fn test_partial_failure_does_not_undo_prior_creations() {
        let store = MemoryStore::strict();
        let parent = store
            .create_issue(
                ACTOR,
                NewIssue::new("Parent", "p")
                    .with_type(IssueType::Task)
                    .with_acceptance_criteria("done"),
            )
            .await
            .unwrap();

        let discoveries = vec![
            DiscoveredIssue::new("Good one", DiscoveryKind::Related).with_acceptance_criteria("ok"),
            // The strict store rejects a task without criteria
            DiscoveredIssue::new("Bad one", DiscoveryKind::Related),
            DiscoveredIssue::new("Another good one", DiscoveryKind::Related).with_acceptance_criteria("ok"),
        ];

        let outcome = process_discoveries(&store, &parent, &discoveries).await.unwrap();
        assert_eq!(outcome.created.len(), 2);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].title, "Bad one");
    }
}
