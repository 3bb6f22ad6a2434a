//! Per-issue selectivity: is this issue worth the refinement loop?
//!
//! Refinement triggers for priority-0 issues, mission/phase subtypes, and
//! novel areas. Everything else takes the single-pass path so cost stays
//! bounded.

use crate::domain::{Issue, IssueSubtype};

/// Whether to refine, which signals fired, and the skip reason otherwise
#[derive(Debug, Clone)]
pub struct SelectivityDecision {
    pub should_refine: bool,
    pub triggers: Vec<String>,
    pub skip_reason: Option<String>,
}

/// Decide whether an issue's assessment should iterate
pub fn assess_selectivity(issue: &Issue) -> SelectivityDecision {
    let mut triggers = Vec::new();

    if issue.priority.is_urgent() {
        triggers.push("priority-0".to_string());
    }
    match issue.subtype {
        IssueSubtype::Mission => triggers.push("mission-subtype".to_string()),
        IssueSubtype::Phase => triggers.push("phase-subtype".to_string()),
        IssueSubtype::None => {}
    }
    if is_novel_area(issue) {
        triggers.push("novel-area".to_string());
    }

    if triggers.is_empty() {
        SelectivityDecision {
            should_refine: false,
            triggers,
            skip_reason: Some(format!("routine {} {}", issue.priority, issue.r#type)),
        }
    } else {
        SelectivityDecision {
            should_refine: true,
            triggers,
            skip_reason: None,
        }
    }
}

/// Conservative novelty heuristic.
///
/// TODO: query closed issues for similar titles once the store grows a
/// similarity search; until then nothing is novel.
fn is_novel_area(_issue: &Issue) -> bool {
    false
}
