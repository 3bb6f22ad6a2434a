//! Domain types for the supervision engine
//!
//! Issues and their assessments, analyses, completion judgments, and
//! mission plans. Everything here is plain data: behavior lives in the
//! supervisor, discovery, and decomposition modules.

mod analysis;
mod assessment;
mod issue;
mod plan;
mod priority;

pub use analysis::{Analysis, CriterionAssessment, DiscoveredIssue, DiscoveryKind, ScopeValidation};
pub use assessment::{Assessment, ChildIssueSpec, CompletionAssessment, DecompositionPlan};
pub use issue::{Issue, IssuePatch, IssueStatus, IssueSubtype, IssueType, NewIssue};
pub use plan::{MissionPlan, PlanStatus, PlannedPhase, PlannedTask};
pub use priority::{Priority, discovered_priority};
