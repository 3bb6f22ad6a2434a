//! Assessment - the pre-execution strategy judgment

use serde::{Deserialize, Serialize};

use super::priority::Priority;

/// Strategy formed before a coding agent executes an issue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    /// High-level approach
    pub strategy: String,

    /// Ordered execution steps
    #[serde(default)]
    pub steps: Vec<String>,

    #[serde(default)]
    pub risks: Vec<String>,

    /// Confidence in [0, 1]
    #[serde(default)]
    pub confidence: f64,

    #[serde(default)]
    pub reasoning: String,

    /// Whether the issue should be split before execution
    #[serde(default)]
    pub should_decompose: bool,

    /// Present when `should_decompose` is true
    #[serde(default)]
    pub decomposition: Option<DecompositionPlan>,
}

/// How to split an issue into children
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecompositionPlan {
    #[serde(default)]
    pub reasoning: String,

    #[serde(default)]
    pub child_issues: Vec<ChildIssueSpec>,
}

impl DecompositionPlan {
    pub fn is_empty(&self) -> bool {
        self.child_issues.is_empty()
    }
}

/// Specification of one child issue within a decomposition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildIssueSpec {
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub acceptance_criteria: String,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub estimated_minutes: Option<u32>,
}

/// Judgment on whether a structural parent may close
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionAssessment {
    pub should_close: bool,

    #[serde(default)]
    pub reasoning: String,

    #[serde(default)]
    pub confidence: f64,

    #[serde(default)]
    pub caveats: Vec<String>,
}
