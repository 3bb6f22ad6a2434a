//! Analysis - the post-execution inspection of agent output
//!
//! Analysis grades completion against acceptance criteria, validates scope,
//! and reports discoveries that may become new issues via the discovery
//! pipeline.

use serde::{Deserialize, Serialize};

/// Kind of a discovered issue; drives priority arithmetic and recursion caps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum DiscoveryKind {
    /// Must be resolved before the parent can proceed
    Blocker,
    /// Useful follow-on work in the same area
    Related,
    /// Low-urgency cleanup noticed in passing
    Background,
    /// The model did not classify the discovery
    #[default]
    Unspecified,
}

impl From<String> for DiscoveryKind {
    /// Unknown kind strings land on Unspecified rather than failing the parse
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "blocker" => Self::Blocker,
            "related" => Self::Related,
            "background" => Self::Background,
            _ => Self::Unspecified,
        }
    }
}

impl DiscoveryKind {
    /// Label suffix for the `discovered:<kind>` label; None for unspecified
    pub fn label_suffix(self) -> Option<&'static str> {
        match self {
            Self::Blocker => Some("blocker"),
            Self::Related => Some("related"),
            Self::Background => Some("background"),
            Self::Unspecified => None,
        }
    }
}

impl std::fmt::Display for DiscoveryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blocker => write!(f, "blocker"),
            Self::Related => write!(f, "related"),
            Self::Background => write!(f, "background"),
            Self::Unspecified => write!(f, "unspecified"),
        }
    }
}

/// A new piece of work surfaced during execution of a parent issue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredIssue {
    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Free-form type string; mapped via `IssueType::from_discovery`
    #[serde(default, rename = "type")]
    pub r#type: String,

    /// Advisory "P0".."P3" hint; discarded by priority arithmetic
    #[serde(default)]
    pub priority_hint: String,

    #[serde(default)]
    pub kind: DiscoveryKind,

    #[serde(default)]
    pub acceptance_criteria: Option<String>,

    #[serde(default)]
    pub labels: Vec<String>,
}

impl DiscoveredIssue {
    pub fn new(title: impl Into<String>, kind: DiscoveryKind) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            r#type: String::new(),
            priority_hint: String::new(),
            kind,
            acceptance_criteria: None,
            labels: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn with_acceptance_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.acceptance_criteria = Some(criteria.into());
        self
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// Whether the agent stayed on task
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScopeValidation {
    pub on_task: bool,

    #[serde(default)]
    pub explanation: String,
}

/// Verdict for one acceptance criterion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionAssessment {
    pub criterion: String,

    pub met: bool,

    #[serde(default)]
    pub evidence: String,

    #[serde(default)]
    pub reason: String,
}

/// Inspection of a coding agent's output for one issue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    /// Whether the issue's work is done
    pub completed: bool,

    #[serde(default)]
    pub scope: ScopeValidation,

    /// One entry per acceptance criterion, in criterion order
    #[serde(default)]
    pub criteria: Vec<CriterionAssessment>,

    /// Work the agent explicitly deferred
    #[serde(default)]
    pub punted: Vec<String>,

    #[serde(default)]
    pub discovered_issues: Vec<DiscoveredIssue>,

    #[serde(default)]
    pub quality_issues: Vec<String>,

    #[serde(default)]
    pub summary: String,

    #[serde(default)]
    pub confidence: f64,
}

impl Analysis {
    /// Count of criteria the agent failed to meet
    pub fn unmet_criteria(&self) -> usize {
        self.criteria.iter().filter(|c| !c.met).count()
    }
}
