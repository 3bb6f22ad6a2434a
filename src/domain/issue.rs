//! Issue - the unit of work the supervisor drives
//!
//! Issues carry title, description, optional design, acceptance criteria,
//! a type/subtype pair, priority, and status. They are created by external
//! callers or by the discovery pipeline, mutated through the store's update
//! verb, and never deleted by the engine.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::priority::Priority;

/// Issue category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    #[default]
    Task,
    Bug,
    Feature,
    Epic,
    Chore,
}

impl IssueType {
    /// Map a free-form type string reported by the model.
    ///
    /// Unknown strings land on Task.
    pub fn from_discovery(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "bug" => Self::Bug,
            "feature" | "enhancement" => Self::Feature,
            "epic" => Self::Epic,
            "chore" => Self::Chore,
            _ => Self::Task,
        }
    }
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Task => write!(f, "task"),
            Self::Bug => write!(f, "bug"),
            Self::Feature => write!(f, "feature"),
            Self::Epic => write!(f, "epic"),
            Self::Chore => write!(f, "chore"),
        }
    }
}

/// Structural tier of an issue within a mission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IssueSubtype {
    Mission,
    Phase,
    #[default]
    None,
}

impl std::fmt::Display for IssueSubtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mission => write!(f, "mission"),
            Self::Phase => write!(f, "phase"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    #[default]
    Open,
    InProgress,
    Blocked,
    Closed,
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Blocked => write!(f, "blocked"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// A unit of software work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Store-assigned identifier, immutable once created
    pub id: String,

    pub title: String,

    pub description: String,

    /// Design notes, if any
    pub design: Option<String>,

    /// Acceptance criteria free text; empty means none recorded yet
    pub acceptance_criteria: String,

    #[serde(rename = "type")]
    pub r#type: IssueType,

    pub subtype: IssueSubtype,

    pub priority: Priority,

    pub status: IssueStatus,

    pub estimated_minutes: Option<u32>,

    pub assignee: Option<String>,

    pub labels: BTreeSet<String>,

    /// Running notes appended by stage operations
    pub notes: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Issue {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    /// Structural containers hold children rather than direct work
    pub fn is_structural(&self) -> bool {
        self.subtype != IssueSubtype::None || self.r#type == IssueType::Epic
    }

    pub fn is_open(&self) -> bool {
        self.status != IssueStatus::Closed
    }
}

/// Fields for issue creation; the store assigns the id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewIssue {
    pub title: String,
    pub description: String,
    pub design: Option<String>,
    pub acceptance_criteria: String,
    #[serde(rename = "type")]
    pub r#type: IssueType,
    pub subtype: IssueSubtype,
    pub priority: Priority,
    pub estimated_minutes: Option<u32>,
    pub assignee: Option<String>,
    pub labels: BTreeSet<String>,
}

impl NewIssue {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, r#type: IssueType) -> Self {
        self.r#type = r#type;
        self
    }

    pub fn with_subtype(mut self, subtype: IssueSubtype) -> Self {
        self.subtype = subtype;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_acceptance_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.acceptance_criteria = criteria.into();
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    pub fn with_estimated_minutes(mut self, minutes: u32) -> Self {
        self.estimated_minutes = Some(minutes);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }
}

/// Partial update applied through the store's update verb.
///
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct IssuePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub design: Option<String>,
    pub acceptance_criteria: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<IssueStatus>,
    pub estimated_minutes: Option<u32>,
    pub assignee: Option<String>,
    pub notes: Option<String>,
}

impl IssuePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.design.is_none()
            && self.acceptance_criteria.is_none()
            && self.priority.is_none()
            && self.status.is_none()
            && self.estimated_minutes.is_none()
            && self.assignee.is_none()
            && self.notes.is_none()
    }

    pub fn status(status: IssueStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn notes(notes: impl Into<String>) -> Self {
        Self {
            notes: Some(notes.into()),
            ..Default::default()
        }
    }
}
