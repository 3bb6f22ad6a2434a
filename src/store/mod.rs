//! Issue store contract
//!
//! A single interface mediates all persistence. The engine is polymorphic
//! over it and receives a concrete implementation by injection; tests and
//! examples use [`MemoryStore`]. Every verb takes an actor string; the
//! engine passes `ai-supervisor`.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Issue, IssuePatch, IssueStatus, IssueType, NewIssue};

mod memory;

pub use memory::MemoryStore;

/// Store operation failures
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Issue not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Directed dependency edge between issues
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// The issue that depends on (or was discovered during) another
    pub issue_id: String,

    pub depends_on: String,

    pub kind: DependencyKind,
}

impl Dependency {
    pub fn blocks(issue_id: impl Into<String>, depends_on: impl Into<String>) -> Self {
        Self {
            issue_id: issue_id.into(),
            depends_on: depends_on.into(),
            kind: DependencyKind::Blocks,
        }
    }

    pub fn discovered_from(issue_id: impl Into<String>, depends_on: impl Into<String>) -> Self {
        Self {
            issue_id: issue_id.into(),
            depends_on: depends_on.into(),
            kind: DependencyKind::DiscoveredFrom,
        }
    }
}

/// Edge kind: ordinary precedence or discovery provenance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyKind {
    Blocks,
    DiscoveredFrom,
}

/// A comment attached to an issue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub issue_id: String,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// One model call's token accounting, persisted through the store
#[derive(Debug, Clone)]
pub struct UsageEvent {
    pub issue_id: String,
    pub activity: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration: Duration,
    pub model: String,
}

impl UsageEvent {
    /// Canonical comment body for usage events
    pub fn comment_body(&self) -> String {
        format!(
            "AI Usage ({}): input={} tokens, output={} tokens, duration={:?}, model={}",
            self.activity, self.input_tokens, self.output_tokens, self.duration, self.model
        )
    }
}

/// Free-form event persisted for observability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub kind: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl StoredEvent {
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            created_at: Utc::now(),
        }
    }
}

/// Aggregate counts for operational visibility
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_issues: usize,
    pub open_issues: usize,
    pub closed_issues: usize,
    pub blocked_issues: usize,
    pub dependencies: usize,
    pub labels: usize,
}

/// Search filter; all present fields must match
#[derive(Debug, Clone, Default)]
pub struct IssueQuery {
    /// Substring match against title and description
    pub text: Option<String>,
    pub status: Option<IssueStatus>,
    pub r#type: Option<IssueType>,
    pub label: Option<String>,
    pub assignee: Option<String>,
}

impl IssueQuery {
    pub fn with_status(mut self, status: IssueStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// The persistence contract the engine drives.
///
/// Stores serialize their own writes; the engine performs no cross-issue
/// synchronization. Stores may reject invalid states (for example an
/// executable issue with empty acceptance criteria); the engine propagates
/// such errors.
#[async_trait]
pub trait IssueStore: Send + Sync {
    async fn create_issue(&self, actor: &str, new: NewIssue) -> Result<Issue, StoreError>;

    async fn get_issue(&self, actor: &str, id: &str) -> Result<Issue, StoreError>;

    /// Partial update; `None` fields are untouched
    async fn update_issue(&self, actor: &str, id: &str, patch: IssuePatch) -> Result<Issue, StoreError>;

    async fn close_issue(&self, actor: &str, id: &str) -> Result<(), StoreError>;

    async fn search_issues(&self, actor: &str, query: &IssueQuery) -> Result<Vec<Issue>, StoreError>;

    async fn add_dependency(&self, actor: &str, dependency: &Dependency) -> Result<(), StoreError>;

    async fn remove_dependency(&self, actor: &str, issue_id: &str, depends_on: &str) -> Result<(), StoreError>;

    /// Outgoing edges of one issue
    async fn dependencies_of(&self, actor: &str, issue_id: &str) -> Result<Vec<Dependency>, StoreError>;

    /// Every edge in the store
    async fn dependency_records(&self, actor: &str) -> Result<Vec<Dependency>, StoreError>;

    async fn has_dependency_cycle(&self, actor: &str) -> Result<bool, StoreError>;

    /// Transitive closure of edges reachable from `issue_id`
    async fn dependency_tree(&self, actor: &str, issue_id: &str) -> Result<Vec<Dependency>, StoreError>;

    async fn add_label(&self, actor: &str, issue_id: &str, label: &str) -> Result<(), StoreError>;

    async fn remove_label(&self, actor: &str, issue_id: &str, label: &str) -> Result<(), StoreError>;

    async fn labels_of(&self, actor: &str, issue_id: &str) -> Result<BTreeSet<String>, StoreError>;

    async fn issues_with_label(&self, actor: &str, label: &str) -> Result<Vec<Issue>, StoreError>;

    async fn add_comment(&self, actor: &str, issue_id: &str, body: &str) -> Result<(), StoreError>;

    async fn comments_of(&self, actor: &str, issue_id: &str) -> Result<Vec<Comment>, StoreError>;

    /// Persist one model call's token accounting
    async fn record_usage(&self, actor: &str, event: &UsageEvent) -> Result<(), StoreError>;

    /// Take executor ownership of an issue
    async fn claim_issue(&self, actor: &str, issue_id: &str, instance: &str) -> Result<(), StoreError>;

    async fn release_issue(&self, actor: &str, issue_id: &str, instance: &str) -> Result<(), StoreError>;

    async fn register_instance(&self, actor: &str, instance: &str) -> Result<(), StoreError>;

    async fn record_event(&self, actor: &str, event: &StoredEvent) -> Result<(), StoreError>;

    async fn stats(&self, actor: &str) -> Result<StoreStats, StoreError>;
}
