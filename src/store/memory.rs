//! In-memory issue store
//!
//! Implements the full store contract behind a mutex. Used by tests and by
//! callers that want the engine without durable persistence. Usage events
//! are persisted as comments in the canonical format.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Issue, IssuePatch, IssueStatus, IssueType, NewIssue};

use super::{
    Comment, Dependency, IssueQuery, IssueStore, StoreError, StoreStats, StoredEvent, UsageEvent,
};

#[derive(Default)]
struct Inner {
    issues: HashMap<String, Issue>,
    dependencies: Vec<Dependency>,
    comments: HashMap<String, Vec<Comment>>,
    events: Vec<StoredEvent>,
    claims: HashMap<String, String>,
    instances: BTreeSet<String>,
}

/// Mutex-protected in-memory store
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    /// Reject executable issues created without acceptance criteria
    strict_criteria: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that enforces the acceptance-criteria policy on creation
    pub fn strict() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            strict_criteria: true,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_id() -> String {
        format!("is-{}", Uuid::now_v7().simple())
    }
}

#[async_trait]
impl IssueStore for MemoryStore {
    async fn create_issue(&self, actor: &str, new: NewIssue) -> Result<Issue, StoreError> {
        if new.title.trim().is_empty() {
            return Err(StoreError::InvalidState("issue title must not be empty".to_string()));
        }
        if self.strict_criteria
            && matches!(new.r#type, IssueType::Task | IssueType::Bug | IssueType::Feature)
            && new.acceptance_criteria.trim().is_empty()
        {
            return Err(StoreError::InvalidState(format!(
                "{} issues require acceptance criteria",
                new.r#type
            )));
        }

        let now = Utc::now();
        let issue = Issue {
            id: Self::next_id(),
            title: new.title,
            description: new.description,
            design: new.design,
            acceptance_criteria: new.acceptance_criteria,
            r#type: new.r#type,
            subtype: new.subtype,
            priority: new.priority,
            status: IssueStatus::Open,
            estimated_minutes: new.estimated_minutes,
            assignee: new.assignee,
            labels: new.labels,
            notes: String::new(),
            created_at: now,
            updated_at: now,
        };

        debug!(actor, issue_id = %issue.id, title = %issue.title, "create_issue");
        self.lock().issues.insert(issue.id.clone(), issue.clone());
        Ok(issue)
    }

    async fn get_issue(&self, _actor: &str, id: &str) -> Result<Issue, StoreError> {
        self.lock()
            .issues
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn update_issue(&self, actor: &str, id: &str, patch: IssuePatch) -> Result<Issue, StoreError> {
        let mut inner = self.lock();
        let issue = inner
            .issues
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Some(title) = patch.title {
            issue.title = title;
        }
        if let Some(description) = patch.description {
            issue.description = description;
        }
        if let Some(design) = patch.design {
            issue.design = Some(design);
        }
        if let Some(criteria) = patch.acceptance_criteria {
            issue.acceptance_criteria = criteria;
        }
        if let Some(priority) = patch.priority {
            issue.priority = priority;
        }
        if let Some(status) = patch.status {
            issue.status = status;
        }
        if let Some(minutes) = patch.estimated_minutes {
            issue.estimated_minutes = Some(minutes);
        }
        if let Some(assignee) = patch.assignee {
            issue.assignee = Some(assignee);
        }
        if let Some(notes) = patch.notes {
            issue.notes = notes;
        }
        issue.updated_at = Utc::now();

        debug!(actor, issue_id = %id, "update_issue");
        Ok(issue.clone())
    }

    async fn close_issue(&self, actor: &str, id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let issue = inner
            .issues
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        issue.status = IssueStatus::Closed;
        issue.updated_at = Utc::now();
        debug!(actor, issue_id = %id, "close_issue");
        Ok(())
    }

    async fn search_issues(&self, _actor: &str, query: &IssueQuery) -> Result<Vec<Issue>, StoreError> {
        let inner = self.lock();
        let mut results: Vec<Issue> = inner
            .issues
            .values()
            .filter(|issue| {
                if let Some(status) = query.status
                    && issue.status != status
                {
                    return false;
                }
                if let Some(r#type) = query.r#type
                    && issue.r#type != r#type
                {
                    return false;
                }
                if let Some(label) = &query.label
                    && !issue.labels.contains(label)
                {
                    return false;
                }
                if let Some(assignee) = &query.assignee
                    && issue.assignee.as_deref() != Some(assignee.as_str())
                {
                    return false;
                }
                if let Some(text) = &query.text {
                    let needle = text.to_lowercase();
                    if !issue.title.to_lowercase().contains(&needle)
                        && !issue.description.to_lowercase().contains(&needle)
                    {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();
        results.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(results)
    }

    async fn add_dependency(&self, _actor: &str, dependency: &Dependency) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner.issues.contains_key(&dependency.issue_id) {
            return Err(StoreError::NotFound(dependency.issue_id.clone()));
        }
        if !inner.issues.contains_key(&dependency.depends_on) {
            return Err(StoreError::NotFound(dependency.depends_on.clone()));
        }
        if !inner.dependencies.contains(dependency) {
            inner.dependencies.push(dependency.clone());
        }
        Ok(())
    }

    async fn remove_dependency(&self, _actor: &str, issue_id: &str, depends_on: &str) -> Result<(), StoreError> {
        self.lock()
            .dependencies
            .retain(|d| !(d.issue_id == issue_id && d.depends_on == depends_on));
        Ok(())
    }

    async fn dependencies_of(&self, _actor: &str, issue_id: &str) -> Result<Vec<Dependency>, StoreError> {
        Ok(self
            .lock()
            .dependencies
            .iter()
            .filter(|d| d.issue_id == issue_id)
            .cloned()
            .collect())
    }

    async fn dependency_records(&self, _actor: &str) -> Result<Vec<Dependency>, StoreError> {
        Ok(self.lock().dependencies.clone())
    }

    async fn has_dependency_cycle(&self, _actor: &str) -> Result<bool, StoreError> {
        let inner = self.lock();
        let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();
        for dep in &inner.dependencies {
            edges.entry(&dep.issue_id).or_default().push(&dep.depends_on);
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut on_stack: HashSet<&str> = HashSet::new();

        fn walk<'a>(
            node: &'a str,
            edges: &HashMap<&'a str, Vec<&'a str>>,
            visited: &mut HashSet<&'a str>,
            on_stack: &mut HashSet<&'a str>,
        ) -> bool {
            if on_stack.contains(node) {
                return true;
            }
            if !visited.insert(node) {
                return false;
            }
            on_stack.insert(node);
            for next in edges.get(node).into_iter().flatten() {
                if walk(next, edges, visited, on_stack) {
                    return true;
                }
            }
            on_stack.remove(node);
            false
        }

        for node in edges.keys() {
            if walk(node, &edges, &mut visited, &mut on_stack) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn dependency_tree(&self, _actor: &str, issue_id: &str) -> Result<Vec<Dependency>, StoreError> {
        let inner = self.lock();
        let mut tree = Vec::new();
        let mut frontier = vec![issue_id.to_string()];
        let mut seen: HashSet<String> = HashSet::new();

        while let Some(current) = frontier.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            for dep in inner.dependencies.iter().filter(|d| d.issue_id == current) {
                tree.push(dep.clone());
                frontier.push(dep.depends_on.clone());
            }
        }
        Ok(tree)
    }

    async fn add_label(&self, _actor: &str, issue_id: &str, label: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let issue = inner
            .issues
            .get_mut(issue_id)
            .ok_or_else(|| StoreError::NotFound(issue_id.to_string()))?;
        issue.labels.insert(label.to_string());
        issue.updated_at = Utc::now();
        Ok(())
    }

    async fn remove_label(&self, _actor: &str, issue_id: &str, label: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let issue = inner
            .issues
            .get_mut(issue_id)
            .ok_or_else(|| StoreError::NotFound(issue_id.to_string()))?;
        issue.labels.remove(label);
        issue.updated_at = Utc::now();
        Ok(())
    }

    async fn labels_of(&self, _actor: &str, issue_id: &str) -> Result<BTreeSet<String>, StoreError> {
        let inner = self.lock();
        inner
            .issues
            .get(issue_id)
            .map(|i| i.labels.clone())
            .ok_or_else(|| StoreError::NotFound(issue_id.to_string()))
    }

    async fn issues_with_label(&self, _actor: &str, label: &str) -> Result<Vec<Issue>, StoreError> {
        Ok(self
            .lock()
            .issues
            .values()
            .filter(|i| i.labels.contains(label))
            .cloned()
            .collect())
    }

    async fn add_comment(&self, actor: &str, issue_id: &str, body: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner.issues.contains_key(issue_id) {
            return Err(StoreError::NotFound(issue_id.to_string()));
        }
        inner.comments.entry(issue_id.to_string()).or_default().push(Comment {
            issue_id: issue_id.to_string(),
            author: actor.to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn comments_of(&self, _actor: &str, issue_id: &str) -> Result<Vec<Comment>, StoreError> {
        Ok(self.lock().comments.get(issue_id).cloned().unwrap_or_default())
    }

    async fn record_usage(&self, actor: &str, event: &UsageEvent) -> Result<(), StoreError> {
        self.add_comment(actor, &event.issue_id, &event.comment_body()).await
    }

    async fn claim_issue(&self, _actor: &str, issue_id: &str, instance: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner.issues.contains_key(issue_id) {
            return Err(StoreError::NotFound(issue_id.to_string()));
        }
        let owner = inner.claims.get(issue_id).cloned();
        match owner {
            Some(owner) if owner != instance => Err(StoreError::Conflict(format!(
                "issue {} already claimed by {}",
                issue_id, owner
            ))),
            _ => {
                inner.claims.insert(issue_id.to_string(), instance.to_string());
                Ok(())
            }
        }
    }

    async fn release_issue(&self, _actor: &str, issue_id: &str, instance: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let owner = inner.claims.get(issue_id).cloned();
        match owner {
            Some(owner) if owner == instance => {
                inner.claims.remove(issue_id);
                Ok(())
            }
            Some(owner) => Err(StoreError::Conflict(format!(
                "issue {} is claimed by {}, not {}",
                issue_id, owner, instance
            ))),
            None => Ok(()),
        }
    }

    async fn register_instance(&self, _actor: &str, instance: &str) -> Result<(), StoreError> {
        self.lock().instances.insert(instance.to_string());
        Ok(())
    }

    async fn record_event(&self, _actor: &str, event: &StoredEvent) -> Result<(), StoreError> {
        self.lock().events.push(event.clone());
        Ok(())
    }

    async fn stats(&self, _actor: &str) -> Result<StoreStats, StoreError> {
        let inner = self.lock();
        let mut stats = StoreStats {
            total_issues: inner.issues.len(),
            dependencies: inner.dependencies.len(),
            ..StoreStats::default()
        };
        let mut labels: HashSet<&str> = HashSet::new();
        for issue in inner.issues.values() {
            match issue.status {
                IssueStatus::Closed => stats.closed_issues += 1,
                IssueStatus::Blocked => stats.blocked_issues += 1,
                _ => stats.open_issues += 1,
            }
            labels.extend(issue.labels.iter().map(String::as_str));
        }
        stats.labels = labels.len();
        Ok(stats)
    }
}
