//! Mission plans - phased execution plans generated for mission issues

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::issue::IssueType;
use super::priority::Priority;

/// Plan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Draft,
    Validated,
    Superseded,
}

/// A phased plan for executing a mission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionPlan {
    pub mission_id: String,

    #[serde(default)]
    pub strategy: String,

    #[serde(default)]
    pub estimated_effort: String,

    #[serde(default)]
    pub confidence: f64,

    #[serde(default)]
    pub risks: Vec<String>,

    #[serde(default)]
    pub phases: Vec<PlannedPhase>,

    #[serde(default = "Utc::now")]
    pub generated_at: DateTime<Utc>,

    /// Model identifier or tool tag that produced the plan
    #[serde(default)]
    pub generated_by: String,

    #[serde(default)]
    pub status: PlanStatus,
}

impl MissionPlan {
    pub fn new(mission_id: impl Into<String>) -> Self {
        Self {
            mission_id: mission_id.into(),
            strategy: String::new(),
            estimated_effort: String::new(),
            confidence: 0.0,
            risks: Vec::new(),
            phases: Vec::new(),
            generated_at: Utc::now(),
            generated_by: String::new(),
            status: PlanStatus::Draft,
        }
    }

    pub fn phase(&self, number: u32) -> Option<&PlannedPhase> {
        self.phases.iter().find(|p| p.number == number)
    }

    pub fn total_tasks(&self) -> usize {
        self.phases.iter().map(|p| p.tasks.len()).sum()
    }
}

/// One phase within a mission plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedPhase {
    /// Unique positive phase number within the plan
    pub number: u32,

    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub strategy: String,

    #[serde(default)]
    pub tasks: Vec<PlannedTask>,

    /// Phase numbers this phase depends on
    #[serde(default)]
    pub depends_on: BTreeSet<u32>,

    #[serde(default)]
    pub estimated_effort: String,
}

/// One task within a planned phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedTask {
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub acceptance_criteria: String,

    /// Titles of tasks in the same phase that must finish first
    #[serde(default)]
    pub depends_on: BTreeSet<String>,

    #[serde(default)]
    pub estimated_minutes: Option<u32>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default, rename = "type")]
    pub r#type: IssueType,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan() -> MissionPlan {
        let json = r#"{
            "mission_id": "is-mission",
            "strategy": "three waves",
            "estimated_effort": "2 weeks",
            "confidence": 0.75,
            "risks": ["unknown schema"],
            "phases": [
                {
                    "number": 1,
                    "title": "Foundations",
                    "description": "set up scaffolding",
                    "strategy": "bottom up",
                    "tasks": [
                        {"title": "Create repo", "acceptance_criteria": "repo exists", "priority": 1, "type": "task"}
                    ],
                    "depends_on": [],
                    "estimated_effort": "3 days"
                },
                {
                    "number": 2,
                    "title": "Core",
                    "tasks": [
                        {"title": "Implement engine", "depends_on": [], "priority": 0}
                    ],
                    "depends_on": [1]
                }
            ],
            "generated_by": "test"
        }"#;
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_plan_deserialize() {
        let plan = sample_plan();
        assert_eq!(plan.phases.len(), 2);
        assert_eq!(plan.total_tasks(), 2);
        assert_eq!(plan.status, PlanStatus::Draft);
        assert!(plan.phases[1].depends_on.contains(&1));
    }

    #[test]
    fn test_plan_phase_lookup() {
        let plan = sample_plan();
        assert_eq!(plan.phase(1).unwrap().title, "Foundations");
        assert!(plan.phase(9).is_none());
    }

    #[test]
    fn test_planned_task_defaults() {
        let task: PlannedTask = serde_json::from_str(r#"{"title": "t"}"#).unwrap();
        assert_eq!(task.priority, Priority::P2);
        assert_eq!(task.r#type, IssueType::Task);
        assert!(task.depends_on.is_empty());
    }
}
