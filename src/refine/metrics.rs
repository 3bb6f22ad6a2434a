//! Refinement metrics
//!
//! Per-artifact records plus an in-memory collector that aggregates by
//! convergence reason and selectivity trigger.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::Priority;

/// One refinement run's bookkeeping
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactMetrics {
    pub artifact_type: String,

    pub priority: Option<Priority>,

    pub total_iterations: u32,

    pub converged: bool,

    /// "converged", "max_iterations", "timeout", or empty when skipped
    pub convergence_reason: String,

    #[serde(with = "duration_ms")]
    pub total_duration: Duration,

    /// True when selectivity skipped the loop entirely
    pub iteration_skipped: bool,

    pub skip_reason: Option<String>,

    pub selectivity_triggers: Vec<String>,

    pub total_input_tokens: u64,

    pub total_output_tokens: u64,
}

mod duration_ms {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

/// Aggregated view over many runs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub total_runs: u64,
    pub skipped_runs: u64,
    pub converged_runs: u64,
    pub total_iterations: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub by_reason: HashMap<String, u64>,
    pub by_trigger: HashMap<String, u64>,
}

/// Where refinement runs report their bookkeeping
pub trait MetricsSink: Send + Sync {
    fn record(&self, metrics: ArtifactMetrics);
}

/// Sink that drops everything
#[derive(Debug, Default)]
pub struct NullMetrics;

impl MetricsSink for NullMetrics {
    fn record(&self, _metrics: ArtifactMetrics) {}
}

/// Mutex-protected collector for tests and in-process observability
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    records: Mutex<Vec<ArtifactMetrics>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ArtifactMetrics> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn aggregate(&self) -> AggregateMetrics {
        let records = self.records();
        let mut aggregate = AggregateMetrics {
            total_runs: records.len() as u64,
            ..AggregateMetrics::default()
        };

        for record in &records {
            if record.iteration_skipped {
                aggregate.skipped_runs += 1;
                if let Some(reason) = &record.skip_reason {
                    *aggregate.by_reason.entry(reason.clone()).or_default() += 1;
                }
            } else {
                if record.converged {
                    aggregate.converged_runs += 1;
                }
                if !record.convergence_reason.is_empty() {
                    *aggregate.by_reason.entry(record.convergence_reason.clone()).or_default() += 1;
                }
            }
            aggregate.total_iterations += record.total_iterations as u64;
            aggregate.total_input_tokens += record.total_input_tokens;
            aggregate.total_output_tokens += record.total_output_tokens;
            for trigger in &record.selectivity_triggers {
                *aggregate.by_trigger.entry(trigger.clone()).or_default() += 1;
            }
        }

        aggregate
    }
}

impl MetricsSink for InMemoryMetrics {
    fn record(&self, metrics: ArtifactMetrics) {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).push(metrics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refined(reason: &str, converged: bool, iterations: u32, triggers: &[&str]) -> ArtifactMetrics {
        ArtifactMetrics {
            artifact_type: "assessment".to_string(),
            total_iterations: iterations,
            converged,
            convergence_reason: reason.to_string(),
            selectivity_triggers: triggers.iter().map(|s| s.to_string()).collect(),
            ..ArtifactMetrics::default()
        }
    }

    fn skipped(reason: &str) -> ArtifactMetrics {
        ArtifactMetrics {
            artifact_type: "assessment".to_string(),
            iteration_skipped: true,
            skip_reason: Some(reason.to_string()),
            ..ArtifactMetrics::default()
        }
    }

    #[test]
    fn test_aggregate_counts() {
        let collector = InMemoryMetrics::new();
        collector.record(refined("converged", true, 3, &["priority-0"]));
        collector.record(refined("max_iterations", false, 6, &["mission-subtype"]));
        collector.record(skipped("routine P2 task"));

        let aggregate = collector.aggregate();
        assert_eq!(aggregate.total_runs, 3);
        assert_eq!(aggregate.skipped_runs, 1);
        assert_eq!(aggregate.converged_runs, 1);
        assert_eq!(aggregate.total_iterations, 9);
        assert_eq!(aggregate.by_reason.get("converged"), Some(&1));
        assert_eq!(aggregate.by_reason.get("max_iterations"), Some(&1));
        assert_eq!(aggregate.by_reason.get("routine P2 task"), Some(&1));
        assert_eq!(aggregate.by_trigger.get("priority-0"), Some(&1));
    }

    #[test]
    fn test_records_snapshot() {
        let collector = InMemoryMetrics::new();
        collector.record(refined("converged", true, 2, &[]));
        assert_eq!(collector.records().len(), 1);
        assert_eq!(collector.records()[0].total_iterations, 2);
    }

    #[test]
    fn test_null_sink_accepts_records() {
        NullMetrics.record(refined("converged", true, 1, &[]));
    }
}
