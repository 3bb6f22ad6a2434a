//! Test-failure diagnosis stage

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::Issue;
use crate::parse::{ParseOptions, parse_lenient};
use crate::refine::RefineError;

use super::{Supervisor, prompts};

/// Classification of a test failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum FailureType {
    Flaky,
    Real,
    Environmental,
    #[default]
    Unknown,
}

impl From<String> for FailureType {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "flaky" => Self::Flaky,
            "real" => Self::Real,
            "environmental" => Self::Environmental,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for FailureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flaky => write!(f, "flaky"),
            Self::Real => write!(f, "real"),
            Self::Environmental => write!(f, "environmental"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Structured diagnosis of a test failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDiagnosis {
    pub failure_type: FailureType,

    #[serde(default)]
    pub root_cause: String,

    #[serde(default)]
    pub proposed_fix: String,

    #[serde(default)]
    pub confidence: f64,

    #[serde(default)]
    pub test_names: Vec<String>,

    #[serde(default)]
    pub stack_traces: Vec<String>,

    /// Steps to verify the proposed fix
    #[serde(default)]
    pub verification: Vec<String>,
}

impl Supervisor {
    /// Diagnose a test failure from raw output.
    ///
    /// Rejects empty output; output above 100 KB is truncated preserving
    /// its boundaries.
    pub async fn diagnose_test_failure(
        &self,
        issue: &Issue,
        test_output: &str,
    ) -> Result<TestDiagnosis, RefineError> {
        if test_output.trim().is_empty() {
            return Err(RefineError::Validation(
                "test output is empty, nothing to diagnose".to_string(),
            ));
        }

        debug!(issue_id = %issue.id, output_len = test_output.len(), "diagnosing test failure");

        let prompt = prompts::diagnosis_prompt(issue, test_output);
        let reply = self
            .call_model("diagnose", Some(&issue.id), prompts::SYSTEM_DIAGNOSE, prompt, 2048, 0.1)
            .await?;

        let diagnosis = parse_lenient::<TestDiagnosis>(
            &reply.text,
            &ParseOptions::new(format!("test diagnosis for {}", issue.id)),
        )?;

        info!(
            issue_id = %issue.id,
            failure_type = %diagnosis.failure_type,
            confidence = diagnosis.confidence,
            tests = diagnosis.test_names.len(),
            "diagnosis complete"
        );
        Ok(diagnosis)
    }
}
