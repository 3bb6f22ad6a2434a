//! Summarization and description parsing stages

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::parse::{ParseOptions, parse_lenient};
use crate::refine::RefineError;

use super::{Supervisor, prompts};

/// Goal and constraints extracted from a free-form description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDescription {
    pub goal: String,

    #[serde(default)]
    pub constraints: Vec<String>,
}

impl Supervisor {
    /// Summarize agent output to at most `max_chars` characters.
    ///
    /// There is no heuristic fallback: a model failure surfaces as an
    /// error rather than a fabricated summary.
    pub async fn summarize_agent_output(&self, agent_output: &str, max_chars: usize) -> Result<String, RefineError> {
        if agent_output.trim().is_empty() {
            return Err(RefineError::Validation("agent output is empty".to_string()));
        }

        let prompt = prompts::summarize_prompt(agent_output, max_chars);
        let reply = self
            .call_model("summarize", None, prompts::SYSTEM_SUMMARIZE, prompt, 1024, 0.2)
            .await?;

        let mut summary = reply.text.trim().to_string();
        if summary.chars().count() > max_chars {
            debug!(
                requested = max_chars,
                produced = summary.chars().count(),
                "model overshot summary budget, clipping"
            );
            summary = summary.chars().take(max_chars).collect();
        }
        Ok(summary)
    }

    /// Parse a free-form description into goal plus constraints.
    pub async fn parse_description(&self, text: &str) -> Result<ParsedDescription, RefineError> {
        if text.trim().is_empty() {
            return Err(RefineError::Validation("description is empty".to_string()));
        }

        let prompt = prompts::describe_prompt(text);
        let reply = self
            .call_model("describe", None, prompts::SYSTEM_DESCRIBE, prompt, 1024, 0.0)
            .await?;

        let parsed = parse_lenient::<ParsedDescription>(&reply.text, &ParseOptions::new("description parse"))?;
        if parsed.goal.trim().is_empty() {
            return Err(RefineError::Validation(
                "description parse produced an empty goal".to_string(),
            ));
        }
        Ok(parsed)
    }
}
