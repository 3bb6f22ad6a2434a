//! Configuration types and loading
//!
//! YAML configuration with a fallback chain: explicit path, project-local
//! `.vigil.yml`, user config, then defaults. Validator limits come from
//! environment variables so operators can tune them without a config file.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::resilience::RetryConfig;

/// Default model when none is configured
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM vendor configuration
    pub llm: LlmConfig,

    /// Retry and circuit-breaker policy
    pub retry: RetryConfig,

    /// Refinement loop budgets
    pub refinement: RefinementConfig,
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must load or the call fails. Without one, the
    /// candidate files are scanned in precedence order and the first
    /// readable one wins; unreadable candidates are logged and passed
    /// over. No candidate at all means defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let loaded = Self::candidate_paths()
            .into_iter()
            .filter(|path| path.exists())
            .find_map(|path| match Self::load_from_file(&path) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable config file");
                    None
                }
            });

        Ok(loaded.unwrap_or_else(|| {
            tracing::info!("no config file found, using defaults");
            Self::default()
        }))
    }

    /// Candidate config files, highest precedence first: the project-local
    /// file, then the user config directory
    fn candidate_paths() -> Vec<PathBuf> {
        let mut candidates = vec![PathBuf::from(".vigil.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("vigil").join("vigil.yml"));
        }
        candidates
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM vendor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Hard cap on tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 8192,
            timeout_ms: 300_000,
        }
    }
}

/// Budgets for the iterative refinement loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    #[serde(rename = "min-iterations")]
    pub min_iterations: u32,

    #[serde(rename = "max-iterations")]
    pub max_iterations: u32,

    /// Skip refinement for routine issues
    #[serde(rename = "skip-simple")]
    pub skip_simple: bool,

    /// Optional wall-clock budget per refinement run, milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: Option<u64>,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            min_iterations: 3,
            max_iterations: 6,
            skip_simple: true,
            timeout_ms: None,
        }
    }
}
