//! Service and experiment configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::CohortError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub experiment: ExperimentConfig,
    #[serde(default)]
    pub content: ContentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the HTTP API on
    #[serde(default = "default_bind")]
    pub bind: String,

    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding `conditions.db`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// How long a writer waits on a locked database before failing
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

/// Parameters of the betting study itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Total bonus budget, split evenly across all blocks
    #[serde(default = "default_bonus_budget")]
    pub bonus_budget: f64,

    /// Correct quiz answers needed to skip remediation
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: u32,

    /// Hard cap on instruction/quiz rounds
    #[serde(default = "default_max_quiz_loops")]
    pub max_quiz_loops: u32,

    /// How long block feedback stays on screen
    #[serde(default = "default_feedback_dwell")]
    pub feedback_dwell_ms: u64,

    /// Version tag written into every session payload
    #[serde(default = "default_version")]
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Problem bank JSON, served at `/content/problems.json`
    #[serde(default = "default_problems_path")]
    pub problems_path: PathBuf,
}

// Defaults
fn default_bind() -> String { "0.0.0.0".to_string() }
fn default_http_port() -> u16 { 8080 }
fn default_data_dir() -> PathBuf { PathBuf::from("data") }
fn default_busy_timeout() -> u64 { 5000 }
fn default_bonus_budget() -> f64 { 5.0 }
fn default_pass_threshold() -> u32 { 2 }
fn default_max_quiz_loops() -> u32 { 2 }
fn default_feedback_dwell() -> u64 { 3000 }
fn default_version() -> String { format!("cohort-{}", env!("CARGO_PKG_VERSION")) }
fn default_problems_path() -> PathBuf { PathBuf::from("content/problems.json") }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            http_port: default_http_port(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            bonus_budget: default_bonus_budget(),
            pass_threshold: default_pass_threshold(),
            max_quiz_loops: default_max_quiz_loops(),
            feedback_dwell_ms: default_feedback_dwell(),
            version: default_version(),
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            problems_path: default_problems_path(),
        }
    }
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl ExperimentConfig {
    pub fn feedback_dwell(&self) -> Duration {
        Duration::from_millis(self.feedback_dwell_ms)
    }
}

impl Config {
    /// Load from a TOML file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, CohortError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| CohortError::Config(format!("reading {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, CohortError> {
        let config: Config =
            toml::from_str(content).map_err(|e| CohortError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), CohortError> {
        let exp = &self.experiment;
        if !exp.bonus_budget.is_finite() || exp.bonus_budget < 0.0 {
            return Err(CohortError::Config(format!(
                "experiment.bonus_budget must be a non-negative number, got {}",
                exp.bonus_budget
            )));
        }
        if exp.max_quiz_loops == 0 {
            return Err(CohortError::Config(
                "experiment.max_quiz_loops must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
