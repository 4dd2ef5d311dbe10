//! Pipeline configuration.
//!
//! Loads the YAML config, fills defaults for every omitted key, and validates
//! the values the workflow depends on before any notebook runs.
use crate::error::PipelineError;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "configs/pipeline_config.yaml";
pub const DEFAULT_RESULTS_DIR: &str = "results";
pub const DEFAULT_EXECUTE_COMMAND: &str =
    "jupyter nbconvert --to notebook --execute --stdout --ExecutePreprocessor.timeout={timeout} {input}";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 600;
pub const LM_COMMAND_ENV: &str = "AUTOPAPER_LM_COMMAND";

const SUMMARY_FILE: &str = "notebook_summary.yaml";
const AGGREGATED_FILE: &str = "aggregated_results.json";
const MANUSCRIPT_FILE: &str = "manuscript.md";
const FIGURE_REVIEW_FILE: &str = "figure_review.json";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub notebooks: Vec<PathBuf>,
    pub output: OutputConfig,
    pub execution: ExecutionConfig,
    pub logging: LoggingConfig,
    pub manuscript: ManuscriptConfig,
    pub review: ReviewConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub results_dir: PathBuf,
    /// Defaults to `<results_dir>/aggregated_results.json`.
    pub aggregated_path: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            aggregated_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Engine command; `{input}` is the source notebook, `{timeout}` the limit in seconds.
    pub command: String,
    pub timeout_seconds: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_EXECUTE_COMMAND.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl ExecutionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Log to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ManuscriptConfig {
    pub lm_command: Option<String>,
    /// Defaults to `<results_dir>/manuscript.md`.
    pub output: Option<PathBuf>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReviewConfig {
    /// Falls back to the manuscript LM command.
    pub lm_command: Option<String>,
    /// Defaults to `<results_dir>/figure_review.json`.
    pub output: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn results_dir(&self) -> &Path {
        &self.output.results_dir
    }

    pub fn notebooks_dir(&self) -> PathBuf {
        self.results_dir().join("notebooks")
    }

    pub fn summary_path(&self) -> PathBuf {
        self.results_dir().join(SUMMARY_FILE)
    }

    pub fn aggregated_path(&self) -> PathBuf {
        self.output
            .aggregated_path
            .clone()
            .unwrap_or_else(|| self.results_dir().join(AGGREGATED_FILE))
    }

    pub fn manuscript_path(&self) -> PathBuf {
        self.manuscript
            .output
            .clone()
            .unwrap_or_else(|| self.results_dir().join(MANUSCRIPT_FILE))
    }

    pub fn figure_review_path(&self) -> PathBuf {
        self.review
            .output
            .clone()
            .unwrap_or_else(|| self.results_dir().join(FIGURE_REVIEW_FILE))
    }

    /// Resolve the review command: explicit override, then `review.lm_command`,
    /// then the manuscript LM command.
    pub fn resolve_review_command(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .map(str::to_string)
            .or_else(|| self.review.lm_command.clone())
            .filter(|command| !command.trim().is_empty())
            .or_else(|| self.resolve_lm_command(None))
    }

    /// Resolve the LM command: explicit override, then config, then environment.
    pub fn resolve_lm_command(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .map(str::to_string)
            .or_else(|| self.manuscript.lm_command.clone())
            .or_else(|| std::env::var(LM_COMMAND_ENV).ok())
            .filter(|command| !command.trim().is_empty())
    }
}

/// Default summary path used by the standalone aggregation command.
pub fn default_summary_path() -> PathBuf {
    Path::new(DEFAULT_RESULTS_DIR).join(SUMMARY_FILE)
}

/// Default aggregate path used by the standalone aggregation command.
pub fn default_aggregated_path() -> PathBuf {
    Path::new(DEFAULT_RESULTS_DIR).join(AGGREGATED_FILE)
}

/// Load the pipeline config, falling back to defaults when the file is absent.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    if !path.is_file() {
        return Ok(PipelineConfig::default());
    }
    let text = fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let config = parse_config(&text).map_err(|err| PipelineError::malformed(path, err))?;
    validate_config(&config).with_context(|| format!("validate config {}", path.display()))?;
    Ok(config)
}

fn parse_config(text: &str) -> Result<PipelineConfig, serde_yaml::Error> {
    // An empty document carries no keys; every default applies.
    if text.trim().is_empty() {
        return Ok(PipelineConfig::default());
    }
    let value: serde_yaml::Value = serde_yaml::from_str(text)?;
    if value.is_null() {
        return Ok(PipelineConfig::default());
    }
    serde_yaml::from_value(value)
}

pub fn validate_config(config: &PipelineConfig) -> Result<()> {
    let command = config.execution.command.trim();
    if command.is_empty() {
        return Err(anyhow!("execution.command must be non-empty"));
    }
    shell_words::split(command).with_context(|| format!("parse execution.command: {command}"))?;
    if !command.contains("{input}") {
        return Err(anyhow!(
            "execution.command must reference the notebook via {{input}} (got {command:?})"
        ));
    }
    if config.execution.timeout_seconds == 0 {
        return Err(anyhow!("execution.timeout_seconds must be > 0"));
    }
    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(anyhow!(
            "logging.level must be one of {} (got {:?})",
            LOG_LEVELS.join(", "),
            config.logging.level
        ));
    }
    Ok(())
}
