//! Planner configuration stored under `.planner/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default config location relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = ".planner/config.toml";

/// Planner configuration (TOML).
///
/// Missing fields default to values that work against a local Ollama install.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlannerConfig {
    /// Directory holding mission checkpoints and the idea list.
    pub data_dir: PathBuf,

    /// Simulated latency of the placeholder step executor, in milliseconds.
    pub step_delay_ms: u64,

    pub reasoner: ReasonerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReasonerConfig {
    /// Command that reads a prompt on stdin and answers on stdout.
    pub command: Vec<String>,

    /// Extra arguments appended when a JSON answer is requested.
    pub structured_args: Vec<String>,

    /// Upper bound for a single reasoning call, in seconds.
    pub timeout_secs: u64,

    /// Truncate reasoning output beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "ollama".to_string(),
                "run".to_string(),
                "llama3.2:1b".to_string(),
            ],
            structured_args: vec!["--format".to_string(), "json".to_string()],
            timeout_secs: 120,
            output_limit_bytes: 200_000,
        }
    }
}

impl ReasonerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".planner/data"),
            step_delay_ms: 1500,
            reasoner: ReasonerConfig::default(),
        }
    }
}

impl PlannerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(anyhow!("data_dir must not be empty"));
        }
        if self.reasoner.command.is_empty() || self.reasoner.command[0].trim().is_empty() {
            return Err(anyhow!("reasoner.command must be a non-empty array"));
        }
        if self.reasoner.timeout_secs == 0 {
            return Err(anyhow!("reasoner.timeout_secs must be > 0"));
        }
        if self.reasoner.output_limit_bytes == 0 {
            return Err(anyhow!("reasoner.output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn missions_dir(&self) -> PathBuf {
        self.data_dir.join("missions")
    }

    pub fn ideas_path(&self) -> PathBuf {
        self.data_dir.join("ideas.json")
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PlannerConfig::default()`.
pub fn load_config(path: &Path) -> Result<PlannerConfig> {
    if !path.exists() {
        let cfg = PlannerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PlannerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PlannerConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}
