//! Global configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{FlowError, Result};

fn default_state_file() -> String {
    ".procflow.state".into()
}

fn default_report_file() -> String {
    ".procflow.report".into()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Global configuration parsed from `config.toml`.
///
/// Every path is resolved relative to `work_dir`, so multiple independent
/// engines can coexist with distinct checkpoint files by pointing their
/// configurations at distinct directories.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FlowConfig {
    /// Directory holding the state, command, and report files.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Checkpoint record file name.
    #[serde(default = "default_state_file")]
    pub state_file: String,
    /// Control-command channel file name; derived from `state_file`
    /// when not set.
    #[serde(default)]
    pub command_file: Option<String>,
    /// Run report file name.
    #[serde(default = "default_report_file")]
    pub report_file: String,
    /// Control-channel polling interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            state_file: default_state_file(),
            command_file: None,
            report_file: default_report_file(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl FlowConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Config`] if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| FlowError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Config`] if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Construct a configuration rooted at the given directory with all
    /// other fields at their defaults. Used by tests to isolate engines.
    #[must_use]
    pub fn rooted_at(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            ..Self::default()
        }
    }

    /// Absolute or relative path to the checkpoint record file.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.work_dir.join(&self.state_file)
    }

    /// Path to the control-command channel file.
    ///
    /// Kept physically separate from the checkpoint file so the controller
    /// and the runner never race on the same bytes.
    #[must_use]
    pub fn command_path(&self) -> PathBuf {
        match &self.command_file {
            Some(name) => self.work_dir.join(name),
            None => self.work_dir.join(format!("{}.cmd", self.state_file)),
        }
    }

    /// Path to the run report file.
    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.work_dir.join(&self.report_file)
    }

    /// Control-channel polling interval.
    #[must_use]
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(FlowError::Config(
                "poll_interval_ms must be greater than zero".into(),
            ));
        }

        if self.state_file.is_empty() {
            return Err(FlowError::Config("state_file must not be empty".into()));
        }

        if self.report_file.is_empty() {
            return Err(FlowError::Config("report_file must not be empty".into()));
        }

        Ok(())
    }
}
