//! Configuration management for pipemgr.
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::constants::{
    DEFAULT_BUILD_COMMAND, PIPELINE_PORT, SETTLE_DELAY, STARTUP_TIMEOUT,
    TRIGGER_TIMEOUT,
};
use crate::error::RunnerError;

/// Default configuration file consulted when no path is given.
const DEFAULT_CONFIG_FILE: &str = "pipemgr.yaml";

/// Runner configuration.
///
/// Every field has a default, so a config file is optional; the file only
/// overrides the knobs it names.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// Port injected into pipeline jobs and targeted by the trigger client.
    pub port: u16,
    /// Seconds to wait for a job to emit its readiness marker.
    pub startup_timeout_secs: u64,
    /// Seconds allowed for a single trigger request.
    pub trigger_timeout_secs: u64,
    /// Milliseconds to let a freshly started job settle before a composite
    /// run triggers it.
    pub settle_delay_ms: u64,
    /// Root directory from which jobs are launched and the build descriptor
    /// is resolved.
    pub project_dir: Option<String>,
    /// Build-style command invoked with the derived job target.
    pub build_command: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            port: PIPELINE_PORT,
            startup_timeout_secs: STARTUP_TIMEOUT.as_secs(),
            trigger_timeout_secs: TRIGGER_TIMEOUT.as_secs(),
            settle_delay_ms: SETTLE_DELAY.as_millis() as u64,
            project_dir: None,
            build_command: DEFAULT_BUILD_COMMAND.to_string(),
        }
    }
}

impl RunnerConfig {
    /// Root directory jobs are launched from.
    pub fn project_root(&self) -> PathBuf {
        self.project_dir
            .as_deref()
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Readiness deadline as a [`Duration`].
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    /// Trigger request bound as a [`Duration`].
    pub fn trigger_timeout(&self) -> Duration {
        Duration::from_secs(self.trigger_timeout_secs)
    }

    /// Composite-run stabilization delay as a [`Duration`].
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Loads the runner configuration.
///
/// An explicit path must exist and parse; the implicit default file is
/// optional and its absence yields the built-in defaults.
pub fn load_config(config_path: Option<&str>) -> Result<RunnerConfig, RunnerError> {
    let (path, required) = match config_path {
        Some(path) => (Path::new(path).to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };

    if !path.exists() {
        if required {
            return Err(RunnerError::ConfigReadError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )));
        }
        return Ok(RunnerConfig::default());
    }

    let content = std::fs::read_to_string(&path).map_err(|e| {
        RunnerError::ConfigReadError(std::io::Error::new(
            e.kind(),
            format!("{} ({})", e, path.display()),
        ))
    })?;

    let config: RunnerConfig =
        serde_yaml::from_str(&content).map_err(RunnerError::ConfigParseError)?;
    Ok(config)
}
