use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Whether a sync waits for its workers before returning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Block until every dispatched worker has finished.
    #[default]
    Wait,
    /// Return once every episode has been admitted to the pool. Workers
    /// still running are abandoned if the process exits.
    Detach,
}

/// Runtime settings, read from an optional YAML file and then overridden by
/// command-line flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    /// Parent directory for per-show output directories.
    pub output_dir: PathBuf,
    pub head_skip_secs: u64,
    pub tail_skip_secs: u64,
    pub max_workers: usize,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub download_attempts: u32,
    pub dispatch: DispatchMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("podcasts.db"),
            output_dir: PathBuf::from("."),
            head_skip_secs: 0,
            tail_skip_secs: 0,
            max_workers: 10,
            connect_timeout_secs: 30,
            request_timeout_secs: 600,
            download_attempts: 3,
            dispatch: DispatchMode::Wait,
        }
    }
}

impl Config {
    /// Load from `path` if given (it must exist), else from the default
    /// location if a file is there, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path().filter(|p| p.exists()),
        };

        let config = match path {
            Some(p) => {
                log::info!("Loading config from {}", p.display());
                let content = std::fs::read_to_string(&p).map_err(|e| {
                    AppError::Config(format!("Failed to read {}: {}", p.display(), e))
                })?;
                Self::from_yaml(&content)?
            }
            None => Self::default(),
        };

        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, AppError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_workers == 0 {
            return Err(AppError::Config("max_workers must be at least 1".to_string()));
        }
        if self.download_attempts == 0 {
            return Err(AppError::Config(
                "download_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn head_skip(&self) -> Duration {
        Duration::from_secs(self.head_skip_secs)
    }

    pub fn tail_skip(&self) -> Duration {
        Duration::from_secs(self.tail_skip_secs)
    }
}

/// `<config dir>/podtrim/config.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("podtrim").join("config.yaml"))
}
