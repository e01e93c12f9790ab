use thiserror::Error;

use crate::audio::DecodeError;

/// Typed application error hierarchy for the sync pipeline.
///
/// Feed-level `Fetch`/`Parse` errors abort a run; everything else is scoped
/// to the episode being processed and leaves it unprocessed for the next run.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Feed parse failed: {0}")]
    Parse(String),

    #[error("Decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("{0}")]
    Database(String),

    #[error("Consistency fault: {0}")]
    Consistency(String),

    #[error("{0}")]
    Io(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

/// Serialize as a plain string so JSON reports carry the display message.
impl serde::Serialize for AppError {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

// ── From impls ─────────────────────────────────────────────────────────────

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Database(e.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(e: serde_yaml::Error) -> Self {
        AppError::Config(e.to_string())
    }
}
