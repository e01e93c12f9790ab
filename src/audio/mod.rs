//! MPEG audio frame scanning and frame-accurate trimming.
//!
//! Everything here works on an in-memory buffer holding one whole episode.
//! Frames are never split or re-encoded: a trimmed file is a concatenation of
//! complete frames copied from the source.

pub mod scanner;
pub mod trim;

#[cfg(test)]
pub(crate) mod test_support;

use thiserror::Error;

pub use scanner::{scan, total_duration, Frame, FrameScanner};
pub use trim::{trim, TrimStats};

/// Audio that cannot be walked frame by frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("no MPEG audio stream found: {0}")]
    NotAudio(String),

    #[error("malformed audio after {frames} frames: {reason}")]
    Malformed { frames: usize, reason: String },
}
