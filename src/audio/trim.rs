use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::scanner::{sum_durations, FrameScanner};
use crate::error::AppError;

/// Summary of one trim run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrimStats {
    pub passthrough: bool,
    pub source_micros: u64,
    pub frames_kept: usize,
    pub kept_micros: u64,
    pub bytes_written: u64,
}

/// Copy the frames of `buffer` that lie strictly between `head_skip` from the
/// start and `tail_skip` from the end into `out`.
///
/// A frame is kept when the cumulative duration at its end is past the head
/// cutoff and before the tail cutoff. With both skips zero the buffer is
/// copied verbatim, tags included. Overlapping skips give an empty output.
///
/// Output is written frame by frame. On error, whatever was already written
/// stays in `out`.
pub fn trim<W: Write>(
    buffer: &[u8],
    head_skip: Duration,
    tail_skip: Duration,
    out: &mut W,
) -> Result<TrimStats, AppError> {
    if head_skip.is_zero() && tail_skip.is_zero() {
        out.write_all(buffer)?;
        return Ok(TrimStats {
            passthrough: true,
            bytes_written: buffer.len() as u64,
            ..TrimStats::default()
        });
    }

    // Both passes read the same shared copy
    let source: Arc<[u8]> = Arc::from(buffer);

    let head = as_micros(head_skip);
    let total = sum_durations(FrameScanner::new(source.clone())?)?;
    let tail_cutoff = total.saturating_sub(as_micros(tail_skip));

    let mut stats = TrimStats {
        source_micros: total,
        ..TrimStats::default()
    };

    let kept = FrameScanner::new(source)?
        .with_running_duration()
        .filter(|item| match item {
            Ok((end, _)) => *end > head && *end < tail_cutoff,
            Err(_) => true,
        });

    for item in kept {
        let (_, frame) = item?;
        out.write_all(&frame.bytes)?;
        stats.frames_kept += 1;
        stats.kept_micros += frame.duration_micros;
        stats.bytes_written += frame.bytes.len() as u64;
    }

    Ok(stats)
}

fn as_micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}
