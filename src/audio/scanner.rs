//! Frame walker over an in-memory MPEG audio buffer.
//!
//! Demuxing is done by symphonia's MPEG audio reader. Every packet it yields
//! is one complete frame, header included, so packet bytes can be written to
//! an output file unchanged. Leading ID3v2 tags are consumed during format
//! detection and junk between frames is skipped by the reader's resync. A
//! final frame cut short by the end of the buffer is reported as malformed.

use std::io::{Cursor, ErrorKind};
use std::sync::Arc;

use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;

use super::DecodeError;

const ID3V1_LEN: usize = 128;

/// One frame exactly as stored in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub bytes: Box<[u8]>,
    pub duration_micros: u64,
}

/// Iterator over the frames of one buffer. Each scanner owns its own reader,
/// so a buffer can be walked any number of times.
pub struct FrameScanner {
    reader: Box<dyn FormatReader>,
    track_id: u32,
    time_base: TimeBase,
    source: Arc<[u8]>,
    /// End of the last yielded frame within `source`.
    consumed: usize,
    frames: usize,
    done: bool,
}

impl FrameScanner {
    pub fn new(source: Arc<[u8]>) -> Result<Self, DecodeError> {
        let mss = MediaSourceStream::new(
            Box::new(Cursor::new(source.clone())),
            MediaSourceStreamOptions::default(),
        );

        let mut hint = Hint::new();
        hint.with_extension("mp3");

        // Gapless trimming stays off so packet durations are whole frames
        let detected = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| DecodeError::NotAudio(e.to_string()))?;
        let reader = detected.format;

        let (track_id, time_base) = {
            let track = reader
                .default_track()
                .ok_or_else(|| DecodeError::NotAudio("no audio track".to_string()))?;
            let params = &track.codec_params;
            let time_base = params
                .time_base
                .or_else(|| params.sample_rate.map(|rate| TimeBase::new(1, rate)))
                .ok_or_else(|| DecodeError::NotAudio("track has no time base".to_string()))?;
            (track.id, time_base)
        };

        Ok(Self {
            reader,
            track_id,
            time_base,
            source,
            consumed: 0,
            frames: 0,
            done: false,
        })
    }

    /// Frames yielded so far.
    pub fn frames_read(&self) -> usize {
        self.frames
    }

    /// Pair each frame with the cumulative duration at its end.
    pub fn with_running_duration(
        self,
    ) -> impl Iterator<Item = Result<(u64, Frame), DecodeError>> {
        self.scan(0u64, |elapsed, item| {
            Some(item.map(|frame| {
                *elapsed += frame.duration_micros;
                (*elapsed, frame)
            }))
        })
    }

    // Frames are verbatim source bytes, normally back to back. A gap means
    // the reader skipped a tag, an Info frame or junk.
    fn advance_past(&mut self, frame: &[u8]) {
        if frame.is_empty() {
            return;
        }
        let rest = &self.source[self.consumed..];
        let at = if rest.starts_with(frame) {
            Some(0)
        } else {
            rest.windows(frame.len()).position(|w| w == frame)
        };
        if let Some(at) = at {
            self.consumed += at + frame.len();
        }
    }

    /// Bytes after the last frame that start another frame the buffer
    /// cannot hold. A trailing ID3v1 tag is not counted.
    fn cut_short_tail(&self) -> Option<usize> {
        let mut rest = &self.source[self.consumed..];
        if rest.len() >= ID3V1_LEN && rest[rest.len() - ID3V1_LEN..].starts_with(b"TAG") {
            rest = &rest[..rest.len() - ID3V1_LEN];
        }
        let starts_frame = rest.len() >= 2 && rest[0] == 0xFF && rest[1] & 0xE0 == 0xE0;
        starts_frame.then_some(rest.len())
    }

    fn to_micros(&self, ticks: u64) -> u64 {
        let micros = u128::from(ticks) * u128::from(self.time_base.numer) * 1_000_000
            / u128::from(self.time_base.denom.max(1));
        u64::try_from(micros).unwrap_or(u64::MAX)
    }
}

impl Iterator for FrameScanner {
    type Item = Result<Frame, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            match self.reader.next_packet() {
                Ok(packet) if packet.track_id() != self.track_id => continue,
                Ok(packet) => {
                    self.frames += 1;
                    self.advance_past(&packet.data);
                    let duration_micros = self.to_micros(packet.dur);
                    return Some(Ok(Frame {
                        bytes: packet.data,
                        duration_micros,
                    }));
                }
                // The reader reports a final frame cut short as a plain end
                // of stream
                Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                    self.done = true;
                    return self.cut_short_tail().map(|remaining| {
                        Err(DecodeError::Malformed {
                            frames: self.frames,
                            reason: format!(
                                "final frame cut short with {} bytes left in the buffer",
                                remaining
                            ),
                        })
                    });
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(DecodeError::Malformed {
                        frames: self.frames,
                        reason: e.to_string(),
                    }));
                }
            }
        }
    }
}

/// Walk the frames of `buf`. Fails when no MPEG audio stream is found.
pub fn scan(buf: &[u8]) -> Result<FrameScanner, DecodeError> {
    FrameScanner::new(Arc::from(buf))
}

/// Sum of all frame durations in microseconds.
pub fn total_duration(buf: &[u8]) -> Result<u64, DecodeError> {
    sum_durations(scan(buf)?)
}

pub(crate) fn sum_durations(frames: FrameScanner) -> Result<u64, DecodeError> {
    frames.fold(Ok(0u64), |total, frame| {
        Ok(total? + frame?.duration_micros)
    })
}
