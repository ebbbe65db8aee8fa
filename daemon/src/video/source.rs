//! Decoder abstraction used by the capture thread
//!
//! The capture loop only needs five things from a decoder: stream metadata,
//! a cheap way to advance past a frame, a full decode, a rewind, and a way
//! to reopen the stream from scratch.

use super::frame::Frame;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Frame rate assumed when the container reports nothing usable
pub const DEFAULT_NATIVE_FPS: f64 = 30.0;

/// Anything above this is treated as a bogus container value
pub const MAX_PLAUSIBLE_FPS: f64 = 120.0;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to open video {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("End of stream")]
    EndOfStream,

    #[error("Failed to decode frame: {0}")]
    DecodeFailed(String),

    #[error("Decoder backend error: {0}")]
    Backend(String),
}

impl DecodeError {
    /// Errors that are answered by rewinding to the first frame
    pub fn restarts_loop(&self) -> bool {
        matches!(self, DecodeError::EndOfStream | DecodeError::DecodeFailed(_))
    }
}

/// Stream metadata probed when the decoder is opened
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    /// Validated native frame rate
    pub native_fps: f64,
    /// Number of frames in one pass (0 when unknown)
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
}

impl StreamInfo {
    pub fn duration(&self) -> Duration {
        if self.native_fps <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count as f64 / self.native_fps)
    }
}

/// Replace a missing or implausible frame rate with [`DEFAULT_NATIVE_FPS`]
pub fn validate_native_fps(reported: f64) -> f64 {
    if !reported.is_finite() || reported <= 0.0 || reported > MAX_PLAUSIBLE_FPS {
        log::warn!(
            "Video reports implausible frame rate {:.2}, assuming {} fps",
            reported,
            DEFAULT_NATIVE_FPS
        );
        DEFAULT_NATIVE_FPS
    } else {
        reported
    }
}

/// A seekable source of decoded frames
///
/// Owned exclusively by the capture thread once playback starts.
pub trait VideoSource: Send {
    fn info(&self) -> StreamInfo;

    /// Advance one frame without producing pixel data.
    ///
    /// Returns false if no frame could be advanced (typically end of stream).
    fn grab(&mut self) -> bool;

    /// Decode the next frame into pixel data
    fn decode_next(&mut self) -> Result<Frame, DecodeError>;

    /// Seek back to the first frame
    fn seek_to_start(&mut self) -> Result<(), DecodeError>;

    /// Tear down and reopen the underlying decoder, returning false on failure
    fn reinitialize(&mut self) -> bool;
}
