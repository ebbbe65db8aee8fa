//! Video decoding for the looping wallpaper
//!
//! - `source`: decoder abstraction and stream metadata
//! - `gst_source`: GStreamer implementation of the decoder
//! - `capture`: background thread that decodes into the frame queue
//! - `queue`: bounded frame queue between capture and playback
//! - `frame`: decoded frames and conversion for display
//! - `stats`: presentation statistics
//! - `manager`: a loaded video (decoder + capture thread + queue)
//!
//! # Architecture
//!
//! 1. The capture thread owns the decoder and decodes every `skip_ratio`-th
//!    frame, grabbing the rest without copying pixels
//! 2. Decoded BGRA frames go through a bounded queue
//! 3. The playback loop pops one frame per tick, converts it to the surface
//!    size and colour order, and presents it
//! 4. When the queue runs dry the last frame is presented again

pub mod capture;
pub mod frame;
#[cfg(feature = "video")]
pub mod gst_source;
pub mod manager;
pub mod queue;
pub mod source;
pub mod stats;

pub use frame::{Frame, FrameConverter, PixelFormat};
pub use manager::VideoManager;
pub use source::{DecodeError, StreamInfo, VideoSource};

use std::path::Path;

/// Open a video file with the compiled-in decoder
#[cfg(feature = "video")]
pub fn open_source(path: &Path) -> Result<Box<dyn VideoSource>, DecodeError> {
    Ok(Box::new(gst_source::GstVideoSource::open(path)?))
}

/// Stub when video feature is disabled
#[cfg(not(feature = "video"))]
pub fn open_source(path: &Path) -> Result<Box<dyn VideoSource>, DecodeError> {
    Err(DecodeError::OpenFailed {
        path: path.to_path_buf(),
        reason: "Video support not compiled in".to_string(),
    })
}
