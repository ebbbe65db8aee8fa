//! A loaded video: decoder, capture thread, and frame queue
//!
//! Dropping the manager stops the capture thread and releases the decoder.

use super::capture::{CaptureCounters, CaptureWorker};
use super::frame::Frame;
use super::queue::FrameQueue;
use super::source::{StreamInfo, VideoSource};
use crate::config::CaptureSettings;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub struct VideoManager {
    path: PathBuf,
    worker: CaptureWorker,
}

impl VideoManager {
    /// Start decoding an opened source in the background
    pub fn start(
        path: impl AsRef<Path>,
        source: Box<dyn VideoSource>,
        queue_size: usize,
        target_fps: u32,
        settings: CaptureSettings,
    ) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading video: {}", path.display());

        let queue = Arc::new(FrameQueue::new(queue_size));
        let mut worker = CaptureWorker::new(source, queue, target_fps, settings);
        worker.start()?;

        Ok(Self {
            path: path.to_path_buf(),
            worker,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> StreamInfo {
        self.worker.stream_info()
    }

    /// Next decoded frame, waiting up to `timeout`
    pub fn next_frame(&self, timeout: Duration) -> Option<Frame> {
        self.worker.queue().pop_timeout(timeout)
    }

    pub fn pause(&self) {
        self.worker.pause();
    }

    pub fn resume(&self) -> usize {
        self.worker.resume()
    }

    pub fn restart_from_beginning(&self) {
        self.worker.request_restart();
    }

    pub fn update_fps(&self, target_fps: u32) {
        self.worker.update_fps(target_fps);
    }

    pub fn skip_ratio(&self) -> u32 {
        self.worker.skip_ratio()
    }

    /// True when the capture thread stopped on its own
    pub fn is_halted(&self) -> bool {
        self.worker.is_stopped()
    }

    pub fn counters(&self) -> CaptureCounters {
        self.worker.counters()
    }
}

impl Drop for VideoManager {
    fn drop(&mut self) {
        log::info!("Unloading video: {}", self.path.display());
        if !self.worker.stop() {
            log::warn!("Capture thread for {} was detached", self.path.display());
        }
    }
}
