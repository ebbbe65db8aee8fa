//! Frame presentation statistics
//!
//! Tracks how many frames the playback loop presented and how many ticks
//! had to re-present the previous frame because the queue was empty.

use std::time::{Duration, Instant};

/// Tracks playback statistics
#[derive(Debug)]
pub struct FrameStats {
    /// Ticks that presented something (new or repeated frame)
    total_frames: u64,

    /// Ticks that had no new frame
    dropped_frames: u64,

    /// Last time stats were logged
    last_stats_log: Instant,
}

impl FrameStats {
    pub fn new() -> Self {
        Self {
            total_frames: 0,
            dropped_frames: 0,
            last_stats_log: Instant::now(),
        }
    }

    pub fn record(&mut self, dropped: bool) {
        self.total_frames += 1;
        if dropped {
            self.dropped_frames += 1;
        }
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Get current drop rate as percentage
    pub fn drop_rate(&self) -> f64 {
        if self.total_frames == 0 {
            0.0
        } else {
            (self.dropped_frames as f64 / self.total_frames as f64) * 100.0
        }
    }

    /// Log statistics if interval has elapsed
    pub fn maybe_log_stats(&mut self, interval: Duration, target_fps: u32, cpu_avg: f32) {
        if self.last_stats_log.elapsed() < interval {
            return;
        }

        log::info!(
            "Playback stats ({} fps target): {} frames, {} dropped ({:.1}% drop rate), CPU {:.1}%",
            target_fps,
            self.total_frames,
            self.dropped_frames,
            self.drop_rate(),
            cpu_avg
        );

        self.last_stats_log = Instant::now();
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_rate() {
        let mut stats = FrameStats::new();
        assert_eq!(stats.drop_rate(), 0.0);

        for i in 0..10 {
            stats.record(i % 5 == 0);
        }
        assert_eq!(stats.total_frames(), 10);
        assert_eq!(stats.dropped_frames(), 2);
        assert!((stats.drop_rate() - 20.0).abs() < f64::EPSILON);
    }
}
