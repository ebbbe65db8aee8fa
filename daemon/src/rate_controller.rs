//! CPU-driven frame rate control
//!
//! Samples this process's CPU usage every few seconds, keeps a short moving
//! average, and steps the target frame rate down under load and back up
//! towards the user's baseline when the load eases.

use crate::config::PerformanceSettings;
use crate::video::stats::FrameStats;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use sysinfo::{ProcessesToUpdate, System};

/// Source of CPU usage samples
pub trait CpuSampler: Send {
    /// CPU usage of this process in percent since the previous sample
    fn sample(&mut self) -> f32;
}

/// Samples the daemon's own process via sysinfo
pub struct ProcessCpuSampler {
    /// System information tracker
    system: System,
    /// Our process PID
    pid: sysinfo::Pid,
}

impl ProcessCpuSampler {
    pub fn new() -> Self {
        let pid = sysinfo::Pid::from(std::process::id() as usize);

        // Use System::new() instead of new_all() to avoid loading all processes
        let mut sampler = Self {
            system: System::new(),
            pid,
        };
        // CPU usage is a delta, the first refresh only establishes the baseline
        sampler.refresh();
        sampler
    }

    fn refresh(&mut self) {
        // Refresh ONLY our process stats; refresh_all() opens /proc/*/stat for every process
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), false);
    }
}

impl Default for ProcessCpuSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuSampler for ProcessCpuSampler {
    fn sample(&mut self) -> f32 {
        self.refresh();

        let Some(process) = self.system.process(self.pid) else {
            return 0.0;
        };

        log::trace!(
            "Process stats: mem={}MB cpu={:.1}%",
            process.memory() / 1024 / 1024,
            process.cpu_usage()
        );
        process.cpu_usage()
    }
}

/// Performance counters for reporting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateStats {
    pub target_fps: u32,
    pub total_frames: u64,
    pub dropped_frames: u64,
    pub drop_rate: f64,
    pub cpu_avg: f32,
}

pub struct RateController {
    sampler: Box<dyn CpuSampler>,
    settings: PerformanceSettings,
    dynamic_enabled: bool,
    target_fps: u32,
    /// User-chosen rate the controller climbs back to
    baseline_fps: u32,
    min_fps: u32,
    max_fps: u32,
    cpu_history: VecDeque<f32>,
    last_check: Instant,
    last_change: Instant,
    stats: FrameStats,
}

impl RateController {
    /// Create a controller bounded by `[settings.min_fps, max_fps]`
    pub fn new(
        initial_fps: u32,
        max_fps: u32,
        settings: PerformanceSettings,
        sampler: Box<dyn CpuSampler>,
    ) -> Self {
        Self::new_at(initial_fps, max_fps, settings, sampler, Instant::now())
    }

    pub(crate) fn new_at(
        initial_fps: u32,
        max_fps: u32,
        settings: PerformanceSettings,
        sampler: Box<dyn CpuSampler>,
        now: Instant,
    ) -> Self {
        let max_fps = max_fps.max(1);
        let min_fps = settings.min_fps.max(1).min(max_fps);
        let target_fps = initial_fps.clamp(min_fps, max_fps);

        log::info!(
            "Rate controller: {} fps (range {}-{}, dynamic {})",
            target_fps,
            min_fps,
            max_fps,
            if settings.dynamic_fps { "on" } else { "off" }
        );

        Self {
            sampler,
            dynamic_enabled: settings.dynamic_fps,
            cpu_history: VecDeque::with_capacity(settings.cpu_history_size.max(1)),
            settings,
            target_fps,
            baseline_fps: target_fps,
            min_fps,
            max_fps,
            last_check: now,
            last_change: now,
            stats: FrameStats::new(),
        }
    }

    /// Check if a CPU check is due and the cooldown has passed
    pub fn should_adjust(&self) -> bool {
        self.should_adjust_at(Instant::now())
    }

    pub fn should_adjust_at(&self, now: Instant) -> bool {
        self.dynamic_enabled
            && now.saturating_duration_since(self.last_check) >= self.settings.cpu_check_interval()
            && now.saturating_duration_since(self.last_change)
                >= self.settings.fps_change_cooldown()
    }

    /// Sample CPU and possibly step the target rate.
    ///
    /// Returns the current target and whether it changed.
    pub fn adjust_fps(&mut self) -> (u32, bool) {
        self.adjust_fps_at(Instant::now())
    }

    pub fn adjust_fps_at(&mut self, now: Instant) -> (u32, bool) {
        if !self.should_adjust_at(now) {
            return (self.target_fps, false);
        }
        self.last_check = now;

        let sample = self.sampler.sample();
        if self.cpu_history.len() >= self.settings.cpu_history_size.max(1) {
            self.cpu_history.pop_front();
        }
        self.cpu_history.push_back(sample);

        let avg = self.cpu_average();
        let previous = self.target_fps;

        if avg > self.settings.high_cpu_percent && self.target_fps > self.min_fps {
            self.target_fps = self
                .target_fps
                .saturating_sub(self.settings.fps_step)
                .max(self.min_fps);
        } else if avg < self.settings.low_cpu_percent && self.target_fps < self.baseline_fps {
            self.target_fps = (self.target_fps + self.settings.fps_step).min(self.baseline_fps);
        }

        if self.target_fps != previous {
            self.last_change = now;
            log::info!(
                "CPU average {:.1}%: target frame rate {} -> {} fps",
                avg,
                previous,
                self.target_fps
            );
            return (self.target_fps, true);
        }

        log::trace!("CPU average {:.1}%, keeping {} fps", avg, self.target_fps);
        (self.target_fps, false)
    }

    /// Count one presented tick; `dropped` when no new frame was available
    pub fn record_frame(&mut self, dropped: bool) {
        self.stats.record(dropped);
    }

    /// Set a new user baseline (clamped to the bounds)
    pub fn set_target_fps(&mut self, fps: u32) {
        let fps = fps.clamp(self.min_fps, self.max_fps);
        if fps != self.target_fps || fps != self.baseline_fps {
            log::info!("Target frame rate set to {} fps", fps);
        }
        self.target_fps = fps;
        self.baseline_fps = fps;
    }

    /// Change the upper bound, e.g. when a video with a different native rate loads
    pub fn set_max_fps(&mut self, max_fps: u32) {
        self.max_fps = max_fps.max(1);
        self.min_fps = self.settings.min_fps.max(1).min(self.max_fps);
        self.target_fps = self.target_fps.clamp(self.min_fps, self.max_fps);
        self.baseline_fps = self.baseline_fps.clamp(self.min_fps, self.max_fps);
    }

    pub fn enable_dynamic_fps(&mut self, enabled: bool) {
        if self.dynamic_enabled == enabled {
            return;
        }
        self.dynamic_enabled = enabled;
        log::info!("Dynamic frame rate {}", if enabled { "enabled" } else { "disabled" });

        if !enabled && self.target_fps != self.baseline_fps {
            log::info!("Restoring baseline {} fps", self.baseline_fps);
            self.target_fps = self.baseline_fps;
        }
    }

    pub fn target_fps(&self) -> u32 {
        self.target_fps
    }

    fn cpu_average(&self) -> f32 {
        if self.cpu_history.is_empty() {
            0.0
        } else {
            self.cpu_history.iter().sum::<f32>() / self.cpu_history.len() as f32
        }
    }

    pub fn stats(&self) -> RateStats {
        RateStats {
            target_fps: self.target_fps,
            total_frames: self.stats.total_frames(),
            dropped_frames: self.stats.dropped_frames(),
            drop_rate: self.stats.drop_rate(),
            cpu_avg: self.cpu_average(),
        }
    }

    pub fn maybe_log_stats(&mut self, interval: Duration) {
        let cpu_avg = self.cpu_average();
        self.stats.maybe_log_stats(interval, self.target_fps, cpu_avg);
    }
}
