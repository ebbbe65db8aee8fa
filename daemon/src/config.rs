use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::validate_enum;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralSettings,

    #[serde(default)]
    pub playback: PlaybackSettings,

    #[serde(default)]
    pub capture: CaptureSettings,

    #[serde(default)]
    pub performance: PerformanceSettings,

    #[serde(default)]
    pub audio: AudioSettings,
}

/// General daemon settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Video to loop on startup (`~` and `$VARS` are expanded)
    #[serde(default)]
    pub video_path: Option<String>,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            video_path: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Playback loop and render surface settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaybackSettings {
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,

    /// How long a tick waits for a decoded frame before re-presenting the last one
    #[serde(default = "default_frame_timeout_ms")]
    pub frame_timeout_ms: u64,

    /// Inactivity before decoding is paused
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Inactivity before the overlay is hidden
    #[serde(default = "default_overlay_autohide_secs")]
    pub overlay_autohide_secs: u64,

    #[serde(default = "default_settings_poll_ms")]
    pub settings_poll_ms: u64,

    #[serde(default = "default_stats_log_secs")]
    pub stats_log_secs: u64,

    #[serde(default = "default_surface_width")]
    pub surface_width: u32,

    #[serde(default = "default_surface_height")]
    pub surface_height: u32,

    /// Pixel order expected by the surface consumer ("bgra" or "rgba")
    #[serde(default = "default_surface_format")]
    pub surface_format: String,

    /// Framebuffer file; defaults to `$XDG_RUNTIME_DIR/loopwall.fb`
    #[serde(default)]
    pub surface_path: Option<String>,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
            frame_timeout_ms: default_frame_timeout_ms(),
            idle_timeout_secs: default_idle_timeout_secs(),
            overlay_autohide_secs: default_overlay_autohide_secs(),
            settings_poll_ms: default_settings_poll_ms(),
            stats_log_secs: default_stats_log_secs(),
            surface_width: default_surface_width(),
            surface_height: default_surface_height(),
            surface_format: default_surface_format(),
            surface_path: None,
        }
    }
}

impl PlaybackSettings {
    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn overlay_autohide(&self) -> Duration {
        Duration::from_secs(self.overlay_autohide_secs)
    }

    pub fn settings_poll_interval(&self) -> Duration {
        Duration::from_millis(self.settings_poll_ms)
    }

    pub fn stats_log_interval(&self) -> Duration {
        Duration::from_secs(self.stats_log_secs)
    }

    pub fn surface_path(&self) -> PathBuf {
        match &self.surface_path {
            Some(path) => PathBuf::from(shellexpand::tilde(path).as_ref()),
            None => common::runtime_dir().join("loopwall.fb"),
        }
    }
}

fn default_queue_size() -> usize {
    60
}
fn default_frame_timeout_ms() -> u64 {
    1000
}
fn default_idle_timeout_secs() -> u64 {
    60
}
fn default_overlay_autohide_secs() -> u64 {
    10
}
fn default_settings_poll_ms() -> u64 {
    500
}
fn default_stats_log_secs() -> u64 {
    5
}
fn default_surface_width() -> u32 {
    1920
}
fn default_surface_height() -> u32 {
    1080
}
fn default_surface_format() -> String {
    "bgra".to_string()
}

/// Capture thread tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureSettings {
    /// How long a decoded frame may wait for queue space before it is dropped
    #[serde(default = "default_put_timeout_ms")]
    pub put_timeout_ms: u64,

    /// How long resume waits for the queue to refill halfway
    #[serde(default = "default_refill_timeout_ms")]
    pub refill_timeout_ms: u64,

    /// Consecutive grab failures before the decoder is reopened
    #[serde(default = "default_max_grab_failures")]
    pub max_grab_failures: u32,

    /// Rewind after every this many grab failures
    #[serde(default = "default_grab_restart_every")]
    pub grab_restart_every: u32,

    /// Consecutive errors before the capture thread gives up
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,

    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,

    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            put_timeout_ms: default_put_timeout_ms(),
            refill_timeout_ms: default_refill_timeout_ms(),
            max_grab_failures: default_max_grab_failures(),
            grab_restart_every: default_grab_restart_every(),
            max_consecutive_errors: default_max_consecutive_errors(),
            error_backoff_ms: default_error_backoff_ms(),
            join_timeout_ms: default_join_timeout_ms(),
        }
    }
}

impl CaptureSettings {
    pub fn put_timeout(&self) -> Duration {
        Duration::from_millis(self.put_timeout_ms)
    }

    pub fn refill_timeout(&self) -> Duration {
        Duration::from_millis(self.refill_timeout_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

fn default_put_timeout_ms() -> u64 {
    100
}
fn default_refill_timeout_ms() -> u64 {
    1000
}
fn default_max_grab_failures() -> u32 {
    50
}
fn default_grab_restart_every() -> u32 {
    10
}
fn default_max_consecutive_errors() -> u32 {
    10
}
fn default_error_backoff_ms() -> u64 {
    100
}
fn default_join_timeout_ms() -> u64 {
    2000
}

/// Adaptive frame rate settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PerformanceSettings {
    #[serde(default = "default_true")]
    pub dynamic_fps: bool,

    #[serde(default = "default_target_fps")]
    pub target_fps: u32,

    #[serde(default = "default_min_fps")]
    pub min_fps: u32,

    #[serde(default = "default_cpu_check_interval_secs")]
    pub cpu_check_interval_secs: f64,

    #[serde(default = "default_fps_change_cooldown_secs")]
    pub fps_change_cooldown_secs: f64,

    /// Samples in the CPU moving average
    #[serde(default = "default_cpu_history_size")]
    pub cpu_history_size: usize,

    #[serde(default = "default_high_cpu_percent")]
    pub high_cpu_percent: f32,

    #[serde(default = "default_low_cpu_percent")]
    pub low_cpu_percent: f32,

    #[serde(default = "default_fps_step")]
    pub fps_step: u32,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            dynamic_fps: true,
            target_fps: default_target_fps(),
            min_fps: default_min_fps(),
            cpu_check_interval_secs: default_cpu_check_interval_secs(),
            fps_change_cooldown_secs: default_fps_change_cooldown_secs(),
            cpu_history_size: default_cpu_history_size(),
            high_cpu_percent: default_high_cpu_percent(),
            low_cpu_percent: default_low_cpu_percent(),
            fps_step: default_fps_step(),
        }
    }
}

impl PerformanceSettings {
    pub fn cpu_check_interval(&self) -> Duration {
        Duration::from_secs_f64(self.cpu_check_interval_secs.max(0.0))
    }

    pub fn fps_change_cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.fps_change_cooldown_secs.max(0.0))
    }
}

/// Upper bound for the CPU sampling interval and the FPS cooldown
const MAX_INTERVAL_SECS: f64 = 3600.0;

fn default_true() -> bool {
    true
}
fn default_target_fps() -> u32 {
    30
}
fn default_min_fps() -> u32 {
    15
}
fn default_cpu_check_interval_secs() -> f64 {
    2.0
}
fn default_fps_change_cooldown_secs() -> f64 {
    3.0
}
fn default_cpu_history_size() -> usize {
    5
}
fn default_high_cpu_percent() -> f32 {
    80.0
}
fn default_low_cpu_percent() -> f32 {
    30.0
}
fn default_fps_step() -> u32 {
    5
}

/// Audio settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioSettings {
    /// Extract and play the video's audio track
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_volume")]
    pub volume: f32,

    #[serde(default)]
    pub muted: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: default_volume(),
            muted: false,
        }
    }
}

fn default_volume() -> f32 {
    1.0
}

impl Config {
    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!(
                "Config file not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded configuration from {}", path.display());
        config.validate()?;

        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("loopwall");

        Ok(config_dir.join("config.toml"))
    }

    /// Startup video with `~` and environment variables expanded
    pub fn video_path(&self) -> Result<Option<PathBuf>> {
        let Some(raw) = &self.general.video_path else {
            return Ok(None);
        };
        let expanded = shellexpand::full(raw)
            .with_context(|| format!("Failed to expand video path: {}", raw))?;
        Ok(Some(PathBuf::from(expanded.as_ref())))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        validate_enum!(
            self.general.log_level.as_str(),
            "trace",
            "debug",
            "info",
            "warn",
            "error"
        )?;
        validate_enum!(
            self.playback.surface_format.to_lowercase().as_str(),
            "bgra",
            "rgba"
        )?;

        let playback = &self.playback;
        if playback.queue_size == 0 {
            anyhow::bail!("playback.queue_size must be at least 1");
        }
        if playback.surface_width == 0 || playback.surface_height == 0 {
            anyhow::bail!(
                "Invalid surface size: {}x{}",
                playback.surface_width,
                playback.surface_height
            );
        }

        let capture = &self.capture;
        if capture.grab_restart_every == 0 || capture.max_grab_failures == 0 {
            anyhow::bail!("capture grab failure thresholds must be at least 1");
        }
        if capture.max_consecutive_errors == 0 {
            anyhow::bail!("capture.max_consecutive_errors must be at least 1");
        }

        let perf = &self.performance;
        if perf.min_fps < common::MIN_TARGET_FPS || perf.target_fps > common::MAX_TARGET_FPS {
            anyhow::bail!(
                "Frame rates must be within {}-{} fps",
                common::MIN_TARGET_FPS,
                common::MAX_TARGET_FPS
            );
        }
        if perf.min_fps > perf.target_fps {
            anyhow::bail!(
                "performance.min_fps ({}) exceeds target_fps ({})",
                perf.min_fps,
                perf.target_fps
            );
        }
        if perf.low_cpu_percent >= perf.high_cpu_percent {
            anyhow::bail!(
                "performance.low_cpu_percent ({}) must be below high_cpu_percent ({})",
                perf.low_cpu_percent,
                perf.high_cpu_percent
            );
        }
        if perf.cpu_history_size == 0 || perf.fps_step == 0 {
            anyhow::bail!("performance.cpu_history_size and fps_step must be at least 1");
        }
        for (name, secs) in [
            ("cpu_check_interval_secs", perf.cpu_check_interval_secs),
            ("fps_change_cooldown_secs", perf.fps_change_cooldown_secs),
        ] {
            // NaN fails the range check too
            if !(0.0..=MAX_INTERVAL_SECS).contains(&secs) {
                anyhow::bail!(
                    "performance.{} must be within 0-{} seconds, got {}",
                    name,
                    MAX_INTERVAL_SECS,
                    secs
                );
            }
        }

        if !(0.0..=1.0).contains(&self.audio.volume) {
            anyhow::bail!("audio.volume must be within 0.0-1.0, got {}", self.audio.volume);
        }

        Ok(())
    }
}
