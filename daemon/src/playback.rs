//! Playback loop tying decoding, rate control, audio and the render surface together
//!
//! Each tick:
//! 1. Services audio events and restart requests
//! 2. Updates the idle and overlay timers, pausing or resuming decoding
//! 3. Lets the rate controller retarget the capture thread
//! 4. Pops one frame (or re-presents the last one) and renders it
//! 5. Reconciles settings changes and publishes status for IPC queries

use crate::audio::{self, AudioSync, AudioTransport};
use crate::config::Config;
use crate::log_and_continue;
use crate::rate_controller::{CpuSampler, ProcessCpuSampler, RateController};
use crate::settings::{SettingsStore, UserSettings};
use crate::surface::{MappedSurface, RenderSurface};
use crate::video::{self, DecodeError, Frame, FrameConverter, PixelFormat, VideoManager, VideoSource};
use anyhow::{Context, Result};
use common::{PlaybackHealth, PlaybackStats};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Tick interval while idle or without a video
const IDLE_TICK: Duration = Duration::from_millis(100);

pub type VideoOpener = Box<dyn FnMut(&Path) -> Result<Box<dyn VideoSource>, DecodeError> + Send>;
pub type AudioPreparer = Box<dyn FnMut(&Path) -> Result<Option<PathBuf>> + Send>;

/// Platform pieces the playback loop drives
pub struct Backends {
    pub open_video: VideoOpener,
    pub prepare_audio: AudioPreparer,
    pub audio: Box<dyn AudioTransport>,
    pub cpu: Box<dyn CpuSampler>,
    pub surface: Box<dyn RenderSurface>,
}

impl Backends {
    /// GStreamer decoding, ffmpeg audio extraction, sysinfo CPU sampling, mmap framebuffer
    pub fn system(config: &Config) -> Result<Self> {
        let playback = &config.playback;
        let format = PixelFormat::from_str(&playback.surface_format)
            .with_context(|| format!("Unsupported surface format: {}", playback.surface_format))?;

        let surface = MappedSurface::create(
            playback.surface_path(),
            playback.surface_width,
            playback.surface_height,
            format,
        )
        .context("Failed to create render surface")?;

        Ok(Self {
            open_video: Box::new(|path: &Path| video::open_source(path)),
            prepare_audio: Box::new(|path: &Path| audio::extract::extract_audio(path)),
            audio: audio::default_transport(),
            cpu: Box::new(ProcessCpuSampler::new()),
            surface: Box::new(surface),
        })
    }
}

/// What the playback loop last reported, read by the IPC server
#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    pub video_path: Option<String>,
    pub health: PlaybackHealth,
    pub volume: f32,
    pub muted: bool,
    pub has_audio: bool,
    pub target_fps: u32,
    pub native_fps: f64,
    pub skip_ratio: u32,
    pub overlay_visible: bool,
    pub stats: PlaybackStats,
}

#[derive(Clone, Default)]
pub struct StatusBoard {
    inner: Arc<Mutex<StatusSnapshot>>,
}

impl StatusBoard {
    pub fn publish(&self, snapshot: StatusSnapshot) {
        *self.inner.lock() = snapshot;
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.lock().clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleTransition {
    Unchanged,
    Entered,
    Left,
}

/// Two independent inactivity timers: full idle and overlay auto-hide
#[derive(Debug)]
pub struct IdleTracker {
    idle_timeout: Duration,
    overlay_timeout: Duration,
    idle: bool,
    overlay_visible: bool,
}

impl IdleTracker {
    pub fn new(idle_timeout: Duration, overlay_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            overlay_timeout,
            idle: false,
            overlay_visible: true,
        }
    }

    pub fn update(&mut self, last_activity: Instant, now: Instant) -> IdleTransition {
        let inactive = now.saturating_duration_since(last_activity);

        let overlay_visible = inactive < self.overlay_timeout;
        if overlay_visible != self.overlay_visible {
            log::debug!("Overlay {}", if overlay_visible { "shown" } else { "hidden" });
            self.overlay_visible = overlay_visible;
        }

        let idle = inactive >= self.idle_timeout;
        let transition = match (self.idle, idle) {
            (false, true) => IdleTransition::Entered,
            (true, false) => IdleTransition::Left,
            _ => IdleTransition::Unchanged,
        };
        self.idle = idle;
        transition
    }

    pub fn is_idle(&self) -> bool {
        self.idle
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible
    }
}

/// Result of one playback tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A new frame was presented
    Rendered,
    /// No frame arrived in time; the last one was presented again
    Starved,
    /// A frame arrived but could not be converted
    Dropped,
    /// Decoding is paused for inactivity
    Idle,
    /// The capture thread gave up
    Halted,
    NoVideo,
}

pub struct PlaybackOrchestrator {
    config: Config,
    settings: Arc<dyn SettingsStore>,
    status: StatusBoard,
    open_video: VideoOpener,
    prepare_audio: AudioPreparer,
    surface: Box<dyn RenderSurface>,
    converter: FrameConverter,
    video: Option<VideoManager>,
    rate: RateController,
    audio: AudioSync,
    idle: IdleTracker,
    /// Retained for re-presentation while starved or idle
    last_frame: Option<Frame>,
    last_generation: Option<u64>,
    applied: UserSettings,
    applied_revision: u64,
    last_settings_poll: Instant,
    halt_reported: bool,
}

impl PlaybackOrchestrator {
    pub fn new(
        config: Config,
        settings: Arc<dyn SettingsStore>,
        status: StatusBoard,
        backends: Backends,
    ) -> Self {
        let applied = settings.snapshot();
        let applied_revision = settings.revision();

        let mut performance = config.performance.clone();
        performance.dynamic_fps = applied.dynamic_fps;
        let rate = RateController::new(
            applied.target_fps,
            common::MAX_TARGET_FPS,
            performance,
            backends.cpu,
        );

        let audio = AudioSync::new(backends.audio, applied.volume, applied.muted);
        let idle = IdleTracker::new(
            config.playback.idle_timeout(),
            config.playback.overlay_autohide(),
        );

        Self {
            settings,
            status,
            open_video: backends.open_video,
            prepare_audio: backends.prepare_audio,
            surface: backends.surface,
            converter: FrameConverter::new(),
            video: None,
            rate,
            audio,
            idle,
            last_frame: None,
            last_generation: None,
            applied,
            applied_revision,
            last_settings_poll: Instant::now(),
            halt_reported: false,
            config,
        }
    }

    /// Load the video configured at startup, if any
    pub fn load_initial(&mut self) -> Result<()> {
        let result = match self.applied.video_path.clone() {
            Some(path) => self.load_video(&path),
            None => {
                log::info!("No video configured, waiting for one over IPC");
                Ok(())
            }
        };
        self.publish_status();
        result
    }

    /// Replace the current video (and its audio) with `path`
    pub fn load_video(&mut self, path: &Path) -> Result<()> {
        self.unload_video();

        let source = (self.open_video)(path)?;
        let info = source.info();

        self.rate.set_max_fps(info.native_fps.round() as u32);
        self.rate.set_target_fps(self.applied.target_fps);

        let video = VideoManager::start(
            path,
            source,
            self.config.playback.queue_size,
            self.rate.target_fps(),
            self.config.capture.clone(),
        )?;
        if self.idle.is_idle() {
            video.pause();
        }

        self.video = Some(video);
        self.last_generation = None;
        self.halt_reported = false;

        if self.config.audio.enabled {
            self.load_audio(path);
        }
        Ok(())
    }

    fn load_audio(&mut self, video_path: &Path) {
        match (self.prepare_audio)(video_path) {
            Ok(Some(track)) => {
                self.audio
                    .load(&track, self.applied.volume, self.applied.muted);
            }
            Ok(None) => log::info!("Video has no audio track, playing silently"),
            Err(e) => log::warn!("Audio unavailable, playing silently: {:#}", e),
        }
    }

    fn unload_video(&mut self) {
        // Stops and joins the capture thread
        self.video = None;
        self.audio.unload();
    }

    /// Rewind video to the first frame; audio follows when that frame is shown
    pub fn restart_from_beginning(&mut self) {
        if let Some(video) = &self.video {
            log::info!("Restarting video from the beginning");
            video.restart_from_beginning();
        }
    }

    pub fn tick(&mut self) -> TickOutcome {
        let now = Instant::now();

        self.audio.poll();
        if self.settings.take_restart_request() {
            self.restart_from_beginning();
        }

        match self.idle.update(self.settings.last_activity(), now) {
            IdleTransition::Entered => {
                log::info!("User inactive, pausing decoding");
                if let Some(video) = &self.video {
                    video.pause();
                }
            }
            IdleTransition::Left => {
                log::info!("User active again, resuming decoding");
                if let Some(video) = &self.video {
                    video.resume();
                }
            }
            IdleTransition::Unchanged => {}
        }

        let outcome = if self.idle.is_idle() {
            self.present_last_frame();
            TickOutcome::Idle
        } else {
            self.adjust_rate();
            self.render_next_frame()
        };

        self.check_worker_health();
        self.poll_settings(now);
        self.rate
            .maybe_log_stats(self.config.playback.stats_log_interval());
        self.publish_status();

        outcome
    }

    fn adjust_rate(&mut self) {
        if !self.rate.should_adjust() {
            return;
        }
        let (fps, changed) = self.rate.adjust_fps();
        if changed && let Some(video) = &self.video {
            video.update_fps(fps);
        }
    }

    fn render_next_frame(&mut self) -> TickOutcome {
        if self.video.is_none() {
            self.present_last_frame();
            return TickOutcome::NoVideo;
        }
        if self.video.as_ref().is_some_and(VideoManager::is_halted) {
            self.present_last_frame();
            return TickOutcome::Halted;
        }

        let timeout = self.config.playback.frame_timeout();
        match self.video.as_ref().and_then(|v| v.next_frame(timeout)) {
            Some(frame) => self.show_frame(frame),
            None => {
                log::trace!("No frame within {:?}, repeating last frame", timeout);
                self.present_last_frame();
                self.rate.record_frame(true);
                TickOutcome::Starved
            }
        }
    }

    fn show_frame(&mut self, frame: Frame) -> TickOutcome {
        let generation = frame.loop_generation;
        if self.last_generation.is_some_and(|g| g != generation) {
            log::debug!("Video looped, rewinding audio");
            self.audio.rewind();
        }
        self.last_generation = Some(generation);

        #[cfg(feature = "profiling")]
        let convert_start = Instant::now();

        let prepared = self.converter.prepare(
            frame,
            self.surface.width(),
            self.surface.height(),
            self.surface.pixel_format(),
        );

        #[cfg(feature = "profiling")]
        log::trace!(
            "[PROFILE] Frame conversion took {:.2}ms",
            convert_start.elapsed().as_secs_f64() * 1000.0
        );

        match prepared {
            Ok(frame) => {
                log_and_continue!(self.surface.present(&frame), "present frame");
                self.last_frame = Some(frame);
                self.rate.record_frame(false);
                TickOutcome::Rendered
            }
            Err(e) => {
                log::warn!("Dropping frame: {:#}", e);
                self.present_last_frame();
                self.rate.record_frame(true);
                TickOutcome::Dropped
            }
        }
    }

    fn present_last_frame(&mut self) {
        if let Some(frame) = &self.last_frame {
            log_and_continue!(self.surface.present(frame), "present last frame");
        }
    }

    fn check_worker_health(&mut self) {
        let halted = self.video.as_ref().is_some_and(VideoManager::is_halted);
        if halted && !self.halt_reported {
            log::error!("Capture thread halted after repeated errors, keeping last frame on screen");
            self.halt_reported = true;
        }
    }

    fn health(&self) -> PlaybackHealth {
        match &self.video {
            None => PlaybackHealth::Empty,
            Some(video) if video.is_halted() => PlaybackHealth::WorkerHalted,
            Some(_) if self.idle.is_idle() => PlaybackHealth::Idle,
            Some(_) => PlaybackHealth::Playing,
        }
    }

    fn poll_settings(&mut self, now: Instant) {
        if now.saturating_duration_since(self.last_settings_poll)
            < self.config.playback.settings_poll_interval()
        {
            return;
        }
        self.last_settings_poll = now;

        let revision = self.settings.revision();
        if revision == self.applied_revision {
            return;
        }
        self.applied_revision = revision;

        let next = self.settings.snapshot();
        self.apply_settings(next);
    }

    fn apply_settings(&mut self, next: UserSettings) {
        if next.volume != self.applied.volume {
            self.audio.set_gain(next.volume);
        }
        if next.muted != self.applied.muted {
            self.audio.set_muted(next.muted);
        }
        if next.dynamic_fps != self.applied.dynamic_fps {
            self.rate.enable_dynamic_fps(next.dynamic_fps);
        }
        if next.target_fps != self.applied.target_fps {
            self.rate.set_target_fps(next.target_fps);
        }
        if let Some(video) = &self.video {
            video.update_fps(self.rate.target_fps());
        }

        let path_changed = next.video_path != self.applied.video_path;
        self.applied = next;

        if path_changed && let Some(path) = self.applied.video_path.clone() {
            log::info!("Video changed to {}", path.display());
            if let Err(e) = self.load_video(&path) {
                log::error!("Failed to load video {}: {:#}", path.display(), e);
            }
        }
    }

    fn publish_status(&self) {
        let audio = self.audio.state();
        let rate = self.rate.stats();
        let counters = self
            .video
            .as_ref()
            .map(VideoManager::counters)
            .unwrap_or_default();

        self.status.publish(StatusSnapshot {
            video_path: self.video.as_ref().map(|v| v.path().display().to_string()),
            health: self.health(),
            volume: audio.gain,
            muted: audio.muted,
            has_audio: audio.loaded,
            target_fps: rate.target_fps,
            native_fps: self.video.as_ref().map_or(0.0, |v| v.info().native_fps),
            skip_ratio: self.video.as_ref().map_or(1, VideoManager::skip_ratio),
            overlay_visible: self.idle.overlay_visible(),
            stats: PlaybackStats {
                target_fps: rate.target_fps,
                total_frames: rate.total_frames,
                dropped_frames: rate.dropped_frames,
                drop_rate: rate.drop_rate,
                cpu_avg: rate.cpu_avg,
                frames_decoded: counters.frames_decoded,
                frames_skipped: counters.frames_skipped,
                loops: counters.loops,
            },
        });
    }

    /// Run ticks until `shutdown` is set, pacing to the target frame rate
    pub fn run(&mut self, shutdown: &AtomicBool) {
        log::info!("Playback loop started");

        while !shutdown.load(Ordering::Acquire) {
            let started = Instant::now();
            let outcome = self.tick();

            let budget = match outcome {
                TickOutcome::Idle | TickOutcome::NoVideo | TickOutcome::Halted => IDLE_TICK,
                _ => Duration::from_secs_f64(1.0 / f64::from(self.rate.target_fps().max(1))),
            };
            if let Some(rest) = budget.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }

        self.shutdown();
    }

    /// Stop decoding and audio, logging the final statistics
    pub fn shutdown(&mut self) {
        let stats = self.rate.stats();
        log::info!("Final playback statistics:");
        log::info!("  Target FPS: {}", stats.target_fps);
        log::info!("  Total frames: {}", stats.total_frames);
        log::info!(
            "  Dropped frames: {} ({:.1}%)",
            stats.dropped_frames,
            stats.drop_rate
        );
        log::info!("  Average CPU: {:.1}%", stats.cpu_avg);

        self.unload_video();
        self.publish_status();
        log::info!("Playback loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tests::{FakeTransport, TransportLog};
    use crate::rate_controller::tests::ScriptedCpu;
    use crate::settings::SharedSettings;
    use crate::video::source::mock::{Scripted, ScriptedSource};

    type Presented = Arc<Mutex<Vec<(u64, u64)>>>;

    struct FakeSurface {
        presented: Presented,
    }

    impl RenderSurface for FakeSurface {
        fn width(&self) -> u32 {
            2
        }

        fn height(&self) -> u32 {
            2
        }

        fn pixel_format(&self) -> PixelFormat {
            PixelFormat::Bgra
        }

        fn present(&mut self, frame: &Frame) -> Result<()> {
            self.presented
                .lock()
                .push((frame.position, frame.loop_generation));
            Ok(())
        }
    }

    struct Harness {
        orchestrator: PlaybackOrchestrator,
        settings: SharedSettings,
        status: StatusBoard,
        audio: Arc<Mutex<TransportLog>>,
        presented: Presented,
        opened: Arc<Mutex<Vec<PathBuf>>>,
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.playback.queue_size = 8;
        config.playback.frame_timeout_ms = 2000;
        config.playback.settings_poll_ms = 0;
        config.capture.put_timeout_ms = 5;
        config.capture.error_backoff_ms = 0;
        config.performance.dynamic_fps = false;
        config
    }

    fn harness(
        config: Config,
        video: Option<&str>,
        make_source: impl Fn() -> ScriptedSource + Send + 'static,
    ) -> Harness {
        let settings = SharedSettings::from_config(&config, video.map(PathBuf::from));
        let status = StatusBoard::default();
        let (transport, audio) = FakeTransport::new();
        let presented: Presented = Arc::new(Mutex::new(Vec::new()));
        let opened = Arc::new(Mutex::new(Vec::new()));

        let opened_log = Arc::clone(&opened);
        let backends = Backends {
            open_video: Box::new(move |path: &Path| -> Result<Box<dyn VideoSource>, DecodeError> {
                opened_log.lock().push(path.to_path_buf());
                Ok(Box::new(make_source()))
            }),
            prepare_audio: Box::new(|path: &Path| -> Result<Option<PathBuf>> {
                Ok(Some(path.with_extension("ogg")))
            }),
            audio: Box::new(transport),
            cpu: Box::new(ScriptedCpu::constant(10.0)),
            surface: Box::new(FakeSurface {
                presented: Arc::clone(&presented),
            }),
        };

        let orchestrator = PlaybackOrchestrator::new(
            config,
            Arc::new(settings.clone()),
            status.clone(),
            backends,
        );

        Harness {
            orchestrator,
            settings,
            status,
            audio,
            presented,
            opened,
        }
    }

    fn generation_changes(presented: &[(u64, u64)]) -> u32 {
        presented.windows(2).filter(|w| w[0].1 != w[1].1).count() as u32
    }

    #[test]
    fn test_idle_tracker_timers() {
        let start = Instant::now();
        let mut idle = IdleTracker::new(Duration::from_secs(60), Duration::from_secs(10));

        assert_eq!(idle.update(start, start + Duration::from_secs(5)), IdleTransition::Unchanged);
        assert!(idle.overlay_visible());

        assert_eq!(idle.update(start, start + Duration::from_secs(11)), IdleTransition::Unchanged);
        assert!(!idle.overlay_visible());
        assert!(!idle.is_idle());

        assert_eq!(idle.update(start, start + Duration::from_secs(60)), IdleTransition::Entered);
        assert!(idle.is_idle());
        assert_eq!(idle.update(start, start + Duration::from_secs(61)), IdleTransition::Unchanged);

        let active = start + Duration::from_secs(62);
        assert_eq!(idle.update(active, active), IdleTransition::Left);
        assert!(idle.overlay_visible());
    }

    #[test]
    fn test_renders_frames_in_order_and_rewinds_audio_on_loop() {
        let mut h = harness(test_config(), Some("/videos/loop.mp4"), || {
            ScriptedSource::new(3, 30.0)
        });
        h.orchestrator.load_initial().unwrap();

        for _ in 0..10 {
            h.orchestrator.tick();
        }

        let presented = h.presented.lock().clone();
        assert!(presented.len() >= 10);
        assert_eq!(&presented[..3], &[(0, 0), (1, 0), (2, 0)]);
        assert_eq!(presented[3].0, 0);

        let changes = generation_changes(&presented);
        assert!(changes >= 1);
        assert_eq!(h.audio.lock().rewinds, changes);
        // Looping never stops the audio
        assert_eq!(h.audio.lock().stops, 0);
    }

    #[test]
    fn test_initial_open_failure_surfaces() {
        let settings = SharedSettings::from_config(&test_config(), Some(PathBuf::from("/missing.mp4")));
        let (transport, _audio) = FakeTransport::new();
        let backends = Backends {
            open_video: Box::new(|path: &Path| -> Result<Box<dyn VideoSource>, DecodeError> {
                Err(DecodeError::OpenFailed {
                    path: path.to_path_buf(),
                    reason: "no such file".into(),
                })
            }),
            prepare_audio: Box::new(|_: &Path| -> Result<Option<PathBuf>> { Ok(None) }),
            audio: Box::new(transport),
            cpu: Box::new(ScriptedCpu::constant(0.0)),
            surface: Box::new(FakeSurface {
                presented: Arc::new(Mutex::new(Vec::new())),
            }),
        };
        let mut orchestrator =
            PlaybackOrchestrator::new(test_config(), Arc::new(settings), StatusBoard::default(), backends);

        let err = orchestrator.load_initial().unwrap_err();
        assert!(err.to_string().contains("no such file"));
    }

    #[test]
    fn test_no_video_waits() {
        let mut h = harness(test_config(), None, || ScriptedSource::new(3, 30.0));
        h.orchestrator.load_initial().unwrap();
        assert_eq!(h.orchestrator.tick(), TickOutcome::NoVideo);
        assert_eq!(h.status.snapshot().health, PlaybackHealth::Empty);
    }

    #[test]
    fn test_settings_reach_audio_and_rate() {
        let mut h = harness(test_config(), Some("/videos/loop.mp4"), || {
            ScriptedSource::new(30, 30.0)
        });
        h.orchestrator.load_initial().unwrap();
        h.orchestrator.tick();

        h.settings.set_volume(0.3);
        h.settings.set_muted(true);
        h.settings.set_target_fps(20);
        h.orchestrator.tick();

        assert_eq!(h.audio.lock().volumes.last(), Some(&0.0));
        assert!(h.audio.lock().playing);

        let status = h.status.snapshot();
        assert!(status.muted);
        assert_eq!(status.volume, 0.3);
        assert_eq!(status.target_fps, 20);
        assert!(status.has_audio);

        // Unmuting restores the configured gain
        h.settings.set_muted(false);
        h.orchestrator.tick();
        assert_eq!(h.audio.lock().volumes.last(), Some(&f64::from(0.3f32)));
    }

    #[test]
    fn test_path_change_reloads() {
        let mut h = harness(test_config(), Some("/videos/a.mp4"), || {
            ScriptedSource::new(30, 30.0)
        });
        h.orchestrator.load_initial().unwrap();
        h.orchestrator.tick();

        h.settings.set_video_path(PathBuf::from("/videos/b.mp4"));
        h.orchestrator.tick();

        assert_eq!(
            *h.opened.lock(),
            vec![PathBuf::from("/videos/a.mp4"), PathBuf::from("/videos/b.mp4")]
        );
        let audio = h.audio.lock();
        assert_eq!(audio.opened.len(), 2);
        assert_eq!(audio.stops, 1);
        drop(audio);

        assert_eq!(
            h.status.snapshot().video_path.as_deref(),
            Some("/videos/b.mp4")
        );
    }

    #[test]
    fn test_idle_pauses_decoding() {
        let mut config = test_config();
        config.playback.idle_timeout_secs = 0;
        let mut h = harness(config, Some("/videos/loop.mp4"), || ScriptedSource::new(30, 30.0));
        h.orchestrator.load_initial().unwrap();

        assert_eq!(h.orchestrator.tick(), TickOutcome::Idle);
        assert_eq!(h.status.snapshot().health, PlaybackHealth::Idle);
        assert!(h.presented.lock().is_empty());
    }

    #[test]
    fn test_worker_halt_is_reported() {
        let mut config = test_config();
        config.playback.frame_timeout_ms = 50;
        let mut h = harness(config, Some("/videos/broken.mp4"), || {
            ScriptedSource::new(30, 30.0).with_errors((0..10).map(|_| Scripted::Backend))
        });
        h.orchestrator.load_initial().unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while h.status.snapshot().health != PlaybackHealth::WorkerHalted && Instant::now() < deadline {
            h.orchestrator.tick();
        }
        assert_eq!(h.status.snapshot().health, PlaybackHealth::WorkerHalted);
        assert_eq!(h.orchestrator.tick(), TickOutcome::Halted);
    }

    #[test]
    fn test_restart_request_returns_to_first_frame() {
        let mut h = harness(test_config(), Some("/videos/loop.mp4"), || {
            ScriptedSource::new(100, 30.0)
        });
        h.orchestrator.load_initial().unwrap();
        for _ in 0..5 {
            h.orchestrator.tick();
        }
        let before = h.presented.lock().len();

        h.settings.request_restart();
        for _ in 0..5 {
            h.orchestrator.tick();
        }

        let presented = h.presented.lock().clone();
        assert!(
            presented[before..].iter().any(|&(pos, generation)| pos == 0 && generation >= 1),
            "no rewound frame in {:?}",
            &presented[before..]
        );
        assert!(h.audio.lock().rewinds >= 1);
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let mut h = harness(test_config(), Some("/videos/loop.mp4"), || {
            ScriptedSource::new(30, 30.0)
        });
        h.orchestrator.load_initial().unwrap();
        h.orchestrator.tick();

        h.orchestrator.shutdown();
        assert_eq!(h.audio.lock().stops, 1);
        assert_eq!(h.status.snapshot().health, PlaybackHealth::Empty);
    }
}
