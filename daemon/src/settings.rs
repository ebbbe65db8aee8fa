//! User-facing playback settings shared between the IPC server and the playback loop
//!
//! The IPC handlers write through [`SharedSettings`]; the playback loop only
//! reads through [`SettingsStore`] on its own polling schedule.

use crate::config::Config;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Settings the user can change while the daemon runs
#[derive(Debug, Clone, PartialEq)]
pub struct UserSettings {
    pub video_path: Option<PathBuf>,
    pub volume: f32,
    pub muted: bool,
    pub target_fps: u32,
    pub dynamic_fps: bool,
}

/// Read side of the settings, as seen by the playback loop
pub trait SettingsStore: Send + Sync {
    fn snapshot(&self) -> UserSettings;

    /// Incremented on every settings change
    fn revision(&self) -> u64;

    /// Returns true once per restart request
    fn take_restart_request(&self) -> bool;

    /// Last time the user interacted with the wallpaper
    fn last_activity(&self) -> Instant;
}

struct Inner {
    settings: UserSettings,
    revision: u64,
    restart_requested: bool,
    last_activity: Instant,
}

#[derive(Clone)]
pub struct SharedSettings {
    inner: Arc<Mutex<Inner>>,
}

impl SharedSettings {
    pub fn new(settings: UserSettings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                settings,
                revision: 0,
                restart_requested: false,
                last_activity: Instant::now(),
            })),
        }
    }

    pub fn from_config(config: &Config, video_path: Option<PathBuf>) -> Self {
        Self::new(UserSettings {
            video_path,
            volume: config.audio.volume.clamp(0.0, 1.0),
            muted: config.audio.muted,
            target_fps: config
                .performance
                .target_fps
                .clamp(common::MIN_TARGET_FPS, common::MAX_TARGET_FPS),
            dynamic_fps: config.performance.dynamic_fps,
        })
    }

    fn update<T>(&self, apply: impl FnOnce(&mut UserSettings) -> T) -> T {
        let mut inner = self.inner.lock();
        let result = apply(&mut inner.settings);
        inner.revision += 1;
        result
    }

    pub fn set_video_path(&self, path: PathBuf) {
        self.update(|s| s.video_path = Some(path));
    }

    pub fn set_volume(&self, volume: f32) {
        self.update(|s| s.volume = volume.clamp(0.0, 1.0));
    }

    pub fn set_muted(&self, muted: bool) {
        self.update(|s| s.muted = muted);
    }

    /// Flip mute, returning the new state
    pub fn toggle_muted(&self) -> bool {
        self.update(|s| {
            s.muted = !s.muted;
            s.muted
        })
    }

    pub fn set_target_fps(&self, fps: u32) {
        self.update(|s| s.target_fps = fps.clamp(common::MIN_TARGET_FPS, common::MAX_TARGET_FPS));
    }

    pub fn set_dynamic_fps(&self, enabled: bool) {
        self.update(|s| s.dynamic_fps = enabled);
    }

    pub fn request_restart(&self) {
        self.inner.lock().restart_requested = true;
    }

    pub fn touch_activity(&self) {
        self.inner.lock().last_activity = Instant::now();
    }
}

impl SettingsStore for SharedSettings {
    fn snapshot(&self) -> UserSettings {
        self.inner.lock().settings.clone()
    }

    fn revision(&self) -> u64 {
        self.inner.lock().revision
    }

    fn take_restart_request(&self) -> bool {
        std::mem::take(&mut self.inner.lock().restart_requested)
    }

    fn last_activity(&self) -> Instant {
        self.inner.lock().last_activity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SharedSettings {
        SharedSettings::from_config(&Config::default(), None)
    }

    #[test]
    fn test_from_config() {
        let snap = settings().snapshot();
        assert_eq!(snap.video_path, None);
        assert_eq!(snap.volume, 1.0);
        assert!(!snap.muted);
        assert_eq!(snap.target_fps, 30);
        assert!(snap.dynamic_fps);
    }

    #[test]
    fn test_setters_clamp() {
        let settings = settings();
        settings.set_volume(2.0);
        settings.set_target_fps(0);
        assert_eq!(settings.snapshot().volume, 1.0);
        assert_eq!(settings.snapshot().target_fps, common::MIN_TARGET_FPS);

        settings.set_target_fps(1000);
        assert_eq!(settings.snapshot().target_fps, common::MAX_TARGET_FPS);
    }

    #[test]
    fn test_revision_tracks_changes() {
        let settings = settings();
        let start = settings.revision();
        settings.set_volume(0.5);
        settings.set_muted(true);
        assert_eq!(settings.revision(), start + 2);

        // Activity and restart requests are not settings changes
        settings.touch_activity();
        settings.request_restart();
        assert_eq!(settings.revision(), start + 2);
    }

    #[test]
    fn test_toggle_muted() {
        let settings = settings();
        assert!(settings.toggle_muted());
        assert!(settings.snapshot().muted);
        assert!(!settings.toggle_muted());
    }

    #[test]
    fn test_restart_request_is_taken_once() {
        let settings = settings();
        assert!(!settings.take_restart_request());
        settings.request_restart();
        assert!(settings.take_restart_request());
        assert!(!settings.take_restart_request());
    }

    #[test]
    fn test_clones_share_state() {
        let settings = settings();
        let writer = settings.clone();
        writer.set_video_path(PathBuf::from("/videos/sea.mp4"));
        assert_eq!(
            settings.snapshot().video_path,
            Some(PathBuf::from("/videos/sea.mp4"))
        );

        let before = settings.last_activity();
        std::thread::sleep(std::time::Duration::from_millis(2));
        writer.touch_activity();
        assert!(settings.last_activity() > before);
    }
}
