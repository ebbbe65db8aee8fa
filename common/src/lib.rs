//! Common types and utilities for loopwall.
//!
//! This crate defines the shared data structures and IPC protocol used for
//! communication between the daemon (`loopwall`) and
//! client (`lwctl`).
//!
//! # IPC Protocol
//!
//! Communication happens over a Unix domain socket using JSON-serialized
//! messages, one per line. The client sends [`Command`] variants and receives
//! [`Response`] variants.
//!
//! # Examples
//!
//! ```no_run
//! use common::Command;
//!
//! // Lower the wallpaper volume to 40%
//! let cmd = Command::SetVolume { volume: 0.4 };
//!
//! // Serialize for sending over IPC
//! let json = serde_json::to_string(&cmd).unwrap();
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest target frame rate a client may request.
pub const MIN_TARGET_FPS: u32 = 1;

/// Highest target frame rate a client may request.
pub const MAX_TARGET_FPS: u32 = 120;

/// Common error types shared between client and daemon.
///
/// All errors are serializable for transmission over IPC.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum LoopwallError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("IPC error: {0}")]
    Ipc(String),

    #[error("Video error: {0}")]
    Video(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<std::io::Error> for LoopwallError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for LoopwallError {
    fn from(e: serde_json::Error) -> Self {
        Self::Ipc(e.to_string())
    }
}

/// Commands sent from client to daemon via IPC.
///
/// Settings commands only update the daemon's settings store; the playback
/// loop picks the change up on its next settings poll.
///
/// # Examples
///
/// ```
/// use common::Command;
///
/// let cmd = Command::SetVideo {
///     path: "/home/user/Videos/rain.mp4".to_string(),
/// };
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub enum Command {
    /// Swap the looping video.
    SetVideo {
        /// Path to the video file (must be absolute)
        path: String,
    },
    /// Set the audio volume (0.0-1.0).
    SetVolume { volume: f32 },
    /// Mute or unmute the audio without interrupting playback.
    SetMuted { muted: bool },
    /// Flip the mute state
    ToggleMute,
    /// Set the target frame rate; becomes the new baseline for adaptive control.
    SetFps { fps: u32 },
    /// Enable or disable CPU-driven frame rate adjustment
    SetDynamicFps { enabled: bool },
    /// Rewind video and audio to the first frame.
    Restart,
    /// Report user activity (resets the idle timers)
    Activity,
    /// Query daemon status
    Query,
    /// Query frame statistics
    Stats,
    /// Ping the daemon
    Ping,
    /// Kill the daemon
    Kill,
}

/// Response from daemon to client
#[derive(Debug, Serialize, Deserialize)]
pub enum Response {
    Ok,
    Error(LoopwallError),
    Status(PlaybackStatus),
    Stats(PlaybackStats),
    Pong,
}

/// Health of the decode pipeline as seen by the playback loop
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PlaybackHealth {
    /// No video loaded yet
    #[default]
    Empty,
    /// Frames are flowing
    Playing,
    /// Decoding suspended because the user is inactive
    Idle,
    /// The capture worker gave up; the last frame stays on screen
    WorkerHalted,
}

/// Daemon status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub version: String,
    pub uptime_secs: u64,
    pub video_path: Option<String>,
    pub health: PlaybackHealth,
    pub volume: f32,
    pub muted: bool,
    pub has_audio: bool,
    pub target_fps: u32,
    pub native_fps: f64,
    pub skip_ratio: u32,
    pub overlay_visible: bool,
}

/// Frame statistics collected by the playback loop
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaybackStats {
    pub target_fps: u32,
    pub total_frames: u64,
    pub dropped_frames: u64,
    pub drop_rate: f64,
    pub cpu_avg: f32,
    pub frames_decoded: u64,
    pub frames_skipped: u64,
    pub loops: u64,
}

/// IPC socket path helper
pub fn get_socket_path() -> std::path::PathBuf {
    runtime_dir().join("loopwall.sock")
}

/// Directory for per-session runtime files (socket, framebuffer)
pub fn runtime_dir() -> std::path::PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .unwrap_or_else(|_| format!("/run/user/{}", unsafe { libc::getuid() }));

    std::path::PathBuf::from(runtime_dir)
}
