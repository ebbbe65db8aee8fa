mod audio;
mod config;
mod ipc_server;
mod macros;
mod playback;
mod rate_controller;
mod settings;
mod surface;
mod video;

use anyhow::{Context, Result};
use clap::Parser;
use playback::{Backends, PlaybackOrchestrator, StatusBoard};
use settings::SharedSettings;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Extracted audio older than this is removed at startup
const AUDIO_CACHE_MAX_AGE_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Parser)]
#[command(name = "loopwall")]
#[command(about = "Looping video wallpaper daemon", version)]
struct Args {
    /// Configuration file (defaults to ~/.config/loopwall/config.toml)
    #[arg(short, long, env = "LOOPWALL_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => config::Config::default_config_path()?,
    };
    let config = config::Config::load_from_path(&config_path)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.general.log_level.as_str()),
    )
    .init();

    log::info!("Starting loopwall v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Configuration: {}", config_path.display());
    log::info!("  Playback settings:");
    log::info!(
        "    - Surface: {}x{} {}",
        config.playback.surface_width,
        config.playback.surface_height,
        config.playback.surface_format
    );
    log::info!("    - Queue size: {} frames", config.playback.queue_size);
    log::info!(
        "    - Idle after {}s, overlay hides after {}s",
        config.playback.idle_timeout_secs,
        config.playback.overlay_autohide_secs
    );
    log::info!("  Performance settings:");
    log::info!(
        "    - Target FPS: {} (min {}, dynamic: {})",
        config.performance.target_fps,
        config.performance.min_fps,
        if config.performance.dynamic_fps { "yes" } else { "no" }
    );
    log::info!(
        "  Audio: {}",
        if config.audio.enabled { "enabled" } else { "disabled" }
    );

    if let Err(e) = audio::extract::cleanup_cache(AUDIO_CACHE_MAX_AGE_SECS) {
        log::warn!("Failed to clean audio cache: {:#}", e);
    }

    let settings = SharedSettings::from_config(&config, config.video_path()?);
    let status = StatusBoard::default();
    let shutdown = Arc::new(AtomicBool::new(false));

    let backends = Backends::system(&config)?;
    let mut orchestrator = PlaybackOrchestrator::new(
        config,
        Arc::new(settings.clone()),
        status.clone(),
        backends,
    );
    orchestrator
        .load_initial()
        .context("Failed to load the configured video")?;

    let playback_shutdown = shutdown.clone();
    let playback_handle = std::thread::Builder::new()
        .name("playback".into())
        .spawn(move || orchestrator.run(&playback_shutdown))
        .context("Failed to spawn playback thread")?;

    let state = Arc::new(DaemonState::new(settings, status, shutdown.clone()));

    // Start IPC server
    let ipc_state = state.clone();
    let ipc_handle = tokio::spawn(async move {
        if let Err(e) = ipc_server::start(ipc_state).await {
            log::error!("IPC server error: {}", e);
        }
    });

    // Set up signal handlers
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    log::error!("Failed to set up signal handlers: {}", e);
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                log::info!("Received SIGTERM, shutting down...");
            }
            _ = sigint.recv() => {
                log::info!("Received SIGINT, shutting down...");
            }
        }

        signal_shutdown.store(true, Ordering::Release);
    });

    let playback_result = tokio::task::spawn_blocking(move || playback_handle.join()).await;
    if !matches!(playback_result, Ok(Ok(()))) {
        log::error!("Playback thread panicked");
    }

    // The IPC server exits once it sees the flag
    shutdown.store(true, Ordering::Release);
    if let Err(e) = ipc_handle.await {
        log::error!("IPC server task failed: {}", e);
    }

    log::info!("Daemon shutting down");
    Ok(())
}

/// State shared with the IPC server
pub struct DaemonState {
    pub start_time: Instant,
    pub settings: SharedSettings,
    pub status: StatusBoard,
    pub shutdown: Arc<AtomicBool>,
}

impl DaemonState {
    fn new(settings: SharedSettings, status: StatusBoard, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            start_time: Instant::now(),
            settings,
            status,
            shutdown,
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn should_exit(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}
