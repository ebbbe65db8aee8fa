use anyhow::Result;
use common::{Command, LoopwallError, PlaybackStatus, Response};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use crate::DaemonState;

pub async fn start(state: Arc<DaemonState>) -> Result<()> {
    let socket_path = common::get_socket_path();

    // Remove old socket if it exists
    if socket_path.exists() {
        std::fs::remove_file(&socket_path)?;
    }

    let listener = UnixListener::bind(&socket_path)?;
    log::info!("IPC server listening on: {}", socket_path.display());

    loop {
        if state.should_exit() {
            break;
        }

        // Accept with a timeout so the exit flag is noticed
        let accept_result =
            tokio::time::timeout(std::time::Duration::from_millis(100), listener.accept()).await;

        match accept_result {
            Ok(Ok((stream, _addr))) => {
                let state = state.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, state).await {
                        log::error!("Error handling client: {}", e);
                    }
                });
            }
            Ok(Err(e)) => {
                log::error!("Error accepting connection: {}", e);
            }
            Err(_) => continue,
        }
    }

    let _ = std::fs::remove_file(&socket_path);
    log::info!("IPC server stopped");
    Ok(())
}

async fn handle_client(stream: UnixStream, state: Arc<DaemonState>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<Command>(&line) {
            Ok(command) => handle_command(command, &state),
            Err(e) => {
                log::warn!("Invalid command: {}", e);
                Response::Error(LoopwallError::Ipc(format!("Invalid command: {}", e)))
            }
        };

        let response_json = serde_json::to_string(&response)?;
        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        line.clear();
    }

    Ok(())
}

fn handle_command(command: Command, state: &DaemonState) -> Response {
    log::debug!("Handling command: {:?}", command);

    match command {
        Command::Ping => Response::Pong,

        Command::Query => {
            let snapshot = state.status.snapshot();
            Response::Status(PlaybackStatus {
                version: env!("CARGO_PKG_VERSION").to_string(),
                uptime_secs: state.uptime_secs(),
                video_path: snapshot.video_path,
                health: snapshot.health,
                volume: snapshot.volume,
                muted: snapshot.muted,
                has_audio: snapshot.has_audio,
                target_fps: snapshot.target_fps,
                native_fps: snapshot.native_fps,
                skip_ratio: snapshot.skip_ratio,
                overlay_visible: snapshot.overlay_visible,
            })
        }

        Command::Stats => Response::Stats(state.status.snapshot().stats),

        Command::SetVideo { path } => {
            log::info!("Setting video: {}", path);

            let path = PathBuf::from(path);
            if !path.is_absolute() {
                return Response::Error(LoopwallError::InvalidValue(format!(
                    "Video path must be absolute: {}",
                    path.display()
                )));
            }
            if !path.is_file() {
                return Response::Error(LoopwallError::NotFound(format!(
                    "Video file not found: {}",
                    path.display()
                )));
            }

            state.settings.set_video_path(path);
            Response::Ok
        }

        Command::SetVolume { volume } => {
            if !(0.0..=1.0).contains(&volume) {
                return Response::Error(LoopwallError::InvalidValue(format!(
                    "Volume must be between 0.0 and 1.0, got {}",
                    volume
                )));
            }
            log::info!("Setting volume: {:.0}%", volume * 100.0);
            state.settings.set_volume(volume);
            Response::Ok
        }

        Command::SetMuted { muted } => {
            log::info!("{}", if muted { "Muting audio" } else { "Unmuting audio" });
            state.settings.set_muted(muted);
            Response::Ok
        }

        Command::ToggleMute => {
            let muted = state.settings.toggle_muted();
            log::info!("Audio {}", if muted { "muted" } else { "unmuted" });
            Response::Ok
        }

        Command::SetFps { fps } => {
            if !(common::MIN_TARGET_FPS..=common::MAX_TARGET_FPS).contains(&fps) {
                return Response::Error(LoopwallError::InvalidValue(format!(
                    "FPS must be between {} and {}, got {}",
                    common::MIN_TARGET_FPS,
                    common::MAX_TARGET_FPS,
                    fps
                )));
            }
            log::info!("Setting target FPS: {}", fps);
            state.settings.set_target_fps(fps);
            Response::Ok
        }

        Command::SetDynamicFps { enabled } => {
            log::info!(
                "Dynamic FPS {}",
                if enabled { "enabled" } else { "disabled" }
            );
            state.settings.set_dynamic_fps(enabled);
            Response::Ok
        }

        Command::Restart => {
            log::info!("Restart requested");
            state.settings.request_restart();
            Response::Ok
        }

        Command::Activity => {
            state.settings.touch_activity();
            Response::Ok
        }

        Command::Kill => {
            log::info!("Received kill command");
            state.shutdown.store(true, Ordering::Release);
            Response::Ok
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::playback::{StatusBoard, StatusSnapshot};
    use crate::settings::{SettingsStore, SharedSettings};
    use common::PlaybackHealth;
    use std::sync::atomic::AtomicBool;

    fn state() -> DaemonState {
        DaemonState::new(
            SharedSettings::from_config(&Config::default(), None),
            StatusBoard::default(),
            Arc::new(AtomicBool::new(false)),
        )
    }

    #[test]
    fn test_ping() {
        assert!(matches!(handle_command(Command::Ping, &state()), Response::Pong));
    }

    #[test]
    fn test_set_video_validates_path() {
        let state = state();

        let response = handle_command(
            Command::SetVideo {
                path: "relative/clip.mp4".into(),
            },
            &state,
        );
        assert!(matches!(response, Response::Error(LoopwallError::InvalidValue(_))));

        let response = handle_command(
            Command::SetVideo {
                path: "/nonexistent/clip.mp4".into(),
            },
            &state,
        );
        assert!(matches!(response, Response::Error(LoopwallError::NotFound(_))));
        assert_eq!(state.settings.snapshot().video_path, None);

        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"video").unwrap();
        let response = handle_command(
            Command::SetVideo {
                path: video.display().to_string(),
            },
            &state,
        );
        assert!(matches!(response, Response::Ok));
        assert_eq!(state.settings.snapshot().video_path, Some(video));
    }

    #[test]
    fn test_volume_and_fps_ranges() {
        let state = state();

        let response = handle_command(Command::SetVolume { volume: 1.5 }, &state);
        assert!(matches!(response, Response::Error(LoopwallError::InvalidValue(_))));

        let response = handle_command(Command::SetVolume { volume: 0.25 }, &state);
        assert!(matches!(response, Response::Ok));
        assert_eq!(state.settings.snapshot().volume, 0.25);

        let response = handle_command(Command::SetFps { fps: 0 }, &state);
        assert!(matches!(response, Response::Error(LoopwallError::InvalidValue(_))));

        let response = handle_command(Command::SetFps { fps: 24 }, &state);
        assert!(matches!(response, Response::Ok));
        assert_eq!(state.settings.snapshot().target_fps, 24);
    }

    #[test]
    fn test_settings_commands_update_store() {
        let state = state();
        let revision = state.settings.revision();

        handle_command(Command::ToggleMute, &state);
        assert!(state.settings.snapshot().muted);
        handle_command(Command::SetMuted { muted: false }, &state);
        assert!(!state.settings.snapshot().muted);
        handle_command(Command::SetDynamicFps { enabled: false }, &state);
        assert!(!state.settings.snapshot().dynamic_fps);
        assert_eq!(state.settings.revision(), revision + 3);

        handle_command(Command::Restart, &state);
        assert!(state.settings.take_restart_request());
    }

    #[test]
    fn test_query_reads_status_board() {
        let state = state();
        state.status.publish(StatusSnapshot {
            video_path: Some("/videos/sea.mp4".into()),
            health: PlaybackHealth::Playing,
            target_fps: 24,
            skip_ratio: 2,
            ..Default::default()
        });

        match handle_command(Command::Query, &state) {
            Response::Status(status) => {
                assert_eq!(status.video_path.as_deref(), Some("/videos/sea.mp4"));
                assert_eq!(status.health, PlaybackHealth::Playing);
                assert_eq!(status.target_fps, 24);
                assert_eq!(status.skip_ratio, 2);
                assert_eq!(status.version, env!("CARGO_PKG_VERSION"));
            }
            other => panic!("Wrong response type: {:?}", other),
        }
    }

    #[test]
    fn test_kill_sets_exit_flag() {
        let state = state();
        assert!(matches!(handle_command(Command::Kill, &state), Response::Ok));
        assert!(state.should_exit());
    }

    #[tokio::test]
    async fn test_client_round_trip() {
        let state = Arc::new(state());
        let (client, server) = UnixStream::pair().unwrap();
        let server_task = tokio::spawn(handle_client(server, state));

        let (reader, mut writer) = client.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        writer.write_all(b"{not json}\n").await.unwrap();
        reader.read_line(&mut line).await.unwrap();
        assert!(matches!(
            serde_json::from_str::<Response>(&line).unwrap(),
            Response::Error(LoopwallError::Ipc(_))
        ));

        line.clear();
        let ping = serde_json::to_string(&Command::Ping).unwrap();
        writer.write_all(format!("{}\n", ping).as_bytes()).await.unwrap();
        reader.read_line(&mut line).await.unwrap();
        assert!(matches!(
            serde_json::from_str::<Response>(&line).unwrap(),
            Response::Pong
        ));

        drop(writer);
        server_task.await.unwrap().unwrap();
    }
}
