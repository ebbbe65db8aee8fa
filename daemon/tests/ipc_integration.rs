/// Integration tests for IPC communication
/// These tests verify that commands and responses serialize correctly
/// and can be sent over IPC boundaries
use common::{Command, LoopwallError, PlaybackHealth, PlaybackStats, PlaybackStatus, Response};

fn roundtrip_command(cmd: &Command) -> Command {
    let json = serde_json::to_string(cmd).unwrap();
    serde_json::from_str(&json).unwrap()
}

fn roundtrip_response(resp: &Response) -> Response {
    let json = serde_json::to_string(resp).unwrap();
    serde_json::from_str(&json).unwrap()
}

#[test]
fn test_set_video_command() {
    let cmd = Command::SetVideo {
        path: "/home/user/Videos/rain.mp4".to_string(),
    };

    match roundtrip_command(&cmd) {
        Command::SetVideo { path } => assert_eq!(path, "/home/user/Videos/rain.mp4"),
        _ => panic!("Wrong command type"),
    }
}

#[test]
fn test_audio_commands() {
    match roundtrip_command(&Command::SetVolume { volume: 0.4 }) {
        Command::SetVolume { volume } => assert_eq!(volume, 0.4),
        _ => panic!("Wrong command type"),
    }

    match roundtrip_command(&Command::SetMuted { muted: true }) {
        Command::SetMuted { muted } => assert!(muted),
        _ => panic!("Wrong command type"),
    }

    assert!(matches!(
        roundtrip_command(&Command::ToggleMute),
        Command::ToggleMute
    ));
}

#[test]
fn test_frame_rate_commands() {
    match roundtrip_command(&Command::SetFps { fps: 24 }) {
        Command::SetFps { fps } => assert_eq!(fps, 24),
        _ => panic!("Wrong command type"),
    }

    match roundtrip_command(&Command::SetDynamicFps { enabled: false }) {
        Command::SetDynamicFps { enabled } => assert!(!enabled),
        _ => panic!("Wrong command type"),
    }
}

#[test]
fn test_unit_commands() {
    let commands = vec![
        Command::Restart,
        Command::Activity,
        Command::Query,
        Command::Stats,
        Command::Ping,
        Command::Kill,
    ];

    for cmd in commands {
        // Just verify it serializes and deserializes without error
        let _ = roundtrip_command(&cmd);
    }
}

#[test]
fn test_wire_format_is_one_line() {
    // The protocol is newline-delimited
    let cmd = Command::SetVideo {
        path: "/tmp/with\nnewline.mp4".to_string(),
    };
    let json = serde_json::to_string(&cmd).unwrap();
    assert!(!json.contains('\n'));

    let json = serde_json::to_string(&Response::Ok).unwrap();
    assert_eq!(json, "\"Ok\"");
}

#[test]
fn test_unknown_command_is_rejected() {
    assert!(serde_json::from_str::<Command>("\"Shuffle\"").is_err());
    assert!(serde_json::from_str::<Command>("{\"SetVolume\":{}}").is_err());
}

#[test]
fn test_response_types() {
    assert!(matches!(roundtrip_response(&Response::Ok), Response::Ok));
    assert!(matches!(roundtrip_response(&Response::Pong), Response::Pong));

    let resp = Response::Error(LoopwallError::InvalidValue("volume".to_string()));
    match roundtrip_response(&resp) {
        Response::Error(LoopwallError::InvalidValue(msg)) => assert_eq!(msg, "volume"),
        other => panic!("Wrong response type: {:?}", other),
    }
}

#[test]
fn test_status_response() {
    let status = PlaybackStatus {
        version: "0.1.0".to_string(),
        uptime_secs: 42,
        video_path: Some("/videos/sea.mp4".to_string()),
        health: PlaybackHealth::WorkerHalted,
        volume: 0.5,
        muted: true,
        has_audio: true,
        target_fps: 15,
        native_fps: 29.97,
        skip_ratio: 1,
        overlay_visible: false,
    };

    match roundtrip_response(&Response::Status(status)) {
        Response::Status(status) => {
            assert_eq!(status.uptime_secs, 42);
            assert_eq!(status.video_path.as_deref(), Some("/videos/sea.mp4"));
            assert_eq!(status.health, PlaybackHealth::WorkerHalted);
            assert!(status.muted);
            assert_eq!(status.native_fps, 29.97);
            assert!(!status.overlay_visible);
        }
        other => panic!("Wrong response type: {:?}", other),
    }
}

#[test]
fn test_stats_response() {
    let stats = PlaybackStats {
        target_fps: 30,
        total_frames: 900,
        dropped_frames: 9,
        drop_rate: 1.0,
        cpu_avg: 12.5,
        frames_decoded: 450,
        frames_skipped: 450,
        loops: 3,
    };

    match roundtrip_response(&Response::Stats(stats)) {
        Response::Stats(stats) => {
            assert_eq!(stats.total_frames, 900);
            assert_eq!(stats.frames_skipped, 450);
            assert_eq!(stats.loops, 3);
        }
        other => panic!("Wrong response type: {:?}", other),
    }
}
