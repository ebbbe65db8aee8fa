use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use common::{Command, PlaybackHealth, Response};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

#[derive(Parser)]
#[command(name = "lwctl")]
#[command(about = "Looping Video Wallpaper Control", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a different video file
    Video {
        /// Path to the video file
        path: String,
    },

    /// Set the audio volume
    Volume {
        /// Volume from 0.0 (silent) to 1.0 (full)
        volume: f32,
    },

    /// Mute the audio (playback continues)
    Mute,

    /// Unmute the audio
    Unmute,

    /// Toggle mute
    ToggleMute,

    /// Set the target frame rate
    Fps {
        /// Frames per second (1-120)
        fps: u32,
    },

    /// Turn CPU-driven frame rate adjustment on or off
    DynamicFps {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Restart video and audio from the beginning
    Restart,

    /// Report user activity (wakes the wallpaper from idle)
    Activity,

    /// Query daemon status
    Query,

    /// Show frame statistics
    Stats,

    /// Ping the daemon to check if it's running
    Ping,

    /// Kill the running daemon
    Kill,
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = match cli.command {
        Commands::Video { path } => Command::SetVideo {
            path: absolute_path(&path)?,
        },
        Commands::Volume { volume } => Command::SetVolume { volume },
        Commands::Mute => Command::SetMuted { muted: true },
        Commands::Unmute => Command::SetMuted { muted: false },
        Commands::ToggleMute => Command::ToggleMute,
        Commands::Fps { fps } => Command::SetFps { fps },
        Commands::DynamicFps { state } => Command::SetDynamicFps {
            enabled: matches!(state, Toggle::On),
        },
        Commands::Restart => Command::Restart,
        Commands::Activity => Command::Activity,
        Commands::Query => Command::Query,
        Commands::Stats => Command::Stats,
        Commands::Ping => Command::Ping,
        Commands::Kill => Command::Kill,
    };

    match send_command(command).await {
        Ok(response) => {
            handle_response(response);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("\nIs the daemon running? Try starting it with: loopwall");
            std::process::exit(1);
        }
    }
}

/// The daemon resolves nothing relative to the client's working directory
fn absolute_path(path: &str) -> Result<String> {
    let absolute = std::path::absolute(Path::new(path))
        .with_context(|| format!("Invalid path: {}", path))?;
    Ok(absolute.display().to_string())
}

async fn send_command(command: Command) -> Result<Response> {
    let socket_path = common::get_socket_path();

    let stream = UnixStream::connect(&socket_path).await?;
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    // Send command
    let command_json = serde_json::to_string(&command)?;
    writer.write_all(command_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    // Read response
    let mut response_line = String::new();
    reader.read_line(&mut response_line).await?;

    let response: Response = serde_json::from_str(&response_line)?;
    Ok(response)
}

fn health_label(health: PlaybackHealth) -> &'static str {
    match health {
        PlaybackHealth::Empty => "no video loaded",
        PlaybackHealth::Playing => "playing",
        PlaybackHealth::Idle => "idle (decoding paused)",
        PlaybackHealth::WorkerHalted => "halted (decoder failed, showing last frame)",
    }
}

fn handle_response(response: Response) {
    match response {
        Response::Ok => {
            println!("✓ Success");
        }
        Response::Error(e) => {
            eprintln!("✗ Error: {}", e);
            std::process::exit(1);
        }
        Response::Status(status) => {
            println!("Daemon Status:");
            println!("  Version: {}", status.version);
            println!("  Uptime: {}s", status.uptime_secs);
            println!(
                "  Video: {}",
                status.video_path.as_deref().unwrap_or("(none)")
            );
            println!("  State: {}", health_label(status.health));
            println!(
                "  Frame rate: {} fps target, {:.2} fps native (skip ratio {})",
                status.target_fps, status.native_fps, status.skip_ratio
            );
            if status.has_audio {
                println!(
                    "  Audio: {:.0}%{}",
                    status.volume * 100.0,
                    if status.muted { " (muted)" } else { "" }
                );
            } else {
                println!("  Audio: none");
            }
            println!(
                "  Overlay: {}",
                if status.overlay_visible { "visible" } else { "hidden" }
            );
        }
        Response::Stats(stats) => {
            println!("Frame Statistics:");
            println!("  Target FPS: {}", stats.target_fps);
            println!("  Frames shown: {}", stats.total_frames);
            println!(
                "  Dropped: {} ({:.1}%)",
                stats.dropped_frames, stats.drop_rate
            );
            println!("  CPU average: {:.1}%", stats.cpu_avg);
            println!(
                "  Decoder: {} decoded, {} skipped, {} loops",
                stats.frames_decoded, stats.frames_skipped, stats.loops
            );
        }
        Response::Pong => {
            println!("✓ Daemon is running");
        }
    }
}
