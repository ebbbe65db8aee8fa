//! Audio track extraction
//!
//! Pulls a video's first audio track into a standalone Ogg Vorbis file so it
//! can be played by a separate audio transport. Extracted tracks are cached
//! by source path and modification time.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Default cache location for extracted tracks
pub fn audio_cache_dir() -> Result<PathBuf> {
    Ok(dirs::cache_dir()
        .context("Failed to get cache directory")?
        .join("loopwall")
        .join("audio"))
}

/// Cache file stem derived from the path and modification time
pub fn cache_key(video_path: &Path) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    video_path.to_string_lossy().hash(&mut hasher);

    if let Ok(modified) = std::fs::metadata(video_path).and_then(|m| m.modified()) {
        modified.hash(&mut hasher);
    }

    format!("{:016x}", hasher.finish())
}

/// Extract the audio track of `video_path` into the default cache
///
/// Returns `Ok(None)` when the video has no audio track.
pub fn extract_audio(video_path: impl AsRef<Path>) -> Result<Option<PathBuf>> {
    extract_audio_in(&audio_cache_dir()?, video_path.as_ref())
}

/// Extract the audio track of `video_path` into `cache_dir`
///
/// # Errors
///
/// Returns an error if:
/// - The video file doesn't exist
/// - FFmpeg is not available
/// - Extraction fails
pub fn extract_audio_in(cache_dir: &Path, video_path: &Path) -> Result<Option<PathBuf>> {
    if !video_path.exists() {
        anyhow::bail!("Video file does not exist: {}", video_path.display());
    }

    std::fs::create_dir_all(cache_dir).context("Failed to create audio cache directory")?;

    let audio_path = cache_dir.join(format!("{}.ogg", cache_key(video_path)));
    if audio_path.exists() {
        log::info!("Using cached audio track: {}", audio_path.display());
        return Ok(Some(audio_path));
    }

    if !has_audio_stream(video_path)? {
        log::info!("No audio track in {}", video_path.display());
        return Ok(None);
    }

    log::info!(
        "Extracting audio: {} -> {}",
        video_path.display(),
        audio_path.display()
    );

    // Write to a temporary name so an interrupted run never leaves a cached partial file
    let partial_path = audio_path.with_extension("ogg.partial");

    // -vn drops video, -map 0:a:0 takes the first audio track
    // -f ogg is needed because of the .partial extension
    let output = Command::new("ffmpeg")
        .arg("-i")
        .arg(video_path)
        .arg("-vn")
        .arg("-map")
        .arg("0:a:0")
        .arg("-c:a")
        .arg("libvorbis")
        .arg("-q:a")
        .arg("5")
        .arg("-f")
        .arg("ogg")
        .arg("-loglevel")
        .arg("error")
        .arg("-y")
        .arg(&partial_path)
        .output()
        .context("Failed to execute ffmpeg")?;

    if !output.status.success() {
        let _ = std::fs::remove_file(&partial_path);
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("FFmpeg audio extraction failed: {}", stderr.trim());
    }

    std::fs::rename(&partial_path, &audio_path)
        .context("Failed to move extracted audio into the cache")?;

    log::info!("Extracted audio track: {}", audio_path.display());
    Ok(Some(audio_path))
}

/// Ask ffprobe whether the file carries any audio stream
fn has_audio_stream(video_path: &Path) -> Result<bool> {
    let output = Command::new("ffprobe")
        .arg("-v")
        .arg("error")
        .arg("-select_streams")
        .arg("a")
        .arg("-show_entries")
        .arg("stream=index")
        .arg("-of")
        .arg("csv=p=0")
        .arg(video_path)
        .output()
        .context("Failed to execute ffprobe")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("ffprobe failed: {}", stderr.trim());
    }

    Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
}

/// Clean up old extracted tracks
///
/// Removes cached audio files older than `max_age` seconds.
pub fn cleanup_cache(max_age: u64) -> Result<()> {
    let cache_dir = audio_cache_dir()?;
    cleanup_cache_in(&cache_dir, max_age)
}

fn cleanup_cache_in(cache_dir: &Path, max_age: u64) -> Result<()> {
    if !cache_dir.exists() {
        return Ok(());
    }

    let now = std::time::SystemTime::now();
    let mut removed_count = 0;

    for entry in std::fs::read_dir(cache_dir)? {
        let entry = entry?;
        let path = entry.path();

        let is_cached_track = matches!(
            path.extension().and_then(|s| s.to_str()),
            Some("ogg") | Some("partial")
        );
        if !is_cached_track {
            continue;
        }

        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());

        if let Some(age) = age
            && age.as_secs() > max_age
            && std::fs::remove_file(&path).is_ok()
        {
            removed_count += 1;
            log::debug!("Removed old cached audio: {}", path.display());
        }
    }

    if removed_count > 0 {
        log::info!("Cleaned up {} old cached audio tracks", removed_count);
    }

    Ok(())
}
