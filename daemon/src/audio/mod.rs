//! Looping audio track kept in step with the video
//!
//! - `extract`: pulls the audio track out of the video file (cached)
//! - `gst_transport`: GStreamer playback of the extracted track
//!
//! [`AudioSync`] owns the gain and mute state. Muting sets the output gain to
//! zero and never stops the transport, so unmuting resumes at the position
//! the video has reached.

pub mod extract;
#[cfg(feature = "video")]
pub mod gst_transport;

use anyhow::Result;
use std::path::Path;

/// Playback backend for an extracted audio track
pub trait AudioTransport: Send {
    /// Prepare `source` for playback, replacing anything loaded before
    fn open(&mut self, source: &Path) -> Result<()>;

    /// Start playing, wrapping to the start at end of stream
    fn play_looped(&mut self) -> Result<()>;

    /// Output gain, 0.0-1.0
    fn set_volume(&mut self, gain: f64);

    /// Jump back to the start without stopping
    fn rewind(&mut self) -> Result<()>;

    fn stop(&mut self);

    fn is_playing(&self) -> bool;

    /// Service backend events (end-of-stream wrap, errors)
    fn poll(&mut self);
}

/// Snapshot of the audio state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioState {
    pub loaded: bool,
    pub gain: f32,
    pub muted: bool,
}

pub struct AudioSync {
    transport: Box<dyn AudioTransport>,
    loaded: bool,
    gain: f32,
    muted: bool,
}

impl AudioSync {
    pub fn new(transport: Box<dyn AudioTransport>, gain: f32, muted: bool) -> Self {
        Self {
            transport,
            loaded: false,
            gain: gain.clamp(0.0, 1.0),
            muted,
        }
    }

    /// Load and start looping a track. Returns false (and stays unloaded) on failure.
    pub fn load(&mut self, source: &Path, gain: f32, muted: bool) -> bool {
        if self.loaded {
            self.unload();
        }

        self.gain = gain.clamp(0.0, 1.0);
        self.muted = muted;

        let gain = self.effective_gain();
        let started = self.transport.open(source).and_then(|()| {
            self.transport.set_volume(gain);
            self.transport.play_looped()
        });

        match started {
            Ok(()) => {
                self.loaded = true;
                log::info!(
                    "Audio loaded: {} (volume {:.0}%{})",
                    source.display(),
                    self.gain * 100.0,
                    if self.muted { ", muted" } else { "" }
                );
                true
            }
            Err(e) => {
                log::error!("Failed to load audio {}: {:#}", source.display(), e);
                self.transport.stop();
                false
            }
        }
    }

    /// Set the gain (clamped to 0.0-1.0). Stored even when nothing is loaded.
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, 1.0);
        self.apply_volume();
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.apply_volume();
    }

    fn apply_volume(&mut self) {
        if self.loaded {
            let gain = self.effective_gain();
            self.transport.set_volume(gain);
        }
    }

    /// Jump to the start of the track; no-op when unloaded
    pub fn rewind(&mut self) {
        if !self.loaded {
            return;
        }
        if let Err(e) = self.transport.rewind() {
            log::warn!("Failed to rewind audio: {}", e);
        }
    }

    pub fn unload(&mut self) {
        if self.loaded {
            self.transport.stop();
            self.loaded = false;
            log::info!("Audio unloaded");
        }
    }

    pub fn poll(&mut self) {
        if self.loaded {
            self.transport.poll();
        }
    }

    pub fn effective_gain(&self) -> f64 {
        if self.muted { 0.0 } else { f64::from(self.gain) }
    }

    pub fn is_playing(&self) -> bool {
        self.loaded && self.transport.is_playing()
    }

    pub fn state(&self) -> AudioState {
        AudioState {
            loaded: self.loaded,
            gain: self.gain,
            muted: self.muted,
        }
    }
}

impl Drop for AudioSync {
    fn drop(&mut self) {
        self.unload();
    }
}

/// Audio transport for the compiled-in backend
#[cfg(feature = "video")]
pub fn default_transport() -> Box<dyn AudioTransport> {
    Box::new(gst_transport::GstAudioTransport::new())
}

/// Stub when video feature is disabled
#[cfg(not(feature = "video"))]
pub fn default_transport() -> Box<dyn AudioTransport> {
    Box::new(UnavailableTransport)
}

#[cfg(not(feature = "video"))]
struct UnavailableTransport;

#[cfg(not(feature = "video"))]
impl AudioTransport for UnavailableTransport {
    fn open(&mut self, _source: &Path) -> Result<()> {
        anyhow::bail!("Audio support not compiled in")
    }

    fn play_looped(&mut self) -> Result<()> {
        anyhow::bail!("Audio support not compiled in")
    }

    fn set_volume(&mut self, _gain: f64) {}

    fn rewind(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn is_playing(&self) -> bool {
        false
    }

    fn poll(&mut self) {}
}
