//! GStreamer `playbin` audio transport
//!
//! Gain maps onto playbin's `volume` property. End of stream is handled in
//! [`AudioTransport::poll`] by seeking back to zero, which keeps the track
//! looping without tearing the pipeline down.

use super::AudioTransport;
use crate::video::gst_source::initialize_gstreamer;
use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;
use std::path::Path;

pub struct GstAudioTransport {
    playbin: Option<gst::Element>,
}

impl GstAudioTransport {
    pub fn new() -> Self {
        Self { playbin: None }
    }

    fn playbin(&self) -> Result<&gst::Element> {
        self.playbin.as_ref().context("No audio track loaded")
    }

    fn seek_to_start(playbin: &gst::Element) -> Result<()> {
        playbin
            .seek_simple(
                gst::SeekFlags::FLUSH | gst::SeekFlags::ACCURATE,
                gst::ClockTime::ZERO,
            )
            .context("Failed to seek audio to start")
    }
}

impl Default for GstAudioTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioTransport for GstAudioTransport {
    fn open(&mut self, source: &Path) -> Result<()> {
        self.stop();
        initialize_gstreamer().map_err(|e| anyhow::anyhow!("Failed to initialize GStreamer: {}", e))?;

        let uri = gst::glib::filename_to_uri(source, None)
            .with_context(|| format!("Invalid audio path: {}", source.display()))?;

        let playbin = gst::ElementFactory::make("playbin")
            .name("audio")
            .property("uri", uri.as_str())
            .build()
            .context("Failed to create playbin")?;

        // Audio only, never open a video window for the track
        let fakesink = gst::ElementFactory::make("fakesink")
            .build()
            .context("Failed to create fakesink")?;
        playbin.set_property("video-sink", &fakesink);

        playbin
            .set_state(gst::State::Paused)
            .context("Failed to preroll audio")?;

        self.playbin = Some(playbin);
        Ok(())
    }

    fn play_looped(&mut self) -> Result<()> {
        self.playbin()?
            .set_state(gst::State::Playing)
            .context("Failed to start audio playback")?;
        Ok(())
    }

    fn set_volume(&mut self, gain: f64) {
        if let Some(playbin) = &self.playbin {
            playbin.set_property("volume", gain.clamp(0.0, 1.0));
        }
    }

    fn rewind(&mut self) -> Result<()> {
        Self::seek_to_start(self.playbin()?)
    }

    fn stop(&mut self) {
        if let Some(playbin) = self.playbin.take() {
            let _ = playbin.set_state(gst::State::Null);
        }
    }

    fn is_playing(&self) -> bool {
        self.playbin
            .as_ref()
            .is_some_and(|p| p.current_state() == gst::State::Playing)
    }

    fn poll(&mut self) {
        let Some(playbin) = &self.playbin else {
            return;
        };
        let Some(bus) = playbin.bus() else {
            return;
        };

        while let Some(msg) = bus.pop() {
            match msg.view() {
                gst::MessageView::Eos(..) => {
                    log::debug!("Audio reached end of stream, looping");
                    if let Err(e) = Self::seek_to_start(playbin) {
                        log::warn!("{:#}", e);
                    }
                }
                gst::MessageView::Error(err) => {
                    log::error!(
                        "Audio playback error: {} ({})",
                        err.error(),
                        err.debug().map(|d| d.to_string()).unwrap_or_default()
                    );
                }
                _ => {}
            }
        }
    }
}

impl Drop for GstAudioTransport {
    fn drop(&mut self) {
        self.stop();
    }
}
