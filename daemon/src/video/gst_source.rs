//! GStreamer decoder backing [`VideoSource`]
//!
//! The pipeline decodes any container GStreamer can demux and converts to
//! BGRA before the appsink:
//!
//! `filesrc ! decodebin ! videoconvert ! video/x-raw,format=BGRA ! appsink`
//!
//! The appsink runs in pull mode with `sync=false`, so the capture thread
//! drives decoding at its own pace and a small `max-buffers` bound provides
//! backpressure inside GStreamer.

use super::frame::{Frame, PixelFormat};
use super::source::{DecodeError, StreamInfo, VideoSource, validate_native_fps};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// How long to wait for a decoded sample before treating the pull as failed
const PULL_TIMEOUT: gst::ClockTime = gst::ClockTime::from_mseconds(500);

/// How long to wait for the pipeline to preroll when opening
const PREROLL_TIMEOUT: gst::ClockTime = gst::ClockTime::from_seconds(5);

/// Initialize GStreamer (idempotent, safe to call multiple times)
pub fn initialize_gstreamer() -> Result<(), String> {
    static GSTREAMER_INIT: OnceLock<Result<(), String>> = OnceLock::new();

    GSTREAMER_INIT
        .get_or_init(|| {
            gst::init().map_err(|e| e.to_string())?;
            log::info!("GStreamer initialized");
            Ok(())
        })
        .clone()
}

pub struct GstVideoSource {
    path: PathBuf,
    pipeline: gst::Pipeline,
    app_sink: gst_app::AppSink,
    info: StreamInfo,
}

impl GstVideoSource {
    /// Open a video file and probe its stream metadata
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DecodeError> {
        let path = path.as_ref();
        let open_failed = |reason: String| DecodeError::OpenFailed {
            path: path.to_path_buf(),
            reason,
        };

        if !path.is_file() {
            return Err(open_failed("file does not exist".into()));
        }

        initialize_gstreamer().map_err(open_failed)?;
        log::info!("Opening video: {}", path.display());

        let (pipeline, app_sink) = build_pipeline(path).map_err(open_failed)?;
        let info = match preroll(&pipeline, &app_sink) {
            Ok(info) => info,
            Err(reason) => {
                let _ = pipeline.set_state(gst::State::Null);
                return Err(open_failed(reason));
            }
        };

        log::info!(
            "Video opened: {}x{} @ {:.2} fps, {} frames ({:.1}s)",
            info.width,
            info.height,
            info.native_fps,
            info.frame_count,
            info.duration().as_secs_f64()
        );

        Ok(Self {
            path: path.to_path_buf(),
            pipeline,
            app_sink,
            info,
        })
    }

    /// Pop pending bus messages and return the first error, if any
    fn take_bus_error(&self) -> Option<String> {
        let bus = self.pipeline.bus()?;
        while let Some(msg) = bus.pop() {
            if let gst::MessageView::Error(err) = msg.view() {
                return Some(format!(
                    "{} ({})",
                    err.error(),
                    err.debug().map(|d| d.to_string()).unwrap_or_default()
                ));
            }
        }
        None
    }
}

impl VideoSource for GstVideoSource {
    fn info(&self) -> StreamInfo {
        self.info
    }

    fn grab(&mut self) -> bool {
        // The decoder still runs, but the sample is released without being copied out
        self.app_sink.try_pull_sample(PULL_TIMEOUT).is_some()
    }

    fn decode_next(&mut self) -> Result<Frame, DecodeError> {
        match self.app_sink.try_pull_sample(PULL_TIMEOUT) {
            Some(sample) => frame_from_sample(&sample),
            None if self.app_sink.is_eos() => Err(DecodeError::EndOfStream),
            None => match self.take_bus_error() {
                Some(err) => Err(DecodeError::Backend(err)),
                None => Err(DecodeError::DecodeFailed(
                    "timed out waiting for a decoded frame".into(),
                )),
            },
        }
    }

    fn seek_to_start(&mut self) -> Result<(), DecodeError> {
        self.pipeline
            .seek_simple(
                gst::SeekFlags::FLUSH | gst::SeekFlags::KEY_UNIT,
                gst::ClockTime::ZERO,
            )
            .map_err(|e| DecodeError::Backend(format!("seek to start failed: {}", e)))
    }

    fn reinitialize(&mut self) -> bool {
        log::warn!("Reinitializing decoder for {}", self.path.display());
        let _ = self.pipeline.set_state(gst::State::Null);

        let (pipeline, app_sink) = match build_pipeline(&self.path) {
            Ok(parts) => parts,
            Err(e) => {
                log::error!("Failed to rebuild pipeline: {}", e);
                return false;
            }
        };

        match preroll(&pipeline, &app_sink) {
            Ok(info) => {
                self.pipeline = pipeline;
                self.app_sink = app_sink;
                self.info = info;
                true
            }
            Err(e) => {
                log::error!("Failed to restart pipeline: {}", e);
                let _ = pipeline.set_state(gst::State::Null);
                false
            }
        }
    }
}

impl Drop for GstVideoSource {
    fn drop(&mut self) {
        log::debug!("Releasing decoder for {}", self.path.display());
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

fn build_pipeline(path: &Path) -> Result<(gst::Pipeline, gst_app::AppSink), String> {
    let pipeline_str = "filesrc name=src ! decodebin ! videoconvert ! \
                        video/x-raw,format=BGRA ! appsink name=sink";
    log::debug!("GStreamer pipeline: {}", pipeline_str);

    let pipeline = gst::parse::launch(pipeline_str)
        .map_err(|e| format!("failed to create pipeline: {}", e))?
        .dynamic_cast::<gst::Pipeline>()
        .map_err(|_| "pipeline is not a gst::Pipeline".to_string())?;

    // Set the location as a property so paths with spaces need no quoting
    let src = pipeline
        .by_name("src")
        .ok_or_else(|| "filesrc missing from pipeline".to_string())?;
    src.set_property("location", path.to_string_lossy().to_string());

    let app_sink = pipeline
        .by_name("sink")
        .ok_or_else(|| "appsink missing from pipeline".to_string())?
        .dynamic_cast::<gst_app::AppSink>()
        .map_err(|_| "sink is not an AppSink".to_string())?;

    configure_app_sink(&app_sink);
    Ok((pipeline, app_sink))
}

/// Configure AppSink for pull-mode decoding
///
/// - `sync=false`: decode as fast as the capture thread pulls
/// - `max-buffers=2`: keep GStreamer's internal backlog small
/// - `drop=false`: never discard frames the capture thread has not seen
fn configure_app_sink(app_sink: &gst_app::AppSink) {
    app_sink.set_property("emit-signals", false);
    app_sink.set_property("sync", false);
    app_sink.set_property("max-buffers", 2u32);
    app_sink.set_property("drop", false);
}

/// Bring the pipeline to Playing and probe stream metadata from the preroll sample
fn preroll(pipeline: &gst::Pipeline, app_sink: &gst_app::AppSink) -> Result<StreamInfo, String> {
    pipeline
        .set_state(gst::State::Paused)
        .map_err(|e| format!("failed to pause pipeline: {}", e))?;

    let (result, _, _) = pipeline.state(PREROLL_TIMEOUT);
    result.map_err(|e| format!("pipeline failed to preroll: {}", e))?;

    let sample = app_sink
        .try_pull_preroll(PREROLL_TIMEOUT)
        .ok_or_else(|| "no video frames in file".to_string())?;
    let caps = sample
        .caps()
        .ok_or_else(|| "preroll sample has no caps".to_string())?;
    let video_info = gst_video::VideoInfo::from_caps(caps)
        .map_err(|e| format!("unsupported caps: {}", e))?;

    let fps = video_info.fps();
    let reported_fps = if fps.denom() > 0 {
        fps.numer() as f64 / fps.denom() as f64
    } else {
        0.0
    };
    let native_fps = validate_native_fps(reported_fps);

    let frame_count = pipeline
        .query_duration::<gst::ClockTime>()
        .map(|d| (d.nseconds() as f64 / 1e9 * native_fps).round() as u64)
        .unwrap_or(0);

    pipeline
        .set_state(gst::State::Playing)
        .map_err(|e| format!("failed to start pipeline: {}", e))?;

    Ok(StreamInfo {
        native_fps,
        frame_count,
        width: video_info.width(),
        height: video_info.height(),
    })
}

/// Copy a BGRA sample into a tightly packed frame, dropping any row padding
fn frame_from_sample(sample: &gst::Sample) -> Result<Frame, DecodeError> {
    let caps = sample
        .caps()
        .ok_or_else(|| DecodeError::DecodeFailed("sample has no caps".into()))?;
    let info = gst_video::VideoInfo::from_caps(caps)
        .map_err(|e| DecodeError::DecodeFailed(e.to_string()))?;
    let buffer = sample
        .buffer()
        .ok_or_else(|| DecodeError::DecodeFailed("sample has no buffer".into()))?;
    let video_frame = gst_video::VideoFrameRef::from_buffer_ref_readable(buffer, &info)
        .map_err(|e| DecodeError::DecodeFailed(e.to_string()))?;

    let width = info.width();
    let height = info.height();
    let stride = video_frame.plane_stride()[0] as usize;
    let plane = video_frame
        .plane_data(0)
        .map_err(|e| DecodeError::DecodeFailed(e.to_string()))?;

    let row_len = width as usize * PixelFormat::BYTES_PER_PIXEL;
    let mut data = Vec::with_capacity(row_len * height as usize);
    for row in plane.chunks(stride).take(height as usize) {
        let row = row
            .get(..row_len)
            .ok_or_else(|| DecodeError::DecodeFailed("short frame row".into()))?;
        data.extend_from_slice(row);
    }

    Ok(Frame::new(data, width, height, PixelFormat::Bgra))
}
