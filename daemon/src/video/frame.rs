//! Decoded frame data and conversion for display
//!
//! This module manages video frame data, including:
//! - The decoded pixel buffer handed from the capture thread to the renderer
//! - Colour order conversion (BGRA <-> RGBA)
//! - Scaling to the render surface size

use anyhow::{Context, Result};
use rayon::prelude::*;

/// Byte order of a 32-bit pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// B, G, R, A (ARGB8888 on little-endian)
    Bgra,
    /// R, G, B, A
    Rgba,
}

impl PixelFormat {
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bgra" | "argb8888" => Some(PixelFormat::Bgra),
            "rgba" => Some(PixelFormat::Rgba),
            _ => None,
        }
    }
}

/// A decoded video frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Tightly packed pixel rows
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Stream frame index counted from the start of the current loop
    pub position: u64,
    /// Number of loop restarts the capture thread had done when this frame was decoded
    pub loop_generation: u64,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            format,
            position: 0,
            loop_generation: 0,
        }
    }

    /// Expected buffer length for the frame dimensions
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * PixelFormat::BYTES_PER_PIXEL
    }

    pub fn is_well_formed(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.expected_len()
    }

    /// Swap the red and blue channels in place if the target order differs
    pub fn convert_to(mut self, format: PixelFormat) -> Self {
        if self.format != format {
            swap_red_blue(&mut self.data);
            self.format = format;
        }
        self
    }
}

/// Swap bytes 0 and 2 of every pixel (BGRA <-> RGBA)
fn swap_red_blue(data: &mut [u8]) {
    data.par_chunks_exact_mut(PixelFormat::BYTES_PER_PIXEL)
        .for_each(|px| px.swap(0, 2));
}

/// Converts decoded frames into the render surface's size and colour order
pub struct FrameConverter {
    resizer: fast_image_resize::Resizer,
}

impl FrameConverter {
    pub fn new() -> Self {
        Self {
            resizer: fast_image_resize::Resizer::new(),
        }
    }

    /// Convert colour order and scale a frame to the surface dimensions
    pub fn prepare(
        &mut self,
        frame: Frame,
        target_width: u32,
        target_height: u32,
        target_format: PixelFormat,
    ) -> Result<Frame> {
        if !frame.is_well_formed() {
            anyhow::bail!(
                "Malformed frame: {}x{} with {} bytes (expected {})",
                frame.width,
                frame.height,
                frame.data.len(),
                frame.expected_len()
            );
        }

        let frame = frame.convert_to(target_format);
        if frame.width == target_width && frame.height == target_height {
            return Ok(frame);
        }

        self.resize(frame, target_width, target_height)
    }

    fn resize(&mut self, frame: Frame, target_width: u32, target_height: u32) -> Result<Frame> {
        use fast_image_resize as fr;

        let Frame {
            data,
            width,
            height,
            format,
            position,
            loop_generation,
        } = frame;

        let src = fr::images::Image::from_vec_u8(width, height, data, fr::PixelType::U8x4)
            .context("Failed to create source image")?;

        let mut dst = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

        // Video frames are opaque, bilinear is plenty at wallpaper scale
        self.resizer
            .resize(
                &src,
                &mut dst,
                &fr::ResizeOptions::new()
                    .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
            )
            .context("Failed to resize frame")?;

        Ok(Frame {
            data: dst.into_vec(),
            width: target_width,
            height: target_height,
            format,
            position,
            loop_generation,
        })
    }
}

impl Default for FrameConverter {
    fn default() -> Self {
        Self::new()
    }
}
