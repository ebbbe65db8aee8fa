use crate::video::frame::{Frame, PixelFormat};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Size of the framebuffer header: magic, width, height, sequence
pub const HEADER_LEN: usize = 16;

/// Magic bytes at the start of the framebuffer file
pub const MAGIC: &[u8; 4] = b"LWFB";

/// Where rendered frames end up
pub trait RenderSurface: Send {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn pixel_format(&self) -> PixelFormat;

    /// Display a frame already converted to the surface size and format
    fn present(&mut self, frame: &Frame) -> anyhow::Result<()>;
}

/// Shared-memory framebuffer file a compositor-side shim maps and displays
///
/// Layout: 16-byte header (`LWFB`, width, height, sequence as little-endian
/// u32s) followed by tightly packed pixel rows. The sequence number is
/// bumped after the pixels are written, so readers can detect new frames.
pub struct MappedSurface {
    path: PathBuf,
    mmap: memmap2::MmapMut,
    width: u32,
    height: u32,
    format: PixelFormat,
    sequence: u32,
}

impl MappedSurface {
    pub fn create(
        path: impl AsRef<Path>,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let size = HEADER_LEN + width as usize * height as usize * PixelFormat::BYTES_PER_PIXEL;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size as u64)?;

        // Memory map the file
        let mmap = unsafe { memmap2::MmapMut::map_mut(&file)? };

        let mut surface = Self {
            path: path.to_path_buf(),
            mmap,
            width,
            height,
            format,
            sequence: 0,
        };
        surface.mmap[0..4].copy_from_slice(MAGIC);
        surface.mmap[4..8].copy_from_slice(&width.to_le_bytes());
        surface.mmap[8..12].copy_from_slice(&height.to_le_bytes());
        surface.fill_color(0, 0, 0, 255);

        log::info!(
            "Render surface {}x{} ({:?}) at {}",
            width,
            height,
            format,
            path.display()
        );
        Ok(surface)
    }

    pub fn fill_color(&mut self, r: u8, g: u8, b: u8, a: u8) {
        let color = match self.format {
            PixelFormat::Bgra => [b, g, r, a],
            PixelFormat::Rgba => [r, g, b, a],
        };

        for chunk in self.mmap[HEADER_LEN..].chunks_exact_mut(4) {
            chunk.copy_from_slice(&color);
        }
        self.bump_sequence();
    }

    fn bump_sequence(&mut self) {
        self.sequence = self.sequence.wrapping_add(1);
        self.mmap[12..16].copy_from_slice(&self.sequence.to_le_bytes());
    }
}

impl RenderSurface for MappedSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn present(&mut self, frame: &Frame) -> anyhow::Result<()> {
        let pixels = &mut self.mmap[HEADER_LEN..];
        if frame.data.len() != pixels.len() || frame.format != self.format {
            anyhow::bail!(
                "Frame mismatch: expected {} bytes of {:?}, got {} bytes of {:?}",
                pixels.len(),
                self.format,
                frame.data.len(),
                frame.format
            );
        }

        pixels.copy_from_slice(&frame.data);
        self.bump_sequence();
        Ok(())
    }
}

impl Drop for MappedSurface {
    fn drop(&mut self) {
        if let Err(e) = self.mmap.flush() {
            log::warn!("Failed to flush framebuffer {}: {}", self.path.display(), e);
        }
    }
}
