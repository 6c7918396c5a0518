//! Decoded frames with multi-format pixel buffers (U8, F16, F32)
//!
//! Different formats decode to different pixel representations:
//! - PNG/JPEG/TIFF/TGA: 8-bit RGBA (u8)
//! - 16-bit integer images and EXR HALF: 16-bit float (half::f16)
//! - EXR FLOAT / HDR: 32-bit float (f32)
//!
//! An `Image` is immutable once decoded. Pixels sit behind an `Arc`, so the
//! cache, the orchestrator and every waiter on a coalesced request share one
//! buffer; cloning an `Image` never copies pixels.

use half::f16 as F16;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::frame_cache::Weighted;

/// Pixel storage for one RGBA frame
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    U8(Vec<u8>),   // LDR formats - 8-bit per channel
    F16(Vec<F16>), // half-precision HDR - 16-bit float per channel
    F32(Vec<f32>), // full-precision HDR - 32-bit float per channel
}

impl PixelBuffer {
    /// Memory size in bytes
    pub fn mem(&self) -> usize {
        match self {
            PixelBuffer::U8(vec) => vec.len(),
            PixelBuffer::F16(vec) => vec.len() * 2,
            PixelBuffer::F32(vec) => vec.len() * 4,
        }
    }

    pub fn format(&self) -> PixelFormat {
        match self {
            PixelBuffer::U8(_) => PixelFormat::Rgba8,
            PixelBuffer::F16(_) => PixelFormat::RgbaF16,
            PixelBuffer::F32(_) => PixelFormat::RgbaF32,
        }
    }
}

/// Pixel format type
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum PixelFormat {
    Rgba8,
    RgbaF16,
    RgbaF32,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::RgbaF16 => 8,
            PixelFormat::RgbaF32 => 16,
        }
    }
}

/// Header information read without decoding pixels
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ImageInfo {
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
}

impl ImageInfo {
    /// Bytes a decoded frame of this shape will occupy
    pub fn mem(&self) -> usize {
        self.width * self.height * self.format.bytes_per_pixel()
    }
}

/// A decoded frame
#[derive(Debug, Clone)]
pub struct Image {
    buffer: Arc<PixelBuffer>,
    width: usize,
    height: usize,
    source: Option<PathBuf>,
}

impl Image {
    pub fn new(buffer: PixelBuffer, width: usize, height: usize) -> Self {
        Self {
            buffer: Arc::new(buffer),
            width,
            height,
            source: None,
        }
    }

    /// 8-bit RGBA image of the given size filled with one color
    pub fn solid(width: usize, height: usize, rgba: [u8; 4]) -> Self {
        let mut pixels = vec![0u8; width * height * 4];
        for px in pixels.chunks_mut(4) {
            px.copy_from_slice(&rgba);
        }
        Self::new(PixelBuffer::U8(pixels), width, height)
    }

    /// Record the file this image was decoded from
    pub fn with_source(mut self, path: impl AsRef<Path>) -> Self {
        self.source = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.buffer.format()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resolution(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn info(&self) -> ImageInfo {
        ImageInfo {
            width: self.width,
            height: self.height,
            format: self.pixel_format(),
        }
    }

    /// Memory size in bytes
    pub fn mem(&self) -> usize {
        self.buffer.mem()
    }

    /// Two images share the same pixel allocation
    pub fn shares_pixels(&self, other: &Image) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }
}

impl Weighted for Image {
    fn weight(&self) -> usize {
        self.mem()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_per_format() {
        assert_eq!(PixelBuffer::U8(vec![0; 16]).mem(), 16);
        assert_eq!(PixelBuffer::F16(vec![F16::ZERO; 16]).mem(), 32);
        assert_eq!(PixelBuffer::F32(vec![0.0; 16]).mem(), 64);
    }

    #[test]
    fn test_solid_image() {
        let img = Image::solid(4, 2, [0, 100, 0, 255]);
        assert_eq!(img.resolution(), (4, 2));
        assert_eq!(img.mem(), 4 * 2 * 4);
        assert_eq!(img.pixel_format(), PixelFormat::Rgba8);
        assert_eq!(img.info().mem(), img.mem());
        match img.buffer() {
            PixelBuffer::U8(px) => assert_eq!(&px[4..8], &[0, 100, 0, 255]),
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_clone_shares_pixels() {
        let img = Image::solid(8, 8, [1, 2, 3, 4]).with_source("a.0001.png");
        let copy = img.clone();
        assert!(img.shares_pixels(&copy));
        assert_eq!(copy.source(), Some(Path::new("a.0001.png")));
        assert!(!img.shares_pixels(&Image::solid(8, 8, [1, 2, 3, 4])));
    }
}
