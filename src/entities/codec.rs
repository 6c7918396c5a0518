//! Codecs and per-clip frame readers
//!
//! A codec turns one file into an `Image`. `CodecRegistry` picks the codec by
//! extension. `SequenceReader` binds a codec to a `FileInfo` and reads frames
//! by number; it is the `FrameReader` the orchestrator decodes through.
//!
//! Both codecs go through the `image` crate (EXR via exrs internally):
//! - `StillCodec`: PNG/JPEG/TIFF/TGA/BMP/PNM. 8-bit → U8, 16-bit → F16, float → F32
//! - `ExrCodec`: always RGBA half float

use enum_dispatch::enum_dispatch;
use half::f16 as F16;
use image::{DynamicImage, ImageDecoder, ImageError, ImageReader};
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::orchestrator::FrameReader;
use crate::entities::file_info::{FileInfo, FileType};
use crate::entities::frame::{Image, ImageInfo, PixelBuffer, PixelFormat};
use crate::entities::sequence::Sequence;
use crate::error::DecodeError;

/// Decoder for one family of file formats
#[enum_dispatch]
pub trait Codec {
    fn name(&self) -> &'static str;

    /// Lower-case extensions without the dot
    fn extensions(&self) -> &'static [&'static str];

    /// Dimensions and pixel format without decoding pixels
    fn info(&self, path: &Path) -> Result<ImageInfo, DecodeError>;

    fn read(&self, path: &Path) -> Result<Image, DecodeError>;
}

fn map_image_error(path: &Path, err: ImageError) -> DecodeError {
    match err {
        ImageError::IoError(e) => DecodeError::io(path, &e),
        ImageError::Unsupported(e) => DecodeError::UnsupportedFormat(e.to_string()),
        other => {
            let msg = other.to_string();
            if msg.contains("DWAA") || msg.contains("DWAB") {
                DecodeError::UnsupportedFormat(format!("DWAA/DWAB compression: {}", path.display()))
            } else {
                DecodeError::Image(format!("{}: {}", path.display(), msg))
            }
        }
    }
}

fn open_reader(path: &Path) -> Result<ImageReader<std::io::BufReader<std::fs::File>>, DecodeError> {
    ImageReader::open(path)
        .map_err(|e| DecodeError::io(path, &e))?
        .with_guessed_format()
        .map_err(|e| DecodeError::io(path, &e))
}

fn decode(path: &Path) -> Result<DynamicImage, DecodeError> {
    open_reader(path)?.decode().map_err(|e| map_image_error(path, e))
}

/// 8-bit and 16-bit stills via the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct StillCodec;

impl Codec for StillCodec {
    fn name(&self) -> &'static str {
        "still"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["png", "jpg", "jpeg", "tif", "tiff", "tga", "bmp", "ppm", "pgm", "pnm"]
    }

    fn info(&self, path: &Path) -> Result<ImageInfo, DecodeError> {
        let decoder = open_reader(path)?
            .into_decoder()
            .map_err(|e| map_image_error(path, e))?;
        let (width, height) = decoder.dimensions();
        let format = match decoder.color_type() {
            image::ColorType::L16
            | image::ColorType::La16
            | image::ColorType::Rgb16
            | image::ColorType::Rgba16 => PixelFormat::RgbaF16,
            image::ColorType::Rgb32F | image::ColorType::Rgba32F => PixelFormat::RgbaF32,
            _ => PixelFormat::Rgba8,
        };
        Ok(ImageInfo {
            width: width as usize,
            height: height as usize,
            format,
        })
    }

    fn read(&self, path: &Path) -> Result<Image, DecodeError> {
        debug!("Loading image: {}", path.display());
        let img = decode(path)?;
        let width = img.width() as usize;
        let height = img.height() as usize;

        let buffer = match img {
            DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_)
            | DynamicImage::ImageRgb16(_)
            | DynamicImage::ImageRgba16(_) => {
                // Normalize 0-65535 to 0.0-1.0
                let rgba16 = img.to_rgba16();
                PixelBuffer::F16(
                    rgba16
                        .as_raw()
                        .iter()
                        .map(|&v| F16::from_f32(v as f32 / 65535.0))
                        .collect(),
                )
            }
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
                PixelBuffer::F32(img.to_rgba32f().into_raw())
            }
            _ => PixelBuffer::U8(img.to_rgba8().into_raw()),
        };
        Ok(Image::new(buffer, width, height).with_source(path))
    }
}

/// OpenEXR as RGBA half float
#[derive(Debug, Clone, Copy, Default)]
pub struct ExrCodec;

impl Codec for ExrCodec {
    fn name(&self) -> &'static str {
        "exr"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["exr"]
    }

    fn info(&self, path: &Path) -> Result<ImageInfo, DecodeError> {
        let (width, height) = open_reader(path)?
            .into_dimensions()
            .map_err(|e| map_image_error(path, e))?;
        Ok(ImageInfo {
            width: width as usize,
            height: height as usize,
            format: PixelFormat::RgbaF16,
        })
    }

    fn read(&self, path: &Path) -> Result<Image, DecodeError> {
        debug!("Loading EXR: {}", path.display());
        let img = decode(path)?;
        let width = img.width() as usize;
        let height = img.height() as usize;
        let halfs: Vec<F16> = img
            .to_rgba32f()
            .as_raw()
            .iter()
            .map(|&v| F16::from_f32(v))
            .collect();
        debug!("Loaded EXR: {}x{} (f16)", width, height);
        Ok(Image::new(PixelBuffer::F16(halfs), width, height).with_source(path))
    }
}

/// All built-in codecs
#[enum_dispatch(Codec)]
#[derive(Debug, Clone, Copy)]
pub enum CodecKind {
    Still(StillCodec),
    Exr(ExrCodec),
}

/// Codec lookup by file extension
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    codecs: Vec<CodecKind>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self {
            codecs: vec![CodecKind::Exr(ExrCodec), CodecKind::Still(StillCodec)],
        }
    }
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn codecs(&self) -> &[CodecKind] {
        &self.codecs
    }

    /// Every extension some codec handles
    pub fn extensions(&self) -> Vec<&'static str> {
        self.codecs.iter().flat_map(|c| c.extensions().iter().copied()).collect()
    }

    pub fn for_extension(&self, ext: &str) -> Option<CodecKind> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        self.codecs
            .iter()
            .find(|c| c.extensions().contains(&ext.as_str()))
            .copied()
    }

    pub fn for_path(&self, path: &Path) -> Result<CodecKind, DecodeError> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        self.for_extension(ext)
            .ok_or_else(|| DecodeError::UnsupportedFormat(format!(".{}", ext.to_ascii_lowercase())))
    }
}

/// Open clip: a codec bound to a file or sequence
#[derive(Debug)]
pub struct SequenceReader {
    file: FileInfo,
    frames: Sequence,
    codec: CodecKind,
    info: ImageInfo,
    closed: AtomicBool,
}

impl SequenceReader {
    /// Pick a codec and read the header of the first frame
    pub fn open(file: FileInfo, registry: &CodecRegistry) -> Result<Self, DecodeError> {
        let frames = if file.sequence().is_empty() {
            // Plain file: a single frame numbered 0
            Sequence::from_frames([0], 0)
        } else {
            file.sequence().clone()
        };
        let first = frames.start().unwrap_or(0);
        let probe = Self::path_for(&file, first);
        let codec = registry.for_path(&probe)?;
        let info = codec.info(&probe)?;
        debug!(
            "Opened {} with {} codec: {} frames, {}x{} {:?}",
            file.file_name(None, true),
            codec.name(),
            frames.len(),
            info.width,
            info.height,
            info.format
        );
        Ok(Self {
            file,
            frames,
            codec,
            info,
            closed: AtomicBool::new(false),
        })
    }

    fn path_for(file: &FileInfo, frame: i64) -> PathBuf {
        match file.file_type() {
            FileType::Sequence => file.frame_path(frame),
            _ => file.path(),
        }
    }

    pub fn file(&self) -> &FileInfo {
        &self.file
    }

    pub fn frames(&self) -> &Sequence {
        &self.frames
    }

    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    pub fn codec(&self) -> CodecKind {
        self.codec
    }

    /// Decode one frame
    pub fn read(&self, frame: i64) -> Result<Image, DecodeError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DecodeError::Cancelled(frame));
        }
        if !self.frames.contains(frame) {
            return Err(DecodeError::NoSuchFrame(frame));
        }
        self.codec.read(&Self::path_for(&self.file, frame))
    }

    /// Refuse further reads; decodes already running finish normally
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("Closed {}", self.file.file_name(None, true));
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl FrameReader for SequenceReader {
    fn read(&self, frame: i64) -> Result<Image, DecodeError> {
        SequenceReader::read(self, frame)
    }
}
