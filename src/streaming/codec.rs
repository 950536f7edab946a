//! Image codec capability.

use crate::capture::{Frame, PixelFormat};
use image::ExtendedColorType;
use thiserror::Error;

/// Errors that can occur while encoding a frame.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("frame buffer does not match its dimensions ({width}x{height}, {len} bytes)")]
    InvalidFrame { width: u32, height: u32, len: usize },
    #[error("jpeg encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Compresses raw frames for the wire.
pub trait FrameEncoder: Send + Sync {
    /// Encodes `frame` at `quality` (0-100, 100 = least compression).
    fn encode(&self, frame: &Frame, quality: u8) -> Result<Vec<u8>, EncodeError>;
}

/// Baseline JPEG encoder backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegEncoder;

impl JpegEncoder {
    /// Lowest quality the underlying encoder accepts.
    pub const MIN_QUALITY: u8 = 1;

    pub fn new() -> Self {
        Self
    }
}

impl FrameEncoder for JpegEncoder {
    fn encode(&self, frame: &Frame, quality: u8) -> Result<Vec<u8>, EncodeError> {
        if !frame.is_valid() {
            return Err(EncodeError::InvalidFrame {
                width: frame.width(),
                height: frame.height(),
                len: frame.pixels().len(),
            });
        }

        let color = match frame.format() {
            PixelFormat::Gray8 => ExtendedColorType::L8,
            PixelFormat::Rgb8 => ExtendedColorType::Rgb8,
        };
        let quality = quality.clamp(Self::MIN_QUALITY, 100);

        let mut jpeg = Vec::with_capacity(frame.pixels().len() / 8);
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, quality).encode(
            frame.pixels(),
            frame.width(),
            frame.height(),
            color,
        )?;
        Ok(jpeg)
    }
}
