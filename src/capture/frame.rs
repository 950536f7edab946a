//! Raw frame type produced by capture devices.

use std::time::Instant;

/// Memory layout of the pixels in a [`Frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// One byte per pixel, luminance only.
    Gray8,
    /// Three bytes per pixel, packed RGB.
    Rgb8,
}

impl PixelFormat {
    /// Bytes used by a single pixel.
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
        }
    }
}

/// A single uncompressed frame read from a capture device.
///
/// The timestamp is taken when the frame leaves the device and is what
/// the streamer paces emission against.
#[derive(Clone)]
pub struct Frame {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    timestamp: Instant,
    /// Monotonic sequence number within one capture handle.
    sequence: u64,
}

impl Frame {
    /// Creates a frame stamped with the current instant.
    pub fn new(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        sequence: u64,
    ) -> Self {
        Self::with_timestamp(pixels, width, height, format, sequence, Instant::now())
    }

    /// Creates a frame with an explicit capture timestamp.
    pub fn with_timestamp(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        sequence: u64,
        timestamp: Instant,
    ) -> Self {
        Self {
            pixels,
            width,
            height,
            format,
            timestamp,
            sequence,
        }
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Returns the capture timestamp.
    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Number of bytes the pixel buffer should hold for these dimensions.
    #[inline]
    pub fn expected_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * self.format.bytes_per_pixel()
    }

    /// Validates that the pixel buffer size matches dimensions and format.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.pixels.len() == self.expected_len()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("sequence", &self.sequence)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_frame_creation() {
        let frame = Frame::new(vec![0u8; 4 * 2 * 3], 4, 2, PixelFormat::Rgb8, 7);

        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.sequence(), 7);
        assert_eq!(frame.expected_len(), 24);
        assert!(frame.is_valid());
    }

    #[test]
    fn test_frame_invalid_size() {
        // Gray-sized buffer declared as RGB
        let frame = Frame::new(vec![0u8; 4 * 2], 4, 2, PixelFormat::Rgb8, 1);
        assert!(!frame.is_valid());
    }

    #[test]
    fn test_zero_dimensions_invalid() {
        let frame = Frame::new(Vec::new(), 0, 0, PixelFormat::Gray8, 1);
        assert!(!frame.is_valid());
    }
}
