//! V4L2 capture through `nokhwa`.
//!
//! Devices are addressed by their `/dev/videoN` path as reported by
//! discovery. Frames are decoded to packed RGB on read.

use super::{CaptureBackend, CaptureConfig, CaptureDevice, CaptureError, Frame, PixelFormat};
use nokhwa::pixel_format::{LumaFormat, RgbFormat};
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;

/// Opens V4L2 devices with `nokhwa`'s native input backend.
#[derive(Debug, Default)]
pub struct NokhwaBackend;

impl NokhwaBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Maps `/dev/video3` (or a bare `3`) to the V4L2 index nokhwa expects.
pub(crate) fn device_index(path: &str) -> Option<u32> {
    let trimmed = path.trim();
    let digits = trimmed.strip_prefix("/dev/video").unwrap_or(trimmed);
    digits.parse().ok()
}

impl CaptureBackend for NokhwaBackend {
    fn open(
        &self,
        path: &str,
        config: &CaptureConfig,
    ) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        config
            .validate()
            .map_err(|e| CaptureError::ConfigFailed(e.to_string()))?;

        let index =
            device_index(path).ok_or_else(|| CaptureError::DeviceNotFound(path.to_string()))?;

        // Closest match to the requested mode; MJPEG keeps USB bandwidth low.
        let wanted = CameraFormat::new(
            Resolution::new(config.width, config.height),
            FrameFormat::MJPEG,
            config.device_fps,
        );
        let requested = if config.grayscale {
            RequestedFormat::new::<LumaFormat>(RequestedFormatType::Closest(wanted))
        } else {
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(wanted))
        };

        let mut camera = Camera::new(CameraIndex::Index(index), requested)
            .map_err(|e| CaptureError::OpenFailed(format!("{path}: {e}")))?;
        camera
            .open_stream()
            .map_err(|e| CaptureError::OpenFailed(format!("{path}: {e}")))?;

        tracing::info!(
            path,
            format = ?camera.camera_format(),
            "Opened capture device"
        );

        Ok(Box::new(NokhwaDevice {
            path: path.to_string(),
            camera: Some(camera),
            grayscale: config.grayscale,
            sequence: 0,
        }))
    }

    fn name(&self) -> &'static str {
        "nokhwa"
    }
}

/// An open `nokhwa` camera stream.
pub struct NokhwaDevice {
    path: String,
    camera: Option<Camera>,
    grayscale: bool,
    sequence: u64,
}

impl CaptureDevice for NokhwaDevice {
    fn read(&mut self) -> Result<Frame, CaptureError> {
        let camera = self.camera.as_mut().ok_or(CaptureError::Released)?;
        let buffer = camera
            .frame()
            .map_err(|e| CaptureError::ReadFailed(e.to_string()))?;
        self.sequence += 1;

        // Only dimensions and raw bytes cross over; nokhwa pins its own `image` version.
        let frame = if self.grayscale {
            let decoded = buffer
                .decode_image::<LumaFormat>()
                .map_err(|e| CaptureError::ReadFailed(e.to_string()))?;
            let (width, height) = (decoded.width(), decoded.height());
            Frame::new(decoded.into_raw(), width, height, PixelFormat::Gray8, self.sequence)
        } else {
            let decoded = buffer
                .decode_image::<RgbFormat>()
                .map_err(|e| CaptureError::ReadFailed(e.to_string()))?;
            let (width, height) = (decoded.width(), decoded.height());
            Frame::new(decoded.into_raw(), width, height, PixelFormat::Rgb8, self.sequence)
        };
        Ok(frame)
    }

    fn is_open(&self) -> bool {
        self.camera.is_some()
    }

    fn release(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                tracing::warn!(path = %self.path, error = %e, "Failed to stop capture stream");
            }
            tracing::info!(path = %self.path, frames = self.sequence, "Released capture device");
        }
    }
}

impl Drop for NokhwaDevice {
    fn drop(&mut self) {
        self.release();
    }
}
