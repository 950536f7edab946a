//! Capture device configuration.
//!
//! These settings are requested from the device when a capture handle is
//! opened. Streaming rate and JPEG quality are per-camera runtime values
//! held by the registry, not part of this config.

use serde::{Deserialize, Serialize};

/// Configuration applied when opening a capture device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Requested frame width in pixels.
    pub width: u32,
    /// Requested frame height in pixels.
    pub height: u32,
    /// Native rate requested from the device. Emission is throttled separately.
    pub device_fps: u32,
    /// Capture luminance only.
    pub grayscale: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            device_fps: 30,
            grayscale: false,
        }
    }
}

impl CaptureConfig {
    /// Creates a new configuration with the specified dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), CaptureConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureConfigError::InvalidDimensions);
        }
        if self.device_fps == 0 || self.device_fps > 240 {
            return Err(CaptureConfigError::InvalidFrameRate);
        }
        Ok(())
    }
}

/// Capture configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureConfigError {
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    #[error("invalid device frame rate (must be 1-240 fps)")]
    InvalidFrameRate,
}
