//! Capture capability consumed by the session manager.
//!
//! A [`CaptureBackend`] opens devices by path and hands back a
//! [`CaptureDevice`] handle that yields raw frames until it is released.
//! Real hardware and synthetic sources both sit behind these traits.

use super::{CaptureConfig, Frame};
use thiserror::Error;

/// Errors that can occur during capture operations.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture device not found: {0}")]
    DeviceNotFound(String),
    #[error("failed to open capture device: {0}")]
    OpenFailed(String),
    #[error("failed to configure capture device: {0}")]
    ConfigFailed(String),
    #[error("failed to read frame: {0}")]
    ReadFailed(String),
    #[error("capture device already released")]
    Released,
}

/// An open capture handle.
///
/// Handles are not required to be `Send`: the streamer opens, reads and
/// releases a handle on a single worker thread.
pub trait CaptureDevice {
    /// Reads the next frame, blocking on device I/O.
    fn read(&mut self) -> Result<Frame, CaptureError>;

    /// Checks if the handle can still be read.
    fn is_open(&self) -> bool;

    /// Releases the underlying device. Calling it more than once is a no-op.
    fn release(&mut self);
}

/// Opens capture handles for device paths.
pub trait CaptureBackend: Send + Sync {
    /// Opens the device at `path`, requesting the given configuration.
    fn open(
        &self,
        path: &str,
        config: &CaptureConfig,
    ) -> Result<Box<dyn CaptureDevice>, CaptureError>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}
