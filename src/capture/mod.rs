//! Camera input and frame handling.
//!
//! This module provides the capture capability the session manager opens
//! devices through, plus the raw frame type the streamer encodes.

mod config;
mod device;
mod frame;
mod mock;
#[cfg(feature = "camera")]
mod nokhwa_backend;

pub use config::{CaptureConfig, CaptureConfigError};
pub use device::{CaptureBackend, CaptureDevice, CaptureError};
pub use frame::{Frame, PixelFormat};
pub use mock::{MockBackend, MockCamera, MockSettings};
#[cfg(feature = "camera")]
pub use nokhwa_backend::{NokhwaBackend, NokhwaDevice};
