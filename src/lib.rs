//! Camera Streamer Library
//!
//! Serves locally attached cameras as rate-limited MJPEG streams over HTTP,
//! with per-camera frame rate and JPEG quality adjustable while streaming.
//!
//! # Architecture
//!
//! ```text
//! discovery → registry ← server (HTTP)
//!                 ↓
//!   capture → streaming → multipart body
//! ```
//!
//! The [`CameraRegistry`] owns every camera and is the only place a
//! session can be started or ended. At most one session runs per camera.
//! A [`FrameStreamer`] reads the camera's live settings on every frame, so
//! changes apply to a running stream without restarting it.
//!
//! # Example
//!
//! ```
//! use camera_streamer::{
//!     CameraRegistry, CaptureConfig, FrameStreamer, JpegEncoder, MockBackend,
//!     RegistryOptions, StaticEnumerator,
//! };
//! use std::sync::Arc;
//!
//! let registry = CameraRegistry::discover(
//!     &StaticEnumerator::mock(1),
//!     Arc::new(MockBackend::new()),
//!     RegistryOptions {
//!         capture: CaptureConfig::with_dimensions(64, 48),
//!         ..Default::default()
//!     },
//! );
//!
//! let handle = registry.begin_session("Mock Camera 0")?;
//! let mut stream = FrameStreamer::new(handle, Arc::new(JpegEncoder::new()));
//!
//! let part = stream.next().unwrap();
//! assert!(part.starts_with(b"--frame\r\n"));
//!
//! registry.end_session("Mock Camera 0")?;
//! assert!(stream.next().is_none());
//! # Ok::<(), camera_streamer::SessionError>(())
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod config;
pub mod discovery;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod streaming;

// Re-export commonly used types at crate root
pub use capture::{CaptureBackend, CaptureConfig, Frame, MockBackend};
pub use config::FileConfig;
pub use discovery::{DeviceEntry, DeviceEnumerator, StaticEnumerator, V4l2CtlEnumerator};
pub use metrics::StreamMetrics;
pub use registry::{CameraRegistry, CameraStatus, RegistryOptions, SessionError};
pub use server::{AppState, StreamServer};
pub use streaming::{FrameStreamer, JpegEncoder, PacingPolicy};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
