//! Camera directory and session gatekeeper.
//!
//! The registry is built once from device discovery and owns every
//! [`Camera`] for the rest of the process. All session transitions go
//! through it; streaming loops only read the live configuration.

mod camera;
mod session;

pub use camera::{Camera, CameraStatus, DEFAULT_FPS, DEFAULT_QUALITY, MAX_QUALITY};
pub use session::{CaptureHandle, Session};

use crate::capture::{CaptureBackend, CaptureConfig};
use crate::discovery::{DeviceEntry, DeviceEnumerator};
use crate::metrics::StreamMetrics;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Failures of registry operations. Each is scoped to one request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("camera not found: {0}")]
    CameraNotFound(String),
    #[error("camera {0} is already streaming")]
    AlreadyStreaming(String),
    #[error("camera {0} is not streaming")]
    NotStreaming(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("camera {name} is unavailable: {reason}")]
    DeviceUnavailable { name: String, reason: String },
}

/// Settings applied to every camera the registry creates.
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    pub default_fps: u32,
    pub default_quality: u8,
    /// Requested from the device on every open.
    pub capture: CaptureConfig,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            default_fps: DEFAULT_FPS,
            default_quality: DEFAULT_QUALITY,
            capture: CaptureConfig::default(),
        }
    }
}

/// Authoritative set of cameras and their session state.
pub struct CameraRegistry {
    /// Discovery order.
    cameras: Vec<Arc<Camera>>,
    backend: Arc<dyn CaptureBackend>,
    capture: CaptureConfig,
    metrics: Option<Arc<StreamMetrics>>,
}

impl CameraRegistry {
    /// Enumerates devices and builds the registry.
    ///
    /// Enumeration failure is not fatal: the registry starts empty.
    pub fn discover(
        enumerator: &dyn DeviceEnumerator,
        backend: Arc<dyn CaptureBackend>,
        options: RegistryOptions,
    ) -> Self {
        let devices = match enumerator.enumerate() {
            Ok(devices) => devices,
            Err(e) => {
                tracing::warn!(
                    enumerator = enumerator.name(),
                    error = %e,
                    "Device enumeration failed, starting with no cameras"
                );
                Vec::new()
            }
        };
        Self::from_devices(devices, backend, options)
    }

    /// Builds the registry from an already enumerated device list.
    ///
    /// Repeated names get a ` (2)`, ` (3)`, ... suffix in listing order.
    pub fn from_devices(
        devices: Vec<DeviceEntry>,
        backend: Arc<dyn CaptureBackend>,
        options: RegistryOptions,
    ) -> Self {
        let mut taken = HashSet::new();
        let mut cameras = Vec::with_capacity(devices.len());

        for device in devices {
            let name = unique_name(&device.name, &taken);
            if name != device.name {
                tracing::warn!(device = %device.name, renamed = %name, "Duplicate camera name");
            }
            taken.insert(name.clone());

            tracing::info!(camera = %name, path = %device.path, "Registered camera");
            cameras.push(Arc::new(Camera::new(
                name,
                device.path,
                options.default_fps,
                options.default_quality,
            )));
        }

        tracing::info!(
            count = cameras.len(),
            backend = backend.name(),
            "Camera registry ready"
        );

        Self {
            cameras,
            backend,
            capture: options.capture,
            metrics: None,
        }
    }

    /// Records session and pipeline activity into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<StreamMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn metrics(&self) -> Option<&Arc<StreamMetrics>> {
        self.metrics.as_ref()
    }

    /// Number of discovered cameras.
    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<Camera>, SessionError> {
        self.cameras
            .iter()
            .find(|camera| camera.name() == name)
            .cloned()
            .ok_or_else(|| SessionError::CameraNotFound(name.to_string()))
    }

    pub fn is_running(&self, name: &str) -> Result<bool, SessionError> {
        Ok(self.lookup(name)?.is_running())
    }

    /// Names of idle cameras, in discovery order.
    pub fn list_available(&self) -> Vec<String> {
        self.cameras
            .iter()
            .filter(|camera| !camera.is_running())
            .map(|camera| camera.name().to_string())
            .collect()
    }

    pub fn target_fps(&self, name: &str) -> Result<u32, SessionError> {
        Ok(self.lookup(name)?.target_fps())
    }

    pub fn encoding_quality(&self, name: &str) -> Result<u8, SessionError> {
        Ok(self.lookup(name)?.encoding_quality())
    }

    pub fn status(&self, name: &str) -> Result<CameraStatus, SessionError> {
        Ok(self.lookup(name)?.status())
    }

    /// Status of every camera, in discovery order.
    pub fn statuses(&self) -> Vec<CameraStatus> {
        self.cameras.iter().map(|camera| camera.status()).collect()
    }

    /// Sets the emission rate. Applies to a running stream on its next frame.
    pub fn set_fps(&self, name: &str, fps: i64) -> Result<(), SessionError> {
        let camera = self.lookup(name)?;
        let fps = u32::try_from(fps)
            .ok()
            .filter(|fps| *fps > 0)
            .ok_or_else(|| {
                SessionError::InvalidArgument(format!("fps must be positive, got {fps}"))
            })?;

        camera.store_fps(fps);
        tracing::info!(camera = %name, fps, "Target fps updated");
        Ok(())
    }

    /// Sets the JPEG quality. Applies to a running stream on its next frame.
    pub fn set_encoding_quality(&self, name: &str, quality: i64) -> Result<(), SessionError> {
        let camera = self.lookup(name)?;
        let quality = u8::try_from(quality)
            .ok()
            .filter(|quality| *quality <= MAX_QUALITY)
            .ok_or_else(|| {
                SessionError::InvalidArgument(format!(
                    "encoding quality must be within 0..={MAX_QUALITY}, got {quality}"
                ))
            })?;

        camera.store_quality(quality);
        tracing::info!(camera = %name, quality, "Encoding quality updated");
        Ok(())
    }

    /// Reserves the camera and opens its device.
    ///
    /// The reservation is taken before the device is opened, so two
    /// concurrent calls can never both open it. If the open fails the
    /// reservation is rolled back.
    pub fn begin_session(&self, name: &str) -> Result<CaptureHandle, SessionError> {
        let camera = self.lookup(name)?;
        let generation = camera
            .try_reserve()
            .ok_or_else(|| SessionError::AlreadyStreaming(name.to_string()))?;
        let session = Session::new(Arc::clone(&camera), generation, self.metrics.clone());

        match self.backend.open(camera.device_path(), &self.capture) {
            Ok(device) => {
                if let Some(metrics) = &self.metrics {
                    metrics.session_started(name);
                }
                tracing::info!(camera = %name, backend = self.backend.name(), "Session started");
                Ok(CaptureHandle { session, device })
            }
            Err(e) => {
                tracing::warn!(camera = %name, error = %e, "Failed to open capture device");
                // Dropping the guard rolls the reservation back
                drop(session);
                Err(SessionError::DeviceUnavailable {
                    name: name.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Ends the running session. Its stream stops before the next frame.
    pub fn end_session(&self, name: &str) -> Result<(), SessionError> {
        let camera = self.lookup(name)?;
        if !camera.stop() {
            return Err(SessionError::NotStreaming(name.to_string()));
        }
        if let Some(metrics) = &self.metrics {
            metrics.session_ended();
        }
        tracing::info!(camera = %name, "Session ended");
        Ok(())
    }

    /// Ends every running session. Returns how many were ended.
    pub fn end_all_sessions(&self) -> usize {
        self.cameras
            .iter()
            .filter(|camera| camera.is_running())
            .filter(|camera| self.end_session(camera.name()).is_ok())
            .count()
    }
}

impl std::fmt::Debug for CameraRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraRegistry")
            .field("cameras", &self.cameras)
            .field("backend", &self.backend.name())
            .finish()
    }
}

fn unique_name(name: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }
    (2..)
        .map(|n| format!("{name} ({n})"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}
