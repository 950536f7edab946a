//! Scoped session reservations.

use super::Camera;
use crate::capture::CaptureDevice;
use crate::metrics::StreamMetrics;
use std::sync::Arc;

/// Reservation of one camera, created by a successful reserve.
///
/// Dropping the guard ends the session if it is still the current one,
/// so a stream that dies for any reason frees its camera. A session
/// already ended through [`CameraRegistry::end_session`] is left alone,
/// as is any newer session on the same camera.
///
/// [`CameraRegistry::end_session`]: super::CameraRegistry::end_session
pub struct Session {
    camera: Arc<Camera>,
    generation: u64,
    metrics: Option<Arc<StreamMetrics>>,
}

impl Session {
    pub(crate) fn new(
        camera: Arc<Camera>,
        generation: u64,
        metrics: Option<Arc<StreamMetrics>>,
    ) -> Self {
        if let Some(metrics) = &metrics {
            metrics.session_reserved();
        }
        Self {
            camera,
            generation,
            metrics,
        }
    }

    /// Name of the reserved camera.
    pub fn camera_name(&self) -> &str {
        self.camera.name()
    }

    /// The reserved camera, for live reads of rate and quality.
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// False once the session was ended externally.
    pub fn is_active(&self) -> bool {
        self.camera.is_current(self.generation)
    }

    pub(crate) fn metrics(&self) -> Option<&StreamMetrics> {
        self.metrics.as_deref()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.camera.stop_generation(self.generation) {
            tracing::info!(camera = %self.camera.name(), "Session released by stream");
            if let Some(metrics) = &self.metrics {
                metrics.session_ended();
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("camera", &self.camera.name())
            .field("generation", &self.generation)
            .finish()
    }
}

/// An open capture device bound to the session that reserved it.
pub struct CaptureHandle {
    // Field order matters: the device drops before the session guard.
    pub(crate) device: Box<dyn CaptureDevice>,
    pub(crate) session: Session,
}

impl CaptureHandle {
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Splits the handle for callers driving the device directly.
    pub fn into_parts(self) -> (Session, Box<dyn CaptureDevice>) {
        (self.session, self.device)
    }
}

impl std::fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureHandle")
            .field("session", &self.session)
            .field("device_open", &self.device.is_open())
            .finish()
    }
}
