//! Camera entity and its session state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Emission rate given to newly discovered cameras.
pub const DEFAULT_FPS: u32 = 30;
/// JPEG quality given to newly discovered cameras.
pub const DEFAULT_QUALITY: u8 = 90;
/// Highest accepted JPEG quality (least compression).
pub const MAX_QUALITY: u8 = 100;

#[derive(Debug, Default)]
struct SessionState {
    running: bool,
    /// Bumped on every successful reservation.
    generation: u64,
    started_at: Option<DateTime<Utc>>,
}

/// One discovered capture device.
///
/// Name and path are fixed at discovery. The rate and quality are read by
/// the streaming loop without locking; only session transitions take the
/// session lock.
#[derive(Debug)]
pub struct Camera {
    name: String,
    device_path: String,
    target_fps: AtomicU32,
    encoding_quality: AtomicU8,
    session: Mutex<SessionState>,
}

impl Camera {
    pub(crate) fn new(name: String, device_path: String, fps: u32, quality: u8) -> Self {
        Self {
            name,
            device_path,
            target_fps: AtomicU32::new(fps.max(1)),
            encoding_quality: AtomicU8::new(quality.min(MAX_QUALITY)),
            session: Mutex::new(SessionState::default()),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path the capture backend opens. Never exposed over HTTP.
    #[inline]
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    #[inline]
    pub fn target_fps(&self) -> u32 {
        self.target_fps.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn encoding_quality(&self) -> u8 {
        self.encoding_quality.load(Ordering::Relaxed)
    }

    pub(crate) fn store_fps(&self, fps: u32) {
        self.target_fps.store(fps, Ordering::Relaxed);
    }

    pub(crate) fn store_quality(&self, quality: u8) {
        self.encoding_quality.store(quality, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.session().running
    }

    fn session(&self) -> MutexGuard<'_, SessionState> {
        // State is two plain fields; a panic elsewhere cannot leave it torn
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Test-and-set on `running`. Returns the new session generation.
    pub(crate) fn try_reserve(&self) -> Option<u64> {
        let mut state = self.session();
        if state.running {
            return None;
        }
        state.running = true;
        state.generation += 1;
        state.started_at = Some(Utc::now());
        Some(state.generation)
    }

    /// Clears `running` regardless of which session set it.
    /// Returns false if the camera was not running.
    pub(crate) fn stop(&self) -> bool {
        let mut state = self.session();
        let was_running = state.running;
        state.running = false;
        state.started_at = None;
        was_running
    }

    /// Clears `running` only if `generation` is still the current session.
    pub(crate) fn stop_generation(&self, generation: u64) -> bool {
        let mut state = self.session();
        if !state.running || state.generation != generation {
            return false;
        }
        state.running = false;
        state.started_at = None;
        true
    }

    /// True while `generation` is the running session.
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        let state = self.session();
        state.running && state.generation == generation
    }

    /// Snapshot of the externally visible state.
    pub fn status(&self) -> CameraStatus {
        let state = self.session();
        CameraStatus {
            name: self.name.clone(),
            running: state.running,
            target_fps: self.target_fps(),
            encoding_quality: self.encoding_quality(),
            session_started_at: state.started_at,
        }
    }
}

/// Serializable view of a camera, as reported by the status routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraStatus {
    pub name: String,
    pub running: bool,
    pub target_fps: u32,
    pub encoding_quality: u8,
    pub session_started_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera::new("cam".into(), "/dev/video0".into(), DEFAULT_FPS, DEFAULT_QUALITY)
    }

    #[test]
    fn test_defaults() {
        let camera = camera();
        assert_eq!(camera.target_fps(), 30);
        assert_eq!(camera.encoding_quality(), 90);
        assert!(!camera.is_running());
        assert_eq!(camera.status().session_started_at, None);
    }

    #[test]
    fn test_out_of_range_construction_values_are_normalized() {
        let camera = Camera::new("cam".into(), "/dev/video0".into(), 0, 250);
        assert_eq!(camera.target_fps(), 1);
        assert_eq!(camera.encoding_quality(), MAX_QUALITY);
    }

    #[test]
    fn test_reserve_is_exclusive() {
        let camera = camera();
        let generation = camera.try_reserve().unwrap();
        assert!(camera.try_reserve().is_none());
        assert!(camera.is_current(generation));
        assert!(camera.status().session_started_at.is_some());
    }

    #[test]
    fn test_stale_generation_cannot_stop_newer_session() {
        let camera = camera();
        let first = camera.try_reserve().unwrap();
        assert!(camera.stop());

        let second = camera.try_reserve().unwrap();
        assert_ne!(first, second);
        assert!(!camera.stop_generation(first));
        assert!(camera.is_running());
        assert!(!camera.is_current(first));

        assert!(camera.stop_generation(second));
        assert!(!camera.is_running());
    }

    #[test]
    fn test_stop_when_idle_reports_false() {
        let camera = camera();
        assert!(!camera.stop());
        assert!(!camera.is_running());
    }
}
