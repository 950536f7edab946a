//! Synthetic capture devices.
//!
//! Used by the test-suite and by `--mock` mode so the server can run on a
//! machine without cameras.

use super::{CaptureBackend, CaptureConfig, CaptureDevice, CaptureError, Frame, PixelFormat};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Behaviour of the cameras produced by a [`MockBackend`].
#[derive(Debug, Clone, Default)]
pub struct MockSettings {
    /// Native frame spacing. `None` delivers frames as fast as they are read.
    pub frame_interval: Option<Duration>,
    /// Block on each read until the frame is due, like a real device.
    /// Otherwise timestamps are synthetic and reads return immediately.
    pub realtime: bool,
    /// The read with this 1-based index fails, ending the stream.
    pub fail_on_read: Option<u64>,
}

impl MockSettings {
    /// Frames stamped as if the device captured at `fps`, without waiting.
    pub fn simulated_fps(fps: u32) -> Self {
        Self {
            frame_interval: Some(Duration::from_secs(1) / fps.max(1)),
            realtime: false,
            fail_on_read: None,
        }
    }

    /// Reads block to emulate a device capturing at `fps`.
    pub fn realtime_fps(fps: u32) -> Self {
        Self {
            realtime: true,
            ..Self::simulated_fps(fps)
        }
    }

    /// Fails on the given read.
    pub fn failing_on_read(mut self, read: u64) -> Self {
        self.fail_on_read = Some(read);
        self
    }
}

/// Backend producing [`MockCamera`] handles for any path not marked unavailable.
#[derive(Debug, Default)]
pub struct MockBackend {
    settings: MockSettings,
    unavailable: Mutex<HashSet<String>>,
    opens: AtomicU64,
    open_handles: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: MockSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    /// Makes subsequent opens of `path` fail as if the device were busy.
    pub fn set_unavailable(&self, path: &str, unavailable: bool) {
        let mut paths = self.unavailable.lock().unwrap_or_else(|e| e.into_inner());
        if unavailable {
            paths.insert(path.to_string());
        } else {
            paths.remove(path);
        }
    }

    /// Total successful opens.
    pub fn open_count(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }

    /// Handles opened and not yet released.
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }
}

impl CaptureBackend for MockBackend {
    fn open(
        &self,
        path: &str,
        config: &CaptureConfig,
    ) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        config
            .validate()
            .map_err(|e| CaptureError::ConfigFailed(e.to_string()))?;

        let busy = self
            .unavailable
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(path);
        if busy {
            return Err(CaptureError::OpenFailed(format!("{path} is busy")));
        }

        self.opens.fetch_add(1, Ordering::SeqCst);
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(path, "MockCamera opened");

        Ok(Box::new(MockCamera {
            path: path.to_string(),
            config: config.clone(),
            settings: self.settings.clone(),
            sequence: 0,
            started: Instant::now(),
            open_handles: Some(Arc::clone(&self.open_handles)),
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Synthetic camera that generates a moving test pattern.
#[derive(Debug)]
pub struct MockCamera {
    path: String,
    config: CaptureConfig,
    settings: MockSettings,
    sequence: u64,
    started: Instant,
    /// Present until released.
    open_handles: Option<Arc<AtomicUsize>>,
}

impl MockCamera {
    fn pattern(&self) -> (Vec<u8>, PixelFormat) {
        let format = if self.config.grayscale {
            PixelFormat::Gray8
        } else {
            PixelFormat::Rgb8
        };
        let len = (self.config.width * self.config.height) as usize * format.bytes_per_pixel();
        let pixels = (0..len)
            .map(|i| ((i as u64).wrapping_add(self.sequence * 3) % 256) as u8)
            .collect();
        (pixels, format)
    }
}

impl CaptureDevice for MockCamera {
    fn read(&mut self) -> Result<Frame, CaptureError> {
        if self.open_handles.is_none() {
            return Err(CaptureError::Released);
        }

        self.sequence += 1;
        if self.settings.fail_on_read == Some(self.sequence) {
            return Err(CaptureError::ReadFailed(format!(
                "{} disconnected on read {}",
                self.path, self.sequence
            )));
        }

        let (pixels, format) = self.pattern();
        let frame = match self.settings.frame_interval {
            Some(interval) if !self.settings.realtime => Frame::with_timestamp(
                pixels,
                self.config.width,
                self.config.height,
                format,
                self.sequence,
                self.started + interval * self.sequence as u32,
            ),
            Some(interval) => {
                let due = self.started + interval * self.sequence as u32;
                let now = Instant::now();
                if due > now {
                    std::thread::sleep(due - now);
                }
                Frame::new(pixels, self.config.width, self.config.height, format, self.sequence)
            }
            None => {
                Frame::new(pixels, self.config.width, self.config.height, format, self.sequence)
            }
        };
        Ok(frame)
    }

    fn is_open(&self) -> bool {
        self.open_handles.is_some()
    }

    fn release(&mut self) {
        if let Some(handles) = self.open_handles.take() {
            handles.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!(path = %self.path, reads = self.sequence, "MockCamera released");
        }
    }
}

impl Drop for MockCamera {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> CaptureConfig {
        CaptureConfig::with_dimensions(8, 4)
    }

    #[test]
    fn test_mock_camera_lifecycle() {
        let backend = MockBackend::new();
        let mut camera = backend.open("/dev/video0", &small_config()).unwrap();

        assert!(camera.is_open());
        assert_eq!(backend.open_handles(), 1);

        let frame = camera.read().unwrap();
        assert!(frame.is_valid());
        assert_eq!(frame.sequence(), 1);
        assert_eq!(frame.format(), PixelFormat::Rgb8);

        let frame2 = camera.read().unwrap();
        assert_eq!(frame2.sequence(), 2);

        camera.release();
        camera.release();
        assert!(!camera.is_open());
        assert_eq!(backend.open_handles(), 0);
        assert!(matches!(camera.read(), Err(CaptureError::Released)));
    }

    #[test]
    fn test_drop_releases_handle() {
        let backend = MockBackend::new();
        {
            let _camera = backend.open("/dev/video0", &small_config()).unwrap();
            assert_eq!(backend.open_handles(), 1);
        }
        assert_eq!(backend.open_handles(), 0);
        assert_eq!(backend.open_count(), 1);
    }

    #[test]
    fn test_unavailable_path_fails_to_open() {
        let backend = MockBackend::new();
        backend.set_unavailable("/dev/video1", true);

        assert!(matches!(
            backend.open("/dev/video1", &small_config()),
            Err(CaptureError::OpenFailed(_))
        ));
        assert!(backend.open("/dev/video0", &small_config()).is_ok());

        backend.set_unavailable("/dev/video1", false);
        assert!(backend.open("/dev/video1", &small_config()).is_ok());
    }

    #[test]
    fn test_fails_on_configured_read() {
        let backend = MockBackend::with_settings(MockSettings::default().failing_on_read(3));
        let mut camera = backend.open("/dev/video0", &small_config()).unwrap();

        assert!(camera.read().is_ok());
        assert!(camera.read().is_ok());
        assert!(matches!(camera.read(), Err(CaptureError::ReadFailed(_))));
    }

    #[test]
    fn test_simulated_timestamps_are_evenly_spaced() {
        let backend = MockBackend::with_settings(MockSettings::simulated_fps(100));
        let mut camera = backend.open("/dev/video0", &small_config()).unwrap();

        let first = camera.read().unwrap();
        let second = camera.read().unwrap();
        assert_eq!(
            second.timestamp() - first.timestamp(),
            Duration::from_millis(10)
        );
    }

    #[test]
    fn test_realtime_reads_block_until_due() {
        let backend = MockBackend::with_settings(MockSettings::realtime_fps(100));
        let mut camera = backend.open("/dev/video0", &small_config()).unwrap();

        let started = Instant::now();
        for _ in 0..3 {
            camera.read().unwrap();
        }
        assert!(started.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_grayscale_config() {
        let backend = MockBackend::new();
        let config = CaptureConfig {
            grayscale: true,
            ..small_config()
        };
        let mut camera = backend.open("/dev/video0", &config).unwrap();
        let frame = camera.read().unwrap();
        assert_eq!(frame.format(), PixelFormat::Gray8);
        assert!(frame.is_valid());
    }
}
