//! Paced frame streaming.
//!
//! A [`FrameStreamer`] owns one capture handle and turns it into multipart
//! chunks at the camera's target rate. Rate and quality are re-read from
//! the camera on every iteration, so changes apply to a live stream.

use super::codec::FrameEncoder;
use super::multipart;
use crate::capture::{CaptureDevice, CaptureError};
use crate::registry::{CaptureHandle, Session};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How the streamer trades freshness against device reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacingPolicy {
    /// Read at the device's native rate and drop frames that are not yet
    /// due. Every emitted frame is the newest one available.
    #[default]
    Freshest,
    /// Sleep until the next frame is due, then read. Fewer reads, but the
    /// frame may have sat in the driver queue.
    Throttled,
}

/// Why a stream stopped producing chunks.
#[derive(Debug)]
pub enum StreamEnd {
    /// The session was ended externally.
    Stopped,
    /// The device stopped delivering frames.
    ReadFailed(CaptureError),
}

/// Time between emitted frames at `fps`.
#[inline]
pub fn frame_interval(fps: u32) -> Duration {
    Duration::from_secs(1) / fps.max(1)
}

/// Lazy, unbounded sequence of multipart chunks for one session.
///
/// Iteration blocks on device reads and is meant to run on a dedicated
/// thread. The device is released when the sequence ends or the streamer
/// is dropped, whichever comes first; dropping also ends the session if
/// it is still current.
pub struct FrameStreamer {
    // Field order matters: the session guard drops after the device.
    device: Box<dyn CaptureDevice>,
    session: Session,
    encoder: Arc<dyn FrameEncoder>,
    pacing: PacingPolicy,
    last_emit: Option<Instant>,
    emitted: u64,
    ended: Option<StreamEnd>,
}

impl FrameStreamer {
    pub fn new(handle: CaptureHandle, encoder: Arc<dyn FrameEncoder>) -> Self {
        let (session, device) = handle.into_parts();
        Self {
            device,
            session,
            encoder,
            pacing: PacingPolicy::default(),
            last_emit: None,
            emitted: 0,
            ended: None,
        }
    }

    pub fn with_pacing(mut self, pacing: PacingPolicy) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn camera_name(&self) -> &str {
        self.session.camera_name()
    }

    /// Chunks produced so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Set once the sequence has ended.
    pub fn end_reason(&self) -> Option<&StreamEnd> {
        self.ended.as_ref()
    }

    fn finish(&mut self, reason: StreamEnd) {
        self.device.release();
        tracing::info!(
            camera = %self.session.camera_name(),
            emitted = self.emitted,
            reason = ?reason,
            "Stream ended"
        );
        self.ended = Some(reason);
    }

    /// Sleeps until the next emission is due (throttled pacing only).
    fn wait_until_due(&self, wait: Duration) {
        if let Some(last) = self.last_emit {
            let due = last + wait;
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
        }
    }
}

impl Iterator for FrameStreamer {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        if self.ended.is_some() {
            return None;
        }

        loop {
            if !self.session.is_active() {
                self.finish(StreamEnd::Stopped);
                return None;
            }

            let camera = self.session.camera();
            let wait = frame_interval(camera.target_fps());

            if self.pacing == PacingPolicy::Throttled {
                self.wait_until_due(wait);
            }

            let frame = match self.device.read() {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(camera = %camera.name(), error = %e, "Capture read failed");
                    if let Some(metrics) = self.session.metrics() {
                        metrics.read_failed(camera.name());
                    }
                    self.finish(StreamEnd::ReadFailed(e));
                    return None;
                }
            };

            if let Some(last) = self.last_emit {
                if frame.timestamp().saturating_duration_since(last) <= wait {
                    tracing::trace!(
                        camera = %camera.name(),
                        sequence = frame.sequence(),
                        "Frame not due, discarded"
                    );
                    if let Some(metrics) = self.session.metrics() {
                        metrics.frame_discarded(camera.name());
                    }
                    continue;
                }
            }

            let quality = camera.encoding_quality();
            match self.encoder.encode(&frame, quality) {
                Ok(jpeg) => {
                    self.last_emit = Some(frame.timestamp());
                    self.emitted += 1;
                    if let Some(metrics) = self.session.metrics() {
                        metrics.frame_emitted(camera.name());
                    }
                    tracing::trace!(
                        camera = %camera.name(),
                        sequence = frame.sequence(),
                        bytes = jpeg.len(),
                        quality,
                        "Frame emitted"
                    );
                    return Some(multipart::frame_part(&jpeg));
                }
                Err(e) => {
                    tracing::warn!(
                        camera = %camera.name(),
                        error = %e,
                        "Frame encoding failed, skipping"
                    );
                    if let Some(metrics) = self.session.metrics() {
                        metrics.encode_failed(camera.name());
                    }
                }
            }
        }
    }
}

impl Drop for FrameStreamer {
    fn drop(&mut self) {
        if self.ended.is_none() {
            tracing::debug!(camera = %self.session.camera_name(), "Stream dropped by consumer");
        }
        self.device.release();
    }
}

impl std::fmt::Debug for FrameStreamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameStreamer")
            .field("session", &self.session)
            .field("pacing", &self.pacing)
            .field("emitted", &self.emitted)
            .field("ended", &self.ended)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureConfig, Frame, MockBackend, MockSettings};
    use crate::discovery::DeviceEntry;
    use crate::metrics::StreamMetrics;
    use crate::registry::{CameraRegistry, RegistryOptions};
    use crate::streaming::{EncodeError, JpegEncoder};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Fixture {
        registry: CameraRegistry,
        backend: Arc<MockBackend>,
        metrics: Arc<StreamMetrics>,
    }

    fn fixture(settings: MockSettings) -> Fixture {
        let backend = Arc::new(MockBackend::with_settings(settings));
        let metrics = Arc::new(StreamMetrics::new().unwrap());
        let options = RegistryOptions {
            capture: CaptureConfig::with_dimensions(8, 8),
            ..Default::default()
        };
        let registry = CameraRegistry::from_devices(
            vec![DeviceEntry::new("cam", "/dev/video0")],
            backend.clone(),
            options,
        )
        .with_metrics(Arc::clone(&metrics));
        Fixture {
            registry,
            backend,
            metrics,
        }
    }

    fn streamer(fixture: &Fixture) -> FrameStreamer {
        let handle = fixture.registry.begin_session("cam").unwrap();
        FrameStreamer::new(handle, Arc::new(JpegEncoder::new()))
    }

    /// Records the quality of every encode call.
    #[derive(Default)]
    struct RecordingEncoder {
        qualities: Mutex<Vec<u8>>,
    }

    impl FrameEncoder for RecordingEncoder {
        fn encode(&self, _frame: &Frame, quality: u8) -> Result<Vec<u8>, EncodeError> {
            self.qualities.lock().unwrap().push(quality);
            Ok(vec![0xFF, 0xD8, 0xFF, 0xD9])
        }
    }

    /// Fails the first `failures` encodes.
    struct FlakyEncoder {
        failures: AtomicUsize,
    }

    impl FrameEncoder for FlakyEncoder {
        fn encode(&self, frame: &Frame, quality: u8) -> Result<Vec<u8>, EncodeError> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(EncodeError::InvalidFrame {
                    width: frame.width(),
                    height: frame.height(),
                    len: 0,
                });
            }
            JpegEncoder::new().encode(frame, quality)
        }
    }

    #[test]
    fn test_frame_interval() {
        assert_eq!(frame_interval(10), Duration::from_millis(100));
        assert_eq!(frame_interval(30), Duration::from_nanos(33_333_333));
        assert_eq!(frame_interval(0), Duration::from_secs(1));
    }

    #[test]
    fn test_chunk_framing() {
        let fixture = fixture(MockSettings::simulated_fps(10));
        let chunk = streamer(&fixture).next().unwrap();

        let header = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
        assert!(chunk.starts_with(header));
        assert_eq!(&chunk[header.len()..header.len() + 2], &[0xFF, 0xD8]);
        assert!(chunk.ends_with(b"\xFF\xD9\r\n"));
    }

    #[test]
    fn test_emission_is_throttled_to_target_fps() {
        // One simulated second of a 100 fps device
        let fixture = fixture(MockSettings::simulated_fps(100).failing_on_read(101));
        fixture.registry.set_fps("cam", 10).unwrap();

        let chunks = streamer(&fixture).count();

        assert!((9..=11).contains(&chunks), "emitted {chunks} chunks");
    }

    #[test]
    fn test_read_failure_ends_stream_cleanly() {
        // Device slower than the target rate, so every frame is due
        let fixture = fixture(MockSettings::simulated_fps(1).failing_on_read(5));
        let mut stream = streamer(&fixture);

        let chunks: Vec<_> = stream.by_ref().collect();
        assert_eq!(chunks.len(), 4);
        assert!(matches!(stream.end_reason(), Some(StreamEnd::ReadFailed(_))));
        assert!(stream.next().is_none());
        assert_eq!(fixture.backend.open_handles(), 0);

        drop(stream);
        assert_eq!(fixture.registry.is_running("cam"), Ok(false));
    }

    #[test]
    fn test_external_stop_ends_stream() {
        let fixture = fixture(MockSettings::simulated_fps(1));
        let mut stream = streamer(&fixture);

        assert!(stream.next().is_some());
        assert!(stream.next().is_some());
        fixture.registry.end_session("cam").unwrap();

        assert!(stream.next().is_none());
        assert!(matches!(stream.end_reason(), Some(StreamEnd::Stopped)));
        assert_eq!(stream.emitted(), 2);
        assert_eq!(fixture.backend.open_handles(), 0);
    }

    #[test]
    fn test_drop_releases_device_and_session() {
        let fixture = fixture(MockSettings::simulated_fps(1));
        let mut stream = streamer(&fixture);
        assert!(stream.next().is_some());
        assert_eq!(fixture.backend.open_handles(), 1);

        drop(stream);

        assert_eq!(fixture.backend.open_handles(), 0);
        assert_eq!(fixture.registry.list_available(), vec!["cam"]);
        assert_eq!(fixture.metrics.active_sessions(), 0);
    }

    #[test]
    fn test_fps_change_applies_mid_stream() {
        let fixture = fixture(MockSettings::simulated_fps(100));
        fixture.registry.set_fps("cam", 10).unwrap();
        let mut stream = streamer(&fixture);

        stream.next().unwrap();
        stream.next().unwrap();
        let discarded = fixture.metrics.encode().unwrap();
        assert!(discarded.contains("camera_streamer_frames_discarded_total{camera=\"cam\"} 10"));

        // 1000 fps target is faster than the device: nothing more is dropped
        fixture.registry.set_fps("cam", 1000).unwrap();
        for _ in 0..5 {
            stream.next().unwrap();
        }
        let after = fixture.metrics.encode().unwrap();
        assert!(after.contains("camera_streamer_frames_discarded_total{camera=\"cam\"} 10"));
        assert_eq!(fixture.metrics.frames_emitted("cam"), 7);
    }

    #[test]
    fn test_quality_change_applies_mid_stream() {
        let fixture = fixture(MockSettings::simulated_fps(1));
        let encoder = Arc::new(RecordingEncoder::default());
        let handle = fixture.registry.begin_session("cam").unwrap();
        let mut stream = FrameStreamer::new(handle, encoder.clone());

        stream.next().unwrap();
        fixture.registry.set_encoding_quality("cam", 40).unwrap();
        stream.next().unwrap();
        fixture.registry.set_encoding_quality("cam", 0).unwrap();
        stream.next().unwrap();

        assert_eq!(*encoder.qualities.lock().unwrap(), vec![90, 40, 0]);
    }

    #[test]
    fn test_encode_failure_skips_frame() {
        let fixture = fixture(MockSettings::simulated_fps(1).failing_on_read(6));
        let handle = fixture.registry.begin_session("cam").unwrap();
        let encoder = Arc::new(FlakyEncoder {
            failures: AtomicUsize::new(2),
        });

        let chunks = FrameStreamer::new(handle, encoder).count();

        assert_eq!(chunks, 3);
        let output = fixture.metrics.encode().unwrap();
        assert!(output.contains("camera_streamer_encode_failures_total{camera=\"cam\"} 2"));
    }

    #[test]
    fn test_throttled_pacing_reads_only_when_due() {
        // Real-clock frames: the freshest policy would drop nearly all of them
        let fixture = fixture(MockSettings::default());
        fixture.registry.set_fps("cam", 100).unwrap();
        let mut stream = streamer(&fixture).with_pacing(PacingPolicy::Throttled);

        let started = Instant::now();
        for _ in 0..3 {
            stream.next().unwrap();
        }

        assert!(started.elapsed() >= Duration::from_millis(20));
        let output = fixture.metrics.encode().unwrap();
        assert!(!output.contains("camera_streamer_frames_discarded_total{camera=\"cam\"}"));
    }

    #[test]
    fn test_pacing_policy_serde() {
        #[derive(Deserialize)]
        struct Wrapper {
            pacing: PacingPolicy,
        }
        let parsed: Wrapper = toml::from_str("pacing = \"throttled\"").unwrap();
        assert_eq!(parsed.pacing, PacingPolicy::Throttled);
    }
}
