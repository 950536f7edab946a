//! Metrics collection and registry.

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Prometheus metrics for camera sessions and the streaming pipeline.
///
/// Each instance owns its own registry, so several can coexist in one
/// process (one per server, one per test).
#[derive(Clone)]
pub struct StreamMetrics {
    registry: Registry,

    // Pipeline metrics
    frames_emitted: IntCounterVec,
    frames_discarded: IntCounterVec,
    encode_failures: IntCounterVec,
    read_failures: IntCounterVec,

    // Session metrics
    sessions_started: IntCounterVec,
    active_sessions: IntGauge,
}

impl StreamMetrics {
    /// Creates a new metrics registry with all streaming metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let frames_emitted = IntCounterVec::new(
            Opts::new(
                "camera_streamer_frames_emitted_total",
                "Frames encoded and sent to a client",
            ),
            &["camera"],
        )?;
        let frames_discarded = IntCounterVec::new(
            Opts::new(
                "camera_streamer_frames_discarded_total",
                "Frames read from a device but dropped by pacing",
            ),
            &["camera"],
        )?;
        let encode_failures = IntCounterVec::new(
            Opts::new(
                "camera_streamer_encode_failures_total",
                "Frames that failed JPEG encoding",
            ),
            &["camera"],
        )?;
        let read_failures = IntCounterVec::new(
            Opts::new(
                "camera_streamer_read_failures_total",
                "Device reads that failed and ended a stream",
            ),
            &["camera"],
        )?;
        let sessions_started = IntCounterVec::new(
            Opts::new(
                "camera_streamer_sessions_started_total",
                "Capture sessions successfully started",
            ),
            &["camera"],
        )?;
        let active_sessions = IntGauge::new(
            "camera_streamer_active_sessions",
            "Cameras currently reserved by a capture session",
        )?;

        // Register all metrics
        registry.register(Box::new(frames_emitted.clone()))?;
        registry.register(Box::new(frames_discarded.clone()))?;
        registry.register(Box::new(encode_failures.clone()))?;
        registry.register(Box::new(read_failures.clone()))?;
        registry.register(Box::new(sessions_started.clone()))?;
        registry.register(Box::new(active_sessions.clone()))?;

        Ok(Self {
            registry,
            frames_emitted,
            frames_discarded,
            encode_failures,
            read_failures,
            sessions_started,
            active_sessions,
        })
    }

    pub fn frame_emitted(&self, camera: &str) {
        self.frames_emitted.with_label_values(&[camera]).inc();
    }

    pub fn frame_discarded(&self, camera: &str) {
        self.frames_discarded.with_label_values(&[camera]).inc();
    }

    pub fn encode_failed(&self, camera: &str) {
        self.encode_failures.with_label_values(&[camera]).inc();
    }

    pub fn read_failed(&self, camera: &str) {
        self.read_failures.with_label_values(&[camera]).inc();
    }

    /// Counts a reservation; pair with [`StreamMetrics::session_ended`].
    pub fn session_reserved(&self) {
        self.active_sessions.inc();
    }

    /// Counts a session whose device opened.
    pub fn session_started(&self, camera: &str) {
        self.sessions_started.with_label_values(&[camera]).inc();
    }

    pub fn session_ended(&self) {
        self.active_sessions.dec();
    }

    /// Current number of reserved cameras.
    pub fn active_sessions(&self) -> i64 {
        self.active_sessions.get()
    }

    /// Frames emitted so far for `camera`.
    pub fn frames_emitted(&self, camera: &str) -> u64 {
        self.frames_emitted.with_label_values(&[camera]).get()
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl std::fmt::Debug for StreamMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamMetrics")
            .field("active_sessions", &self.active_sessions.get())
            .finish_non_exhaustive()
    }
}
