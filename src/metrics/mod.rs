//! Prometheus metrics for streaming activity.
//!
//! Exposed as Prometheus text on the server's `/metrics` route.
//!
//! # Metrics Exposed
//!
//! ## Pipeline Metrics (labelled by `camera`)
//! - `camera_streamer_frames_emitted_total` - Frames encoded and sent
//! - `camera_streamer_frames_discarded_total` - Frames dropped by pacing
//! - `camera_streamer_encode_failures_total` - Frames that failed to encode
//! - `camera_streamer_read_failures_total` - Reads that ended a stream
//!
//! ## Session Metrics
//! - `camera_streamer_sessions_started_total` - Sessions whose device opened (by `camera`)
//! - `camera_streamer_active_sessions` - Cameras currently reserved
//!
//! # Example
//!
//! ```
//! use camera_streamer::metrics::StreamMetrics;
//!
//! let metrics = StreamMetrics::new().expect("Failed to create registry");
//! metrics.frame_emitted("HD Webcam");
//!
//! let text = metrics.encode().unwrap();
//! assert!(text.contains("camera_streamer_frames_emitted_total"));
//! ```

mod collector;

pub use collector::{MetricsError, StreamMetrics};
