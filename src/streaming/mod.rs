//! Encoding and pacing of outgoing MJPEG streams.

mod codec;
pub mod multipart;
mod streamer;

pub use codec::{EncodeError, FrameEncoder, JpegEncoder};
pub use streamer::{frame_interval, FrameStreamer, PacingPolicy, StreamEnd};
