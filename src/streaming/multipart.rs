//! `multipart/x-mixed-replace` framing for MJPEG clients.
//!
//! Each part is `--frame\r\nContent-Type: image/jpeg\r\n\r\n<jpeg>\r\n`.
//! There is no closing boundary; the stream ends when the connection does.

/// Boundary token separating parts.
pub const BOUNDARY: &str = "frame";

/// Response content type announcing the boundary.
pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

const PART_HEADER: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
const PART_TRAILER: &[u8] = b"\r\n";

/// Wraps one encoded JPEG in a multipart part.
pub fn frame_part(jpeg: &[u8]) -> Vec<u8> {
    let mut part = Vec::with_capacity(PART_HEADER.len() + jpeg.len() + PART_TRAILER.len());
    part.extend_from_slice(PART_HEADER);
    part.extend_from_slice(jpeg);
    part.extend_from_slice(PART_TRAILER);
    part
}
