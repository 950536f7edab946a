//! Enumeration through `v4l2-ctl --list-devices`.
//!
//! The tool prints one block per physical device: a header line naming the
//! device and its bus, followed by indented device nodes.
//!
//! ```text
//! HD Webcam: HD Webcam (usb-0000:00:14.0-1):
//!         /dev/video0
//!         /dev/video1
//!         /dev/media0
//! ```
//!
//! The first node of a block is the capture node; the rest are metadata
//! and media-controller nodes and are skipped.

use super::{DeviceEntry, DeviceEnumerator, DiscoveryError};
use std::process::Command;

/// Runs `v4l2-ctl` and parses its device listing.
#[derive(Debug, Clone)]
pub struct V4l2CtlEnumerator {
    command: String,
}

impl V4l2CtlEnumerator {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for V4l2CtlEnumerator {
    fn default() -> Self {
        Self::new("v4l2-ctl")
    }
}

impl DeviceEnumerator for V4l2CtlEnumerator {
    fn enumerate(&self) -> Result<Vec<DeviceEntry>, DiscoveryError> {
        tracing::debug!(command = %self.command, "Listing video devices");

        let output = Command::new(&self.command)
            .arg("--list-devices")
            .output()
            .map_err(|e| DiscoveryError::Unavailable {
                command: self.command.clone(),
                reason: e.to_string(),
            })?;

        // v4l2-ctl exits non-zero when it finds no devices at all
        if !output.status.success() {
            return Err(DiscoveryError::CommandFailed {
                command: self.command.clone(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_list_devices(&stdout))
    }

    fn name(&self) -> &'static str {
        "v4l2-ctl"
    }
}

/// Parses `v4l2-ctl --list-devices` output into name/path pairs in listing order.
///
/// Headers without any device node are dropped.
pub fn parse_list_devices(output: &str) -> Vec<DeviceEntry> {
    let mut devices = Vec::new();
    let mut pending: Option<String> = None;

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("/dev/") {
            if let Some(name) = pending.take() {
                tracing::debug!(name = %name, path = line, "Found video device");
                devices.push(DeviceEntry::new(name, line));
            }
            continue;
        }

        if let Some(name) = pending.replace(header_name(line)) {
            tracing::debug!(name = %name, "Device header without nodes, skipping");
        }
    }

    devices
}

/// Extracts the device name from a block header.
///
/// `HD Webcam: HD Webcam (usb-0000:00:14.0-1):` becomes `HD Webcam`.
fn header_name(line: &str) -> String {
    let mut name = line.trim_end_matches(':').trim_end();

    // Drop the trailing bus info
    if name.ends_with(')') {
        if let Some(open) = name.rfind(" (") {
            name = &name[..open];
        }
    }

    // Card name is repeated after the driver name on UVC devices
    if let Some((card, _)) = name.split_once(": ") {
        name = card;
    }

    name.trim().to_string()
}
