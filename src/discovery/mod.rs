//! Device enumeration.
//!
//! Discovery runs once when the registry is built. It maps stable camera
//! names to the device paths the capture backend opens.

mod v4l2_ctl;

pub use v4l2_ctl::{parse_list_devices, V4l2CtlEnumerator};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while enumerating devices.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("enumeration command `{command}` unavailable: {reason}")]
    Unavailable { command: String, reason: String },
    #[error("enumeration command `{command}` failed (status {status:?}): {stderr}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
}

/// One enumerated capture device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// Human-readable device name, used as the camera key.
    pub name: String,
    /// Path handed to the capture backend.
    pub path: String,
}

impl DeviceEntry {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Source of the camera list used at startup.
pub trait DeviceEnumerator {
    /// Lists devices in a stable order. An empty list is a valid answer.
    fn enumerate(&self) -> Result<Vec<DeviceEntry>, DiscoveryError>;

    /// Short enumerator name for logs.
    fn name(&self) -> &'static str;
}

/// Enumerator returning a fixed device list, from config or for mock cameras.
#[derive(Debug, Clone, Default)]
pub struct StaticEnumerator {
    devices: Vec<DeviceEntry>,
}

impl StaticEnumerator {
    pub fn new(devices: Vec<DeviceEntry>) -> Self {
        Self { devices }
    }

    /// `count` synthetic devices named `Mock Camera 0..count`.
    pub fn mock(count: usize) -> Self {
        let devices = (0..count)
            .map(|i| DeviceEntry::new(format!("Mock Camera {i}"), format!("/dev/video{i}")))
            .collect();
        Self { devices }
    }
}

impl DeviceEnumerator for StaticEnumerator {
    fn enumerate(&self) -> Result<Vec<DeviceEntry>, DiscoveryError> {
        Ok(self.devices.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_enumerator() {
        let devices = StaticEnumerator::mock(2).enumerate().unwrap();
        assert_eq!(
            devices,
            vec![
                DeviceEntry::new("Mock Camera 0", "/dev/video0"),
                DeviceEntry::new("Mock Camera 1", "/dev/video1"),
            ]
        );
    }
}
