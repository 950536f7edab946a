//! Configuration file format.
//!
//! Every section is optional; a missing file section falls back to its
//! defaults. Command-line flags are applied on top in `main`.

use crate::capture::{CaptureConfig, CaptureConfigError};
use crate::discovery::DeviceEntry;
use crate::registry::{RegistryOptions, DEFAULT_FPS, DEFAULT_QUALITY, MAX_QUALITY};
use crate::streaming::PacingPolicy;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Configuration loading and validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid default fps (must be positive)")]
    InvalidFrameRate,
    #[error("invalid default encoding quality {0} (must be 0-100)")]
    InvalidQuality(u8),
    #[error("invalid channel capacity (must be positive)")]
    InvalidChannelCapacity,
    #[error("invalid capture config: {0}")]
    Capture(#[from] CaptureConfigError),
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Allow cross-origin requests from any origin.
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            cors_permissive: true,
        }
    }
}

/// Streaming defaults and tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Initial target fps of every camera.
    pub default_fps: u32,
    /// Initial JPEG quality of every camera.
    pub default_quality: u8,
    pub pacing: PacingPolicy,
    /// Encoded chunks buffered between the capture thread and the client.
    /// A slow client can see frames up to `channel_capacity + 1` emissions old.
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            default_fps: DEFAULT_FPS,
            default_quality: DEFAULT_QUALITY,
            pacing: PacingPolicy::default(),
            channel_capacity: 1,
        }
    }
}

/// Where the camera list comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Enumeration tool, invoked with `--list-devices`.
    pub command: String,
    /// Fixed devices. When non-empty, the command is not run.
    pub devices: Vec<DeviceEntry>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            command: "v4l2-ctl".to_string(),
            devices: Vec::new(),
        }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream.default_fps == 0 {
            return Err(ConfigError::InvalidFrameRate);
        }
        if self.stream.default_quality > MAX_QUALITY {
            return Err(ConfigError::InvalidQuality(self.stream.default_quality));
        }
        if self.stream.channel_capacity == 0 {
            return Err(ConfigError::InvalidChannelCapacity);
        }
        self.capture.validate()?;
        Ok(())
    }

    /// Per-camera defaults for the registry.
    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            default_fps: self.stream.default_fps,
            default_quality: self.stream.default_quality,
            capture: self.capture.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = FileConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind_addr.port(), 8000);
        assert_eq!(config.stream.pacing, PacingPolicy::Freshest);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = FileConfig::from_toml("").unwrap();
        assert_eq!(config.stream.default_fps, 30);
        assert_eq!(config.stream.default_quality, 90);
        assert_eq!(config.stream.channel_capacity, 1);
        assert_eq!(config.discovery.command, "v4l2-ctl");
        assert!(config.discovery.devices.is_empty());
    }

    #[test]
    fn test_full_document() {
        let config = FileConfig::from_toml(
            r#"
            [server]
            bind_addr = "127.0.0.1:9000"
            cors_permissive = false

            [stream]
            default_fps = 15
            default_quality = 70
            pacing = "throttled"
            channel_capacity = 4

            [capture]
            width = 1280
            height = 720

            [[discovery.devices]]
            name = "Front Door"
            path = "/dev/video2"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert!(!config.server.cors_permissive);
        assert_eq!(config.stream.pacing, PacingPolicy::Throttled);
        assert_eq!(config.stream.channel_capacity, 4);
        assert_eq!(config.capture.width, 1280);
        assert_eq!(config.capture.device_fps, 30);
        assert_eq!(
            config.discovery.devices,
            vec![DeviceEntry::new("Front Door", "/dev/video2")]
        );

        let options = config.registry_options();
        assert_eq!(options.default_fps, 15);
        assert_eq!(options.default_quality, 70);
        assert_eq!(options.capture.height, 720);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert_eq!(
            FileConfig::from_toml("[stream]\ndefault_fps = 0").unwrap_err(),
            ConfigError::InvalidFrameRate
        );
        assert_eq!(
            FileConfig::from_toml("[stream]\ndefault_quality = 101").unwrap_err(),
            ConfigError::InvalidQuality(101)
        );
        assert_eq!(
            FileConfig::from_toml("[stream]\nchannel_capacity = 0").unwrap_err(),
            ConfigError::InvalidChannelCapacity
        );
        assert_eq!(
            FileConfig::from_toml("[capture]\nwidth = 0").unwrap_err(),
            ConfigError::Capture(CaptureConfigError::InvalidDimensions)
        );
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            FileConfig::from_toml("[stream\n"),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            FileConfig::from_file("/nonexistent/camera-streamer.toml"),
            Err(ConfigError::FileReadError(_))
        ));
    }
}
