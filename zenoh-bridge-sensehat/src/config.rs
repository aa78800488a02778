//! Configuration for the Sense HAT bridge.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use edgesense_common::config::{LoggingConfig, ZenohConfig};

/// Environment variable carrying the device identity.
pub const DEVICE_ID_ENV: &str = "IOTEDGE_DEVICEID";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Required environment variable {0} is not set")]
    MissingEnv(&'static str),
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenseHatBridgeConfig {
    /// Zenoh connection settings.
    pub zenoh: ZenohConfig,

    /// Sense HAT sampling settings.
    #[serde(default)]
    pub sensehat: SenseHatConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Sense HAT sampling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenseHatConfig {
    /// Key expression prefix (default: "edgesense/sensehat").
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Poll interval in seconds (default: 15).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Logical output channel the readings are published on (default: "output1").
    #[serde(default = "default_output_channel")]
    pub output_channel: String,

    /// Root of the kernel IIO sysfs tree.
    #[serde(default = "default_iio_root")]
    pub iio_root: PathBuf,

    /// Sense HAT LED framebuffer device. Auto-discovered when unset.
    #[serde(default)]
    pub framebuffer: Option<PathBuf>,
}

fn default_key_prefix() -> String {
    "edgesense/sensehat".to_string()
}

fn default_poll_interval() -> u64 {
    15
}

fn default_output_channel() -> String {
    "output1".to_string()
}

fn default_iio_root() -> PathBuf {
    PathBuf::from("/sys/bus/iio/devices")
}

impl Default for SenseHatConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            poll_interval_secs: default_poll_interval(),
            output_channel: default_output_channel(),
            iio_root: default_iio_root(),
            framebuffer: None,
        }
    }
}

impl SenseHatBridgeConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: SenseHatBridgeConfig = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.zenoh
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        if self.sensehat.poll_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "poll_interval_secs must be > 0".to_string(),
            ));
        }

        if self.sensehat.output_channel.is_empty() {
            return Err(ConfigError::Validation(
                "output_channel must not be empty".to_string(),
            ));
        }

        if self.sensehat.key_prefix.is_empty() {
            return Err(ConfigError::Validation(
                "key_prefix must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Resolve the device identity from the value of [`DEVICE_ID_ENV`].
///
/// Takes the looked-up value rather than reading the environment itself so
/// callers (and tests) control the lookup.
pub fn require_device_id(value: Option<String>) -> Result<String, ConfigError> {
    match value {
        None => Err(ConfigError::MissingEnv(DEVICE_ID_ENV)),
        Some(id) if id.trim().is_empty() => Err(ConfigError::Validation(format!(
            "{} must not be empty",
            DEVICE_ID_ENV
        ))),
        Some(id) => Ok(id),
    }
}
