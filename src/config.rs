//! Device configuration.
//!
//! The agent is identified by a JSON config file written at registration
//! time. The config is loaded once at startup and read-only afterwards; every
//! connection attempt sees the same immutable [`Device`].

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Identity and connection settings for one managed device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Device {
    /// Device identifier registered with the IoT hub.
    pub device_id: String,
    /// Organization that owns this device.
    pub rewst_org_id: String,
    /// Engine hostname used to build postback URLs.
    pub rewst_engine_host: String,
    /// Base64-encoded shared access key for SAS token generation.
    pub shared_access_key: String,
    /// IoT hub hostname to connect to.
    pub azure_iot_hub_host: String,
    /// Broker selector. Empty means the IoT hub default.
    #[serde(default)]
    pub broker: Option<String>,
    #[serde(default)]
    pub logging_level: LoggingLevel,
    #[serde(default, rename = "syslog")]
    pub use_syslog: bool,
}

/// Log verbosity carried in the device config.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Error,
    Warn,
    Info,
    Debug,
    Off,
    /// Defer to the environment (`LOG_LEVEL`) or the built-in default.
    #[default]
    Default,
}

impl LoggingLevel {
    /// Filter directive for this level, or `None` to defer to the
    /// environment.
    pub fn directive(self) -> Option<&'static str> {
        match self {
            LoggingLevel::Error => Some("error"),
            LoggingLevel::Warn => Some("warn"),
            LoggingLevel::Info => Some("info"),
            LoggingLevel::Debug => Some("debug"),
            LoggingLevel::Off => Some("off"),
            LoggingLevel::Default => None,
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Device {
    /// Load and validate a device config from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let device: Device = serde_json::from_str(&content)?;
        device.validate()?;
        Ok(device)
    }

    /// Validate required fields. Hostnames must parse as URL hosts so a bad
    /// config fails at startup instead of on the first postback.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (&self.device_id, "device_id"),
            (&self.rewst_org_id, "rewst_org_id"),
            (&self.rewst_engine_host, "rewst_engine_host"),
            (&self.shared_access_key, "shared_access_key"),
            (&self.azure_iot_hub_host, "azure_iot_hub_host"),
        ];

        for (value, name) in required {
            if value.is_empty() {
                return Err(ConfigError::InvalidConfig(format!("missing {name}")));
            }
        }

        validate_host(&self.rewst_engine_host, "rewst_engine_host")?;
        validate_host(&self.azure_iot_hub_host, "azure_iot_hub_host")?;

        Ok(())
    }
}

fn validate_host(host: &str, name: &str) -> Result<(), ConfigError> {
    // Engine hosts may carry an explicit scheme; broker hosts never do.
    let candidate = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{host}")
    };

    let url = Url::parse(&candidate)
        .map_err(|e| ConfigError::InvalidConfig(format!("{name} is not a valid host: {e}")))?;

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidConfig(format!(
            "{name} is not a valid host: {host}"
        )));
    }

    Ok(())
}

#[cfg(test)]
pub(crate) fn test_device() -> Device {
    Device {
        device_id: "device-123".to_string(),
        rewst_org_id: "org-456".to_string(),
        rewst_engine_host: "engine.example.com".to_string(),
        shared_access_key: base64_key(),
        azure_iot_hub_host: "hub.example.com".to_string(),
        broker: None,
        logging_level: LoggingLevel::Default,
        use_syslog: false,
    }
}

#[cfg(test)]
pub(crate) fn base64_key() -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    STANDARD.encode(b"test shared access key material")
}
