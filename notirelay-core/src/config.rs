//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/notirelay/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/notirelay/` (~/.config/notirelay/)
//! - Data: `$XDG_DATA_HOME/notirelay/` (~/.local/share/notirelay/)
//! - State/Logs: `$XDG_STATE_HOME/notirelay/` (~/.local/state/notirelay/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Collection endpoint configuration
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Device identity override
    #[serde(default)]
    pub device: DeviceConfig,

    /// Capture toggle defaults
    #[serde(default)]
    pub capture: CaptureConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// Collection endpoint configuration
///
/// Each captured event is POSTed as one JSON object to
/// `server_url` + `endpoint_path`.
#[derive(Debug, Deserialize, Clone)]
pub struct DeliveryConfig {
    /// Enable/disable network delivery
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Collection server URL (e.g., `http://10.0.2.2:8080`)
    pub server_url: Option<String>,

    /// Path of the submit endpoint on the server
    #[serde(default = "default_endpoint_path")]
    pub endpoint_path: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_delivery_timeout")]
    pub timeout_secs: u64,

    /// Lowest status code counted as delivered
    #[serde(default = "default_success_status_min")]
    pub success_status_min: u16,

    /// Highest status code counted as delivered
    #[serde(default = "default_success_status_max")]
    pub success_status_max: u16,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server_url: None,
            endpoint_path: default_endpoint_path(),
            timeout_secs: default_delivery_timeout(),
            success_status_min: default_success_status_min(),
            success_status_max: default_success_status_max(),
        }
    }
}

impl DeliveryConfig {
    /// Check if delivery is enabled and has somewhere to send to
    pub fn is_ready(&self) -> bool {
        self.enabled
            && self
                .server_url
                .as_deref()
                .is_some_and(|url| !url.trim().is_empty())
    }

    /// Status codes the endpoint uses to acknowledge an event
    pub fn success_range(&self) -> RangeInclusive<u16> {
        self.success_status_min..=self.success_status_max
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        match self.server_url.as_deref() {
            Some(url) if !url.trim().is_empty() => {}
            _ => {
                return Err(Error::Config(
                    "delivery.server_url is required when delivery is enabled".to_string(),
                ))
            }
        }
        if !self.endpoint_path.starts_with('/') {
            return Err(Error::Config(
                "delivery.endpoint_path must start with '/'".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "delivery.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.success_status_min < 100
            || self.success_status_max > 599
            || self.success_status_min > self.success_status_max
        {
            return Err(Error::Config(format!(
                "delivery success range {}..={} is not a valid HTTP status range",
                self.success_status_min, self.success_status_max
            )));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_endpoint_path() -> String {
    "/api/notifications".to_string()
}

fn default_delivery_timeout() -> u64 {
    30
}

fn default_success_status_min() -> u16 {
    200
}

fn default_success_status_max() -> u16 {
    299
}

/// Device identity configuration
#[derive(Debug, Deserialize, Default, Clone)]
pub struct DeviceConfig {
    /// Fixed device id; when unset a generated id is persisted in the data dir
    pub id: Option<String>,
}

/// Capture configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    /// Whether the listener starts out forwarding events
    #[serde(default = "default_true")]
    pub listening: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { listening: true }
    }
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/notirelay/config.toml` (~/.config/notirelay/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("notirelay").join("config.toml")
    }

    /// Returns the data directory path (for the device id file)
    ///
    /// `$XDG_DATA_HOME/notirelay/` (~/.local/share/notirelay/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("notirelay")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/notirelay/` (~/.local/state/notirelay/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("notirelay")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/notirelay/notirelay.log` (~/.local/state/notirelay/notirelay.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("notirelay.log")
    }

    /// Returns the persisted device id file path
    pub fn device_id_path() -> PathBuf {
        Self::data_dir().join("device_id")
    }

    /// Resolve the id stamped on every outbound record.
    ///
    /// Uses `[device] id` when configured, otherwise the id stored under the
    /// data dir, generating and persisting a new one on first use.
    pub fn device_id(&self) -> Result<String> {
        if let Some(id) = self.device.id.as_deref().map(str::trim) {
            if !id.is_empty() {
                return Ok(id.to_string());
            }
        }
        load_or_create_device_id(&Self::device_id_path())
    }
}

/// Read the device id from `path`, creating it with a fresh UUID if missing.
pub fn load_or_create_device_id(path: &Path) -> Result<String> {
    if path.exists() {
        let existing = std::fs::read_to_string(path)?;
        let existing = existing.trim();
        if !existing.is_empty() {
            return Ok(existing.to_string());
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let id = uuid::Uuid::new_v4().to_string();
    std::fs::write(path, &id)?;
    tracing::info!(path = %path.display(), device_id = %id, "Generated device id");
    Ok(id)
}
