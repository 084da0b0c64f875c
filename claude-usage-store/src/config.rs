//! Configuration management.
//!
//! `config.json` holds the settings a user might hand-edit: OAuth client
//! overrides, the auto-refresh interval and the log level. Every field is
//! optional on disk; a missing file means defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::persistence::default_config_path;

/// Default auto-refresh interval in seconds.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

/// Shortest auto-refresh interval accepted, in seconds.
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 60;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OAuth client id override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Scopes requested on the authorize URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorize_scopes: Option<Vec<String>>,
    /// Scopes sent with refresh-token grants.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_scopes: Option<Vec<String>>,
    /// Auto-refresh interval in seconds.
    pub refresh_interval_secs: u64,
    /// Log level.
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: None,
            authorize_scopes: None,
            refresh_scopes: None,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the default path.
    ///
    /// # Errors
    ///
    /// See [`load_from`](Self::load_from).
    pub fn load() -> Result<Self, StoreError> {
        Self::load_from(&default_config_path())
    }

    /// Loads configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded,
    /// or if it fails [`validate`](Self::validate).
    pub fn load_from(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Saves configuration to the default path.
    ///
    /// # Errors
    ///
    /// See [`save_to`](Self::save_to).
    pub fn save(&self) -> Result<(), StoreError> {
        self.save_to(&default_config_path())
    }

    /// Saves configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file
    /// cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Checks values that deserialize fine but make no sense.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] naming the offending field.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.refresh_interval_secs < MIN_REFRESH_INTERVAL_SECS {
            return Err(StoreError::Config(format!(
                "refresh_interval_secs must be at least {MIN_REFRESH_INTERVAL_SECS}, got {}",
                self.refresh_interval_secs
            )));
        }
        if self.client_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err(StoreError::Config("client_id must not be empty".into()));
        }
        for (field, scopes) in [
            ("authorize_scopes", &self.authorize_scopes),
            ("refresh_scopes", &self.refresh_scopes),
        ] {
            if scopes.as_ref().is_some_and(Vec::is_empty) {
                return Err(StoreError::Config(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }

    /// Returns the auto-refresh interval.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

// ============================================================================
// Log Level
// ============================================================================

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Error level logging.
    Error,
    /// Warning level logging.
    #[default]
    Warn,
    /// Info level logging.
    Info,
    /// Debug level logging.
    Debug,
    /// Trace level logging.
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}
