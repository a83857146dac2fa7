//! Configuration management for termsync.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/termsync/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use protocol::events::{CONN_CHANGE_EVENT, CONTROLLER_STATUS_EVENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::{DisplayConfig, DEFAULT_FONT_SIZE, DEFAULT_THEME_NAME};

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("log level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("font_size must be between {min} and {max}, got {value}")]
    InvalidFontSize { value: f32, min: f32, max: f32 },

    #[error("theme_name must not be empty")]
    EmptyThemeName,

    #[error("event channel name must not be empty: {0}")]
    EmptyChannelName(&'static str),

    #[error("runtime and connection events cannot share channel {0}")]
    DuplicateChannelName(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Smallest accepted default font size.
pub const MIN_FONT_SIZE: f32 = 4.0;

/// Largest accepted default font size.
pub const MAX_FONT_SIZE: f32 = 72.0;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration.
    pub log: LogConfig,

    /// Display defaults for new sessions.
    pub display: DisplaySettings,

    /// Session store behavior.
    pub store: StoreConfig,

    /// Backend event channel names.
    pub events: EventsConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub level: String,
}

/// Display defaults applied to session records created after startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplaySettings {
    pub font_size: f32,
    pub theme_name: String,
}

/// Session store behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Drop runtime-status updates older than the stored version.
    pub enforce_runtime_version: bool,
}

/// Names of the backend event channels to subscribe to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EventsConfig {
    pub runtime_status_channel: String,
    pub connection_change_channel: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            theme_name: DEFAULT_THEME_NAME.to_string(),
        }
    }
}

impl DisplaySettings {
    /// The display config handed to new session records.
    pub fn to_display_config(&self) -> DisplayConfig {
        DisplayConfig {
            font_size: self.font_size,
            theme_name: self.theme_name.clone(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            enforce_runtime_version: true,
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            runtime_status_channel: CONTROLLER_STATUS_EVENT.to_string(),
            connection_change_channel: CONN_CHANGE_EVENT.to_string(),
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("termsync")
        .join("config.toml")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - TERMSYNC_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    /// - TERMSYNC_THEME: Override the default theme name
    /// - TERMSYNC_FONT_SIZE: Override the default font size
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("TERMSYNC_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log level from environment: {}", level);
                self.log.level = level;
            }
        }

        if let Ok(theme) = std::env::var("TERMSYNC_THEME") {
            if !theme.is_empty() {
                tracing::info!("Overriding theme_name from environment: {}", theme);
                self.display.theme_name = theme;
            }
        }

        if let Ok(size) = std::env::var("TERMSYNC_FONT_SIZE") {
            if !size.is_empty() {
                match size.parse::<f32>() {
                    Ok(size) => {
                        tracing::info!("Overriding font_size from environment: {}", size);
                        self.display.font_size = size;
                    }
                    Err(_) => {
                        tracing::warn!("Ignoring unparsable TERMSYNC_FONT_SIZE: {}", size);
                    }
                }
            }
        }
    }

    /// Validate the configuration values.
    ///
    /// Returns an error if any configuration value is outside the valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.log.level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.log.level.clone()));
        }

        let size = self.display.font_size;
        if !size.is_finite() || !(MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&size) {
            return Err(ConfigError::InvalidFontSize {
                value: size,
                min: MIN_FONT_SIZE,
                max: MAX_FONT_SIZE,
            });
        }

        if self.display.theme_name.trim().is_empty() {
            return Err(ConfigError::EmptyThemeName);
        }

        if self.events.runtime_status_channel.is_empty() {
            return Err(ConfigError::EmptyChannelName("runtime_status_channel"));
        }
        if self.events.connection_change_channel.is_empty() {
            return Err(ConfigError::EmptyChannelName("connection_change_channel"));
        }
        if self.events.runtime_status_channel == self.events.connection_change_channel {
            return Err(ConfigError::DuplicateChannelName(
                self.events.runtime_status_channel.clone(),
            ));
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Load from `path`, apply environment overrides and validate.
    pub fn resolve<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn clear_env() {
        std::env::remove_var("TERMSYNC_LOG_LEVEL");
        std::env::remove_var("TERMSYNC_THEME");
        std::env::remove_var("TERMSYNC_FONT_SIZE");
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.log.level, "info");
        assert_eq!(config.display.font_size, DEFAULT_FONT_SIZE);
        assert_eq!(config.display.theme_name, DEFAULT_THEME_NAME);
        assert!(config.store.enforce_runtime_version);
        assert_eq!(config.events.runtime_status_channel, "controller:status");
        assert_eq!(config.events.connection_change_channel, "terminal:conn-change");
    }

    #[test]
    fn test_display_settings_to_display_config() {
        let settings = DisplaySettings {
            font_size: 14.5,
            theme_name: "nord".to_string(),
        };
        let display = settings.to_display_config();
        assert_eq!(display.font_size, 14.5);
        assert_eq!(display.theme_name, "nord");
    }

    #[test]
    fn test_from_toml_empty() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
[display]
theme_name = "solarized-light"

[store]
enforce_runtime_version = false
"#;
        let config = Config::from_toml(toml).unwrap();

        assert_eq!(config.display.theme_name, "solarized-light");
        assert_eq!(config.display.font_size, DEFAULT_FONT_SIZE);
        assert!(!config.store.enforce_runtime_version);
        assert_eq!(config.log, LogConfig::default());
    }

    #[test]
    fn test_from_toml_full() {
        let toml = r#"
[log]
level = "trace"

[display]
font_size = 16.0
theme_name = "dracula"

[store]
enforce_runtime_version = true

[events]
runtime_status_channel = "rt:status"
connection_change_channel = "rt:conn"
"#;
        let config = Config::from_toml(toml).unwrap();

        assert_eq!(config.log.level, "trace");
        assert_eq!(config.display.font_size, 16.0);
        assert_eq!(config.display.theme_name, "dracula");
        assert_eq!(config.events.runtime_status_channel, "rt:status");
        assert_eq!(config.events.connection_change_channel, "rt:conn");
    }

    #[test]
    fn test_from_toml_invalid_syntax() {
        let toml = r#"
[log
level = "debug"
"#;
        let err = Config::from_toml(toml).unwrap_err().to_string();
        assert!(err.contains("Invalid TOML"));
    }

    #[test]
    fn test_from_toml_wrong_type() {
        let toml = r#"
[display]
font_size = "large"
"#;
        assert!(Config::from_toml(toml).is_err());
    }

    #[test]
    fn test_roundtrip_custom() {
        let mut original = Config::default();
        original.log.level = "warn".to_string();
        original.display.font_size = 13.0;
        original.store.enforce_runtime_version = false;

        let toml = original.to_toml().unwrap();
        assert!(toml.contains("[display]"));
        assert!(toml.contains("[events]"));

        let loaded = Config::from_toml(&toml).unwrap();
        assert_eq!(original, loaded);
    }

    #[test]
    fn test_load_missing_file() {
        let config = Config::load("/nonexistent/path/config.toml").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original = Config::default();
        original.display.theme_name = "gruvbox".to_string();
        original.save(&config_path).unwrap();

        let loaded = Config::load(&config_path).unwrap();
        assert_eq!(original, loaded);
    }

    #[test]
    fn test_load_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "invalid [ toml").unwrap();

        let err = Config::load(&config_path).unwrap_err().to_string();
        assert!(err.contains("Failed to parse config file"));
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.to_string_lossy().contains("termsync"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn test_validate_default_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = Config::default();
        config.log.level = "verbose".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidLogLevel("verbose".to_string()))
        );

        config.log.level = "DEBUG".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_font_size() {
        let mut config = Config::default();
        config.display.font_size = 2.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidFontSize { .. })
        ));

        config.display.font_size = f32::NAN;
        assert!(config.validate().is_err());

        config.display.font_size = MAX_FONT_SIZE;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_theme_name() {
        let mut config = Config::default();
        config.display.theme_name = "  ".to_string();
        assert_eq!(config.validate(), Err(ConfigError::EmptyThemeName));
    }

    #[test]
    fn test_validate_channels() {
        let mut config = Config::default();
        config.events.connection_change_channel = String::new();
        assert_eq!(
            config.validate(),
            Err(ConfigError::EmptyChannelName("connection_change_channel"))
        );

        config.events.connection_change_channel = config.events.runtime_status_channel.clone();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateChannelName(_))
        ));
    }

    #[test]
    #[serial]
    fn test_env_override_log_level() {
        clear_env();
        std::env::set_var("TERMSYNC_LOG_LEVEL", "debug");

        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.log.level, "debug");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_override_display() {
        clear_env();
        std::env::set_var("TERMSYNC_THEME", "high-contrast");
        std::env::set_var("TERMSYNC_FONT_SIZE", "18");

        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.display.theme_name, "high-contrast");
        assert_eq!(config.display.font_size, 18.0);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_override_empty_or_invalid_is_ignored() {
        clear_env();
        std::env::set_var("TERMSYNC_THEME", "");
        std::env::set_var("TERMSYNC_FONT_SIZE", "huge");

        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config, Config::default());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_resolve_rejects_invalid_override() {
        clear_env();
        std::env::set_var("TERMSYNC_LOG_LEVEL", "loud");

        let temp_dir = TempDir::new().unwrap();
        let result = Config::resolve(temp_dir.path().join("config.toml"));
        assert!(result.is_err());

        clear_env();
    }
}
