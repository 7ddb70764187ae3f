//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::storage::{KeyEncoding, StoreConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable (development)
    #[default]
    Pretty,
    /// One JSON object per line (production)
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::Invalid(format!(
                "unknown log format {:?} (expected pretty or json)",
                other
            ))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        // Try default config locations
        let config_paths = [
            dirs::config_dir().map(|p| p.join("timebucket").join("config.toml")),
            Some(PathBuf::from("/etc/timebucket/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        // Fall back to environment-only config
        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any variable source (the environment in practice)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Storage overrides
        if let Some(path) = lookup("TIMEBUCKET_DB_PATH") {
            self.storage.path = PathBuf::from(path);
        }
        if let Some(encoding) = lookup("TIMEBUCKET_KEY_ENCODING") {
            match encoding.parse::<KeyEncoding>() {
                Ok(encoding) => self.storage.key_encoding = encoding,
                Err(e) => tracing::warn!("Ignoring TIMEBUCKET_KEY_ENCODING: {}", e),
            }
        }

        // Logging overrides
        if let Some(level) = lookup("TIMEBUCKET_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("TIMEBUCKET_LOG_FORMAT") {
            match format.parse::<LogFormat>() {
                Ok(format) => self.logging.format = format,
                Err(e) => tracing::warn!("Ignoring TIMEBUCKET_LOG_FORMAT: {}", e),
            }
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Timebucket Configuration
#
# Environment variables override these settings:
# - TIMEBUCKET_DB_PATH
# - TIMEBUCKET_KEY_ENCODING
# - TIMEBUCKET_LOG_LEVEL
# - TIMEBUCKET_LOG_FORMAT

[storage]
# Database file (created on first use).
# Defaults to <data dir>/timebucket/timebucket.db, e.g. ~/.local/share on Linux.
# path = "/var/lib/timebucket/timebucket.db"

# Timestamp key encoding: binary (compact, any year) or text (readable, years 0000-9999).
# Must match the encoding the file was written with.
key_encoding = "binary"

# Commit durability: off, normal, full
synchronous = "normal"

# How long a writer waits for a locked database (ms)
busy_timeout_ms = 5000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/timebucket/timebucket.log"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SyncMode;
    use std::collections::HashMap;

    #[test]
    fn test_default_template_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.storage.key_encoding, KeyEncoding::Binary);
        assert_eq!(config.storage.synchronous, SyncMode::Normal);
        assert_eq!(config.storage.busy_timeout_ms, 5000);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.logging.file, None);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = Config::parse(
            r#"
            [storage]
            path = "/data/ts.db"
            key_encoding = "text"
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.path, PathBuf::from("/data/ts.db"));
        assert_eq!(config.storage.key_encoding, KeyEncoding::Text);
        assert_eq!(config.storage.synchronous, SyncMode::Normal);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_unknown_encoding_is_a_parse_error() {
        assert!(Config::parse("[storage]\nkey_encoding = \"rfc3339\"").is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TIMEBUCKET_DB_PATH", "/tmp/override.db"),
            ("TIMEBUCKET_KEY_ENCODING", "text"),
            ("TIMEBUCKET_LOG_LEVEL", "debug"),
            ("TIMEBUCKET_LOG_FORMAT", "yaml"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.storage.path, PathBuf::from("/tmp/override.db"));
        assert_eq!(config.storage.key_encoding, KeyEncoding::Text);
        assert_eq!(config.logging.level, "debug");
        // Invalid values are ignored
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging]\nformat = \"json\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
    }
}
