//! Runtime configuration resolved from the environment.
//!
//! # Responsibility
//! - Provide defaults for database path, logging and wall-clock zone.
//! - Apply non-empty `NODESTORE_*` environment overrides.

use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

pub const ENV_DB_PATH: &str = "NODESTORE_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "NODESTORE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "NODESTORE_LOG_DIR";
pub const ENV_TIMEZONE: &str = "NODESTORE_TIMEZONE";

const DEFAULT_DB_FILE_NAME: &str = "nodestore.sqlite3";
const DEFAULT_LOG_DIR_NAME: &str = "nodestore-logs";

/// Zone used to interpret wall-clock date strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimezoneMode {
    #[default]
    Local,
    Utc,
}

impl FromStr for TimezoneMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "utc" => Ok(Self::Utc),
            other => Err(ConfigError::InvalidValue {
                key: ENV_TIMEZONE,
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    /// Must be absolute.
    pub log_dir: PathBuf,
    /// Mirror warnings and errors to stderr.
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            log_dir: std::env::temp_dir().join(DEFAULT_LOG_DIR_NAME),
            stderr: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub logging: LoggingConfig,
    pub timezone: TimezoneMode,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            logging: LoggingConfig::default(),
            timezone: TimezoneMode::default(),
        }
    }
}

impl AppConfig {
    /// Defaults overlaid with process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`. Blank values are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(path) = read(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            config.logging.level = level;
        }
        if let Some(dir) = read(ENV_LOG_DIR) {
            config.logging.log_dir = PathBuf::from(dir);
        }
        if let Some(zone) = read(ENV_TIMEZONE) {
            config.timezone = zone.parse()?;
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value } => write!(f, "invalid value `{value}` for {key}"),
        }
    }
}

impl Error for ConfigError {}
