//! Application configuration loading, validation, and management.
//!
//! This module provides the top-level `Config` structure that aggregates
//! logging, sensor, recovery, and collector-link configurations. It handles
//! loading from a TOML file, a small set of environment overrides for
//! deployment secrets, and validation.
//!
//! The configuration is loaded once at startup and stays immutable afterwards.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use validator::Validate;

use self::{logger::LoggerConfig, recovery::RecoveryConfig, sensor::SensorConfig};

pub mod logger;
pub mod recovery;
pub mod sensor;

/// Simple macros for printing timestamped messages before the tracing subscriber
/// is initialized. These are used during early configuration loading.
#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        $crate::print_line!(console::style("INFO").green(), $($arg)*)
    };
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        $crate::print_line!(console::style("WARN").yellow(), $($arg)*)
    };
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        $crate::print_line!(console::style("ERROR").red(), $($arg)*)
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! print_line {
    ($level:expr, $($arg:tt)*) => {
        println!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(&time::macros::format_description!(
                        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
                    ))
                    .unwrap_or_default()
            ).dim(),
            $level,
            format_args!($($arg)*)
        )
    };
}

/// Environment variable pointing at the configuration file.
pub const CONFIG_ENV: &str = "THERMONODE_CONFIG";

/// Fallback configuration path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/thermonode/config.toml";

/// Errors that can occur during configuration loading, parsing, or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Generic configuration-related error with a descriptive message.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error while accessing configuration files.
    #[error("IO error while reading configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// Failure to parse the TOML configuration file.
    #[error("Parse error while reading configuration: {0}")]
    ParseError(String),

    /// Validation failure after successful parsing.
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Top-level application configuration.
#[derive(Serialize, Deserialize, Debug, Validate, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// Logging subsystem configuration.
    #[validate(nested)]
    pub logger: LoggerConfig,

    /// Collector link: endpoint, identity, connect deadline, renewal threshold.
    #[validate(nested)]
    pub socket: SocketConfig,

    /// Sensor bus and sampling cadence.
    #[validate(nested)]
    pub sensor: SensorConfig,

    /// Out-of-band bus recovery service.
    #[validate(nested)]
    pub recovery: RecoveryConfig,
}

pub type SocketConfig = thermonode_socket::Config;

impl Config {
    /// Constructs a new configuration by locating and loading the config file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the configuration file cannot be found,
    /// read, parsed, or validated.
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        Self::load(&config_path)
    }

    /// Determines the configuration file path.
    ///
    /// Priority:
    /// 1. `THERMONODE_CONFIG` environment variable
    /// 2. `/etc/thermonode/config.toml`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Config` if no suitable file is found.
    fn get_config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(config_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(config_path);
            print_info!("Using config from {}: {}", CONFIG_ENV, path.display());
            return Ok(path);
        }

        let fallback = Path::new(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            print_info!("Using default config path: {}", fallback.display());
            return Ok(fallback.to_path_buf());
        }

        Err(ConfigError::Config(
            "No configuration file found.".to_string(),
        ))
    }

    /// Loads, applies environment overrides to, and validates configuration
    /// from the specified path.
    ///
    /// # Errors
    ///
    /// Propagates IO, parsing, and validation errors as `ConfigError`.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        print_info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::Config(format!(
                "Configuration file does not exist: {}",
                path.display()
            )));
        }

        let config_str = fs::read_to_string(path)?;
        let mut config = Self::parse(&config_str)?;
        config.apply_overrides(|key| std::env::var(key).ok());

        config
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        print_info!("Successfully loaded config from: {}", path.display());
        Ok(config)
    }

    /// Parses a TOML document without validating it.
    pub fn parse(source: &str) -> Result<Config, ConfigError> {
        toml::from_str(source).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Overrides deployment-specific values from the environment.
    ///
    /// `lookup` returns the value of a variable if it is set. Recognised keys:
    /// `THERMONODE_SOCKET_HOST`, `THERMONODE_DEVICE_ID`,
    /// `THERMONODE_MONITORING_GROUP_ID`, `THERMONODE_RECOVERY_HOST`,
    /// `THERMONODE_RECOVERY_KEY`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let targets: [(&str, &mut String); 5] = [
            ("THERMONODE_SOCKET_HOST", &mut self.socket.host),
            ("THERMONODE_DEVICE_ID", &mut self.socket.device_id),
            (
                "THERMONODE_MONITORING_GROUP_ID",
                &mut self.socket.monitoring_group_id,
            ),
            ("THERMONODE_RECOVERY_HOST", &mut self.recovery.host),
            ("THERMONODE_RECOVERY_KEY", &mut self.recovery.api_key),
        ];

        for (key, field) in targets {
            if let Some(value) = lookup(key) {
                print_info!("Overriding configuration value from {}", key);
                *field = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, io::Write};

    use super::*;

    const MINIMAL: &str = r#"
        [socket]
        host = "http://collector.local:3001"

        [recovery]
        host = "http://plug-controller.local:8080"
        api_key = "secret"
    "#;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_minimal_config() {
        let file = write_config(MINIMAL);
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.socket.host, "http://collector.local:3001");
        assert_eq!(config.socket.connect_timeout, 10);
        assert_eq!(config.socket.renewal_interval, 300);
        assert_eq!(config.sensor.sample_interval, 3);
        assert_eq!(config.recovery.path, "/raspberry-pi/reset");
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = Config::load(Path::new("/nonexistent/thermonode.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Config(_)));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let file = write_config("[socket\nhost = ");
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_missing_socket_host_fails_validation() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains("Collector host is required"));
    }

    #[test]
    fn test_out_of_range_values_fail_validation() {
        let mut config = Config::parse(MINIMAL).unwrap();
        config.sensor.sample_interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_environment_overrides() {
        let mut config = Config::parse(MINIMAL).unwrap();
        let env: HashMap<&str, &str> = [
            ("THERMONODE_SOCKET_HOST", "http://other:3001"),
            ("THERMONODE_RECOVERY_KEY", "rotated"),
        ]
        .into_iter()
        .collect();

        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.socket.host, "http://other:3001");
        assert_eq!(config.recovery.api_key, "rotated");
        assert_eq!(config.socket.device_id, "1");
    }
}
