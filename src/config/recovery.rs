//! Configuration of the external bus recovery service.
//!
//! The service is a separate process able to power-cycle the node (or reset
//! the bus driver). It is called with `PUT {host}{path}` and an API key header.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Recovery service settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_endpoint"))]
pub struct RecoveryConfig {
    /// When false, sensor faults are only logged.
    pub enabled: bool,

    /// Base URL of the recovery service, e.g. `http://plug-controller:8080`.
    pub host: String,

    /// Path of the reset endpoint.
    #[validate(length(min = 1, message = "Recovery path must not be empty"))]
    pub path: String,

    /// Shared secret sent in the `X-API-Key` header.
    #[serde(skip_serializing)]
    pub api_key: String,

    /// Request timeout in seconds.
    #[validate(range(
        min = 1,
        max = 120,
        message = "Recovery timeout must be between 1 and 120 seconds"
    ))]
    pub timeout: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: String::new(),
            path: "/raspberry-pi/reset".to_string(),
            api_key: String::new(),
            timeout: 10,
        }
    }
}

impl RecoveryConfig {
    /// Full URL of the reset endpoint.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.host.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

fn validate_endpoint(config: &RecoveryConfig) -> Result<(), ValidationError> {
    if !config.enabled {
        return Ok(());
    }
    if config.host.trim().is_empty() {
        let mut err = ValidationError::new("missing_recovery_host");
        err.message = Some("Recovery host is required when recovery is enabled".into());
        return Err(err);
    }
    if config.api_key.is_empty() {
        let mut err = ValidationError::new("missing_recovery_key");
        err.message = Some("Recovery API key is required when recovery is enabled".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> RecoveryConfig {
        RecoveryConfig {
            host: "http://plug:8080/".into(),
            api_key: "k".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_endpoint_joins_host_and_path() {
        assert_eq!(enabled().endpoint(), "http://plug:8080/raspberry-pi/reset");
    }

    #[test]
    fn test_enabled_requires_host_and_key() {
        assert!(enabled().validate().is_ok());

        let no_key = RecoveryConfig {
            api_key: String::new(),
            ..enabled()
        };
        assert!(no_key.validate().is_err());

        let no_host = RecoveryConfig {
            host: String::new(),
            ..enabled()
        };
        assert!(no_host.validate().is_err());
    }

    #[test]
    fn test_disabled_needs_nothing() {
        let config = RecoveryConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
