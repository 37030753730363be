//! Configuration for the collector connection.
//!
//! All fields support serde deserialization with defaults, so a minimal TOML
//! section only needs the collector `host`:
//!
//! ```toml
//! [socket]
//! host = "https://collector.example.com"
//! device_id = "1"
//! monitoring_group_id = "1"
//! ```
//!
//! Constraints are enforced by the `validator` crate when the application
//! configuration is loaded, so an invalid value fails at startup rather than
//! on the first connect attempt.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;
use validator::{Validate, ValidationError};

use super::error::TransferError;

/// Event name used for temperature recordings.
pub const DEFAULT_EVENT: &str = "send-temperature-recording";

/// Collector connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// Collector base URL, e.g. `http://localhost:3001`.
    ///
    /// Required. An empty host is rejected at validation time.
    #[validate(custom(function = "validate_host"))]
    pub host: String,

    /// Identifier of this device, sent as the `deviceId` query parameter.
    #[validate(length(min = 1, max = 64, message = "Device id must be between 1 and 64 characters"))]
    pub device_id: String,

    /// Monitoring group this device reports into, sent as `monitoringGroupId`.
    #[validate(length(
        min = 1,
        max = 64,
        message = "Monitoring group id must be between 1 and 64 characters"
    ))]
    pub monitoring_group_id: String,

    /// Name of the event carrying each reading.
    #[validate(length(min = 1, message = "Event name must not be empty"))]
    pub event: String,

    /// Maximum time (seconds) a single connect attempt may take.
    ///
    /// The attempt is abandoned when this elapses; the next cycle tries again.
    #[validate(range(
        min = 1,
        max = 300,
        message = "Connect timeout must be between 1 and 300 seconds"
    ))]
    pub connect_timeout: u64,

    /// Session age (seconds) after which the link is forcibly renewed.
    ///
    /// Long-lived links have been seen to report connected while the collector
    /// receives nothing; renewing on age is the only signal available.
    #[validate(range(
        min = 10,
        max = 86400,
        message = "Renewal interval must be between 10 and 86400 seconds"
    ))]
    pub renewal_interval: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::new(),
            device_id: "1".to_string(),
            monitoring_group_id: "1".to_string(),
            event: DEFAULT_EVENT.to_string(),
            connect_timeout: 10,
            renewal_interval: 300,
        }
    }
}

impl Config {
    /// Connect deadline as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Renewal threshold as a `Duration`.
    pub fn renewal_interval(&self) -> Duration {
        Duration::from_secs(self.renewal_interval)
    }

    /// Builds the connect URL with the identity query parameters appended.
    ///
    /// Existing query parameters on `host` are preserved.
    ///
    /// # Errors
    ///
    /// Returns `TransferError::InvalidEndpoint` if `host` is not a URL.
    pub fn endpoint_url(&self) -> Result<Url, TransferError> {
        let mut url = Url::parse(&self.host)?;
        url.query_pairs_mut()
            .append_pair("deviceId", &self.device_id)
            .append_pair("monitoringGroupId", &self.monitoring_group_id);
        Ok(url)
    }
}

fn validate_host(host: &str) -> Result<(), ValidationError> {
    if host.trim().is_empty() {
        let mut err = ValidationError::new("missing_host");
        err.message = Some("Collector host is required".into());
        return Err(err);
    }
    if Url::parse(host).is_err() {
        let mut err = ValidationError::new("invalid_host");
        err.message = Some(format!("Collector host is not a valid URL: {host}").into());
        return Err(err);
    }
    Ok(())
}
