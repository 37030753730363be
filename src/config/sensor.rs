//! Sensor bus and sampling configuration.
//!
//! Defaults match an SHT3x-class sensor wired to the first I²C bus of a
//! Raspberry Pi with the ADDR pin pulled low.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Sensor acquisition settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SensorConfig {
    /// I²C character device the sensor is attached to.
    #[validate(length(min = 1, message = "Bus path must not be empty"))]
    pub bus: String,

    /// 7-bit bus address of the sensor.
    #[validate(range(
        min = 0x03,
        max = 0x77,
        message = "Sensor address must be a 7-bit address between 0x03 and 0x77"
    ))]
    pub address: u8,

    /// Delay between the measurement trigger and the read-back, in milliseconds.
    ///
    /// The physical conversion must finish inside this window, otherwise the
    /// sensor NACKs the read.
    #[validate(range(
        min = 20,
        max = 5000,
        message = "Settle time must be between 20 and 5000 milliseconds"
    ))]
    pub settle_time_ms: u64,

    /// Reject frames whose CRC-8 does not match.
    ///
    /// Off by default: frames are converted as received.
    pub validate_checksum: bool,

    /// Seconds between the start of two sampling cycles.
    #[validate(range(
        min = 1,
        max = 3600,
        message = "Sample interval must be between 1 and 3600 seconds"
    ))]
    pub sample_interval: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            bus: "/dev/i2c-1".to_string(),
            address: 0x44,
            settle_time_ms: 500,
            validate_checksum: false,
            sample_interval: 3,
        }
    }
}

impl SensorConfig {
    pub fn settle_time(&self) -> Duration {
        Duration::from_millis(self.settle_time_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval)
    }
}
