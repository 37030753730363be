use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::SensorError;

/// Result type for every sampling operation.
pub type SensorResult<T> = std::result::Result<T, SensorError>;

/// One converted measurement, as sent to the collector.
///
/// Serializes to `{"id", "temperature", "humidity", "timeReceived"}` with the
/// timestamp in RFC 3339. Fields are fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    id: Uuid,
    temperature: f64,
    humidity: f64,
    #[serde(rename = "timeReceived", with = "time::serde::rfc3339")]
    observed_at: OffsetDateTime,
}

impl Reading {
    /// Stamps a new reading with a random id and the current UTC time.
    pub fn new(temperature: f64, humidity: f64) -> Self {
        Self::at(temperature, humidity, OffsetDateTime::now_utc())
    }

    pub fn at(temperature: f64, humidity: f64, observed_at: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            temperature,
            humidity,
            observed_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Temperature in °C.
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Relative humidity in percent.
    pub fn humidity(&self) -> f64 {
        self.humidity
    }

    pub fn observed_at(&self) -> OffsetDateTime {
        self.observed_at
    }
}
