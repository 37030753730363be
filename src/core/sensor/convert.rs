//! Raw-code conversion and frame decoding for SHT3x-class sensors.
//!
//! A measurement frame is six bytes: temperature MSB, LSB, CRC followed by
//! humidity MSB, LSB, CRC. Both words are 16-bit codes scaled linearly over
//! the full range.

use super::{error::SensorError, types::SensorResult};

/// Length of a measurement frame in bytes.
pub const FRAME_LEN: usize = 6;

const FULL_SCALE: f64 = 65535.0;

/// Temperature in °C for a raw code: `-45 + 175 * raw / 65535`.
pub fn celsius(raw: u16) -> f64 {
    -45.0 + 175.0 * f64::from(raw) / FULL_SCALE
}

/// Temperature in °F for a raw code: `-49 + 315 * raw / 65535`.
pub fn fahrenheit(raw: u16) -> f64 {
    -49.0 + 315.0 * f64::from(raw) / FULL_SCALE
}

/// Relative humidity in percent for a raw code: `100 * raw / 65535`.
pub fn humidity(raw: u16) -> f64 {
    100.0 * f64::from(raw) / FULL_SCALE
}

/// Sensirion CRC-8 (polynomial 0x31, init 0xFF, no reflection, no final xor).
pub fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0xFF_u8, |mut crc, byte| {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
        crc
    })
}

/// A decoded measurement frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub raw_temperature: u16,
    pub temperature_crc: u8,
    pub raw_humidity: u16,
    pub humidity_crc: u8,
}

impl Frame {
    pub fn from_bytes(bytes: &[u8; FRAME_LEN]) -> Self {
        Self {
            raw_temperature: u16::from_be_bytes([bytes[0], bytes[1]]),
            temperature_crc: bytes[2],
            raw_humidity: u16::from_be_bytes([bytes[3], bytes[4]]),
            humidity_crc: bytes[5],
        }
    }

    /// Checks both words against their CRC bytes.
    ///
    /// # Errors
    ///
    /// Returns `SensorError::Checksum` for the first word that does not match.
    pub fn verify(&self) -> SensorResult<()> {
        let words = [
            ("temperature", self.raw_temperature, self.temperature_crc),
            ("humidity", self.raw_humidity, self.humidity_crc),
        ];
        for (word, value, received) in words {
            let expected = crc8(&value.to_be_bytes());
            if expected != received {
                return Err(SensorError::Checksum {
                    word,
                    expected,
                    received,
                });
            }
        }
        Ok(())
    }

    pub fn celsius(&self) -> f64 {
        celsius(self.raw_temperature)
    }

    pub fn fahrenheit(&self) -> f64 {
        fahrenheit(self.raw_temperature)
    }

    pub fn humidity(&self) -> f64 {
        humidity(self.raw_humidity)
    }
}
