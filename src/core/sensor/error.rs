use embedded_hal::i2c::ErrorKind;
use thiserror::Error;

/// Failure of a single sampling attempt.
///
/// Any `SensorError` returned by a sampler is the fault signal for that
/// cycle: the reading is discarded and nothing is emitted.
#[derive(Error, Debug)]
pub enum SensorError {
    /// The I²C bus rejected a transaction. Triggers out-of-band recovery.
    #[error("I2C {operation} at 0x{address:02x} failed ({kind:?}): {message}")]
    Bus {
        operation: &'static str,
        address: u8,
        kind: ErrorKind,
        message: String,
    },

    /// A received word did not match its CRC byte.
    #[error("Checksum mismatch on {word}: expected 0x{expected:02x}, received 0x{received:02x}")]
    Checksum {
        word: &'static str,
        expected: u8,
        received: u8,
    },

    /// The bus device could not be opened at startup.
    #[error("Failed to open I2C bus {path}: {reason}")]
    Open { path: String, reason: String },
}

impl SensorError {
    /// Wraps a HAL bus error with the operation that produced it.
    pub fn bus<E: embedded_hal::i2c::Error>(operation: &'static str, address: u8, err: &E) -> Self {
        SensorError::Bus {
            operation,
            address,
            kind: err.kind(),
            message: format!("{err:?}"),
        }
    }

    /// Whether this fault warrants power-cycling the sensor.
    pub fn needs_recovery(&self) -> bool {
        matches!(self, SensorError::Bus { .. })
    }
}
