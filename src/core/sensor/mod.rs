//! Sensor acquisition with fault recovery.
//!
//! [`Sht3x`] runs one single-shot measurement per call: it writes the
//! measurement command, waits for the conversion to settle, reads the
//! six-byte frame back and converts it into a [`Reading`]. A bus failure at
//! either step hands off to the configured [`RecoveryTrigger`] before the
//! fault is returned, so the driving loop only has to skip the cycle.

use std::{sync::Arc, time::Duration};

use embedded_hal::i2c::I2c;
use tracing::{debug, instrument, warn};

use super::recovery::RecoveryTrigger;
use crate::config::sensor::SensorConfig;

pub mod convert;
pub mod error;
pub mod types;

pub use self::{
    convert::Frame,
    error::SensorError,
    types::{Reading, SensorResult},
};

/// Single-shot, high repeatability, clock stretching enabled.
pub const MEASURE_COMMAND: [u8; 2] = [0x2C, 0x06];

/// Register pointer written before reading the result frame.
pub const READ_REGISTER: u8 = 0x00;

/// A source of readings driven once per cycle.
#[async_trait::async_trait]
pub trait Sampler: Send {
    /// Takes one measurement.
    ///
    /// An `Err` is the fault signal for the cycle. Recovery, when the fault
    /// calls for it, has already been requested by the time this returns.
    async fn sample(&mut self) -> SensorResult<Reading>;
}

/// SHT3x-class temperature/humidity sensor on an I²C bus.
pub struct Sht3x<B> {
    bus: B,
    address: u8,
    settle_time: Duration,
    validate_checksum: bool,
    recovery: Arc<dyn RecoveryTrigger>,
}

impl<B> Sht3x<B>
where
    B: I2c + Send,
{
    pub fn new(bus: B, config: &SensorConfig, recovery: Arc<dyn RecoveryTrigger>) -> Self {
        Self {
            bus,
            address: config.address,
            settle_time: config.settle_time(),
            validate_checksum: config.validate_checksum,
            recovery,
        }
    }

    async fn read_frame(&mut self) -> SensorResult<Frame> {
        let address = self.address;
        self.bus
            .write(address, &MEASURE_COMMAND)
            .map_err(|e| SensorError::bus("write", address, &e))?;

        tokio::time::sleep(self.settle_time).await;

        let mut buf = [0u8; convert::FRAME_LEN];
        self.bus
            .write_read(address, &[READ_REGISTER], &mut buf)
            .map_err(|e| SensorError::bus("read", address, &e))?;

        Ok(Frame::from_bytes(&buf))
    }
}

#[async_trait::async_trait]
impl<B> Sampler for Sht3x<B>
where
    B: I2c + Send,
{
    #[instrument(skip(self), fields(address = self.address))]
    async fn sample(&mut self) -> SensorResult<Reading> {
        let frame = match self.read_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                if e.needs_recovery() {
                    warn!("Sensor bus fault, requesting reset: {}", e);
                    self.recovery.trigger().await;
                }
                return Err(e);
            }
        };

        if self.validate_checksum {
            frame.verify()?;
        }

        debug!(
            "C: {:.2} | F: {:.2} | H: {:.2}",
            frame.celsius(),
            frame.fahrenheit(),
            frame.humidity()
        );
        Ok(Reading::new(frame.celsius(), frame.humidity()))
    }
}

/// Opens the Linux I²C character device at `path`.
///
/// # Errors
///
/// Returns `SensorError::Open` if the device cannot be opened.
#[cfg(feature = "linux-i2c")]
pub fn open_bus(path: &str) -> SensorResult<linux_embedded_hal::I2cdev> {
    linux_embedded_hal::I2cdev::new(path).map_err(|e| SensorError::Open {
        path: path.to_string(),
        reason: e.to_string(),
    })
}
