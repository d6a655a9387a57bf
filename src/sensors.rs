mod bme;
mod gpio;
mod mics6814;
mod pms5003;
mod thermal;

pub use bme::Bme280Sensor;
pub use gpio::open_chip;
pub use mics6814::Mics6814;
pub use pms5003::Pms5003;
pub use thermal::ThermalZone;

use crate::reading::{GasResistances, ParticulateSample};
use thiserror::Error;

/// Read failures worth one device reset and a second attempt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransientError {
    #[error("read timed out: {0}")]
    Timeout(String),
    #[error("checksum mismatch: frame says {expected:#06x}, computed {computed:#06x}")]
    ChecksumMismatch { expected: u16, computed: u16 },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SensorError {
    #[error("transient sensor error: {0}")]
    Transient(#[from] TransientError),
    #[error("sensor error: {0}")]
    Fatal(String),
}

impl SensorError {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

pub type SensorResult<T> = Result<T, SensorError>;

/// Temperature, pressure and humidity source (BME280 on the Enviro+ board).
pub trait EnvironmentalSensor {
    /// Degrees Celsius.
    fn temperature(&mut self) -> SensorResult<f64>;
    /// Hectopascals.
    fn pressure(&mut self) -> SensorResult<f64>;
    /// Relative humidity, percent.
    fn humidity(&mut self) -> SensorResult<f64>;
}

pub trait GasSensor {
    fn read_all(&mut self) -> SensorResult<GasResistances>;
}

pub trait ParticulateSensor {
    fn read(&mut self) -> SensorResult<ParticulateSample>;
    fn reset(&mut self) -> SensorResult<()>;
}

pub trait CpuTemperature {
    /// Degrees Celsius.
    fn cpu_temperature(&mut self) -> SensorResult<f64>;
}

/// Runs `read`; on a transient failure runs `reset` once and `read` once more.
///
/// Fatal errors from the first attempt and any error from `reset` or the second
/// attempt are returned as-is.
pub fn retry_once_after_reset<S, T>(
    sensor: &mut S,
    mut read: impl FnMut(&mut S) -> SensorResult<T>,
    mut reset: impl FnMut(&mut S) -> SensorResult<()>,
) -> SensorResult<T> {
    match read(sensor) {
        Err(err) if err.is_transient() => {
            tracing::info!(error = %err, "sensor read failed; resetting and retrying");
            reset(sensor)?;
            read(sensor)
        }
        other => other,
    }
}
