use super::{EnvironmentalSensor, SensorError, SensorResult};
use anyhow::{anyhow, Result};
use bme280::i2c::BME280;
use bme280::Measurements;
use embedded_hal::i2c::ErrorType;
use linux_embedded_hal::{Delay, I2cdev};
use std::path::Path;

/// BME280 at its primary address (0x76) on the Enviro+ board.
pub struct Bme280Sensor {
    device: BME280<I2cdev>,
    delay: Delay,
}

impl Bme280Sensor {
    pub fn open(bus: &Path) -> Result<Self> {
        let i2c = I2cdev::new(bus)
            .map_err(|err| anyhow!("failed to open I2C bus {}: {err}", bus.display()))?;
        let mut device = BME280::new_primary(i2c);
        let mut delay = Delay;
        device
            .init(&mut delay)
            .map_err(|err| anyhow!("failed to initialise BME280: {err:?}"))?;
        Ok(Self { device, delay })
    }

    fn measure(&mut self) -> SensorResult<Measurements<<I2cdev as ErrorType>::Error>> {
        self.device
            .measure(&mut self.delay)
            .map_err(|err| SensorError::fatal(format!("BME280 measurement failed: {err:?}")))
    }
}

impl EnvironmentalSensor for Bme280Sensor {
    fn temperature(&mut self) -> SensorResult<f64> {
        Ok(f64::from(self.measure()?.temperature))
    }

    fn pressure(&mut self) -> SensorResult<f64> {
        // Driver reports pascals.
        Ok(f64::from(self.measure()?.pressure) / 100.0)
    }

    fn humidity(&mut self) -> SensorResult<f64> {
        Ok(f64::from(self.measure()?.humidity))
    }
}
