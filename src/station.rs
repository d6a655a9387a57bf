use crate::reading::{AirQualityReading, EnviroReading, EnviroSample};
use crate::sensors::{
    retry_once_after_reset, CpuTemperature, EnvironmentalSensor, GasSensor, ParticulateSensor,
    SensorResult,
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Produces formatted readings for the scheduler.
pub trait ReadingSource {
    fn read_enviro(&mut self) -> SensorResult<EnviroReading>;
    fn read_air_quality(&mut self) -> SensorResult<AirQualityReading>;
}

/// The sensors of one Enviro+ station.
pub struct Station<E, G, P, C> {
    environment: E,
    gas: G,
    particulate: P,
    cpu: C,
    timezone: Tz,
    compensation_factor: f64,
}

impl<E, G, P, C> Station<E, G, P, C>
where
    E: EnvironmentalSensor,
    G: GasSensor,
    P: ParticulateSensor,
    C: CpuTemperature,
{
    pub fn new(
        environment: E,
        gas: G,
        particulate: P,
        cpu: C,
        timezone: Tz,
        compensation_factor: f64,
    ) -> Self {
        Self {
            environment,
            gas,
            particulate,
            cpu,
            timezone,
            compensation_factor,
        }
    }

    fn local_now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.timezone)
    }
}

impl<E, G, P, C> ReadingSource for Station<E, G, P, C>
where
    E: EnvironmentalSensor,
    G: GasSensor,
    P: ParticulateSensor,
    C: CpuTemperature,
{
    fn read_enviro(&mut self) -> SensorResult<EnviroReading> {
        let cpu_temperature = self.cpu.cpu_temperature()?;
        let raw_temperature = self.environment.temperature()?;
        let captured_at = self.local_now();
        let pressure = self.environment.pressure()?;
        let humidity = self.environment.humidity()?;
        let gas = self.gas.read_all()?;

        let sample = EnviroSample {
            raw_temperature,
            cpu_temperature,
            pressure,
            humidity,
            gas,
        };
        Ok(EnviroReading::from_sample(
            captured_at,
            &sample,
            self.compensation_factor,
        ))
    }

    fn read_air_quality(&mut self) -> SensorResult<AirQualityReading> {
        let captured_at = self.local_now();
        let sample = retry_once_after_reset(&mut self.particulate, P::read, P::reset)?;
        Ok(AirQualityReading::from_sample(captured_at, &sample))
    }
}
