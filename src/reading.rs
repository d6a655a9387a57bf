use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;

pub const DATE_FORMAT: &str = "%d-%m-%Y %H:%M";

/// Environmental sample as posted to `/enviro-data`. Field order is the JSON key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnviroReading {
    pub date: String,
    pub temperature: String,
    pub pressure: String,
    pub humidity: String,
    pub oxidising: String,
    pub reducing: String,
    pub nh3: String,
}

/// Particulate sample as posted to `/air-quality`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AirQualityReading {
    pub date: String,
    pub pm1: String,
    pub pm25: String,
    pub pm10: String,
}

/// Raw values gathered from the environmental and gas sensors for one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnviroSample {
    pub raw_temperature: f64,
    pub cpu_temperature: f64,
    pub pressure: f64,
    pub humidity: f64,
    pub gas: GasResistances,
}

/// Gas sensor resistances in ohms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasResistances {
    pub oxidising: f64,
    pub reducing: f64,
    pub nh3: f64,
}

/// Mass concentrations in µg/m³ for the 1.0, 2.5 and 10 µm size cuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticulateSample {
    pub pm1: u16,
    pub pm25: u16,
    pub pm10: u16,
}

impl EnviroReading {
    pub fn from_sample(captured_at: DateTime<Tz>, sample: &EnviroSample, factor: f64) -> Self {
        let temperature =
            compensate_temperature(sample.raw_temperature, sample.cpu_temperature, factor);
        Self {
            date: format_date(captured_at),
            temperature: format_measurement(temperature),
            pressure: format_measurement(sample.pressure),
            humidity: format_measurement(sample.humidity),
            oxidising: format_gas(sample.gas.oxidising),
            reducing: format_gas(sample.gas.reducing),
            nh3: format_gas(sample.gas.nh3),
        }
    }
}

impl AirQualityReading {
    pub fn from_sample(captured_at: DateTime<Tz>, sample: &ParticulateSample) -> Self {
        Self {
            date: format_date(captured_at),
            pm1: sample.pm1.to_string(),
            pm25: sample.pm25.to_string(),
            pm10: sample.pm10.to_string(),
        }
    }
}

/// Corrects the sensor temperature for heat soaked up from the CPU next to it.
pub fn compensate_temperature(raw: f64, cpu: f64, factor: f64) -> f64 {
    raw - (cpu - raw) / factor
}

pub fn format_date(captured_at: DateTime<Tz>) -> String {
    captured_at.format(DATE_FORMAT).to_string()
}

fn format_measurement(value: f64) -> String {
    format!("{value:05.2}")
}

// Truncates toward zero; the API expects whole numbers.
fn format_gas(ohms: f64) -> String {
    ((ohms / 1000.0).trunc() as i64).to_string()
}
