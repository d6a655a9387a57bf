mod config;
mod reading;
mod scheduler;
mod sensors;
mod station;
mod uploader;

#[cfg(test)]
mod test_support;

use crate::config::Config;
use crate::scheduler::Scheduler;
use crate::sensors::{open_chip, Bme280Sensor, Mics6814, Pms5003, ThermalZone};
use crate::station::Station;
use crate::uploader::ApiClient;
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use std::time::Instant;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

fn init_tracing(config: &Config) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,enviro_forwarder=info".into());
    let console_layer = tracing_subscriber::fmt::layer().with_target(true);

    let error_log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.error_log_path)
        .with_context(|| format!("failed to open {}", config.error_log_path.display()))?;
    let error_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(error_log))
        .with_filter(LevelFilter::ERROR);

    tracing_subscriber::registry()
        .with(console_layer.with_filter(env_filter))
        .with(error_layer)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config)?;

    if let Err(err) = run(&config) {
        tracing::error!(error = %format!("{err:#}"), "enviro-forwarder failed to start");
        return Err(err);
    }
    Ok(())
}

fn run(config: &Config) -> Result<()> {
    if config.api_url.is_none() {
        tracing::warn!("API_URL is not set; every upload will fail");
    }

    let mut chip = open_chip(&config.gpio_chip)?;
    let environment = Bme280Sensor::open(&config.i2c_bus)?;
    let gas = Mics6814::open(&config.i2c_bus, &mut chip)?;
    let particulate = Pms5003::open(&config.pms_serial, &mut chip)?;
    let cpu = ThermalZone::new(&config.cpu_temp_path);

    let mut station = Station::new(
        environment,
        gas,
        particulate,
        cpu,
        config.timezone,
        config.compensation_factor,
    );
    let mut api = ApiClient::new(config.api_url.as_deref(), config.http_timeout)?;
    let mut scheduler = Scheduler::new(
        config.air_quality_interval,
        config.enviro_interval,
        Instant::now(),
    );

    tracing::info!(
        api_url = config.api_url.as_deref().unwrap_or("<unset>"),
        air_quality_interval_secs = config.air_quality_interval.as_secs(),
        enviro_interval_secs = config.enviro_interval.as_secs(),
        "starting Enviro+ data send"
    );
    scheduler.run(&mut station, &mut api, config.loop_delay)
}
