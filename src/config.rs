use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: Option<String>,
    pub http_timeout: Duration,

    pub air_quality_interval: Duration,
    pub enviro_interval: Duration,
    pub loop_delay: Duration,

    pub compensation_factor: f64,
    pub timezone: Tz,

    pub error_log_path: PathBuf,

    pub cpu_temp_path: PathBuf,
    pub i2c_bus: PathBuf,
    pub pms_serial: String,
    pub gpio_chip: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let api_url = env_optional("API_URL").map(|url| url.trim_end_matches('/').to_string());
        let http_timeout = Duration::from_secs(env_u64("ENVIRO_HTTP_TIMEOUT_SECS", Some(10))?);

        let air_quality_interval =
            Duration::from_secs(env_u64("ENVIRO_AIR_QUALITY_INTERVAL_SECS", Some(300))?);
        let enviro_interval =
            Duration::from_secs(env_u64("ENVIRO_ENVIRO_INTERVAL_SECS", Some(900))?);
        let loop_delay = Duration::from_millis(env_u64("ENVIRO_LOOP_DELAY_MS", Some(0))?);

        let compensation_factor = env_f64("ENVIRO_COMPENSATION_FACTOR", Some(2.25))?;
        if !compensation_factor.is_finite() || compensation_factor == 0.0 {
            return Err(anyhow!(
                "ENVIRO_COMPENSATION_FACTOR must be a non-zero number"
            ));
        }

        let timezone_name = env_string("ENVIRO_TIMEZONE", Some("Europe/Paris".to_string()))?;
        let timezone = timezone_name
            .parse::<Tz>()
            .map_err(|err| anyhow!("invalid ENVIRO_TIMEZONE {timezone_name:?}: {err}"))?;

        let error_log_path =
            PathBuf::from(env_string("ENVIRO_ERROR_LOG", Some("error.log".to_string()))?);

        let cpu_temp_path = PathBuf::from(env_string(
            "ENVIRO_CPU_TEMP_PATH",
            Some("/sys/class/thermal/thermal_zone0/temp".to_string()),
        )?);
        let i2c_bus = PathBuf::from(env_string("ENVIRO_I2C_BUS", Some("/dev/i2c-1".to_string()))?);
        let pms_serial = env_string("ENVIRO_PMS_SERIAL", Some("/dev/ttyAMA0".to_string()))?;
        let gpio_chip =
            PathBuf::from(env_string("ENVIRO_GPIO_CHIP", Some("/dev/gpiochip0".to_string()))?);

        Ok(Self {
            api_url,
            http_timeout,
            air_quality_interval,
            enviro_interval,
            loop_delay,
            compensation_factor,
            timezone,
            error_log_path,
            cpu_temp_path,
            i2c_bus,
            pms_serial,
            gpio_chip,
        })
    }
}

fn env_string(key: &str, default: Option<String>) -> Result<String> {
    match env::var(key) {
        Ok(value) => Ok(value.trim().to_string()),
        Err(_) => default.ok_or_else(|| anyhow!("missing env var {key}")),
    }
}

fn env_u64(key: &str, default: Option<u64>) -> Result<u64> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .with_context(|| format!("invalid {key}")),
        Err(_) => default.ok_or_else(|| anyhow!("missing env var {key}")),
    }
}

fn env_f64(key: &str, default: Option<f64>) -> Result<f64> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<f64>()
            .with_context(|| format!("invalid {key}")),
        Err(_) => default.ok_or_else(|| anyhow!("missing env var {key}")),
    }
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-wide; serialize the tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const KEYS: &[&str] = &[
        "API_URL",
        "ENVIRO_HTTP_TIMEOUT_SECS",
        "ENVIRO_AIR_QUALITY_INTERVAL_SECS",
        "ENVIRO_ENVIRO_INTERVAL_SECS",
        "ENVIRO_LOOP_DELAY_MS",
        "ENVIRO_COMPENSATION_FACTOR",
        "ENVIRO_TIMEZONE",
    ];

    fn clear_env() {
        for key in KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    fn defaults_match_deployed_station() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
        clear_env();

        let config = Config::from_env().unwrap();
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.air_quality_interval, Duration::from_secs(300));
        assert_eq!(config.enviro_interval, Duration::from_secs(900));
        assert_eq!(config.loop_delay, Duration::ZERO);
        assert_eq!(config.compensation_factor, 2.25);
        assert_eq!(config.timezone, chrono_tz::Europe::Paris);
        assert_eq!(
            config.cpu_temp_path,
            PathBuf::from("/sys/class/thermal/thermal_zone0/temp")
        );
    }

    #[test]
    fn api_url_is_trimmed() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
        clear_env();
        env::set_var("API_URL", " http://station.local:3000/api/ ");

        let config = Config::from_env().unwrap();
        assert_eq!(
            config.api_url.as_deref(),
            Some("http://station.local:3000/api")
        );
        clear_env();
    }

    #[test]
    fn rejects_invalid_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
        clear_env();

        env::set_var("ENVIRO_AIR_QUALITY_INTERVAL_SECS", "five minutes");
        assert!(Config::from_env().is_err());
        clear_env();

        env::set_var("ENVIRO_TIMEZONE", "Mars/Olympus_Mons");
        assert!(Config::from_env().is_err());
        clear_env();

        env::set_var("ENVIRO_COMPENSATION_FACTOR", "0");
        assert!(Config::from_env().is_err());
        clear_env();
    }
}
