use super::{CpuTemperature, SensorError, SensorResult};
use std::fs;
use std::path::PathBuf;

/// Linux thermal zone exposing the SoC temperature in millidegrees Celsius.
#[derive(Debug, Clone)]
pub struct ThermalZone {
    path: PathBuf,
}

impl ThermalZone {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CpuTemperature for ThermalZone {
    fn cpu_temperature(&mut self) -> SensorResult<f64> {
        let raw = fs::read_to_string(&self.path).map_err(|err| {
            SensorError::fatal(format!("failed to read {}: {err}", self.path.display()))
        })?;
        parse_millidegrees(&raw).ok_or_else(|| {
            SensorError::fatal(format!(
                "unexpected contents in {}: {:?}",
                self.path.display(),
                raw.trim()
            ))
        })
    }
}

fn parse_millidegrees(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .map(|millis| millis as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reads_millidegrees_as_celsius() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("temp");
        fs::write(&path, "48312\n").unwrap();

        let mut zone = ThermalZone::new(&path);
        let value = zone.cpu_temperature().unwrap();
        assert!((value - 48.312).abs() < 1e-9);
    }

    #[test]
    fn garbage_is_a_fatal_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("temp");
        fs::write(&path, "hot").unwrap();

        let err = ThermalZone::new(&path).cpu_temperature().unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn missing_file_is_a_fatal_error() {
        let dir = TempDir::new().unwrap();
        let err = ThermalZone::new(dir.path().join("absent"))
            .cpu_temperature()
            .unwrap_err();
        assert!(matches!(err, SensorError::Fatal(_)));
    }
}
