//! Raspberry Pi SoC temperature from the kernel thermal zone.

use crate::error::{ExporterError, Result};
use crate::sensors::CpuThermometer;
use std::fs;
use std::path::PathBuf;

pub const THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

pub struct ThermalZone {
    path: PathBuf,
}

impl ThermalZone {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ThermalZone {
    fn default() -> Self {
        Self::new(THERMAL_ZONE)
    }
}

/// Parse a millidegree reading such as `"48312\n"`.
pub fn parse_millicelsius(raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<i64>()
        .map(|millicelsius| millicelsius as f64 / 1000.0)
        .map_err(|e| ExporterError::parse_error(format!("thermal zone value {:?}: {}", raw, e)))
}

impl CpuThermometer for ThermalZone {
    fn read_celsius(&mut self) -> Result<f64> {
        parse_millicelsius(&fs::read_to_string(&self.path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_millicelsius() {
        assert_eq!(parse_millicelsius("48312\n").unwrap(), 48.312);
        assert!(parse_millicelsius("hot").is_err());
    }

    #[test]
    fn test_reads_zone_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "51000").unwrap();
        let mut zone = ThermalZone::new(file.path());
        assert_eq!(zone.read_celsius().unwrap(), 51.0);
    }

    #[test]
    fn test_missing_zone_is_io_error() {
        let mut zone = ThermalZone::new("/nonexistent/thermal_zone0/temp");
        assert!(matches!(zone.read_celsius(), Err(ExporterError::Io(_))));
    }
}
