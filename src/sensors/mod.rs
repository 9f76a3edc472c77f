//! Sensor drivers for the Enviro and Enviro+ boards.
//!
//! Each physical sensor sits behind a small trait so the sampler can run with
//! whichever devices are actually present, and tests can substitute fakes.

pub mod bme280;
pub mod cpu;
pub mod gas;
pub mod lc709203f;
pub mod ltr559;
pub mod pms5003;

use crate::error::Result;
use crate::hardware::{self, PiI2c, PiUart};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// BME280 output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherReading {
    /// °C
    pub temperature: f64,
    /// hPa
    pub pressure: f64,
    /// %RH
    pub humidity: f64,
}

/// LTR559 output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightReading {
    pub lux: f64,
    /// Raw 11-bit proximity, larger is closer
    pub proximity: f64,
}

/// MICS6814 element resistances in Ω.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasReading {
    pub oxidising: f64,
    pub reducing: f64,
    pub nh3: f64,
}

/// PMS5003 concentrations in µg/m³.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticulateReading {
    pub pm1: f64,
    pub pm25: f64,
    pub pm10: f64,
}

/// LC709203F output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryReading {
    pub voltage: f64,
    pub percentage: f64,
}

pub trait WeatherSensor: Send {
    fn read(&mut self) -> Result<WeatherReading>;
}

pub trait LightSensor: Send {
    fn read(&mut self) -> Result<LightReading>;
}

pub trait GasSensor: Send {
    fn read(&mut self) -> Result<GasReading>;
}

pub trait ParticulateSensor: Send {
    fn read(&mut self) -> Result<ParticulateReading>;
}

pub trait BatteryMonitor: Send {
    fn read(&mut self) -> Result<BatteryReading>;
}

pub trait CpuThermometer: Send {
    fn read_celsius(&mut self) -> Result<f64>;
}

/// The sensors the sampler polls. Missing devices are `None`.
pub struct SensorSet {
    pub weather: Option<Box<dyn WeatherSensor>>,
    pub light: Option<Box<dyn LightSensor>>,
    pub gas: Option<Box<dyn GasSensor>>,
    pub particulates: Option<Box<dyn ParticulateSensor>>,
    pub battery: Option<Box<dyn BatteryMonitor>>,
    pub cpu: Box<dyn CpuThermometer>,
}

impl SensorSet {
    /// A set with no board sensors, only the CPU thermal zone.
    pub fn cpu_only() -> Self {
        Self {
            weather: None,
            light: None,
            gas: None,
            particulates: None,
            battery: None,
            cpu: Box::new(cpu::ThermalZone::default()),
        }
    }

    /// Open every sensor on the board. A device that fails to open is logged
    /// and left out; the PMS5003 is skipped entirely on an Enviro (`enviro`).
    pub fn open(enviro: bool) -> Self {
        let mut set = Self::cpu_only();

        set.weather = open_logged("BME280", || {
            let sensor = bme280::Bme280::new(PiI2c::open(bme280::ADDRESS)?)?;
            Ok(Box::new(sensor) as Box<dyn WeatherSensor>)
        });

        set.light = open_logged("LTR559", || {
            let sensor = ltr559::Ltr559::new(PiI2c::open(ltr559::ADDRESS)?)?;
            Ok(Box::new(sensor) as Box<dyn LightSensor>)
        });

        set.gas = open_logged("MICS6814", || {
            let heater = match hardware::drive_high(gas::HEATER_PIN) {
                Ok(guard) => Some(guard),
                Err(e) => {
                    warn!("Gas heater not enabled: {}", e);
                    None
                }
            };
            let sensor = gas::Mics6814::new(PiI2c::open(gas::ADDRESS)?, heater);
            Ok(Box::new(sensor) as Box<dyn GasSensor>)
        });

        if enviro {
            info!("Enviro board selected, particulate sensor disabled");
        } else {
            set.particulates = open_logged("PMS5003", || {
                let port = PiUart::open(
                    Path::new(pms5003::DEVICE),
                    pms5003::BAUD_RATE,
                    Duration::from_secs(1),
                )?;
                Ok(Box::new(pms5003::Pms5003::new(port)) as Box<dyn ParticulateSensor>)
            });
        }

        // The fuel gauge is an optional add-on; its absence is normal
        set.battery = match PiI2c::open(lc709203f::ADDRESS)
            .and_then(|bus| lc709203f::Lc709203f::new(bus, lc709203f::PackSize::Mah3000))
        {
            Ok(gauge) => {
                info!("LC709203F battery monitor found");
                Some(Box::new(gauge) as Box<dyn BatteryMonitor>)
            }
            Err(e) => {
                info!("No battery monitor: {}", e);
                None
            }
        };

        set
    }
}

fn open_logged<T>(name: &str, open: impl FnOnce() -> Result<T>) -> Option<T> {
    match open() {
        Ok(sensor) => {
            info!("{} initialized", name);
            Some(sensor)
        }
        Err(e) => {
            warn!("Failed to initialize {}: {}", name, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "hardware"))]
    #[test]
    fn test_open_without_hardware_leaves_board_sensors_out() {
        let set = SensorSet::open(false);
        assert!(set.weather.is_none());
        assert!(set.light.is_none());
        assert!(set.gas.is_none());
        assert!(set.particulates.is_none());
        assert!(set.battery.is_none());
    }

    #[test]
    fn test_enviro_skips_particulates() {
        let set = SensorSet::open(true);
        assert!(set.particulates.is_none());
    }
}
