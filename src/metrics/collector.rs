//! Sensor polling and snapshot assembly.

use crate::metrics::aqi;
use crate::metrics::data::{Dashboard, EnviroSnapshot, SensorReadings};
use crate::metrics::derived::{
    aqi_to_color, correct_humidity, describe_aqi, describe_humidity, describe_pressure,
    group_thousands, PressureTrend, Temperature, TemperatureCompensator,
};
use crate::metrics::prometheus;
use crate::sensors::SensorSet;
use chrono::{DateTime, Local};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

/// Seconds after start-up before the min/max temperature is tracked.
pub const WARM_UP: Duration = Duration::from_secs(30);
/// Below this the panel backlight is switched off.
pub const BACKLIGHT_LUX: f64 = 10.0;

/// Per-run adjustments applied to the raw readings.
#[derive(Debug, Clone, Default)]
pub struct SamplingOptions {
    /// Subtracted from the raw temperature
    pub temperature_offset: Option<f64>,
    /// Added to the raw humidity
    pub humidity_offset: Option<f64>,
    /// Enviro board without a particulate sensor
    pub enviro: bool,
    /// Log every sample at info level
    pub debug: bool,
}

/// Polls a [`SensorSet`] and turns the results into [`EnviroSnapshot`]s.
///
/// A sensor that fails keeps its previous value so one flaky device never
/// blanks the others.
pub struct EnviroCollector {
    sensors: SensorSet,
    options: SamplingOptions,
    readings: SensorReadings,
    compensator: Option<TemperatureCompensator>,
    pressure_trend: PressureTrend,
    temperature_range: Option<(f64, f64)>,
    started: Instant,
}

impl EnviroCollector {
    pub fn new(sensors: SensorSet, options: SamplingOptions) -> Self {
        Self {
            sensors,
            options,
            readings: SensorReadings::default(),
            compensator: None,
            pressure_trend: PressureTrend::default(),
            temperature_range: None,
            started: Instant::now(),
        }
    }

    /// The readings as of the last sample.
    pub fn readings(&self) -> &SensorReadings {
        &self.readings
    }

    /// Read every sensor once and build the snapshot. Blocks on bus I/O.
    pub fn sample(&mut self, external_aqi: Option<i64>) -> EnviroSnapshot {
        let elapsed = self.started.elapsed();
        self.sample_at(external_aqi, Local::now(), elapsed)
    }

    fn sample_at(
        &mut self,
        external_aqi: Option<i64>,
        now: DateTime<Local>,
        elapsed: Duration,
    ) -> EnviroSnapshot {
        self.read_sensors();
        self.readings.external_aqi = external_aqi;
        self.readings.timestamp = now.timestamp_millis().max(0) as u64;

        prometheus::record_readings(&self.readings);
        if self.options.debug {
            info!("Sensor data: {:?}", self.readings);
        }

        let dashboard = self.dashboard(now, elapsed);
        EnviroSnapshot {
            readings: self.readings.clone(),
            dashboard,
        }
    }

    fn read_sensors(&mut self) {
        let readings = &mut self.readings;

        if let Some(weather) = self.sensors.weather.as_mut() {
            match weather.read() {
                Ok(sample) => {
                    readings.temperature = match self.options.temperature_offset {
                        Some(offset) => sample.temperature - offset,
                        None => sample.temperature,
                    };
                    readings.humidity = match self.options.humidity_offset {
                        Some(offset) => sample.humidity + offset,
                        None => sample.humidity,
                    };
                    readings.pressure = sample.pressure;
                }
                Err(e) => warn!("Failed to read weather sensor with error: {}", e),
            }
        }

        if let Some(light) = self.sensors.light.as_mut() {
            match light.read() {
                Ok(sample) => {
                    readings.lux = sample.lux;
                    readings.proximity = sample.proximity;
                }
                Err(e) => warn!("Failed to read light sensor with error: {}", e),
            }
        }

        if let Some(gas) = self.sensors.gas.as_mut() {
            match gas.read() {
                Ok(sample) => {
                    readings.oxidising = sample.oxidising;
                    readings.reducing = sample.reducing;
                    readings.nh3 = sample.nh3;
                    prometheus::observe_gas(&sample);
                }
                Err(e) => warn!("Failed to read gas sensor with error: {}", e),
            }
        }

        if !self.options.enviro {
            if let Some(particulates) = self.sensors.particulates.as_mut() {
                match particulates.read() {
                    Ok(sample) => {
                        readings.pm1 = sample.pm1;
                        readings.pm25 = sample.pm25;
                        readings.pm10 = sample.pm10;
                        readings.aqi = aqi::us_epa(sample.pm25, sample.pm10) as f64;
                        prometheus::observe_particulates(&sample, readings.aqi);
                    }
                    Err(e) => warn!("Failed to read PMS5003: {}", e),
                }
            }
        }

        match self.sensors.cpu.read_celsius() {
            Ok(celsius) => {
                readings.cpu_temperature = celsius;
                match self.compensator.as_mut() {
                    Some(compensator) => compensator.push_cpu(celsius),
                    None => self.compensator = Some(TemperatureCompensator::new(celsius)),
                }
            }
            Err(e) => warn!("Failed to read CPU temperature: {}", e),
        }

        if let Some(battery) = self.sensors.battery.as_mut() {
            match battery.read() {
                Ok(sample) => {
                    readings.battery_voltage = sample.voltage;
                    readings.battery_percentage = sample.percentage;
                    debug!("Battery: {} Volts / {} %", sample.voltage, sample.percentage);
                }
                Err(e) => warn!("Failed to read battery monitor with error: {}", e),
            }
        }
    }

    fn dashboard(&mut self, now: DateTime<Local>, elapsed: Duration) -> Dashboard {
        let readings = &self.readings;

        let compensated = self
            .compensator
            .as_ref()
            .map(|c| c.compensate(readings.temperature))
            .unwrap_or(readings.temperature);

        if elapsed > WARM_UP {
            self.temperature_range = Some(match self.temperature_range {
                None => (compensated, compensated),
                Some((min, max)) => (min.min(compensated), max.max(compensated)),
            });
        }
        let fahrenheit = |celsius: f64| Temperature::Celsius(celsius).to_fahrenheit().value();
        let temperature_range = match self.temperature_range {
            Some((min, max)) => format!("{:.0}-{:.0}", fahrenheit(min), fahrenheit(max)),
            None => "------".to_string(),
        };

        let corrected_humidity =
            correct_humidity(readings.humidity, readings.temperature, compensated);

        let internal_aqi = aqi::us_epa(readings.pm25, readings.pm10);
        let external_aqi = readings.external_aqi.unwrap_or(-1);

        let unix_seconds = now.timestamp_millis() as f64 / 1000.0;
        let pressure = self.pressure_trend.analyse(readings.pressure, unix_seconds);

        Dashboard {
            time: now.format("%I:%M:%S").to_string(),
            date: now.format("%d %b %y").to_string().trim_start_matches('0').to_string(),
            compensated_temperature: compensated,
            temperature_string: format!("{:.0}°F", fahrenheit(compensated)),
            temperature_range,
            corrected_humidity,
            humidity_string: format!("{:.0}%", corrected_humidity),
            humidity_description: describe_humidity(corrected_humidity).to_uppercase(),
            internal_aqi,
            external_aqi,
            aqi_string: format!("AQI: {}/{}", internal_aqi, external_aqi),
            aqi_description: describe_aqi(internal_aqi).to_uppercase(),
            aqi_color: aqi_to_color(internal_aqi),
            external_aqi_bad: external_aqi > 101,
            pressure_string: format!("{} {}", group_thousands(pressure.mean as i64), pressure.trend),
            pressure_description: describe_pressure(pressure.mean).to_uppercase(),
            mean_pressure: pressure.mean,
            pressure_change_per_hour: pressure.change_per_hour,
            pressure_trend: pressure.trend,
            backlight_on: readings.lux >= BACKLIGHT_LUX,
        }
    }
}

/// Run the collector every `interval`, publishing each snapshot on `snapshots`.
///
/// Sensor reads block on I2C/UART, so each sample runs on the blocking pool.
/// The task ends when every snapshot receiver has been dropped.
pub fn spawn_sampling(
    mut collector: EnviroCollector,
    interval: Duration,
    external_aqi: watch::Receiver<Option<i64>>,
    snapshots: watch::Sender<EnviroSnapshot>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let external = *external_aqi.borrow();

            let sampled = tokio::task::spawn_blocking(move || {
                let snapshot = collector.sample(external);
                (collector, snapshot)
            })
            .await;

            let snapshot = match sampled {
                Ok((returned, snapshot)) => {
                    collector = returned;
                    snapshot
                }
                Err(e) => {
                    error!("Sensor sampling task failed: {}", e);
                    break;
                }
            };

            if snapshots.send(snapshot).is_err() {
                debug!("No snapshot receivers left, stopping sampler");
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExporterError, Result};
    use crate::sensors::{
        CpuThermometer, LightReading, LightSensor, ParticulateReading, ParticulateSensor,
        WeatherReading, WeatherSensor,
    };
    use chrono::TimeZone;

    struct FixedWeather(WeatherReading);

    impl WeatherSensor for FixedWeather {
        fn read(&mut self) -> Result<WeatherReading> {
            Ok(self.0)
        }
    }

    /// Succeeds once, then fails on every read.
    struct FlakyLight {
        reads: usize,
    }

    impl LightSensor for FlakyLight {
        fn read(&mut self) -> Result<LightReading> {
            self.reads += 1;
            if self.reads == 1 {
                Ok(LightReading {
                    lux: 120.0,
                    proximity: 3.0,
                })
            } else {
                Err(ExporterError::sensor_error("LTR559", "bus error"))
            }
        }
    }

    struct FixedParticulates(ParticulateReading);

    impl ParticulateSensor for FixedParticulates {
        fn read(&mut self) -> Result<ParticulateReading> {
            Ok(self.0)
        }
    }

    struct FixedCpu(f64);

    impl CpuThermometer for FixedCpu {
        fn read_celsius(&mut self) -> Result<f64> {
            Ok(self.0)
        }
    }

    fn sensors() -> SensorSet {
        SensorSet {
            weather: Some(Box::new(FixedWeather(WeatherReading {
                temperature: 27.5,
                pressure: 1013.2,
                humidity: 40.0,
            }))),
            light: Some(Box::new(FlakyLight { reads: 0 })),
            gas: None,
            particulates: Some(Box::new(FixedParticulates(ParticulateReading {
                pm1: 3.0,
                pm25: 10.0,
                pm10: 100.0,
            }))),
            battery: None,
            cpu: Box::new(FixedCpu(50.0)),
        }
    }

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 10, 7, 12, 30, 15).unwrap()
    }

    #[test]
    fn test_sample_applies_offsets() {
        let options = SamplingOptions {
            temperature_offset: Some(2.0),
            humidity_offset: Some(5.0),
            ..Default::default()
        };
        let mut collector = EnviroCollector::new(sensors(), options);
        let snapshot = collector.sample_at(None, noon(), Duration::ZERO);

        assert_eq!(snapshot.readings.temperature, 25.5);
        assert_eq!(snapshot.readings.humidity, 45.0);
        assert_eq!(snapshot.readings.pressure, 1013.2);
        assert_eq!(snapshot.readings.cpu_temperature, 50.0);
        assert_eq!(snapshot.readings.aqi, 73.0);
    }

    #[test]
    fn test_failed_sensor_keeps_previous_value() {
        let mut collector = EnviroCollector::new(sensors(), SamplingOptions::default());
        let first = collector.sample_at(None, noon(), Duration::ZERO);
        let second = collector.sample_at(None, noon(), Duration::from_secs(5));

        assert_eq!(first.readings.lux, 120.0);
        assert_eq!(second.readings.lux, 120.0);
        assert_eq!(second.readings.proximity, 3.0);
    }

    #[test]
    fn test_enviro_ignores_particulates() {
        let options = SamplingOptions {
            enviro: true,
            ..Default::default()
        };
        let mut collector = EnviroCollector::new(sensors(), options);
        let snapshot = collector.sample_at(None, noon(), Duration::ZERO);
        assert_eq!(snapshot.readings.pm25, 0.0);
        assert_eq!(snapshot.readings.aqi, 0.0);
    }

    #[test]
    fn test_dashboard_values() {
        let mut collector = EnviroCollector::new(sensors(), SamplingOptions::default());
        let snapshot = collector.sample_at(Some(120), noon(), Duration::ZERO);
        let dashboard = snapshot.dashboard;

        assert_eq!(dashboard.time, "12:30:15");
        assert_eq!(dashboard.date, "7 Oct 24");
        // 27.5 - (50 - 27.5) / 2.25 = 17.5 °C = 63.5 °F
        assert!((dashboard.compensated_temperature - 17.5).abs() < 1e-9);
        assert_eq!(dashboard.temperature_string, "64°F");
        assert_eq!(dashboard.temperature_range, "------");
        assert_eq!(dashboard.humidity_description, "BAD");
        assert_eq!(dashboard.aqi_string, "AQI: 73/120");
        assert_eq!(dashboard.aqi_description, "OK");
        assert_eq!(dashboard.aqi_color, [192, 192, 0]);
        assert!(dashboard.external_aqi_bad);
        assert_eq!(dashboard.pressure_string, "1,013 -");
        assert_eq!(dashboard.pressure_description, "GOOD");
        assert!(dashboard.backlight_on);
    }

    #[test]
    fn test_temperature_range_after_warm_up() {
        let mut collector = EnviroCollector::new(sensors(), SamplingOptions::default());
        collector.sample_at(None, noon(), Duration::from_secs(10));
        let warm = collector.sample_at(None, noon(), Duration::from_secs(35));
        assert_eq!(warm.dashboard.temperature_range, "64-64");
    }

    #[test]
    fn test_missing_external_aqi_reads_as_minus_one() {
        let mut collector = EnviroCollector::new(SensorSet::cpu_only(), SamplingOptions::default());
        let dashboard = collector.sample_at(None, noon(), Duration::ZERO).dashboard;
        assert_eq!(dashboard.external_aqi, -1);
        assert!(!dashboard.external_aqi_bad);
        assert!(!dashboard.backlight_on);
    }

    #[tokio::test]
    async fn test_spawn_sampling_publishes_snapshots() {
        let collector = EnviroCollector::new(sensors(), SamplingOptions::default());
        let (_aqi_tx, aqi_rx) = watch::channel(Some(42));
        let (tx, mut rx) = watch::channel(EnviroSnapshot::default());

        let handle = spawn_sampling(collector, Duration::from_millis(10), aqi_rx, tx);

        time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("no snapshot published")
            .unwrap();
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.readings.external_aqi, Some(42));
        assert!(snapshot.readings.timestamp > 0);

        drop(rx);
        time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sampler did not stop")
            .unwrap();
    }
}
