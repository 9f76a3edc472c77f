//! Prometheus gauges and histograms for the sensor readings.
//!
//! Metric names match the long-standing Enviro+ exporter so existing
//! dashboards keep working.

use crate::error::{ExporterError, Result};
use crate::metrics::data::SensorReadings;
use crate::sensors::{GasReading, ParticulateReading};
use metrics::{describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

pub const TEMPERATURE: &str = "temperature";
pub const PRESSURE: &str = "pressure";
pub const HUMIDITY: &str = "humidity";
pub const OXIDISING: &str = "oxidising";
pub const REDUCING: &str = "reducing";
pub const NH3: &str = "NH3";
pub const LUX: &str = "lux";
pub const PROXIMITY: &str = "proximity";
pub const PM1: &str = "PM1";
pub const PM25: &str = "PM25";
pub const PM10: &str = "PM10";
pub const AQI: &str = "AQI";
pub const EXTERNAL_AQI: &str = "external_AQI";
pub const CPU_TEMPERATURE: &str = "cpu_temperature";
pub const BATTERY_VOLTAGE: &str = "battery_voltage";
pub const BATTERY_PERCENTAGE: &str = "battery_percentage";

pub const OXIDISING_HIST: &str = "oxidising_measurements";
pub const REDUCING_HIST: &str = "reducing_measurements";
pub const NH3_HIST: &str = "nh3_measurements";
pub const PM1_HIST: &str = "pm1_measurements";
pub const PM25_HIST: &str = "pm25_measurements";
pub const PM10_HIST: &str = "pm10_measurements";
pub const AQI_HIST: &str = "aqi_measurements";

const GAUGES: [(&str, &str); 16] = [
    (TEMPERATURE, "Temperature measured (*C)"),
    (PRESSURE, "Pressure measured (hPa)"),
    (HUMIDITY, "Relative humidity measured (%)"),
    (OXIDISING, "Mostly nitrogen dioxide but could include NO and Hydrogen (Ohms)"),
    (
        REDUCING,
        "Mostly carbon monoxide but could include H2S, Ammonia, Ethanol, Hydrogen, Methane, Propane, Iso-butane (Ohms)",
    ),
    (
        NH3,
        "mostly Ammonia but could also include Hydrogen, Ethanol, Propane, Iso-butane (Ohms)",
    ),
    (LUX, "current ambient light level (lux)"),
    (
        PROXIMITY,
        "proximity, with larger numbers being closer proximity and vice versa",
    ),
    (
        PM1,
        "Particulate Matter of diameter less than 1 micron. Measured in micrograms per cubic metre (ug/m3)",
    ),
    (
        PM25,
        "Particulate Matter of diameter less than 2.5 microns. Measured in micrograms per cubic metre (ug/m3)",
    ),
    (
        PM10,
        "Particulate Matter of diameter less than 10 microns. Measured in micrograms per cubic metre (ug/m3)",
    ),
    (AQI, "EPA Air Quality Measurement"),
    (EXTERNAL_AQI, "Air Quality Index reported by WAQI for the configured location"),
    (CPU_TEMPERATURE, "CPU temperature measured (*C)"),
    (BATTERY_VOLTAGE, "Voltage of the battery (Volts)"),
    (BATTERY_PERCENTAGE, "Percentage of the battery remaining (%)"),
];

const HISTOGRAMS: [(&str, &str); 7] = [
    (OXIDISING_HIST, "Histogram of oxidising measurements"),
    (REDUCING_HIST, "Histogram of reducing measurements"),
    (NH3_HIST, "Histogram of nh3 measurements"),
    (
        PM1_HIST,
        "Histogram of Particulate Matter of diameter less than 1 micron measurements",
    ),
    (
        PM25_HIST,
        "Histogram of Particulate Matter of diameter less than 2.5 micron measurements",
    ),
    (
        PM10_HIST,
        "Histogram of Particulate Matter of diameter less than 10 micron measurements",
    ),
    (AQI_HIST, "Histogram of EPA AQI measurements"),
];

/// Bucket upper bounds for each histogram.
pub fn buckets(histogram: &str) -> Vec<f64> {
    match histogram {
        OXIDISING_HIST => std::iter::once(0.0)
            .chain((10_000..=90_000).step_by(5_000).map(f64::from))
            .chain(std::iter::once(100_000.0))
            .collect(),
        REDUCING_HIST => (0..=1_500_000).step_by(100_000).map(f64::from).collect(),
        NH3_HIST => [0.0, 10_000.0]
            .into_iter()
            .chain((110_000..=1_910_000).step_by(100_000).map(f64::from))
            .chain(std::iter::once(2_000_000.0))
            .collect(),
        _ => (0..=100).step_by(5).map(f64::from).collect(),
    }
}

fn builder() -> Result<PrometheusBuilder> {
    HISTOGRAMS.iter().try_fold(PrometheusBuilder::new(), |builder, (name, _)| {
        builder
            .set_buckets_for_metric(Matcher::Full(name.to_string()), &buckets(name))
            .map_err(|e| ExporterError::metrics_error(e.to_string()))
    })
}

/// Install the global recorder and register metric descriptions.
///
/// The returned handle renders the text exposition for `/metrics`.
pub fn install_recorder() -> Result<PrometheusHandle> {
    let handle = builder()?
        .install_recorder()
        .map_err(|e| ExporterError::metrics_error(e.to_string()))?;
    describe_all();
    Ok(handle)
}

/// Build a recorder without installing it, for scoped use.
pub fn build_recorder() -> Result<PrometheusRecorder> {
    Ok(builder()?.build_recorder())
}

/// Register help text for every gauge and histogram with the current recorder.
pub fn describe_all() {
    for (name, help) in GAUGES {
        describe_gauge!(name, help);
    }
    for (name, help) in HISTOGRAMS {
        describe_histogram!(name, help);
    }
}

/// Set every gauge from the latest readings.
pub fn record_readings(readings: &SensorReadings) {
    gauge!(TEMPERATURE).set(readings.temperature);
    gauge!(PRESSURE).set(readings.pressure);
    gauge!(HUMIDITY).set(readings.humidity);
    gauge!(OXIDISING).set(readings.oxidising);
    gauge!(REDUCING).set(readings.reducing);
    gauge!(NH3).set(readings.nh3);
    gauge!(LUX).set(readings.lux);
    gauge!(PROXIMITY).set(readings.proximity);
    gauge!(PM1).set(readings.pm1);
    gauge!(PM25).set(readings.pm25);
    gauge!(PM10).set(readings.pm10);
    gauge!(AQI).set(readings.aqi);
    gauge!(CPU_TEMPERATURE).set(readings.cpu_temperature);
    gauge!(BATTERY_VOLTAGE).set(readings.battery_voltage);
    gauge!(BATTERY_PERCENTAGE).set(readings.battery_percentage);
    if let Some(external) = readings.external_aqi {
        gauge!(EXTERNAL_AQI).set(external as f64);
    }
}

/// Observe a fresh gas reading.
pub fn observe_gas(gas: &GasReading) {
    histogram!(OXIDISING_HIST).record(gas.oxidising);
    histogram!(REDUCING_HIST).record(gas.reducing);
    histogram!(NH3_HIST).record(gas.nh3);
}

/// Observe a fresh particulate reading. The PM2.5 and PM10 histograms track
/// the increment over the next smaller size class.
pub fn observe_particulates(pm: &ParticulateReading, aqi: f64) {
    histogram!(PM1_HIST).record(pm.pm1);
    histogram!(PM25_HIST).record(pm.pm25 - pm.pm1);
    histogram!(PM10_HIST).record(pm.pm10 - pm.pm25);
    histogram!(AQI_HIST).record(aqi);
}
