//! Data structures for sensor readings and the dashboard view.

use serde::{Deserialize, Serialize};

/// The latest value of every sensor, as exported on `/metrics`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReadings {
    /// Temperature in °C, after the `--temp` offset
    pub temperature: f64,
    /// Relative humidity in %, after the `--humid` offset
    pub humidity: f64,
    /// Pressure in hPa
    pub pressure: f64,
    /// MICS6814 oxidising element resistance in Ω
    pub oxidising: f64,
    /// MICS6814 reducing element resistance in Ω
    pub reducing: f64,
    /// MICS6814 NH3 element resistance in Ω
    pub nh3: f64,
    pub lux: f64,
    pub proximity: f64,
    /// Particulates in µg/m³
    pub pm1: f64,
    pub pm25: f64,
    pub pm10: f64,
    pub cpu_temperature: f64,
    pub battery_voltage: f64,
    pub battery_percentage: f64,
    /// US-EPA AQI computed from pm25 and pm10
    pub aqi: f64,
    /// AQI reported by WAQI for the configured location (-1 when the lookup failed)
    pub external_aqi: Option<i64>,
    /// Unix timestamp in milliseconds
    pub timestamp: u64,
}

impl SensorReadings {
    /// Every numeric field in a fixed order, as uploaded to InfluxDB and Notehub.
    /// `external_aqi` comes last and only once a lookup has produced a value.
    pub fn as_fields(&self) -> Vec<(&'static str, f64)> {
        let mut fields = vec![
            ("temperature", self.temperature),
            ("humidity", self.humidity),
            ("pressure", self.pressure),
            ("oxidising", self.oxidising),
            ("reducing", self.reducing),
            ("nh3", self.nh3),
            ("lux", self.lux),
            ("proximity", self.proximity),
            ("pm1", self.pm1),
            ("pm25", self.pm25),
            ("pm10", self.pm10),
            ("cpu_temperature", self.cpu_temperature),
            ("battery_voltage", self.battery_voltage),
            ("battery_percentage", self.battery_percentage),
            ("aqi", self.aqi),
        ];
        if let Some(external) = self.external_aqi {
            fields.push(("external_aqi", external as f64));
        }
        fields
    }
}

/// Human-oriented view of one sample: what the front panel would show.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    /// Local time, `HH:MM:SS` on a 12-hour clock
    pub time: String,
    /// Local date such as `7 Oct 24`
    pub date: String,
    /// Temperature in °C corrected for CPU heat
    pub compensated_temperature: f64,
    /// Compensated temperature such as `68°F`
    pub temperature_string: String,
    /// Min-max compensated temperature in °F, `------` during warm-up
    pub temperature_range: String,
    pub corrected_humidity: f64,
    pub humidity_string: String,
    pub humidity_description: String,
    pub internal_aqi: i64,
    pub external_aqi: i64,
    /// `AQI: <internal>/<external>`
    pub aqi_string: String,
    pub aqi_description: String,
    pub aqi_color: [u8; 3],
    /// External AQI above 101 switches the panel to the warning icon
    pub external_aqi_bad: bool,
    pub mean_pressure: f64,
    pub pressure_change_per_hour: f64,
    pub pressure_trend: String,
    /// Mean pressure with thousands separators and the trend arrow
    pub pressure_string: String,
    pub pressure_description: String,
    /// The panel backlight is off in the dark (below 10 lux)
    pub backlight_on: bool,
}

/// One sampler tick: raw readings plus the derived dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnviroSnapshot {
    pub readings: SensorReadings,
    pub dashboard: Dashboard,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_zero() {
        let readings = SensorReadings::default();
        assert!(readings.as_fields().iter().all(|(_, value)| *value == 0.0));
        assert_eq!(readings.external_aqi, None);
    }

    #[test]
    fn test_field_order() {
        let readings = SensorReadings {
            temperature: 21.5,
            aqi: 42.0,
            ..Default::default()
        };
        let fields = readings.as_fields();
        assert_eq!(fields[0], ("temperature", 21.5));
        assert_eq!(fields[5].0, "nh3");
        assert_eq!(fields[14], ("aqi", 42.0));
        assert_eq!(fields.len(), 15);
    }

    #[test]
    fn test_external_aqi_field_once_known() {
        let readings = SensorReadings {
            aqi: 42.0,
            external_aqi: Some(57),
            ..Default::default()
        };
        let fields = readings.as_fields();
        assert_eq!(fields.len(), 16);
        assert_eq!(fields[15], ("external_aqi", 57.0));

        let failed = SensorReadings {
            external_aqi: Some(-1),
            ..Default::default()
        };
        assert_eq!(failed.as_fields().last(), Some(&("external_aqi", -1.0)));
    }

    #[test]
    fn test_readings_serialize() {
        let readings = SensorReadings {
            pm25: 7.0,
            external_aqi: Some(33),
            timestamp: 1_700_000_000_000,
            ..Default::default()
        };
        let json = serde_json::to_value(&readings).unwrap();
        assert_eq!(json["pm25"], 7.0);
        assert_eq!(json["external_aqi"], 33);
        assert_eq!(json["timestamp"], 1_700_000_000_000u64);

        let back: SensorReadings = serde_json::from_value(json).unwrap();
        assert_eq!(back, readings);
    }
}
