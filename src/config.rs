//! Exporter configuration from command-line flag values and environment variables.

use crate::error::{ExporterError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Parse the loose boolean spellings accepted by the command-line flags.
pub fn parse_bool(value: &str) -> std::result::Result<bool, String> {
    match value.to_lowercase().as_str() {
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        _ => Err(format!("{} is not a valid boolean value", value)),
    }
}

/// A compensation offset of exactly zero means no compensation.
pub fn nonzero(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0)
}

/// InfluxDB v2 upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxDbConfig {
    pub url: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub org_id: String,
    pub bucket: String,
    /// Value of the `location` tag
    pub location: String,
    pub period: Duration,
}

/// Luftdaten (sensor.community) upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LuftdatenConfig {
    pub period: Duration,
}

/// Safecast upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafecastConfig {
    pub period: Duration,
    /// Post to the development API with the development key
    pub dev_mode: bool,
    #[serde(skip_serializing)]
    pub api_key: String,
    #[serde(skip_serializing)]
    pub api_key_dev: String,
    pub latitude: String,
    pub longitude: String,
    pub device_id: u32,
    pub location_name: String,
}

impl SafecastConfig {
    /// The key matching the selected API.
    pub fn active_api_key(&self) -> &str {
        if self.dev_mode {
            &self.api_key_dev
        } else {
            &self.api_key
        }
    }
}

/// Notecard serial settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotecardConfig {
    pub period: Duration,
    pub port: PathBuf,
    pub baud_rate: u32,
}

/// Location and key for the WAQI external AQI lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaqiConfig {
    pub latitude: String,
    pub longitude: String,
    #[serde(skip_serializing)]
    pub api_key: String,
}

/// Everything the exporter reads from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    pub influxdb: InfluxDbConfig,
    pub luftdaten: LuftdatenConfig,
    pub safecast: SafecastConfig,
    pub notecard: NotecardConfig,
    /// Present only when latitude, longitude and key are all set
    pub waqi: Option<WaqiConfig>,
}

impl ExporterConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let seconds = |key: &str, default: u64| -> Result<Duration> {
            Ok(Duration::from_secs(number(&lookup, key, default)?))
        };

        let influxdb = InfluxDbConfig {
            url: string("INFLUXDB_URL", "https://us-central1-1.gcp.cloud2.influxdata.com"),
            token: string("INFLUXDB_TOKEN", ""),
            org_id: string("INFLUXDB_ORG_ID", ""),
            bucket: string("INFLUXDB_BUCKET", "enviro"),
            location: string("INFLUXDB_SENSOR_LOCATION", "San Francisco"),
            period: seconds("INFLUXDB_TIME_BETWEEN_POSTS", 5)?,
        };

        let luftdaten = LuftdatenConfig {
            period: seconds("LUFTDATEN_TIME_BETWEEN_POSTS", 30)?,
        };

        let safecast = SafecastConfig {
            period: seconds("SAFECAST_TIME_BETWEEN_POSTS", 300)?,
            dev_mode: lookup("SAFECAST_DEV_MODE").as_deref() == Some("true"),
            api_key: string("SAFECAST_API_KEY", ""),
            api_key_dev: string("SAFECAST_API_KEY_DEV", ""),
            latitude: string("SAFECAST_LATITUDE", ""),
            longitude: string("SAFECAST_LONGITUDE", ""),
            device_id: number(&lookup, "SAFECAST_DEVICE_ID", 226)?,
            location_name: string("SAFECAST_LOCATION_NAME", ""),
        };

        let notecard = NotecardConfig {
            period: seconds("NOTECARD_TIME_BETWEEN_POSTS", 600)?,
            port: PathBuf::from(string("NOTECARD_PORT", "/dev/ttyACM0")),
            baud_rate: 9600,
        };

        let waqi = match (
            string("LATITUDE", ""),
            string("LONGITUDE", ""),
            string("WAQI_API_KEY", ""),
        ) {
            (latitude, longitude, api_key)
                if !latitude.is_empty() && !longitude.is_empty() && !api_key.is_empty() =>
            {
                Some(WaqiConfig {
                    latitude,
                    longitude,
                    api_key,
                })
            }
            _ => None,
        };

        Ok(Self {
            influxdb,
            luftdaten,
            safecast,
            notecard,
            waqi,
        })
    }
}

fn number<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ExporterError::config_error(format!("{}={:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}
