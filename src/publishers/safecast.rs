//! Safecast measurement uploads.

use crate::config::SafecastConfig;
use crate::error::{ExporterError, Result};
use crate::metrics::SensorReadings;
use crate::publishers::Publisher;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const PRODUCTION_API_URL: &str = "https://api.safecast.org";
pub const DEVELOPMENT_API_URL: &str = "https://dev.safecast.org";

/// One measurement as accepted by `measurements.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub latitude: String,
    pub longitude: String,
    pub value: f64,
    pub unit: String,
    /// Local time in RFC 3339
    pub captured_at: String,
    pub device_id: u32,
    pub location_name: String,
    pub height: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: serde_json::Value,
}

/// The six measurements uploaded per sample, in upload order.
pub fn measurements(
    config: &SafecastConfig,
    readings: &SensorReadings,
    captured_at: &str,
) -> Vec<Measurement> {
    [
        (readings.pm1, "PM1 ug/m3"),
        (readings.pm25, "PM2.5 ug/m3"),
        (readings.pm10, "PM10 ug/m3"),
        (readings.temperature, "Temperature C"),
        (readings.humidity, "Humidity %"),
        (readings.cpu_temperature, "CPU temperature C"),
    ]
    .into_iter()
    .map(|(value, unit)| Measurement {
        latitude: config.latitude.clone(),
        longitude: config.longitude.clone(),
        value,
        unit: unit.to_string(),
        captured_at: captured_at.to_string(),
        device_id: config.device_id,
        location_name: config.location_name.clone(),
        height: None,
    })
    .collect()
}

pub struct Safecast {
    client: reqwest::Client,
    api_url: String,
    config: SafecastConfig,
}

impl Safecast {
    /// Targets the development API when `dev_mode` is set.
    pub fn new(client: reqwest::Client, config: SafecastConfig) -> Self {
        let api_url = if config.dev_mode {
            DEVELOPMENT_API_URL
        } else {
            PRODUCTION_API_URL
        };
        Self {
            client,
            api_url: api_url.to_string(),
            config,
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn add_measurement(&self, measurement: &Measurement) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/measurements.json", self.api_url.trim_end_matches('/')))
            .query(&[("api_key", self.config.active_api_key())])
            .json(measurement)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ExporterError::publish_error(
                "Safecast",
                format!("{} for {}: {}", status, measurement.unit, text.trim()),
            ));
        }

        let created: Created = response.json().await?;
        debug!("Safecast {} measurement created, id: {}", measurement.unit, created.id);
        Ok(())
    }
}

impl Publisher for Safecast {
    fn name(&self) -> &'static str {
        "Safecast"
    }

    async fn publish(&mut self, readings: &SensorReadings) -> Result<()> {
        let captured_at = chrono::Local::now().to_rfc3339();
        for measurement in measurements(&self.config, readings, &captured_at) {
            self.add_measurement(&measurement).await?;
        }
        Ok(())
    }
}
