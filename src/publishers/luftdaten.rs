//! Luftdaten (sensor.community) uploads.
//!
//! The service takes two requests per sample: particulates on pin 1 and
//! climate values on pin 11, each tagged with the Pi's serial number.

use crate::error::{ExporterError, Result};
use crate::metrics::SensorReadings;
use crate::publishers::Publisher;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;

pub const ENDPOINT: &str = "https://api.luftdaten.info/v1/push-sensor-data/";
pub const SOFTWARE_VERSION: &str = "enviro-plus 0.0.1";
pub const CPUINFO: &str = "/proc/cpuinfo";

/// Extract the `Serial` value from `/proc/cpuinfo` contents.
pub fn parse_serial(cpuinfo: &str) -> Option<String> {
    cpuinfo
        .lines()
        .find(|line| line.starts_with("Serial"))
        .and_then(|line| line.split_once(':'))
        .map(|(_, serial)| serial.trim().to_string())
        .filter(|serial| !serial.is_empty())
}

/// Read the Raspberry Pi serial number.
pub fn read_serial_number(cpuinfo: &Path) -> Result<String> {
    let contents = fs::read_to_string(cpuinfo)?;
    parse_serial(&contents).ok_or_else(|| {
        ExporterError::config_error(format!("no Serial line in {}", cpuinfo.display()))
    })
}

fn payload(values: Vec<(&str, Value)>) -> Value {
    let values: Vec<Value> = values
        .into_iter()
        .map(|(value_type, value)| json!({ "value_type": value_type, "value": value }))
        .collect();
    json!({
        "software_version": SOFTWARE_VERSION,
        "sensordatavalues": values,
    })
}

/// Pin 1 body: PM2.5 as `P2` and PM10 as `P1`.
pub fn particulate_payload(readings: &SensorReadings) -> Value {
    payload(vec![("P2", json!(readings.pm25)), ("P1", json!(readings.pm10))])
}

/// Pin 11 body: temperature, pressure in Pa and humidity as two-decimal strings.
pub fn climate_payload(readings: &SensorReadings) -> Value {
    payload(vec![
        ("temperature", json!(format!("{:.2}", readings.temperature))),
        ("pressure", json!(format!("{:.2}", readings.pressure * 100.0))),
        ("humidity", json!(format!("{:.2}", readings.humidity))),
    ])
}

pub struct Luftdaten {
    client: reqwest::Client,
    endpoint: String,
    sensor_uid: String,
}

impl Luftdaten {
    pub fn new(client: reqwest::Client, serial: &str) -> Self {
        Self {
            client,
            endpoint: ENDPOINT.to_string(),
            sensor_uid: format!("raspi-{}", serial),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn sensor_uid(&self) -> &str {
        &self.sensor_uid
    }

    async fn push(&self, pin: &str, body: &Value) -> Result<reqwest::StatusCode> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Pin", pin)
            .header("X-Sensor", &self.sensor_uid)
            .header("cache-control", "no-cache")
            .json(body)
            .send()
            .await?;
        Ok(response.status())
    }
}

impl Publisher for Luftdaten {
    fn name(&self) -> &'static str {
        "Luftdaten"
    }

    async fn publish(&mut self, readings: &SensorReadings) -> Result<()> {
        let pin_1 = self.push("1", &particulate_payload(readings)).await?;
        let pin_11 = self.push("11", &climate_payload(readings)).await?;

        if pin_1.is_success() && pin_11.is_success() {
            Ok(())
        } else {
            Err(ExporterError::publish_error(
                "Luftdaten",
                format!("pin 1: {}, pin 11: {}", pin_1, pin_11),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const CPUINFO_SAMPLE: &str = "processor\t: 0\nHardware\t: BCM2835\nRevision\t: c03111\nSerial\t\t: 10000000abcdef01\nModel\t\t: Raspberry Pi 4 Model B Rev 1.1\n";

    #[test]
    fn test_parse_serial() {
        assert_eq!(parse_serial(CPUINFO_SAMPLE), Some("10000000abcdef01".to_string()));
        assert_eq!(parse_serial("processor\t: 0\n"), None);
    }

    #[test]
    fn test_read_serial_number() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, CPUINFO_SAMPLE.as_bytes()).unwrap();
        assert_eq!(read_serial_number(file.path()).unwrap(), "10000000abcdef01");

        let empty = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            read_serial_number(empty.path()),
            Err(ExporterError::Config(_))
        ));
    }

    #[test]
    fn test_payloads() {
        let readings = SensorReadings {
            pm25: 4.0,
            pm10: 9.0,
            temperature: 21.5,
            pressure: 1013.2,
            humidity: 40.0,
            ..Default::default()
        };

        let pm = particulate_payload(&readings);
        assert_eq!(pm["software_version"], SOFTWARE_VERSION);
        assert_eq!(pm["sensordatavalues"][0], json!({"value_type": "P2", "value": 4.0}));
        assert_eq!(pm["sensordatavalues"][1], json!({"value_type": "P1", "value": 9.0}));

        let climate = climate_payload(&readings);
        let values = climate["sensordatavalues"].as_array().unwrap();
        assert_eq!(values[0]["value"], "21.50");
        assert_eq!(values[1]["value"], "101320.00");
        assert_eq!(values[2]["value"], "40.00");
    }

    #[tokio::test]
    async fn test_publish_sends_both_pins() {
        let mut server = mockito::Server::new_async().await;
        let pin_1 = server
            .mock("POST", "/v1/push-sensor-data/")
            .match_header("x-pin", "1")
            .match_header("x-sensor", "raspi-abc")
            .match_body(Matcher::Regex(r#""value_type":"P2""#.to_string()))
            .with_status(201)
            .create_async()
            .await;
        let pin_11 = server
            .mock("POST", "/v1/push-sensor-data/")
            .match_header("x-pin", "11")
            .match_header("cache-control", "no-cache")
            .with_status(201)
            .create_async()
            .await;

        let mut luftdaten = Luftdaten::new(reqwest::Client::new(), "abc")
            .with_endpoint(format!("{}/v1/push-sensor-data/", server.url()));
        luftdaten.publish(&SensorReadings::default()).await.unwrap();

        pin_1.assert_async().await;
        pin_11.assert_async().await;
    }

    #[tokio::test]
    async fn test_one_failed_pin_fails_upload() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/push-sensor-data/")
            .match_header("x-pin", "1")
            .with_status(201)
            .create_async()
            .await;
        server
            .mock("POST", "/v1/push-sensor-data/")
            .match_header("x-pin", "11")
            .with_status(500)
            .create_async()
            .await;

        let mut luftdaten = Luftdaten::new(reqwest::Client::new(), "abc")
            .with_endpoint(format!("{}/v1/push-sensor-data/", server.url()));
        let err = luftdaten.publish(&SensorReadings::default()).await.unwrap_err();
        assert!(err.to_string().contains("pin 11: 500"));
    }
}
