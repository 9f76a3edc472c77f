//! InfluxDB v2 uploads over the line protocol.

use crate::config::InfluxDbConfig;
use crate::error::{ExporterError, Result};
use crate::metrics::SensorReadings;
use crate::publishers::Publisher;
use std::fmt::Write;

pub const MEASUREMENT: &str = "enviroplus";

/// Escape a tag value: commas, equals signs and spaces are backslash-escaped.
pub fn escape_tag(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | '=' | ' ') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// One line-protocol point carrying every finite reading as a field.
pub fn line_protocol(location: &str, readings: &SensorReadings, unix_seconds: i64) -> String {
    let mut line = format!("{},location={} ", MEASUREMENT, escape_tag(location));
    let mut first = true;
    for (name, value) in readings.as_fields() {
        if !value.is_finite() {
            continue;
        }
        if !first {
            line.push(',');
        }
        first = false;
        // Writing to a String cannot fail
        let _ = write!(line, "{}={}", name, value);
    }
    let _ = write!(line, " {}", unix_seconds);
    line
}

pub struct InfluxDb {
    client: reqwest::Client,
    config: InfluxDbConfig,
}

impl InfluxDb {
    pub fn new(client: reqwest::Client, config: InfluxDbConfig) -> Self {
        Self { client, config }
    }

    fn write_url(&self) -> String {
        format!("{}/api/v2/write", self.config.url.trim_end_matches('/'))
    }
}

impl Publisher for InfluxDb {
    fn name(&self) -> &'static str {
        "InfluxDB"
    }

    async fn publish(&mut self, readings: &SensorReadings) -> Result<()> {
        let unix_seconds = match readings.timestamp {
            0 => chrono::Utc::now().timestamp(),
            millis => (millis / 1000) as i64,
        };
        let body = line_protocol(&self.config.location, readings, unix_seconds);

        let response = self
            .client
            .post(self.write_url())
            .query(&[
                ("org", self.config.org_id.as_str()),
                ("bucket", self.config.bucket.as_str()),
                ("precision", "s"),
            ])
            .header("Authorization", format!("Token {}", self.config.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(ExporterError::publish_error(
                "InfluxDB",
                format!("{}: {}", status, text.trim()),
            ))
        }
    }
}
