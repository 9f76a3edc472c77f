//! External AQI from the World Air Quality Index project.

use crate::config::WaqiConfig;
use crate::error::{ExporterError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const API_URL: &str = "https://api.waqi.info";
/// Minimum time between lookups.
pub const REFRESH_PERIOD: Duration = Duration::from_secs(600);
/// Value published when a lookup fails.
pub const UNAVAILABLE: i64 = -1;

#[derive(Debug, Deserialize)]
struct Feed {
    status: String,
    #[serde(default)]
    data: Value,
}

/// Read the AQI out of a feed response body.
pub fn parse_feed(body: &str) -> Result<i64> {
    let feed: Feed = serde_json::from_str(body)?;
    if feed.status != "ok" {
        return Err(ExporterError::publish_error("WAQI", format!("status {}: {}", feed.status, feed.data)));
    }
    let aqi = &feed.data["aqi"];
    aqi.as_i64()
        .or_else(|| aqi.as_f64().map(|v| v as i64))
        .or_else(|| aqi.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| ExporterError::parse_error(format!("WAQI aqi value {}", aqi)))
}

/// Client for the geo feed at one location.
pub struct Waqi {
    client: reqwest::Client,
    api_url: String,
    config: WaqiConfig,
}

impl Waqi {
    pub fn new(client: reqwest::Client, config: WaqiConfig) -> Self {
        Self {
            client,
            api_url: API_URL.to_string(),
            config,
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Current AQI at the configured location.
    pub async fn fetch(&self) -> Result<i64> {
        let url = format!(
            "{}/feed/geo:{};{}/",
            self.api_url.trim_end_matches('/'),
            self.config.latitude,
            self.config.longitude
        );
        let response = self
            .client
            .get(url)
            .query(&[("token", self.config.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ExporterError::publish_error(
                "WAQI",
                format!("{}: {}", status, body.trim()),
            ));
        }
        parse_feed(&body)
    }
}

/// Refresh the external AQI every [`REFRESH_PERIOD`], publishing
/// [`UNAVAILABLE`] when a lookup fails. The first lookup runs immediately.
pub fn spawn_external_aqi(waqi: Waqi, aqi: watch::Sender<Option<i64>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REFRESH_PERIOD);
        loop {
            ticker.tick().await;
            let value = match waqi.fetch().await {
                Ok(value) => {
                    debug!("External AQI: {}", value);
                    value
                }
                Err(e) => {
                    warn!("Failed to retrieve AQI: {}", e);
                    UNAVAILABLE
                }
            };
            if aqi.send(Some(value)).is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn config() -> WaqiConfig {
        WaqiConfig {
            latitude: "37.77".to_string(),
            longitude: "-122.42".to_string(),
            api_key: "k3y".to_string(),
        }
    }

    #[test]
    fn test_parse_feed() {
        assert_eq!(parse_feed(r#"{"status":"ok","data":{"aqi":57}}"#).unwrap(), 57);
        assert_eq!(parse_feed(r#"{"status":"ok","data":{"aqi":"61"}}"#).unwrap(), 61);
        assert!(parse_feed(r#"{"status":"ok","data":{"aqi":"-"}}"#).is_err());
        assert!(parse_feed(r#"{"status":"error","data":"Invalid key"}"#).is_err());
        assert!(parse_feed("not json").is_err());
    }

    #[tokio::test]
    async fn test_fetch() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/feed/geo:37.77;-122.42/")
            .match_query(Matcher::UrlEncoded("token".into(), "k3y".into()))
            .with_status(200)
            .with_body(r#"{"status":"ok","data":{"aqi":42,"idx":1}}"#)
            .create_async()
            .await;

        let waqi = Waqi::new(reqwest::Client::new(), config()).with_api_url(server.url());
        assert_eq!(waqi.fetch().await.unwrap(), 42);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_lookup_publishes_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let waqi = Waqi::new(reqwest::Client::new(), config()).with_api_url(server.url());
        let (tx, mut rx) = watch::channel(None);
        let handle = spawn_external_aqi(waqi, tx);

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("no AQI published")
            .unwrap();
        assert_eq!(*rx.borrow(), Some(UNAVAILABLE));
        handle.abort();
    }
}
