//! # enviroplus-exporter
//!
//! Prometheus exporter for the Pimoroni Enviro and Enviro+ boards on a
//! Raspberry Pi.
//!
//! ## Features
//!
//! - **Sensor drivers**: BME280, LTR559, MICS6814 (through an ADS1015), PMS5003,
//!   LC709203F fuel gauge and the CPU thermal zone
//! - **Prometheus metrics**: gauges and histograms on `/metrics`
//! - **Derived values**: US-EPA AQI, compensated temperature, corrected
//!   humidity and a barometric pressure trend
//! - **Uploaders**: InfluxDB, Luftdaten, Safecast and Notehub (via a Notecard)
//! - **External AQI** from the World Air Quality Index project
//!
//! Hardware access needs the `hardware` feature; without it every board sensor
//! is reported as absent and only the CPU temperature is sampled.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use enviroplus_exporter::metrics::{prometheus, spawn_sampling, EnviroCollector, EnviroSnapshot};
//! use enviroplus_exporter::sensors::SensorSet;
//! use enviroplus_exporter::web::{start_web_server, AppState, WebConfig};
//! use enviroplus_exporter::DEFAULT_INTERVAL;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handle = prometheus::install_recorder()?;
//!     let collector = EnviroCollector::new(SensorSet::open(false), Default::default());
//!
//!     let (_aqi_tx, aqi_rx) = watch::channel(None);
//!     let (tx, rx) = watch::channel(EnviroSnapshot::default());
//!     spawn_sampling(collector, DEFAULT_INTERVAL, aqi_rx, tx);
//!
//!     let config = WebConfig::default();
//!     start_web_server(config.clone(), AppState::new(handle, rx, &config)).await?;
//!     Ok(())
//! }
//! ```

use std::time::Duration;

pub mod config;
pub mod error;
pub mod hardware;
pub mod metrics;
pub mod publishers;
pub mod sensors;
pub mod web;

// Re-export public API
pub use config::ExporterConfig;
pub use error::{ExporterError, Result};
pub use metrics::{Dashboard, EnviroCollector, EnviroSnapshot, SamplingOptions, SensorReadings};
pub use sensors::SensorSet;
pub use web::{start_web_server, AppState, WebConfig};

/// Time between sensor samples.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// The default web server port
pub const DEFAULT_PORT: u16 = 8000;
