//! Sensor sampling, derived values and Prometheus export.
//!
//! This module turns raw sensor readings into the values the exporter
//! serves: Prometheus gauges and histograms, the US-EPA AQI, temperature
//! compensation, pressure trend and the dashboard view.

pub mod aqi;
pub mod collector;
pub mod data;
pub mod derived;
pub mod prometheus;

// Re-export commonly used items
pub use collector::{spawn_sampling, EnviroCollector, SamplingOptions};
pub use data::{Dashboard, EnviroSnapshot, SensorReadings};
