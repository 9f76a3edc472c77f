//! Periodic uploads of the latest readings to third-party services.
//!
//! Every uploader implements [`Publisher`] and runs in its own task started
//! by [`spawn_publisher`]: sleep for the period, take the latest readings,
//! upload, log the outcome, repeat.

pub mod influxdb;
pub mod luftdaten;
pub mod notecard;
pub mod safecast;
pub mod waqi;

use crate::error::Result;
use crate::metrics::{EnviroSnapshot, SensorReadings};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use influxdb::InfluxDb;
pub use luftdaten::Luftdaten;
pub use notecard::Notehub;
pub use safecast::Safecast;

/// Timeout applied to every upload request.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// An upload target for sensor readings.
pub trait Publisher: Send + 'static {
    /// Service name used in log lines.
    fn name(&self) -> &'static str;

    /// Upload one set of readings.
    fn publish(
        &mut self,
        readings: &SensorReadings,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// The HTTP client shared by the uploaders.
pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!("enviroplus-exporter/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Upload the latest readings every `period` until the sampler goes away.
pub fn spawn_publisher<P: Publisher>(
    mut publisher: P,
    period: Duration,
    snapshots: watch::Receiver<EnviroSnapshot>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(period).await;
            if snapshots.has_changed().is_err() {
                debug!("Sampler stopped, ending {} uploads", publisher.name());
                break;
            }

            let readings = snapshots.borrow().readings.clone();
            match publisher.publish(&readings).await {
                Ok(()) => debug!("{} response: OK", publisher.name()),
                Err(e) => warn!("Exception sending to {}: {}", publisher.name(), e),
            }
        }
    })
}
