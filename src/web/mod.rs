//! HTTP surface: Prometheus scrape endpoint, JSON API and a WebSocket feed.

pub mod config;
pub mod handlers;
pub mod router;
pub mod websocket;

pub use config::WebConfig;
pub use router::create_app;

use crate::error::{ExporterError, Result};
use crate::metrics::EnviroSnapshot;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub prometheus: PrometheusHandle,
    pub snapshots: watch::Receiver<EnviroSnapshot>,
    pub(crate) connections: Arc<AtomicUsize>,
    pub(crate) max_websocket_connections: usize,
}

impl AppState {
    pub fn new(
        prometheus: PrometheusHandle,
        snapshots: watch::Receiver<EnviroSnapshot>,
        config: &WebConfig,
    ) -> Self {
        Self {
            prometheus,
            snapshots,
            connections: Arc::new(AtomicUsize::new(0)),
            max_websocket_connections: config.max_websocket_connections,
        }
    }
}

/// Bind `config.bind_address()` and serve until the server fails.
pub async fn start_web_server(config: WebConfig, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(config.bind_address())
        .await
        .map_err(|e| {
            ExporterError::web_server_error(format!(
                "Failed to bind to {}: {}",
                config.bind_address(),
                e
            ))
        })?;
    serve(listener, config, state).await
}

/// Serve on an already bound listener.
pub async fn serve(listener: TcpListener, config: WebConfig, state: AppState) -> Result<()> {
    let app = create_app(&config, state);
    let addr = listener.local_addr()?;

    info!("Listening on http://{}", addr);
    info!("Prometheus metrics at http://{}/metrics", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| ExporterError::web_server_error(format!("Server error: {}", e)))
}
