//! HTTP handlers for API endpoints.

use crate::metrics::{Dashboard, SensorReadings};
use crate::web::AppState;
use axum::{
    extract::State,
    http::header,
    response::{Html, IntoResponse, Json},
};
use serde_json::json;

/// Prometheus text exposition of every gauge and histogram.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.prometheus.render(),
    )
}

/// Latest raw readings as JSON.
pub async fn readings(State(state): State<AppState>) -> Json<SensorReadings> {
    Json(state.snapshots.borrow().readings.clone())
}

/// Latest dashboard view as JSON.
pub async fn dashboard(State(state): State<AppState>) -> Json<Dashboard> {
    Json(state.snapshots.borrow().dashboard.clone())
}

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "enviroplus-exporter",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Enviro+ Exporter</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 2rem; color: #333; }
        h1 { margin-bottom: 0.25rem; }
        table { border-collapse: collapse; margin-top: 1rem; }
        td { padding: 4px 16px 4px 0; border-bottom: 1px solid #eee; }
        td.value { text-align: right; font-variant-numeric: tabular-nums; }
        #status { font-size: 0.9rem; color: #888; }
    </style>
</head>
<body>
    <h1>Enviro+ Exporter</h1>
    <p>
        <a href="/metrics">/metrics</a> &middot;
        <a href="/api/readings">/api/readings</a> &middot;
        <a href="/api/dashboard">/api/dashboard</a> &middot;
        <a href="/api/health">/api/health</a>
    </p>
    <p id="status">connecting&hellip;</p>
    <table id="readings"></table>
    <script>
        function render(data) {
            const table = document.getElementById('readings');
            table.innerHTML = '';
            for (const [name, value] of Object.entries(data)) {
                const row = table.insertRow();
                row.insertCell().textContent = name;
                const cell = row.insertCell();
                cell.className = 'value';
                cell.textContent = typeof value === 'number' ? value.toFixed(2) : String(value);
            }
        }

        function connect() {
            const protocol = window.location.protocol === 'https:' ? 'wss:' : 'ws:';
            const ws = new WebSocket(`${protocol}//${window.location.host}/ws`);
            const status = document.getElementById('status');
            ws.onopen = () => { status.textContent = 'live'; };
            ws.onmessage = (event) => render(JSON.parse(event.data));
            ws.onclose = () => {
                status.textContent = 'disconnected, retrying';
                setTimeout(connect, 5000);
            };
        }

        fetch('/api/readings')
            .then(response => response.json())
            .then(render)
            .catch(error => console.error('Failed to fetch readings:', error));
        connect();
    </script>
</body>
</html>"#;
