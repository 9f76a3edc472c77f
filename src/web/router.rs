//! Web application router and middleware setup.

use crate::web::config::WebConfig;
use crate::web::{handlers, websocket, AppState};
use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main axum application with all routes and middleware.
pub fn create_app(config: &WebConfig, state: AppState) -> Router {
    let mut app = Router::new()
        .route("/", get(handlers::index))
        .route("/metrics", get(handlers::metrics))
        // API routes
        .route("/api/readings", get(handlers::readings))
        .route("/api/dashboard", get(handlers::dashboard))
        .route("/api/health", get(handlers::health_check))
        .route("/ws", get(websocket::websocket_handler))
        .with_state(state);

    if config.enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::prometheus::{build_recorder, TEMPERATURE};
    use crate::metrics::{EnviroSnapshot, SensorReadings};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tokio::sync::watch;
    use tower::ServiceExt;

    fn test_app(config: &WebConfig) -> (Router, watch::Sender<EnviroSnapshot>) {
        let recorder = build_recorder().unwrap();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::gauge!(TEMPERATURE).set(21.5);
        });
        let (tx, rx) = watch::channel(EnviroSnapshot::default());
        let state = AppState::new(handle, rx, config);
        (create_app(config, state), tx)
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_route_renders_prometheus_text() {
        let (app, _tx) = test_app(&WebConfig::default());
        let (status, body) = get_body(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("temperature 21.5"));
    }

    #[tokio::test]
    async fn test_readings_route_serves_latest_snapshot() {
        let (app, tx) = test_app(&WebConfig::default());
        tx.send_modify(|snapshot| {
            snapshot.readings = SensorReadings {
                pm25: 7.0,
                ..Default::default()
            }
        });

        let (status, body) = get_body(app, "/api/readings").await;
        assert_eq!(status, StatusCode::OK);
        let readings: SensorReadings = serde_json::from_str(&body).unwrap();
        assert_eq!(readings.pm25, 7.0);
    }

    #[tokio::test]
    async fn test_dashboard_and_health_routes() {
        let (app, _tx) = test_app(&WebConfig::default());
        let (status, body) = get_body(app.clone(), "/api/dashboard").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"aqi_string\""));

        let (status, body) = get_body(app, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        let health: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["service"], "enviroplus-exporter");
    }

    #[tokio::test]
    async fn test_index_links_endpoints() {
        let (app, _tx) = test_app(&WebConfig::default());
        let (status, body) = get_body(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("/metrics"));
        assert!(body.contains("/api/readings"));
    }

    #[tokio::test]
    async fn test_cors_header_only_when_enabled() {
        let request = || {
            Request::builder()
                .uri("/api/health")
                .header(header::ORIGIN, "http://example.com")
                .body(Body::empty())
                .unwrap()
        };

        let (app, _tx) = test_app(&WebConfig::default());
        let response = app.oneshot(request()).await.unwrap();
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());

        let (app, _tx) = test_app(&WebConfig::default().with_cors(true));
        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (app, _tx) = test_app(&WebConfig::default());
        let (status, _) = get_body(app, "/api/snapshot").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
