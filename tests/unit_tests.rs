use enviroplus_exporter::{
    config::{parse_bool, ExporterConfig},
    error::ExporterError,
    metrics::{aqi, derived},
    EnviroSnapshot, SensorReadings, WebConfig,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

/// Test SensorReadings serialization and the JSON field names clients rely on
#[test]
fn test_sensor_readings_json_schema() {
    let readings = SensorReadings {
        temperature: 21.5,
        pm25: 8.0,
        external_aqi: Some(42),
        timestamp: 1_700_000_000_000,
        ..Default::default()
    };

    let json: serde_json::Value = serde_json::to_value(&readings).expect("Should serialize");
    for field in [
        "temperature",
        "humidity",
        "pressure",
        "oxidising",
        "reducing",
        "nh3",
        "lux",
        "proximity",
        "pm1",
        "pm25",
        "pm10",
        "cpu_temperature",
        "battery_voltage",
        "battery_percentage",
        "aqi",
        "external_aqi",
        "timestamp",
    ] {
        assert!(json.get(field).is_some(), "missing field {}", field);
    }
    assert_eq!(json["external_aqi"], 42);

    let back: SensorReadings = serde_json::from_value(json).expect("Should deserialize");
    assert_eq!(back, readings);
}

/// Test the snapshot carries both the raw readings and the dashboard view
#[test]
fn test_snapshot_json_layout() {
    let json = serde_json::to_value(EnviroSnapshot::default()).expect("Should serialize");
    assert!(json.get("readings").is_some());
    let dashboard = json.get("dashboard").expect("dashboard");
    assert!(dashboard.get("pressure_trend").is_some());
    assert!(dashboard.get("aqi_color").is_some());
}

/// Test ExporterError creation and formatting
#[test]
fn test_error_types() {
    let hardware = ExporterError::hardware_error("I2C bus 1 missing");
    assert!(format!("{}", hardware).contains("I2C bus 1 missing"));

    let sensor = ExporterError::sensor_error("BME280", "bad chip id");
    let text = format!("{}", sensor);
    assert!(text.contains("BME280"));
    assert!(text.contains("bad chip id"));

    let publish = ExporterError::publish_error("InfluxDB", "401 Unauthorized");
    assert!(format!("{}", publish).contains("401 Unauthorized"));

    let web_error = ExporterError::web_server_error("Server startup failed");
    assert!(format!("{}", web_error).contains("Server startup failed"));

    let config_error = ExporterError::config_error("Invalid configuration");
    assert!(format!("{}", config_error).contains("Invalid configuration"));
}

/// Test WebConfig builder pattern
#[test]
fn test_web_config() {
    let config = WebConfig::default()
        .with_host("127.0.0.1")
        .with_port(9090)
        .with_cors(false)
        .with_max_websocket_connections(50);

    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.port, 9090);
    assert!(!config.enable_cors);
    assert_eq!(config.max_websocket_connections, 50);
    assert_eq!(config.bind_address(), "127.0.0.1:9090");
}

/// Test the flag boolean spellings
#[test]
fn test_parse_bool_spellings() {
    for value in ["true", "T", "1", "Yes", "y"] {
        assert_eq!(parse_bool(value), Ok(true), "{}", value);
    }
    for value in ["false", "F", "0", "NO", "n"] {
        assert_eq!(parse_bool(value), Ok(false), "{}", value);
    }
    assert_eq!(
        parse_bool("maybe"),
        Err("maybe is not a valid boolean value".to_string())
    );
}

/// Test environment defaults match a fresh install
#[test]
fn test_exporter_config_defaults() {
    let config = assert_ok!(ExporterConfig::from_lookup(lookup(&[])));
    assert_eq!(config.influxdb.bucket, "enviro");
    assert_eq!(config.influxdb.location, "San Francisco");
    assert_eq!(config.influxdb.period, Duration::from_secs(5));
    assert_eq!(config.luftdaten.period, Duration::from_secs(30));
    assert_eq!(config.safecast.period, Duration::from_secs(300));
    assert_eq!(config.safecast.device_id, 226);
    assert!(!config.safecast.dev_mode);
    assert_eq!(config.notecard.period, Duration::from_secs(600));
    assert_eq!(config.notecard.baud_rate, 9600);
    assert!(config.waqi.is_none());
}

/// Test external AQI needs all three of latitude, longitude and key
#[test]
fn test_waqi_needs_location_and_key() {
    let partial = ExporterConfig::from_lookup(lookup(&[("LATITUDE", "1"), ("LONGITUDE", "2")]))
        .expect("config");
    assert!(partial.waqi.is_none());

    let full = ExporterConfig::from_lookup(lookup(&[
        ("LATITUDE", "1"),
        ("LONGITUDE", "2"),
        ("WAQI_API_KEY", "k"),
    ]))
    .expect("config");
    assert_eq!(full.waqi.expect("waqi").api_key, "k");
}

/// Test malformed periods are rejected at startup
#[test]
fn test_malformed_period_is_config_error() {
    let err = assert_err!(ExporterConfig::from_lookup(lookup(&[(
        "INFLUXDB_TIME_BETWEEN_POSTS",
        "soon"
    )])));
    assert!(matches!(err, ExporterError::Config(_)));

    let err = assert_err!(ExporterConfig::from_lookup(lookup(&[("SAFECAST_DEVICE_ID", "-1")])));
    assert!(err.to_string().contains("SAFECAST_DEVICE_ID"));
}

/// Test AQI and its presentation agree across category boundaries
#[test]
fn test_aqi_categories() {
    let cases = [
        (5.0, 20.0, "Good", [0, 128, 0]),
        (20.0, 20.0, "OK", [192, 192, 0]),
        (40.0, 20.0, "Poor", [192, 128, 0]),
        (100.0, 20.0, "Bad", [192, 0, 0]),
        (200.0, 20.0, "Very Bad", [128, 0, 128]),
        (300.0, 20.0, "XXX", [128, 0, 0]),
    ];
    for (pm25, pm10, description, color) in cases {
        let index = aqi::us_epa(pm25, pm10);
        assert_eq!(derived::describe_aqi(index), description, "pm25 {}", pm25);
        assert_eq!(derived::aqi_to_color(index), color, "pm25 {}", pm25);
    }
}

/// Test the descriptions shown on the dashboard
#[test]
fn test_descriptions() {
    assert_eq!(derived::describe_pressure(965.0), "storm");
    assert_eq!(derived::describe_pressure(1013.0), "good");
    assert_eq!(derived::describe_humidity(45.0), "good");
    assert_eq!(derived::describe_humidity(75.0), "bad");
    assert_eq!(derived::describe_light(20.0), "dark");
    assert_eq!(derived::describe_light(800.0), "bright");
}
