//! Error handling for the Enviro+ exporter.

/// A specialized `Result` type for exporter operations.
pub type Result<T> = std::result::Result<T, ExporterError>;

/// The main error type for sensor, upload and server operations.
#[derive(Debug, thiserror::Error)]
pub enum ExporterError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bus or pin access failed (I2C, UART, GPIO)
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// A sensor returned an unusable reading
    #[error("Failed to read {sensor}: {message}")]
    Sensor {
        sensor: &'static str,
        message: String,
    },

    /// Frame or register checksum did not match
    #[error("Checksum mismatch: expected {expected:#06x}, got {actual:#06x}")]
    Checksum { expected: u16, actual: u16 },

    /// No data arrived before the deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// An upload target rejected the data
    #[error("{target} upload failed: {message}")]
    Publish {
        target: &'static str,
        message: String,
    },

    /// Notecard transaction failed
    #[error("Notecard error: {0}")]
    Notecard(String),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Prometheus recorder could not be built or installed
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),

    /// Parsing of a sensor or system value failed
    #[error("Failed to parse: {0}")]
    Parse(String),
}

impl ExporterError {
    /// Create a new hardware error
    pub fn hardware_error(msg: impl Into<String>) -> Self {
        Self::Hardware(msg.into())
    }

    /// Create a new sensor error
    pub fn sensor_error(sensor: &'static str, msg: impl Into<String>) -> Self {
        Self::Sensor {
            sensor,
            message: msg.into(),
        }
    }

    /// Create a new upload error
    pub fn publish_error(target: &'static str, msg: impl Into<String>) -> Self {
        Self::Publish {
            target,
            message: msg.into(),
        }
    }

    /// Create a new Notecard error
    pub fn notecard_error(msg: impl Into<String>) -> Self {
        Self::Notecard(msg.into())
    }

    /// Create a new metrics error
    pub fn metrics_error(msg: impl Into<String>) -> Self {
        Self::Metrics(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Create a new parse error
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}
