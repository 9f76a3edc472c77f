//! Blues Notecard transactions and Notehub uploads over a serial port.
//!
//! Requests are single-line JSON objects terminated by `\n`; the card answers
//! each with one JSON line. A reply carrying `err` is a failed request.

use crate::config::NotecardConfig;
use crate::error::{ExporterError, Result};
use crate::hardware::{PiUart, SerialPort};
use crate::metrics::SensorReadings;
use crate::publishers::Publisher;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How long to wait for each reply byte before giving up.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_REPLY: usize = 8 * 1024;

/// Unit label sent with a reading, chosen by substring of its name.
pub fn units_for(field: &str) -> Option<&'static str> {
    if field.contains("temperature") {
        Some("°C")
    } else if field.contains("humidity") {
        Some("%RH")
    } else if field.contains("pressure") {
        Some("hPa")
    } else if field.contains("oxidising") || field.contains("reducing") || field.contains("nh3") {
        Some("kOhms")
    } else if field.contains("proximity") {
        None
    } else if field.contains("lux") {
        Some("Lux")
    } else if field.contains("pm") {
        Some("ug/m3")
    } else if field.contains("battery_voltage") {
        Some("V")
    } else if field.contains("battery_percentage") {
        Some("%")
    } else {
        None
    }
}

/// `note.add` request for one reading.
pub fn note_add(field: &str, value: f64) -> Value {
    let mut body = serde_json::Map::new();
    body.insert(field.to_string(), json!(value));
    body.insert("units".to_string(), json!(units_for(field)));
    json!({ "req": "note.add", "body": body })
}

/// A Notecard reached over a serial port.
pub struct Notecard<S: SerialPort> {
    port: S,
}

impl<S: SerialPort> Notecard<S> {
    pub fn new(port: S) -> Self {
        Self { port }
    }

    pub fn into_inner(self) -> S {
        self.port
    }

    /// Send one request and wait for its reply.
    pub fn transaction(&mut self, request: &Value) -> Result<Value> {
        let mut line = serde_json::to_vec(request)?;
        line.push(b'\n');
        self.port.write_all(&line)?;

        let reply = self.read_line()?;
        let reply: Value = serde_json::from_slice(&reply)?;
        if let Some(err) = reply.get("err") {
            let message = err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string());
            return Err(ExporterError::notecard_error(message));
        }
        Ok(reply)
    }

    fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut reply = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            if self.port.read(&mut byte)? == 0 {
                return Err(ExporterError::Timeout("no reply from Notecard".to_string()));
            }
            match byte[0] {
                b'\n' => return Ok(reply),
                b'\r' => {}
                other => reply.push(other),
            }
            if reply.len() > MAX_REPLY {
                return Err(ExporterError::notecard_error("reply too long"));
            }
        }
    }

    /// Queue a note for every reading, then ask the card to sync with Notehub.
    /// A rejected note is logged and skipped; a failed sync is an error.
    pub fn send_readings(&mut self, readings: &SensorReadings) -> Result<()> {
        for (field, value) in readings.as_fields() {
            match self.transaction(&note_add(field, value)) {
                Ok(response) => debug!("Notecard response: {}", response),
                Err(e) => warn!("Notecard data setup error: {}", e),
            }
        }
        let response = self.transaction(&json!({ "req": "service.sync" }))?;
        debug!("Notecard response: {}", response);
        Ok(())
    }
}

type PortOpener = dyn Fn() -> Result<Box<dyn SerialPort>> + Send + Sync;

/// Notehub uploads through a Notecard. The port is opened fresh for every
/// upload so an unplugged card recovers on the next period.
pub struct Notehub {
    open: Arc<PortOpener>,
}

impl Notehub {
    /// Open `config.port` at `config.baud_rate` for each upload.
    pub fn new(config: &NotecardConfig) -> Self {
        let path = config.port.clone();
        let baud_rate = config.baud_rate;
        Self::with_opener(move || {
            let port = PiUart::open(&path, baud_rate, REPLY_TIMEOUT)?;
            Ok(Box::new(port) as Box<dyn SerialPort>)
        })
    }

    pub fn with_opener(
        open: impl Fn() -> Result<Box<dyn SerialPort>> + Send + Sync + 'static,
    ) -> Self {
        Self { open: Arc::new(open) }
    }
}

impl Publisher for Notehub {
    fn name(&self) -> &'static str {
        "Notehub"
    }

    async fn publish(&mut self, readings: &SensorReadings) -> Result<()> {
        let open = Arc::clone(&self.open);
        let readings = readings.clone();
        tokio::task::spawn_blocking(move || {
            let port = open().map_err(|e| {
                ExporterError::notecard_error(format!("Error opening notecard: {}", e))
            })?;
            Notecard::new(port).send_readings(&readings)
        })
        .await
        .map_err(|e| ExporterError::notecard_error(format!("upload task failed: {}", e)))?
    }
}
