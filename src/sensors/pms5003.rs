//! PMS5003 particulate matter sensor on the Pi's UART.

use crate::error::{ExporterError, Result};
use crate::hardware::SerialPort;
use crate::sensors::{ParticulateReading, ParticulateSensor};
use std::time::{Duration, Instant};

pub const DEVICE: &str = "/dev/ttyAMA0";
pub const BAUD_RATE: u32 = 9600;

const START_1: u8 = 0x42;
const START_2: u8 = 0x4D;
const FRAME_LENGTH: u16 = 28;
const FRAME_SIZE: usize = 32;

/// How long to wait for a complete frame before giving up.
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// One decoded 32-byte frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmsFrame {
    pub data: [u16; 13],
}

impl PmsFrame {
    /// Decode a frame that starts with the two start bytes.
    pub fn parse(frame: &[u8; FRAME_SIZE]) -> Result<Self> {
        if frame[0] != START_1 || frame[1] != START_2 {
            return Err(ExporterError::sensor_error("PMS5003", "missing start bytes"));
        }

        let length = u16::from_be_bytes([frame[2], frame[3]]);
        if length != FRAME_LENGTH {
            return Err(ExporterError::sensor_error(
                "PMS5003",
                format!("unexpected frame length {}", length),
            ));
        }

        let expected = u16::from_be_bytes([frame[30], frame[31]]);
        let actual = frame[..30]
            .iter()
            .fold(0u16, |sum, byte| sum.wrapping_add(*byte as u16));
        if expected != actual {
            return Err(ExporterError::Checksum { expected, actual });
        }

        let mut data = [0u16; 13];
        for (i, word) in data.iter_mut().enumerate() {
            let at = 4 + i * 2;
            *word = u16::from_be_bytes([frame[at], frame[at + 1]]);
        }
        Ok(Self { data })
    }

    /// Standard particle (CF=1) concentration in µg/m³ for PM1.0, PM2.5 or PM10.
    pub fn pm_ug_per_m3(&self, size: f64) -> Option<u16> {
        match size {
            s if s == 1.0 => Some(self.data[0]),
            s if s == 2.5 => Some(self.data[1]),
            s if s == 10.0 => Some(self.data[2]),
            _ => None,
        }
    }

    /// Concentration under atmospheric environment.
    pub fn pm_ug_per_m3_atmospheric(&self, size: f64) -> Option<u16> {
        match size {
            s if s == 1.0 => Some(self.data[3]),
            s if s == 2.5 => Some(self.data[4]),
            s if s == 10.0 => Some(self.data[5]),
            _ => None,
        }
    }
}

pub struct Pms5003<S> {
    port: S,
    timeout: Duration,
}

impl<S: SerialPort> Pms5003<S> {
    pub fn new(port: S) -> Self {
        Self {
            port,
            timeout: READ_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn read_byte(&mut self, deadline: Instant) -> Result<u8> {
        let mut byte = [0u8; 1];
        loop {
            if self.port.read(&mut byte)? == 1 {
                return Ok(byte[0]);
            }
            if Instant::now() >= deadline {
                return Err(ExporterError::Timeout("PMS5003 read timed out".to_string()));
            }
        }
    }

    /// Scan for the start bytes and read one full frame.
    pub fn read_frame(&mut self) -> Result<PmsFrame> {
        let deadline = Instant::now() + self.timeout;
        let mut frame = [0u8; FRAME_SIZE];

        loop {
            if self.read_byte(deadline)? != START_1 {
                continue;
            }
            if self.read_byte(deadline)? == START_2 {
                break;
            }
        }
        frame[0] = START_1;
        frame[1] = START_2;
        for slot in frame.iter_mut().skip(2) {
            *slot = self.read_byte(deadline)?;
        }

        PmsFrame::parse(&frame)
    }
}

impl<S: SerialPort> ParticulateSensor for Pms5003<S> {
    fn read(&mut self) -> Result<ParticulateReading> {
        let frame = self.read_frame()?;
        Ok(ParticulateReading {
            pm1: frame.data[0] as f64,
            pm25: frame.data[1] as f64,
            pm10: frame.data[2] as f64,
        })
    }
}

#[cfg(test)]
pub(crate) fn encode_frame(data: [u16; 13]) -> [u8; FRAME_SIZE] {
    let mut frame = [0u8; FRAME_SIZE];
    frame[0] = START_1;
    frame[1] = START_2;
    frame[2..4].copy_from_slice(&FRAME_LENGTH.to_be_bytes());
    for (i, word) in data.iter().enumerate() {
        frame[4 + i * 2..6 + i * 2].copy_from_slice(&word.to_be_bytes());
    }
    let checksum = frame[..30]
        .iter()
        .fold(0u16, |sum, byte| sum.wrapping_add(*byte as u16));
    frame[30..].copy_from_slice(&checksum.to_be_bytes());
    frame
}
