//! LC709203F battery fuel gauge.
//!
//! Every 16-bit register transfer carries a CRC-8 (polynomial 0x07) computed
//! over the bus address bytes, the register and the little-endian word.

use crate::error::{ExporterError, Result};
use crate::hardware::RegisterBus;
use crate::sensors::{BatteryMonitor, BatteryReading};
use tracing::debug;

pub const ADDRESS: u16 = 0x0B;

const WRITE_ADDRESS: u8 = (ADDRESS as u8) << 1;
const READ_ADDRESS: u8 = WRITE_ADDRESS | 1;

const REG_INIT_RSOC: u8 = 0x07;
const REG_CELL_VOLTAGE: u8 = 0x09;
const REG_APA: u8 = 0x0B;
const REG_CELL_ITE: u8 = 0x0F;
const REG_IC_VERSION: u8 = 0x11;
const REG_POWER_MODE: u8 = 0x15;

const INIT_RSOC_MAGIC: u16 = 0xAA55;
const POWER_MODE_OPERATE: u16 = 0x0001;

/// Battery pack capacities and their adjustment-pack-application values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackSize {
    Mah100,
    Mah200,
    Mah500,
    Mah1000,
    Mah2000,
    Mah3000,
}

impl PackSize {
    pub fn apa(self) -> u16 {
        match self {
            PackSize::Mah100 => 0x08,
            PackSize::Mah200 => 0x0B,
            PackSize::Mah500 => 0x10,
            PackSize::Mah1000 => 0x19,
            PackSize::Mah2000 => 0x2D,
            PackSize::Mah3000 => 0x36,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PackSize::Mah100 => "100 mAh",
            PackSize::Mah200 => "200 mAh",
            PackSize::Mah500 => "500 mAh",
            PackSize::Mah1000 => "1000 mAh",
            PackSize::Mah2000 => "2000 mAh",
            PackSize::Mah3000 => "3000 mAh",
        }
    }
}

/// CRC-8, polynomial 0x07, initial value 0.
pub fn crc8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |mut crc, byte| {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x07
            } else {
                crc << 1
            };
        }
        crc
    })
}

pub struct Lc709203f<B> {
    bus: B,
}

impl<B: RegisterBus> Lc709203f<B> {
    /// Wake the gauge, set the pack size and restart the state-of-charge estimate.
    pub fn new(bus: B, pack_size: PackSize) -> Result<Self> {
        let mut gauge = Self { bus };
        gauge.write_word(REG_POWER_MODE, POWER_MODE_OPERATE)?;
        debug!("Sensor IC version: {:#x}", gauge.read_word(REG_IC_VERSION)?);
        gauge.write_word(REG_APA, pack_size.apa())?;
        gauge.write_word(REG_INIT_RSOC, INIT_RSOC_MAGIC)?;
        debug!("Battery size: {}", pack_size.label());
        Ok(gauge)
    }

    fn write_word(&mut self, register: u8, value: u16) -> Result<()> {
        let [lo, hi] = value.to_le_bytes();
        let crc = crc8(&[WRITE_ADDRESS, register, lo, hi]);
        self.bus.write_register(register, &[lo, hi, crc])
    }

    fn read_word(&mut self, register: u8) -> Result<u16> {
        let mut buffer = [0u8; 3];
        self.bus.read_registers(register, &mut buffer)?;
        let [lo, hi, crc] = buffer;
        let expected = crc8(&[WRITE_ADDRESS, register, READ_ADDRESS, lo, hi]);
        if crc != expected {
            return Err(ExporterError::Checksum {
                expected: expected as u16,
                actual: crc as u16,
            });
        }
        Ok(u16::from_le_bytes([lo, hi]))
    }
}

impl<B: RegisterBus> BatteryMonitor for Lc709203f<B> {
    fn read(&mut self) -> Result<BatteryReading> {
        let millivolts = self.read_word(REG_CELL_VOLTAGE)?;
        let tenths_percent = self.read_word(REG_CELL_ITE)?;
        Ok(BatteryReading {
            voltage: millivolts as f64 / 1000.0,
            percentage: tenths_percent as f64 / 10.0,
        })
    }
}
