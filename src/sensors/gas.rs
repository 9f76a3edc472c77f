//! MICS6814 gas sensor, read through the ADS1015 ADC.
//!
//! The three sensing elements sit in voltage dividers against 56 kΩ on a
//! 3.3 V rail; each ADC channel voltage is converted back into the element's
//! resistance.

use crate::error::{ExporterError, Result};
use crate::hardware::{PinGuard, RegisterBus};
use crate::sensors::{GasReading, GasSensor};
use std::thread;
use std::time::Duration;

pub const ADDRESS: u16 = 0x49;

/// BCM pin that powers the sensor heater.
pub const HEATER_PIN: u8 = 24;

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

const SUPPLY_VOLTS: f64 = 3.3;
const DIVIDER_OHMS: f64 = 56000.0;
const FULL_SCALE_VOLTS: f64 = 6.144;

const OXIDISING_CHANNEL: u8 = 0;
const REDUCING_CHANNEL: u8 = 1;
const NH3_CHANNEL: u8 = 2;

const READY_POLLS: usize = 10;

/// Single-shot conversion of `channel` against ground at ±6.144 V, 1600 SPS.
pub fn single_shot_config(channel: u8) -> u16 {
    let start = 1 << 15;
    let mux = (0b100 | (channel as u16 & 0b11)) << 12;
    let pga = 0b000 << 9;
    let single_shot = 1 << 8;
    let data_rate = 0b100 << 5;
    let comparator_off = 0b11;
    start | mux | pga | single_shot | data_rate | comparator_off
}

/// Decode the 12-bit, left-aligned conversion register into volts.
pub fn conversion_to_volts(raw: [u8; 2]) -> f64 {
    let value = i16::from_be_bytes(raw) >> 4;
    value as f64 * FULL_SCALE_VOLTS / 2048.0
}

/// Resistance of a sensing element given the divider's output voltage.
pub fn resistance_from_volts(volts: f64) -> Result<f64> {
    if volts >= SUPPLY_VOLTS {
        return Err(ExporterError::sensor_error(
            "MICS6814",
            format!("channel voltage {:.3} V at or above supply", volts),
        ));
    }
    Ok(volts * DIVIDER_OHMS / (SUPPLY_VOLTS - volts))
}

pub struct Mics6814<B> {
    adc: B,
    _heater: Option<PinGuard>,
}

impl<B: RegisterBus> Mics6814<B> {
    pub fn new(adc: B, heater: Option<PinGuard>) -> Self {
        Self {
            adc,
            _heater: heater,
        }
    }

    fn read_volts(&mut self, channel: u8) -> Result<f64> {
        self.adc
            .write_register(REG_CONFIG, &single_shot_config(channel).to_be_bytes())?;

        for _ in 0..READY_POLLS {
            let mut config = [0u8; 2];
            self.adc.read_registers(REG_CONFIG, &mut config)?;
            if config[0] & 0x80 != 0 {
                let mut raw = [0u8; 2];
                self.adc.read_registers(REG_CONVERSION, &mut raw)?;
                return Ok(conversion_to_volts(raw));
            }
            thread::sleep(Duration::from_millis(1));
        }

        Err(ExporterError::Timeout(format!(
            "ADS1015 conversion on channel {} did not complete",
            channel
        )))
    }
}

impl<B: RegisterBus> GasSensor for Mics6814<B> {
    fn read(&mut self) -> Result<GasReading> {
        let oxidising = resistance_from_volts(self.read_volts(OXIDISING_CHANNEL)?)?;
        let reducing = resistance_from_volts(self.read_volts(REDUCING_CHANNEL)?)?;
        let nh3 = resistance_from_volts(self.read_volts(NH3_CHANNEL)?)?;
        Ok(GasReading {
            oxidising,
            reducing,
            nh3,
        })
    }
}
