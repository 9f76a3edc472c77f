//! LTR559 ambient light and proximity sensor.

use crate::error::{ExporterError, Result};
use crate::hardware::RegisterBus;
use crate::sensors::{LightReading, LightSensor};

pub const ADDRESS: u16 = 0x23;

const PART_ID: u8 = 0x09;

const REG_ALS_CONTROL: u8 = 0x80;
const REG_PS_CONTROL: u8 = 0x81;
const REG_PS_LED: u8 = 0x82;
const REG_PS_N_PULSES: u8 = 0x83;
const REG_PS_MEAS_RATE: u8 = 0x84;
const REG_ALS_MEAS_RATE: u8 = 0x85;
const REG_PART_ID: u8 = 0x86;
const REG_ALS_DATA: u8 = 0x88;
const REG_PS_DATA: u8 = 0x8D;

/// ALS gain written to ALS_CONTROL.
const GAIN: f64 = 4.0;
/// ALS integration time in ms.
const INTEGRATION_MS: f64 = 50.0;

const CH0_COEFFICIENTS: [f64; 4] = [17743.0, 42785.0, 5926.0, 0.0];
const CH1_COEFFICIENTS: [f64; 4] = [-11059.0, 19548.0, -1185.0, 0.0];

/// Convert raw ALS channel counts into lux.
pub fn lux_from_channels(ch0: u16, ch1: u16) -> f64 {
    let total = ch0 as u32 + ch1 as u32;
    let ratio = if total == 0 {
        100
    } else {
        ch1 as u32 * 100 / total
    };

    let index = match ratio {
        0..=44 => 0,
        45..=63 => 1,
        64..=84 => 2,
        _ => 3,
    };

    let lux = ch0 as f64 * CH0_COEFFICIENTS[index] - ch1 as f64 * CH1_COEFFICIENTS[index];
    lux / (INTEGRATION_MS / 100.0) / GAIN / 10000.0
}

pub struct Ltr559<B> {
    bus: B,
}

impl<B: RegisterBus> Ltr559<B> {
    pub fn new(mut bus: B) -> Result<Self> {
        let part = bus.read_register(REG_PART_ID)? >> 4;
        if part != PART_ID {
            return Err(ExporterError::sensor_error(
                "LTR559",
                format!("unexpected part id {:#03x}", part),
            ));
        }

        // Gain x4, active
        bus.write_register(REG_ALS_CONTROL, &[0b0000_1001])?;
        // 50 ms integration, 50 ms repeat
        bus.write_register(REG_ALS_MEAS_RATE, &[0b0000_1000])?;
        // 30 kHz, 100% duty, 50 mA
        bus.write_register(REG_PS_LED, &[0b0001_1011])?;
        bus.write_register(REG_PS_N_PULSES, &[0x01])?;
        // 100 ms
        bus.write_register(REG_PS_MEAS_RATE, &[0b0000_0010])?;
        bus.write_register(REG_PS_CONTROL, &[0b0000_0011])?;

        Ok(Self { bus })
    }
}

impl<B: RegisterBus> LightSensor for Ltr559<B> {
    fn read(&mut self) -> Result<LightReading> {
        let mut als = [0u8; 4];
        self.bus.read_registers(REG_ALS_DATA, &mut als)?;
        let ch1 = u16::from_le_bytes([als[0], als[1]]);
        let ch0 = u16::from_le_bytes([als[2], als[3]]);

        let mut ps = [0u8; 2];
        self.bus.read_registers(REG_PS_DATA, &mut ps)?;
        let proximity = u16::from_le_bytes(ps) & 0x07FF;

        Ok(LightReading {
            lux: lux_from_channels(ch0, ch1),
            proximity: proximity as f64,
        })
    }
}
