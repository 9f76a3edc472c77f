//! BME280 temperature, pressure and humidity sensor.

use crate::error::{ExporterError, Result};
use crate::hardware::RegisterBus;
use crate::sensors::{WeatherReading, WeatherSensor};
use tracing::debug;

/// Default I2C address on the Enviro+ board.
pub const ADDRESS: u16 = 0x76;

const CHIP_ID: u8 = 0x60;

const REG_CHIP_ID: u8 = 0xD0;
const REG_CALIB_TP: u8 = 0x88;
const REG_CALIB_H1: u8 = 0xA1;
const REG_CALIB_H2: u8 = 0xE1;
const REG_CTRL_HUM: u8 = 0xF2;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CONFIG: u8 = 0xF5;
const REG_DATA: u8 = 0xF7;

/// Factory trimming parameters stored in the sensor's NVM.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
    pub h1: u8,
    pub h2: i16,
    pub h3: u8,
    pub h4: i16,
    pub h5: i16,
    pub h6: i8,
}

impl Calibration {
    /// Decode the 24 temperature/pressure bytes at 0x88, H1 at 0xA1 and the
    /// seven humidity bytes at 0xE1.
    pub fn from_registers(tp: &[u8; 24], h1: u8, h: &[u8; 7]) -> Self {
        let u = |i: usize| u16::from_le_bytes([tp[i], tp[i + 1]]);
        let s = |i: usize| i16::from_le_bytes([tp[i], tp[i + 1]]);

        // H4 and H5 share the nibbles of 0xE5
        let h4 = ((h[3] as i8 as i16) << 4) | (h[4] & 0x0F) as i16;
        let h5 = ((h[5] as i8 as i16) << 4) | (h[4] >> 4) as i16;

        Self {
            t1: u(0),
            t2: s(2),
            t3: s(4),
            p1: u(6),
            p2: s(8),
            p3: s(10),
            p4: s(12),
            p5: s(14),
            p6: s(16),
            p7: s(18),
            p8: s(20),
            p9: s(22),
            h1,
            h2: i16::from_le_bytes([h[0], h[1]]),
            h3: h[2],
            h4,
            h5,
            h6: h[6] as i8,
        }
    }

    /// Returns (temperature °C, t_fine).
    pub fn compensate_temperature(&self, adc_t: i32) -> (f64, f64) {
        let adc_t = adc_t as f64;
        let t1 = self.t1 as f64;
        let var1 = (adc_t / 16384.0 - t1 / 1024.0) * self.t2 as f64;
        let var2 = (adc_t / 131072.0 - t1 / 8192.0).powi(2) * self.t3 as f64;
        let t_fine = var1 + var2;
        (t_fine / 5120.0, t_fine)
    }

    /// Pressure in Pa.
    pub fn compensate_pressure(&self, adc_p: i32, t_fine: f64) -> f64 {
        let mut var1 = t_fine / 2.0 - 64000.0;
        let mut var2 = var1 * var1 * self.p6 as f64 / 32768.0;
        var2 += var1 * self.p5 as f64 * 2.0;
        var2 = var2 / 4.0 + self.p4 as f64 * 65536.0;
        var1 = (self.p3 as f64 * var1 * var1 / 524288.0 + self.p2 as f64 * var1) / 524288.0;
        var1 = (1.0 + var1 / 32768.0) * self.p1 as f64;
        if var1 == 0.0 {
            return 0.0;
        }

        let mut p = 1048576.0 - adc_p as f64;
        p = (p - var2 / 4096.0) * 6250.0 / var1;
        let var1 = self.p9 as f64 * p * p / 2147483648.0;
        let var2 = p * self.p8 as f64 / 32768.0;
        p + (var1 + var2 + self.p7 as f64) / 16.0
    }

    /// Relative humidity in %, clamped to 0..=100.
    pub fn compensate_humidity(&self, adc_h: i32, t_fine: f64) -> f64 {
        let h = t_fine - 76800.0;
        let mut humidity = (adc_h as f64 - (self.h4 as f64 * 64.0 + self.h5 as f64 / 16384.0 * h))
            * (self.h2 as f64 / 65536.0
                * (1.0
                    + self.h6 as f64 / 67108864.0
                        * h
                        * (1.0 + self.h3 as f64 / 67108864.0 * h)));
        humidity *= 1.0 - self.h1 as f64 * humidity / 524288.0;
        humidity.clamp(0.0, 100.0)
    }
}

/// Split the 8-byte burst at 0xF7 into (adc_p, adc_t, adc_h).
pub fn split_raw(data: &[u8; 8]) -> (i32, i32, i32) {
    let adc_p = ((data[0] as i32) << 12) | ((data[1] as i32) << 4) | ((data[2] as i32) >> 4);
    let adc_t = ((data[3] as i32) << 12) | ((data[4] as i32) << 4) | ((data[5] as i32) >> 4);
    let adc_h = ((data[6] as i32) << 8) | data[7] as i32;
    (adc_p, adc_t, adc_h)
}

pub struct Bme280<B> {
    bus: B,
    calibration: Calibration,
}

impl<B: RegisterBus> Bme280<B> {
    /// Verify the chip id, load calibration and start continuous sampling.
    pub fn new(mut bus: B) -> Result<Self> {
        let chip_id = bus.read_register(REG_CHIP_ID)?;
        if chip_id != CHIP_ID {
            return Err(ExporterError::sensor_error(
                "BME280",
                format!("unexpected chip id {:#04x}", chip_id),
            ));
        }

        let mut tp = [0u8; 24];
        bus.read_registers(REG_CALIB_TP, &mut tp)?;
        let h1 = bus.read_register(REG_CALIB_H1)?;
        let mut h = [0u8; 7];
        bus.read_registers(REG_CALIB_H2, &mut h)?;
        let calibration = Calibration::from_registers(&tp, h1, &h);
        debug!("BME280 calibration: {:?}", calibration);

        // Humidity oversampling must be written before ctrl_meas to take effect
        bus.write_register(REG_CTRL_HUM, &[0x01])?;
        // 1000 ms standby, filter off
        bus.write_register(REG_CONFIG, &[0xA0])?;
        // Temperature x1, pressure x1, normal mode
        bus.write_register(REG_CTRL_MEAS, &[0x27])?;

        Ok(Self { bus, calibration })
    }
}

impl<B: RegisterBus> WeatherSensor for Bme280<B> {
    fn read(&mut self) -> Result<WeatherReading> {
        let mut data = [0u8; 8];
        self.bus.read_registers(REG_DATA, &mut data)?;
        let (adc_p, adc_t, adc_h) = split_raw(&data);

        let (temperature, t_fine) = self.calibration.compensate_temperature(adc_t);
        let pressure = self.calibration.compensate_pressure(adc_p, t_fine) / 100.0;
        let humidity = self.calibration.compensate_humidity(adc_h, t_fine);

        Ok(WeatherReading {
            temperature,
            pressure,
            humidity,
        })
    }
}
