//! Bus access for the sensors on the Enviro+ board.
//!
//! Drivers are written against the [`RegisterBus`] and [`SerialPort`] traits so
//! their decoding can be exercised without a Raspberry Pi. The concrete
//! implementations are feature-gated on `hardware` to allow compilation on
//! non-Raspberry Pi systems.

use crate::error::Result;
use std::time::Duration;

/// I2C bus number of the 40-pin header.
pub const I2C_BUS: u8 = 1;

/// Register-oriented access to one I2C device.
pub trait RegisterBus: Send {
    /// Write `data` starting at `register`.
    fn write_register(&mut self, register: u8, data: &[u8]) -> Result<()>;

    /// Fill `buffer` with bytes read starting at `register`.
    fn read_registers(&mut self, register: u8, buffer: &mut [u8]) -> Result<()>;

    /// Read a single register.
    fn read_register(&mut self, register: u8) -> Result<u8> {
        let mut buffer = [0u8; 1];
        self.read_registers(register, &mut buffer)?;
        Ok(buffer[0])
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for Box<B> {
    fn write_register(&mut self, register: u8, data: &[u8]) -> Result<()> {
        (**self).write_register(register, data)
    }

    fn read_registers(&mut self, register: u8, buffer: &mut [u8]) -> Result<()> {
        (**self).read_registers(register, buffer)
    }
}

/// Byte stream over a UART.
pub trait SerialPort: Send {
    /// Read available bytes into `buffer`, returning 0 when the read timed out.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write the whole of `data`.
    fn write_all(&mut self, data: &[u8]) -> Result<()>;
}

impl<S: SerialPort + ?Sized> SerialPort for Box<S> {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        (**self).read(buffer)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        (**self).write_all(data)
    }
}

#[cfg(feature = "hardware")]
mod raspberry_pi {
    use super::*;
    use crate::error::ExporterError;
    use rppal::gpio::{Gpio, OutputPin};
    use rppal::i2c::I2c;
    use rppal::uart::{Parity, Uart};
    use std::path::Path;

    /// One I2C device on the Raspberry Pi bus, using rppal.
    pub struct PiI2c {
        i2c: I2c,
    }

    impl PiI2c {
        pub fn open(address: u16) -> Result<Self> {
            let mut i2c = I2c::with_bus(I2C_BUS).map_err(|e| {
                ExporterError::hardware_error(format!("Failed to open I2C bus {}: {}", I2C_BUS, e))
            })?;
            i2c.set_slave_address(address).map_err(|e| {
                ExporterError::hardware_error(format!(
                    "Failed to select I2C device {:#04x}: {}",
                    address, e
                ))
            })?;
            Ok(Self { i2c })
        }
    }

    impl RegisterBus for PiI2c {
        fn write_register(&mut self, register: u8, data: &[u8]) -> Result<()> {
            let mut frame = Vec::with_capacity(data.len() + 1);
            frame.push(register);
            frame.extend_from_slice(data);
            self.i2c
                .write(&frame)
                .map_err(|e| ExporterError::hardware_error(format!("I2C write failed: {}", e)))?;
            Ok(())
        }

        fn read_registers(&mut self, register: u8, buffer: &mut [u8]) -> Result<()> {
            self.i2c
                .write_read(&[register], buffer)
                .map_err(|e| ExporterError::hardware_error(format!("I2C read failed: {}", e)))
        }
    }

    /// A UART addressed by device path, using rppal.
    pub struct PiUart {
        uart: Uart,
    }

    impl PiUart {
        pub fn open(path: &Path, baud_rate: u32, read_timeout: Duration) -> Result<Self> {
            let mut uart = Uart::with_path(path, baud_rate, Parity::None, 8, 1).map_err(|e| {
                ExporterError::hardware_error(format!("Failed to open {}: {}", path.display(), e))
            })?;
            uart.set_read_mode(0, read_timeout)
                .map_err(|e| ExporterError::hardware_error(format!("UART setup failed: {}", e)))?;
            Ok(Self { uart })
        }
    }

    impl SerialPort for PiUart {
        fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
            self.uart
                .read(buffer)
                .map_err(|e| ExporterError::hardware_error(format!("UART read failed: {}", e)))
        }

        fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
            while !data.is_empty() {
                let written = self.uart.write(data).map_err(|e| {
                    ExporterError::hardware_error(format!("UART write failed: {}", e))
                })?;
                data = &data[written..];
            }
            Ok(())
        }
    }

    /// Holds an output pin high for as long as it lives.
    pub struct PinGuard {
        _pin: OutputPin,
    }

    pub fn drive_high(bcm_pin: u8) -> Result<PinGuard> {
        let gpio = Gpio::new()
            .map_err(|e| ExporterError::hardware_error(format!("Failed to initialize GPIO: {}", e)))?;
        let mut pin = gpio
            .get(bcm_pin)
            .map_err(|e| {
                ExporterError::hardware_error(format!("Failed to access pin {}: {}", bcm_pin, e))
            })?
            .into_output();
        pin.set_high();
        Ok(PinGuard { _pin: pin })
    }
}

#[cfg(not(feature = "hardware"))]
mod unavailable {
    use super::*;
    use crate::error::ExporterError;
    use std::path::Path;

    fn not_compiled<T>() -> Result<T> {
        Err(ExporterError::hardware_error(
            "hardware access not available (built without the `hardware` feature)",
        ))
    }

    /// Stand-in for systems without I2C support.
    pub struct PiI2c;

    impl PiI2c {
        pub fn open(_address: u16) -> Result<Self> {
            not_compiled()
        }
    }

    impl RegisterBus for PiI2c {
        fn write_register(&mut self, _register: u8, _data: &[u8]) -> Result<()> {
            not_compiled()
        }

        fn read_registers(&mut self, _register: u8, _buffer: &mut [u8]) -> Result<()> {
            not_compiled()
        }
    }

    /// Stand-in for systems without UART support.
    pub struct PiUart;

    impl PiUart {
        pub fn open(_path: &Path, _baud_rate: u32, _read_timeout: Duration) -> Result<Self> {
            not_compiled()
        }
    }

    impl SerialPort for PiUart {
        fn read(&mut self, _buffer: &mut [u8]) -> Result<usize> {
            not_compiled()
        }

        fn write_all(&mut self, _data: &[u8]) -> Result<()> {
            not_compiled()
        }
    }

    pub struct PinGuard;

    pub fn drive_high(_bcm_pin: u8) -> Result<PinGuard> {
        not_compiled()
    }
}

#[cfg(feature = "hardware")]
pub use raspberry_pi::{drive_high, PiI2c, PiUart, PinGuard};

#[cfg(not(feature = "hardware"))]
pub use unavailable::{drive_high, PiI2c, PiUart, PinGuard};


#[cfg(test)]
mod tests {
    use super::fake::*;
    use super::*;

    #[test]
    fn test_fake_serial_splits_long_chunks() {
        let mut port = FakeSerial::replying(&[b"abcdef"]);
        let mut buffer = [0u8; 4];
        assert_eq!(port.read(&mut buffer).unwrap(), 4);
        assert_eq!(&buffer, b"abcd");
        assert_eq!(port.read(&mut buffer).unwrap(), 2);
        assert_eq!(port.read(&mut buffer).unwrap(), 0);
    }

    #[test]
    fn test_boxed_bus_delegates() {
        let mut bus: Box<dyn RegisterBus> = Box::new(FakeBus::default().with(0xD0, &[0x60]));
        assert_eq!(bus.read_register(0xD0).unwrap(), 0x60);
    }

    #[cfg(not(feature = "hardware"))]
    #[test]
    fn test_hardware_unavailable_without_feature() {
        assert!(PiI2c::open(0x76).is_err());
        assert!(drive_high(24).is_err());
    }
}
