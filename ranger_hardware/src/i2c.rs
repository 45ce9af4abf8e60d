//! Real bus access through the Linux I2C subsystem.

use crate::error::HwError;
use ranger_traits::RegisterBus;
use rppal::i2c::I2c;
use tracing::debug;

/// Register bus over `/dev/i2c-*`.
///
/// The device expects the 16-bit register address big-endian, immediately
/// followed by the payload; reads address the register and then read back
/// with auto-increment.
pub struct LinuxI2cBus {
    i2c: I2c,
}

impl LinuxI2cBus {
    /// Open the given I2C bus and address the sensor.
    pub fn open(bus: u8, address: u8) -> crate::error::Result<Self> {
        let mut i2c = I2c::with_bus(bus).map_err(map_i2c_err)?;
        i2c.set_slave_address(u16::from(address))
            .map_err(map_i2c_err)?;
        debug!(bus, address, "i2c bus opened");
        Ok(Self { i2c })
    }
}

fn map_i2c_err(e: rppal::i2c::Error) -> HwError {
    match e {
        rppal::i2c::Error::Io(err) => HwError::Io(err),
        other => HwError::Bus(other.to_string()),
    }
}

impl RegisterBus for LinuxI2cBus {
    fn write(
        &mut self,
        reg: u16,
        bytes: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut frame = Vec::with_capacity(2 + bytes.len());
        frame.extend_from_slice(&reg.to_be_bytes());
        frame.extend_from_slice(bytes);
        self.i2c
            .write(&frame)
            .map_err(|e| Box::new(map_i2c_err(e)) as _)?;
        Ok(())
    }

    fn read(
        &mut self,
        reg: u16,
        buf: &mut [u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.i2c
            .write_read(&reg.to_be_bytes(), buf)
            .map_err(|e| Box::new(map_i2c_err(e)) as _)?;
        Ok(())
    }
}
