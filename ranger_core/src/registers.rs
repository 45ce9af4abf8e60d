//! Typed access to the register map over a raw [`RegisterBus`].
//!
//! Width is carried by the map, so an access with the wrong width fails with
//! `InvalidRegister` before a single byte goes out on the wire. There is no
//! read caching: status and result registers change under the device's own
//! control.

use crate::error::{RangeError, Result, map_bus_error};
use crate::regmap::{HISTORY_WINDOW_LEN, RegWidth, Register};
use eyre::WrapErr;
use ranger_traits::RegisterBus;

#[derive(Debug)]
pub struct Registers<B> {
    bus: B,
}

impl<B: RegisterBus> Registers<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Read an 8-bit register.
    pub fn read_u8(&mut self, reg: Register) -> Result<u8> {
        self.ensure_width(reg, RegWidth::W8)?;
        let mut buf = [0u8; 1];
        self.bus
            .read(reg.into(), &mut buf)
            .map_err(|e| eyre::Report::new(map_bus_error(&*e)))
            .wrap_err("register read")?;
        Ok(buf[0])
    }

    /// Write an 8-bit register.
    pub fn write_u8(&mut self, reg: Register, value: u8) -> Result<()> {
        self.ensure_width(reg, RegWidth::W8)?;
        self.bus
            .write(reg.into(), &[value])
            .map_err(|e| eyre::Report::new(map_bus_error(&*e)))
            .wrap_err("register write")
    }

    /// Read a 16-bit big-endian register.
    pub fn read_u16(&mut self, reg: Register) -> Result<u16> {
        self.ensure_width(reg, RegWidth::W16)?;
        let mut buf = [0u8; 2];
        self.bus
            .read(reg.into(), &mut buf)
            .map_err(|e| eyre::Report::new(map_bus_error(&*e)))
            .wrap_err("register read")?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Write a 16-bit big-endian register.
    pub fn write_u16(&mut self, reg: Register, value: u16) -> Result<()> {
        self.ensure_width(reg, RegWidth::W16)?;
        self.bus
            .write(reg.into(), &value.to_be_bytes())
            .map_err(|e| eyre::Report::new(map_bus_error(&*e)))
            .wrap_err("register write")
    }

    /// Sequential auto-incrementing read of the history window.
    ///
    /// The window is the only documented multi-byte region; any other start
    /// register or an over-long read is a programmer error.
    pub fn read_block(&mut self, start: Register, out: &mut [u8]) -> Result<()> {
        if start != Register::ResultHistoryBuffer0 || out.len() > HISTORY_WINDOW_LEN {
            return Err(eyre::Report::new(RangeError::InvalidRegister {
                addr: start.into(),
            }));
        }
        if out.is_empty() {
            return Ok(());
        }
        self.bus
            .read(start.into(), out)
            .map_err(|e| eyre::Report::new(map_bus_error(&*e)))
            .wrap_err("history window read")
    }

    /// Raw single-byte write used exclusively for the boot-time tuning
    /// block, which mixes undocumented vendor addresses with a few public
    /// defaults.
    pub(crate) fn write_raw_u8(&mut self, addr: u16, value: u8) -> Result<()> {
        self.bus
            .write(addr, &[value])
            .map_err(|e| eyre::Report::new(map_bus_error(&*e)))
            .wrap_err("tuning write")
    }

    fn ensure_width(&self, reg: Register, want: RegWidth) -> Result<()> {
        if reg.width() == want {
            Ok(())
        } else {
            Err(eyre::Report::new(RangeError::InvalidRegister {
                addr: reg.into(),
            }))
        }
    }
}
