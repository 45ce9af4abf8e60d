//! History buffer manager: configure and drain the on-device ring of recent
//! range samples.
//!
//! The device keeps ranging while the host is away and stores the most
//! recent results in a small circular window. Draining never waits for new
//! data; it hands back whatever the device reports as unread and stops.

use crate::device::{Device, DeviceState};
use crate::error::{RangeError, Result};
use crate::regmap::{HISTORY_WINDOW_LEN, Register};
use crate::sample::{RangeSample, RangeStatus};
use ranger_traits::RegisterBus;
use tracing::{debug, warn};

const HISTORY_ENABLE: u8 = 0x01;
const FILL_COUNT_MASK: u8 = 0x1F;
const FILL_OVERRUN: u8 = 0x80;

/// Cursor-tracking manager for the on-device history ring.
///
/// Invariant: the cursor never reaches the configured capacity; it wraps
/// modulo capacity and is reset whenever history is (re)enabled.
#[derive(Debug, Default)]
pub struct History {
    capacity: u8,
    cursor: u8,
    enabled: bool,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Next unread slot, modulo the configured capacity.
    pub fn cursor(&self) -> u8 {
        self.cursor
    }

    /// Configure and enable buffering. Precondition: device idle.
    pub fn enable<B: RegisterBus>(&mut self, device: &mut Device<B>, capacity: u8) -> Result<()> {
        if device.state() != DeviceState::Idle {
            return Err(eyre::Report::new(RangeError::DeviceBusy(
                "device must be idle to enable history buffering",
            )));
        }
        if capacity == 0 {
            return Err(eyre::Report::new(RangeError::InvalidMode(
                "history capacity must be at least 1",
            )));
        }
        if usize::from(capacity) > HISTORY_WINDOW_LEN {
            return Err(eyre::Report::new(RangeError::CapacityExceeded {
                requested: capacity,
                max: HISTORY_WINDOW_LEN as u8,
            }));
        }
        let ctrl = HISTORY_ENABLE | ((capacity - 1) << 4);
        device.regs_mut().write_u8(Register::HistoryCtrl, ctrl)?;
        self.capacity = capacity;
        self.cursor = 0;
        self.enabled = true;
        debug!(capacity, "history buffering enabled");
        Ok(())
    }

    /// Read every sample the device reports as unread, in insertion order.
    ///
    /// Returns an empty batch when nothing new arrived; never blocks. An
    /// overrun (samples overwritten before this drain) flags every sample of
    /// the batch — the lost data cannot be recovered, only reported.
    pub fn drain<B: RegisterBus>(&mut self, device: &mut Device<B>) -> Result<Vec<RangeSample>> {
        if !self.enabled {
            return Err(eyre::Report::new(RangeError::InvalidMode(
                "history buffering is not enabled",
            )));
        }

        let fill = device.regs_mut().read_u8(Register::HistoryFill)?;
        let overrun = fill & FILL_OVERRUN != 0;
        let count = usize::from((fill & FILL_COUNT_MASK).min(self.capacity));
        if count == 0 {
            return Ok(Vec::new());
        }

        // The window presents the newest sample first; reverse to yield
        // insertion order.
        let mut window = [0u8; HISTORY_WINDOW_LEN];
        device
            .regs_mut()
            .read_block(Register::ResultHistoryBuffer0, &mut window[..count])?;

        if overrun {
            warn!(count, "history overrun: older samples were overwritten");
        }

        let mut batch = Vec::with_capacity(count);
        for &distance in window[..count].iter().rev() {
            batch.push(RangeSample {
                distance_mm: u16::from(distance),
                status: RangeStatus::Valid,
                seq: device.next_seq(),
                overrun,
            });
        }

        self.cursor = ((u16::from(self.cursor) + count as u16) % u16::from(self.capacity)) as u8;
        debug!(count, cursor = self.cursor, "history drained");
        Ok(batch)
    }

    /// Turn buffering off and invalidate the cursor. Valid in any state.
    pub fn disable<B: RegisterBus>(&mut self, device: &mut Device<B>) -> Result<()> {
        if self.enabled {
            device.regs_mut().write_u8(Register::HistoryCtrl, 0x00)?;
        }
        self.enabled = false;
        self.capacity = 0;
        self.cursor = 0;
        Ok(())
    }
}
