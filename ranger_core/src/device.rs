//! Device state machine: trigger, poll, read, clear.
//!
//! The device signals readiness through a status register rather than a
//! blocking call, so the driver polls. Exposing the trigger/poll/read cycle
//! as an explicit state machine keeps the wait strategy (busy-poll, timed
//! sleep, async suspension) a caller decision; nothing in here sleeps.

use crate::error::{RangeError, Result};
use crate::regmap::{MODEL_ID, Register, TUNING_BLOCK};
use crate::registers::Registers;
use crate::sample::{AmbientSample, RangeSample, RangeStatus};
use ranger_traits::{Clock, RegisterBus};
use std::time::Duration;
use tracing::{debug, info, trace};

// Range start codes. In continuous mode 0x01 acts as the stop toggle.
const RANGE_SINGLE_SHOT: u8 = 0x01;
const RANGE_CONTINUOUS: u8 = 0x03;
const RANGE_CONTINUOUS_BIT: u8 = 0x02;

// Interrupt status register layout.
const INT_RANGE_READY: u8 = 0x04;
const INT_ALS_READY_STATE: u8 = 0x04; // bits 5:3
const INT_CLEAR_ALL: u8 = 0x07;

// Range status register layout.
const STATUS_DEVICE_READY: u8 = 0x01;

/// Pacing used by the blocking helpers layered on top of `poll_ready`.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Driver-side view of the measurement cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Idle,
    Triggered,
    MeasurementInProgress,
    ResultReady,
    /// Self-looping: the device re-arms itself after every interrupt clear
    /// until explicitly stopped.
    Continuous,
}

/// Analogue gain for ambient light measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlsGain {
    X1,
    X1_25,
    X1_67,
    X2_5,
    X5,
    X10,
    X20,
    X40,
}

impl AlsGain {
    pub fn code(self) -> u8 {
        match self {
            AlsGain::X1 => 0x06,
            AlsGain::X1_25 => 0x05,
            AlsGain::X1_67 => 0x04,
            AlsGain::X2_5 => 0x03,
            AlsGain::X5 => 0x02,
            AlsGain::X10 => 0x01,
            AlsGain::X20 => 0x00,
            AlsGain::X40 => 0x07,
        }
    }

    pub fn factor(self) -> f32 {
        match self {
            AlsGain::X1 => 1.0,
            AlsGain::X1_25 => 1.25,
            AlsGain::X1_67 => 1.67,
            AlsGain::X2_5 => 2.5,
            AlsGain::X5 => 5.0,
            AlsGain::X10 => 10.0,
            AlsGain::X20 => 20.0,
            AlsGain::X40 => 40.0,
        }
    }
}

/// Exclusive owner of one physical sensor: the bus handle plus the driver's
/// view of the measurement cycle. Exactly one `Device` exists per sensor
/// address; sharing one across threads requires external serialization (see
/// [`crate::sampler`]).
#[derive(Debug)]
pub struct Device<B> {
    regs: Registers<B>,
    state: DeviceState,
    // In continuous mode the state stays `Continuous`; this tracks a cycle
    // whose result has been observed ready but not yet read.
    continuous_pending: bool,
    ambient_in_flight: Option<AlsGain>,
    seq: u64,
}

impl<B: RegisterBus> Device<B> {
    /// Probe and initialize the sensor.
    ///
    /// Verifies the model ID, loads the vendor tuning block on a part fresh
    /// out of reset, and recovers a part left in continuous mode by a
    /// crashed host.
    pub fn new(bus: B) -> Result<Self> {
        let mut regs = Registers::new(bus);
        let model_id = regs.read_u8(Register::ModelId)?;
        if model_id != MODEL_ID {
            return Err(eyre::Report::new(RangeError::UnexpectedDevice { model_id }));
        }

        let mut dev = Self {
            regs,
            state: DeviceState::Idle,
            continuous_pending: false,
            ambient_in_flight: None,
            seq: 0,
        };

        if dev.regs.read_u8(Register::FreshOutOfReset)? == 0x01 {
            debug!("fresh out of reset, loading tuning block");
            for &(addr, value) in TUNING_BLOCK {
                dev.regs.write_raw_u8(addr, value)?;
            }
            dev.regs.write_u8(Register::FreshOutOfReset, 0x00)?;
        }

        if dev.continuous_active()? {
            info!("sensor left in continuous mode, stopping it");
            dev.regs
                .write_u8(Register::RangeStart, RANGE_SINGLE_SHOT)?;
        }
        dev.regs.write_u8(Register::InterruptClear, INT_CLEAR_ALL)?;
        Ok(dev)
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Trigger one measurement. Precondition: `Idle`.
    pub fn start_single_shot(&mut self) -> Result<()> {
        self.ensure_idle("a ranging acquisition is already in progress")?;
        self.regs
            .write_u8(Register::RangeStart, RANGE_SINGLE_SHOT)?;
        self.state = DeviceState::Triggered;
        trace!("single-shot triggered");
        Ok(())
    }

    /// Enter continuous mode with the given inter-measurement period.
    ///
    /// The period is floored to the nearest 10 ms; the device supports
    /// 20..=2550 ms.
    pub fn start_continuous(&mut self, period_ms: u16) -> Result<()> {
        self.ensure_idle("a ranging acquisition is already in progress")?;
        if !(20..=2550).contains(&period_ms) {
            return Err(eyre::Report::new(RangeError::InvalidMode(
                "continuous period must be between 20 and 2550 ms",
            )));
        }
        let period_reg = (period_ms / 10 - 1) as u8;
        self.regs
            .write_u8(Register::IntermeasurementPeriod, period_reg)?;
        self.regs.write_u8(Register::RangeStart, RANGE_CONTINUOUS)?;
        self.state = DeviceState::Continuous;
        self.continuous_pending = false;
        debug!(period_ms, "continuous ranging started");
        Ok(())
    }

    /// Non-blocking readiness check; advances the state as the device's
    /// status bits indicate. Call repeatedly until it returns `true`.
    pub fn poll_ready(&mut self) -> Result<bool> {
        match self.state {
            DeviceState::ResultReady => return Ok(true),
            DeviceState::Continuous if self.continuous_pending => return Ok(true),
            DeviceState::Idle => {
                return Err(eyre::Report::new(RangeError::InvalidMode(
                    "no acquisition in progress",
                )));
            }
            _ => {}
        }

        let int_status = self.regs.read_u8(Register::ResultInterruptStatus)?;
        if int_status & INT_RANGE_READY != 0 {
            if self.state == DeviceState::Continuous {
                self.continuous_pending = true;
            } else {
                self.state = DeviceState::ResultReady;
            }
            return Ok(true);
        }

        if self.state == DeviceState::Triggered {
            let range_status = self.regs.read_u8(Register::ResultRangeStatus)?;
            if range_status & STATUS_DEVICE_READY == 0 {
                self.state = DeviceState::MeasurementInProgress;
            }
        }
        Ok(false)
    }

    /// Read the completed measurement and clear the interrupt.
    /// Precondition: `poll_ready` returned `true`.
    pub fn read_result(&mut self) -> Result<RangeSample> {
        let in_continuous = match self.state {
            DeviceState::ResultReady => false,
            DeviceState::Continuous if self.continuous_pending => true,
            _ => return Err(eyre::Report::new(RangeError::ResultNotReady)),
        };

        let distance = self.regs.read_u8(Register::ResultRangeVal)?;
        let code = self.regs.read_u8(Register::ResultRangeStatus)? >> 4;
        let status = RangeStatus::from_nibble(code);
        // Clearing the interrupt is what allows the next result, in
        // continuous mode as much as in single-shot.
        self.regs.write_u8(Register::InterruptClear, INT_CLEAR_ALL)?;

        if in_continuous {
            self.continuous_pending = false;
        } else {
            self.state = DeviceState::Idle;
        }

        let seq = self.next_seq();
        trace!(distance_mm = distance, status = status.name(), seq, "range sample");
        Ok(RangeSample {
            distance_mm: u16::from(distance),
            status,
            seq,
            overrun: false,
        })
    }

    /// Stop ranging. Valid in any state and idempotent; always returns the
    /// driver to `Idle`.
    pub fn stop(&mut self) -> Result<()> {
        if self.continuous_active()? {
            // The start register acts as a stop toggle while continuous.
            self.regs
                .write_u8(Register::RangeStart, RANGE_SINGLE_SHOT)?;
        }
        self.regs.write_u8(Register::InterruptClear, INT_CLEAR_ALL)?;
        self.state = DeviceState::Idle;
        self.continuous_pending = false;
        Ok(())
    }

    /// Current part-to-part offset, signed millimeters.
    pub fn read_offset_mm(&mut self) -> Result<i8> {
        Ok(self.regs.read_u8(Register::RangeOffset)? as i8)
    }

    /// Program the part-to-part offset. The device applies it to every
    /// subsequent measurement; the register is volatile across power cycles.
    pub fn write_offset_mm(&mut self, offset: i8) -> Result<()> {
        self.regs.write_u8(Register::RangeOffset, offset as u8)
    }

    /// Start an ambient light measurement with the given analogue gain and a
    /// 100 ms integration period. Precondition: `Idle`.
    pub fn start_ambient(&mut self, gain: AlsGain) -> Result<()> {
        self.ensure_idle("ranging in progress")?;
        let cfg = self.regs.read_u8(Register::InterruptConfig)?;
        self.regs
            .write_u8(Register::InterruptConfig, (cfg & !0x38) | (0x4 << 3))?;
        self.regs.write_u8(Register::AlsIntegrationPeriodHi, 0)?;
        self.regs.write_u8(Register::AlsIntegrationPeriodLo, 100)?;
        self.regs
            .write_u8(Register::AlsAnalogueGain, 0x40 | gain.code())?;
        self.regs.write_u8(Register::AlsStart, 0x01)?;
        self.ambient_in_flight = Some(gain);
        Ok(())
    }

    /// Non-blocking readiness check for an ambient measurement.
    pub fn poll_ambient_ready(&mut self) -> Result<bool> {
        if self.ambient_in_flight.is_none() {
            return Err(eyre::Report::new(RangeError::InvalidMode(
                "no ambient measurement in progress",
            )));
        }
        let int_status = self.regs.read_u8(Register::ResultInterruptStatus)?;
        Ok((int_status >> 3) & 0x07 == INT_ALS_READY_STATE)
    }

    /// Read the completed ambient measurement and clear the interrupt.
    pub fn read_ambient(&mut self) -> Result<AmbientSample> {
        let Some(gain) = self.ambient_in_flight else {
            return Err(eyre::Report::new(RangeError::ResultNotReady));
        };
        let raw = self.regs.read_u16(Register::ResultAlsVal)?;
        self.regs.write_u8(Register::InterruptClear, INT_CLEAR_ALL)?;
        self.ambient_in_flight = None;
        // 0.32 lux per count at unity gain and 100 ms integration.
        let lux = f32::from(raw) * 0.32 / gain.factor();
        Ok(AmbientSample { raw, lux })
    }

    pub(crate) fn next_seq(&mut self) -> u64 {
        let seq = self.seq;
        self.seq += 1;
        seq
    }

    pub(crate) fn regs_mut(&mut self) -> &mut Registers<B> {
        &mut self.regs
    }

    fn ensure_idle(&self, why: &'static str) -> Result<()> {
        if self.state != DeviceState::Idle {
            return Err(eyre::Report::new(RangeError::DeviceBusy(why)));
        }
        if self.ambient_in_flight.is_some() {
            return Err(eyre::Report::new(RangeError::DeviceBusy(
                "ambient measurement in progress",
            )));
        }
        Ok(())
    }

    fn continuous_active(&mut self) -> Result<bool> {
        let start = self.regs.read_u8(Register::RangeStart)?;
        Ok(start & RANGE_CONTINUOUS_BIT != 0)
    }
}

/// Poll until a range result is ready, pacing with the clock. Shared by the
/// session facade and the calibration engine.
pub(crate) fn wait_ready<B: RegisterBus>(
    device: &mut Device<B>,
    clock: &dyn Clock,
    budget_ms: u64,
) -> Result<()> {
    let start = clock.now();
    loop {
        if device.poll_ready()? {
            return Ok(());
        }
        if clock.ms_since(start) >= budget_ms {
            return Err(eyre::Report::new(RangeError::Timeout));
        }
        clock.sleep(POLL_INTERVAL);
    }
}
