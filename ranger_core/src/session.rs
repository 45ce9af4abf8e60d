//! Range session facade: one uniform `next_range` contract across the three
//! acquisition modes.
//!
//! The underlying registers happily accept inconsistent simultaneous
//! configuration (continuous enable plus a pending single-shot trigger, say).
//! This facade is where that is made unrepresentable: a mode is selected at
//! activation, and every transition tears the previous mode down first.

use crate::calibration::{self, CalibrationCfg, CalibrationOutcome};
use crate::device::{self, AlsGain, Device, DeviceState};
use crate::error::{BuildError, RangeError, Result};
use crate::history::History;
use crate::sample::{AmbientSample, RangeSample};
use ranger_traits::{Clock, MonotonicClock, RegisterBus};
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// How samples are acquired. Selected once per session activation;
/// transitions go through [`RangeSession::switch_mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionMode {
    /// One triggered measurement per `next_range` call.
    SingleShot,
    /// Device re-arms itself at a fixed period without re-triggering.
    Continuous { period_ms: u16 },
    /// Device buffers recent samples on its own; the host drains them.
    History { capacity: u8 },
}

/// Timeouts and watchdogs.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Poll budget per measurement (ms).
    pub sensor_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { sensor_ms: 150 }
    }
}

/// Integration time of an ambient light measurement (ms), added to the poll
/// budget when waiting for one.
const ALS_INTEGRATION_MS: u64 = 100;

/// Owns the [`Device`] — exactly one session per physical sensor — and
/// composes the state machine and the history manager into the mode the
/// caller picked.
pub struct RangeSession<B: RegisterBus> {
    device: Device<B>,
    mode: AcquisitionMode,
    history: History,
    queued: VecDeque<RangeSample>,
    clock: Arc<dyn Clock + Send + Sync>,
    timeouts: Timeouts,
    calibration: CalibrationCfg,
    stopped: bool,
}

impl<B: RegisterBus> core::fmt::Debug for RangeSession<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RangeSession")
            .field("mode", &self.mode)
            .field("device_state", &self.device.state())
            .field("stopped", &self.stopped)
            .finish()
    }
}

impl<B: RegisterBus> RangeSession<B> {
    /// Start building a session.
    pub fn builder() -> SessionBuilder<B, Missing, Missing> {
        SessionBuilder {
            bus: None,
            mode: None,
            timeouts: None,
            calibration: None,
            clock: None,
            initial_offset_mm: None,
            _b: PhantomData,
            _m: PhantomData,
        }
    }

    /// Next range sample, uniform across modes.
    ///
    /// SingleShot triggers and waits; Continuous and History return the next
    /// available sample. Blocking is clock-paced 1 ms polling bounded by the
    /// configured budget; `Timeout` when the budget elapses.
    pub fn next_range(&mut self) -> Result<RangeSample> {
        if self.stopped {
            return Err(eyre::Report::new(RangeError::InvalidMode(
                "session stopped; switch_mode to resume",
            )));
        }
        match self.mode {
            AcquisitionMode::SingleShot => {
                self.device.start_single_shot()?;
                device::wait_ready(&mut self.device, &*self.clock, self.timeouts.sensor_ms)?;
                self.device.read_result()
            }
            AcquisitionMode::Continuous { period_ms } => {
                // The device may be anywhere in its cycle; cover one full
                // period plus the measurement budget.
                let budget = u64::from(period_ms) + self.timeouts.sensor_ms;
                device::wait_ready(&mut self.device, &*self.clock, budget)?;
                self.device.read_result()
            }
            AcquisitionMode::History { .. } => {
                if let Some(sample) = self.queued.pop_front() {
                    return Ok(sample);
                }
                let start = self.clock.now();
                loop {
                    let batch = self.history.drain(&mut self.device)?;
                    self.queued.extend(batch);
                    if let Some(sample) = self.queued.pop_front() {
                        return Ok(sample);
                    }
                    if self.clock.ms_since(start) >= self.timeouts.sensor_ms {
                        return Err(eyre::Report::new(RangeError::Timeout));
                    }
                    self.clock.sleep(device::POLL_INTERVAL);
                }
            }
        }
    }

    /// Non-blocking drain of everything currently buffered (History mode).
    pub fn drain_history(&mut self) -> Result<Vec<RangeSample>> {
        if !matches!(self.mode, AcquisitionMode::History { .. }) || self.stopped {
            return Err(eyre::Report::new(RangeError::InvalidMode(
                "history drain requires an active history session",
            )));
        }
        let mut out: Vec<RangeSample> = self.queued.drain(..).collect();
        out.extend(self.history.drain(&mut self.device)?);
        Ok(out)
    }

    /// Switch acquisition mode. The previous mode is always torn down first;
    /// no call sequence leaves two modes configured at once.
    pub fn switch_mode(&mut self, mode: AcquisitionMode) -> Result<()> {
        self.teardown()?;
        debug!(?mode, "switching acquisition mode");
        self.activate(mode)
    }

    /// Stop ranging and return the device to idle. Idempotent; the session
    /// stays usable through [`switch_mode`](Self::switch_mode).
    pub fn stop(&mut self) -> Result<()> {
        self.teardown()?;
        self.stopped = true;
        Ok(())
    }

    /// Run the offset calibration. Precondition: not actively ranging —
    /// stop continuous or history acquisition first.
    pub fn calibrate(&mut self, reference_mm: u16) -> Result<CalibrationOutcome> {
        if self.device.state() != DeviceState::Idle || self.history.is_enabled() {
            return Err(eyre::Report::new(RangeError::DeviceBusy(
                "stop ranging before calibrating",
            )));
        }
        calibration::run(
            &mut self.device,
            &*self.clock,
            reference_mm,
            &self.calibration,
        )
    }

    /// One ambient light measurement. Precondition: not actively ranging.
    pub fn ambient(&mut self, gain: AlsGain) -> Result<AmbientSample> {
        self.device.start_ambient(gain)?;
        let budget = self.timeouts.sensor_ms + ALS_INTEGRATION_MS;
        let start = self.clock.now();
        loop {
            if self.device.poll_ambient_ready()? {
                return self.device.read_ambient();
            }
            if self.clock.ms_since(start) >= budget {
                return Err(eyre::Report::new(RangeError::Timeout));
            }
            self.clock.sleep(device::POLL_INTERVAL);
        }
    }

    pub fn mode(&self) -> AcquisitionMode {
        self.mode
    }

    pub fn device_state(&self) -> DeviceState {
        self.device.state()
    }

    /// Currently programmed part-to-part offset.
    pub fn offset_mm(&mut self) -> Result<i8> {
        self.device.read_offset_mm()
    }

    fn teardown(&mut self) -> Result<()> {
        self.device.stop()?;
        self.history.disable(&mut self.device)?;
        self.queued.clear();
        Ok(())
    }

    fn activate(&mut self, mode: AcquisitionMode) -> Result<()> {
        match mode {
            AcquisitionMode::SingleShot => {}
            AcquisitionMode::Continuous { period_ms } => self.device.start_continuous(period_ms)?,
            AcquisitionMode::History { capacity } => {
                self.history.enable(&mut self.device, capacity)?;
            }
        }
        self.mode = mode;
        self.stopped = false;
        Ok(())
    }
}

// Type-state markers for the builder
pub struct Missing;
pub struct Set;

/// Builder for [`RangeSession`]. Bus and mode are mandatory and tracked in
/// the type; everything else has defaults and is validated on `build()`.
pub struct SessionBuilder<B, BusState, ModeState> {
    bus: Option<B>,
    mode: Option<AcquisitionMode>,
    timeouts: Option<Timeouts>,
    calibration: Option<CalibrationCfg>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    initial_offset_mm: Option<i8>,
    _b: PhantomData<BusState>,
    _m: PhantomData<ModeState>,
}

/// Chainable setters that do not affect type-state
impl<B, BS, MS> SessionBuilder<B, BS, MS> {
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    pub fn with_calibration(mut self, calibration: CalibrationCfg) -> Self {
        self.calibration = Some(calibration);
        self
    }

    /// Provide a custom clock; defaults to [`MonotonicClock`].
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Re-apply a persisted part-to-part offset at session start, before the
    /// selected mode activates.
    pub fn with_initial_offset(mut self, offset_mm: i8) -> Self {
        self.initial_offset_mm = Some(offset_mm);
        self
    }
}

impl<B: RegisterBus, BS, MS> SessionBuilder<B, BS, MS> {
    /// Fallible build available in any type-state; returns a detailed
    /// `BuildError` for missing pieces.
    pub fn try_build(self) -> Result<RangeSession<B>> {
        let SessionBuilder {
            bus,
            mode,
            timeouts,
            calibration,
            clock,
            initial_offset_mm,
            _b: _,
            _m: _,
        } = self;

        let bus = bus.ok_or_else(|| eyre::Report::new(BuildError::MissingBus))?;
        let mode = mode.ok_or_else(|| eyre::Report::new(BuildError::MissingMode))?;

        let timeouts = timeouts.unwrap_or_default();
        let calibration = calibration.unwrap_or_default();
        let clock: Arc<dyn Clock + Send + Sync> = match clock {
            Some(b) => Arc::from(b),
            None => Arc::new(MonotonicClock::new()),
        };

        if timeouts.sensor_ms == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "sensor_ms must be >= 1",
            )));
        }
        if calibration.samples == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "calibration samples must be >= 1",
            )));
        }
        if let AcquisitionMode::Continuous { period_ms } = mode
            && !(20..=2550).contains(&period_ms)
        {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "continuous period must be between 20 and 2550 ms",
            )));
        }

        let mut device = Device::new(bus)?;
        if let Some(offset_mm) = initial_offset_mm {
            device.write_offset_mm(offset_mm)?;
        }

        let mut session = RangeSession {
            device,
            mode: AcquisitionMode::SingleShot,
            history: History::new(),
            queued: VecDeque::new(),
            clock,
            timeouts,
            calibration,
            stopped: false,
        };
        session.activate(mode)?;
        Ok(session)
    }
}

// Setters that advance type-state when providing mandatory components
impl<B: RegisterBus, MS> SessionBuilder<B, Missing, MS> {
    pub fn with_bus(self, bus: B) -> SessionBuilder<B, Set, MS> {
        let SessionBuilder {
            bus: _,
            mode,
            timeouts,
            calibration,
            clock,
            initial_offset_mm,
            _b: _,
            _m: _,
        } = self;
        SessionBuilder {
            bus: Some(bus),
            mode,
            timeouts,
            calibration,
            clock,
            initial_offset_mm,
            _b: PhantomData,
            _m: PhantomData,
        }
    }
}

impl<B: RegisterBus, BS> SessionBuilder<B, BS, Missing> {
    pub fn with_mode(self, mode: AcquisitionMode) -> SessionBuilder<B, BS, Set> {
        let SessionBuilder {
            bus,
            mode: _,
            timeouts,
            calibration,
            clock,
            initial_offset_mm,
            _b: _,
            _m: _,
        } = self;
        SessionBuilder {
            bus,
            mode: Some(mode),
            timeouts,
            calibration,
            clock,
            initial_offset_mm,
            _b: PhantomData,
            _m: PhantomData,
        }
    }
}

impl<B: RegisterBus> SessionBuilder<B, Set, Set> {
    /// Validate and build the session. Only available once bus and mode are
    /// both set.
    pub fn build(self) -> Result<RangeSession<B>> {
        self.try_build()
    }
}
