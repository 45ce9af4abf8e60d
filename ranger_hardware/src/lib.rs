//! Concrete `RegisterBus` implementations.
//!
//! [`SimulatedSensor`] is a behavioral model of the ranging module that is
//! always available; the CLI's sim mode and integration tests run against
//! it. The real Linux I2C bus lives behind the `hardware` feature.

pub mod error;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod i2c;

pub use error::HwError;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use i2c::LinuxI2cBus;

use ranger_traits::RegisterBus;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const REG_MODEL_ID: u16 = 0x0000;
const REG_HISTORY_CTRL: u16 = 0x0012;
const REG_HISTORY_FILL: u16 = 0x0013;
const REG_INTERRUPT_CLEAR: u16 = 0x0015;
const REG_RANGE_START: u16 = 0x0018;
const REG_PERIOD: u16 = 0x001B;
const REG_RANGE_OFFSET: u16 = 0x0024;
const REG_ALS_START: u16 = 0x0038;
const REG_RESULT_RANGE_STATUS: u16 = 0x004D;
const REG_RESULT_INTERRUPT_STATUS: u16 = 0x004F;
const REG_RESULT_ALS_HI: u16 = 0x0050;
const REG_RESULT_ALS_LO: u16 = 0x0051;
const REG_HISTORY_WINDOW_START: u16 = 0x0052;
const REG_HISTORY_WINDOW_END: u16 = REG_HISTORY_WINDOW_START + 15;
const REG_RESULT_RANGE_VAL: u16 = 0x0062;

const INT_RANGE_READY: u8 = 0x04;
const INT_ALS_READY: u8 = 0x20;

struct SimState {
    regs: BTreeMap<u16, u8>,
    target_mm: u8,
    wobble: u8,
    latency: Duration,
    continuous: bool,
    period: Duration,
    measure_done_at: Option<Instant>,
    int_status: u8,
    current_mm: u8,
    history_enabled: bool,
    history_capacity: u8,
    ring: VecDeque<u8>,
    fill: u8,
    overrun: bool,
    als_done_at: Option<Instant>,
    als_count: u16,
}

impl SimState {
    fn new() -> Self {
        let mut regs = BTreeMap::new();
        regs.insert(0x0016, 0x01); // fresh out of reset
        Self {
            regs,
            target_mm: 100,
            wobble: 0,
            latency: Duration::from_millis(5),
            continuous: false,
            period: Duration::from_millis(100),
            measure_done_at: None,
            int_status: 0,
            current_mm: 0,
            history_enabled: false,
            history_capacity: 0,
            ring: VecDeque::new(),
            fill: 0,
            overrun: false,
            als_done_at: None,
            als_count: 320,
        }
    }

    /// Advance time-driven state: measurement completion, continuous
    /// re-arm, autonomous history ranging, ambient completion.
    fn refresh(&mut self) {
        let now = Instant::now();
        // With history enabled the device ranges on its own at the
        // programmed period, filling the ring while the host is away.
        if self.history_enabled && !self.continuous && self.measure_done_at.is_none() {
            self.measure_done_at = Some(now + self.period);
        }
        if let Some(done) = self.measure_done_at
            && now >= done
        {
            self.current_mm = self.produce_reading();
            self.int_status |= INT_RANGE_READY;
            if self.history_enabled {
                self.record_history(self.current_mm);
            }
            self.measure_done_at = if self.continuous {
                Some(now + self.period)
            } else {
                None
            };
        }
        if let Some(done) = self.als_done_at
            && now >= done
        {
            self.als_done_at = None;
            self.int_status |= INT_ALS_READY;
            let count = self.als_count;
            self.regs.insert(REG_RESULT_ALS_HI, (count >> 8) as u8);
            self.regs.insert(REG_RESULT_ALS_LO, (count & 0xFF) as u8);
        }
    }

    /// Scene distance with a deterministic ±1 mm wobble, shifted by the
    /// programmed part-to-part offset the way the real part applies it.
    fn produce_reading(&mut self) -> u8 {
        self.wobble = self.wobble.wrapping_add(1);
        let noise = match self.wobble % 4 {
            1 => 1i16,
            3 => -1i16,
            _ => 0,
        };
        let offset = self.regs.get(&REG_RANGE_OFFSET).copied().unwrap_or(0) as i8;
        let value = i16::from(self.target_mm) + noise + i16::from(offset);
        value.clamp(0, 255) as u8
    }

    fn record_history(&mut self, distance: u8) {
        self.ring.push_back(distance);
        if self.ring.len() > usize::from(self.history_capacity) {
            self.ring.pop_front();
        }
        if self.fill < self.history_capacity {
            self.fill += 1;
        } else if !self.overrun {
            tracing::debug!("simulated history overrun");
            self.overrun = true;
        }
    }

    fn write_byte(&mut self, addr: u16, value: u8) {
        self.refresh();
        match addr {
            REG_RANGE_START => {
                if value == 0x03 {
                    let period_reg = self.regs.get(&REG_PERIOD).copied().unwrap_or(9);
                    self.period = Duration::from_millis((u64::from(period_reg) + 1) * 10);
                    self.continuous = true;
                    self.regs.insert(addr, value);
                    self.measure_done_at = Some(Instant::now() + self.latency);
                } else if value == 0x01 {
                    if self.continuous {
                        self.continuous = false;
                        self.measure_done_at = None;
                        self.regs.insert(addr, 0x00);
                    } else {
                        self.regs.insert(addr, value);
                        self.measure_done_at = Some(Instant::now() + self.latency);
                    }
                } else {
                    self.regs.insert(addr, value);
                }
            }
            REG_INTERRUPT_CLEAR => {
                self.int_status = 0;
            }
            REG_HISTORY_CTRL => {
                self.regs.insert(addr, value);
                if value & 0x01 != 0 {
                    self.history_enabled = true;
                    self.history_capacity = (value >> 4) + 1;
                    self.ring.clear();
                    self.fill = 0;
                    self.overrun = false;
                } else {
                    self.history_enabled = false;
                }
            }
            REG_ALS_START => {
                self.regs.insert(addr, value);
                if value & 0x01 != 0 {
                    // Short integration keeps demos snappy; the driver's
                    // budget comfortably covers it.
                    self.als_done_at = Some(Instant::now() + Duration::from_millis(10));
                }
            }
            _ => {
                self.regs.insert(addr, value);
            }
        }
    }

    fn read_byte(&mut self, addr: u16) -> u8 {
        self.refresh();
        match addr {
            REG_MODEL_ID => 0xB4,
            REG_RESULT_INTERRUPT_STATUS => self.int_status,
            REG_RESULT_RANGE_STATUS => {
                let ready = if self.measure_done_at.is_none() {
                    0x01
                } else {
                    0x00
                };
                // The simulator always converges: status nibble 0.
                ready
            }
            REG_RESULT_RANGE_VAL => self.current_mm,
            REG_HISTORY_FILL => {
                let value = self.fill | if self.overrun { 0x80 } else { 0x00 };
                self.fill = 0;
                self.overrun = false;
                value
            }
            REG_HISTORY_WINDOW_START..=REG_HISTORY_WINDOW_END => {
                let age = usize::from(addr - REG_HISTORY_WINDOW_START);
                if age < self.ring.len() {
                    self.ring[self.ring.len() - 1 - age]
                } else {
                    0
                }
            }
            _ => self.regs.get(&addr).copied().unwrap_or(0),
        }
    }
}

/// Simulated ranging module.
///
/// Clone handles share state: keep one to steer the scene while the driver
/// owns the other.
#[derive(Clone)]
pub struct SimulatedSensor {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Distance of the simulated scene, in millimeters.
    pub fn set_target_mm(&self, target_mm: u8) {
        self.lock().target_mm = target_mm;
    }

    /// Duration of a single measurement.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Raw ambient light count the next measurement reports.
    pub fn set_als_count(&self, count: u16) {
        self.lock().als_count = count;
    }
}

impl RegisterBus for SimulatedSensor {
    fn write(
        &mut self,
        reg: u16,
        bytes: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut st = self.lock();
        for (i, &b) in bytes.iter().enumerate() {
            st.write_byte(reg + i as u16, b);
        }
        Ok(())
    }

    fn read(
        &mut self,
        reg: u16,
        buf: &mut [u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut st = self.lock();
        for (i, slot) in buf.iter_mut().enumerate() {
            *slot = st.read_byte(reg + i as u16);
        }
        Ok(())
    }
}
