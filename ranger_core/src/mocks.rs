//! Test and helper mocks for ranger_core.
//!
//! [`ScriptedSensor`] is a faithful register-file stub of the ranging
//! module: plain registers behave as memory (writes read back), while the
//! measurement, history, and ambient machinery follow the documented
//! behavior with a poll-counted latency. Tests keep a clone to script
//! readings and inspect registers after the driver took ownership.

use crate::regmap::Register;
use ranger_traits::RegisterBus;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

const REG_MODEL_ID: u16 = Register::ModelId as u16;
const REG_HISTORY_CTRL: u16 = Register::HistoryCtrl as u16;
const REG_HISTORY_FILL: u16 = Register::HistoryFill as u16;
const REG_INTERRUPT_CLEAR: u16 = Register::InterruptClear as u16;
const REG_RANGE_START: u16 = Register::RangeStart as u16;
const REG_ALS_START: u16 = Register::AlsStart as u16;
const REG_RESULT_RANGE_STATUS: u16 = Register::ResultRangeStatus as u16;
const REG_RESULT_INTERRUPT_STATUS: u16 = Register::ResultInterruptStatus as u16;
const REG_RESULT_ALS_VAL: u16 = Register::ResultAlsVal as u16;
const REG_HISTORY_WINDOW_START: u16 = Register::ResultHistoryBuffer0 as u16;
const REG_HISTORY_WINDOW_END: u16 = REG_HISTORY_WINDOW_START + 15;
const REG_RESULT_RANGE_VAL: u16 = Register::ResultRangeVal as u16;

const INT_RANGE_READY: u8 = 0x04;
const INT_ALS_READY: u8 = 0x20;

#[derive(Debug)]
struct SensorState {
    regs: BTreeMap<u16, u8>,
    write_log: Vec<(u16, u8)>,
    model_id: u8,
    // Ranging behavior
    latency_polls: u8,
    measuring: Option<u8>,
    continuous: bool,
    int_status: u8,
    current: (u8, u8), // (distance mm, status nibble)
    default_reading: (u8, u8),
    single_queue: VecDeque<(u8, u8)>,
    // History ring
    history_enabled: bool,
    history_capacity: u8,
    ring: VecDeque<u8>,
    fill: u8,
    overrun: bool,
    // Ambient
    als_measuring: Option<u8>,
    als_value: u16,
}

const REG_RESULT_ALS_LO: u16 = REG_RESULT_ALS_VAL + 1;

impl SensorState {
    fn new() -> Self {
        let mut regs = BTreeMap::new();
        // A part fresh out of reset, so Device::new exercises the tuning load.
        regs.insert(Register::FreshOutOfReset as u16, 0x01);
        Self {
            regs,
            write_log: Vec::new(),
            model_id: crate::regmap::MODEL_ID,
            latency_polls: 2,
            measuring: None,
            continuous: false,
            int_status: 0,
            current: (0, 0),
            default_reading: (20, 0),
            single_queue: VecDeque::new(),
            history_enabled: false,
            history_capacity: 0,
            ring: VecDeque::new(),
            fill: 0,
            overrun: false,
            als_measuring: None,
            als_value: 320,
        }
    }

    fn begin_measurement(&mut self) {
        self.measuring = Some(self.latency_polls);
    }

    fn complete_measurement(&mut self) {
        self.measuring = None;
        self.current = self
            .single_queue
            .pop_front()
            .unwrap_or(self.default_reading);
        self.int_status |= INT_RANGE_READY;
        if self.history_enabled {
            self.record_history(self.current.0);
        }
    }

    fn record_history(&mut self, distance: u8) {
        self.ring.push_back(distance);
        if self.ring.len() > usize::from(self.history_capacity) {
            self.ring.pop_front();
        }
        if self.fill < self.history_capacity {
            self.fill += 1;
        } else {
            self.overrun = true;
        }
    }

    fn write_byte(&mut self, addr: u16, value: u8) {
        self.write_log.push((addr, value));
        match addr {
            REG_RANGE_START => {
                if value == 0x03 {
                    self.continuous = true;
                    self.regs.insert(addr, value);
                    self.begin_measurement();
                } else if value == 0x01 {
                    if self.continuous {
                        self.continuous = false;
                        self.measuring = None;
                        self.regs.insert(addr, 0x00);
                    } else {
                        self.regs.insert(addr, value);
                        self.begin_measurement();
                    }
                } else {
                    self.regs.insert(addr, value);
                }
            }
            REG_INTERRUPT_CLEAR => {
                self.int_status = 0;
                if self.continuous && self.measuring.is_none() {
                    self.begin_measurement();
                }
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
                    self.als_measuring = Some(self.latency_polls);
                }
            }
            _ => {
                self.regs.insert(addr, value);
            }
        }
    }

    fn read_byte(&mut self, addr: u16) -> u8 {
        match addr {
            REG_MODEL_ID => self.model_id,
            REG_RESULT_INTERRUPT_STATUS => {
                if let Some(n) = self.measuring {
                    if n == 0 {
                        self.complete_measurement();
                    } else {
                        self.measuring = Some(n - 1);
                    }
                }
                if let Some(n) = self.als_measuring {
                    if n == 0 {
                        self.als_measuring = None;
                        self.int_status |= INT_ALS_READY;
                        let raw = self.als_value;
                        self.regs.insert(REG_RESULT_ALS_VAL, (raw >> 8) as u8);
                        self.regs.insert(REG_RESULT_ALS_LO, (raw & 0xFF) as u8);
                    } else {
                        self.als_measuring = Some(n - 1);
                    }
                }
                self.int_status
            }
            REG_RESULT_RANGE_STATUS => {
                let ready = if self.measuring.is_none() { 0x01 } else { 0x00 };
                (self.current.1 << 4) | ready
            }
            REG_RESULT_RANGE_VAL => self.current.0,
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

/// Scripted in-memory sensor. Clone handles share state, so tests can keep
/// one to inject readings and inspect registers while the driver owns the
/// other.
#[derive(Clone, Debug)]
pub struct ScriptedSensor {
    state: Arc<Mutex<SensorState>>,
}

impl Default for ScriptedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSensor {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SensorState::new())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SensorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue one scripted reading: distance in mm plus the status nibble.
    pub fn push_single(&self, distance_mm: u8, status: u8) {
        self.lock().single_queue.push_back((distance_mm, status));
    }

    /// Reading used whenever the script queue is empty.
    pub fn set_default_reading(&self, distance_mm: u8, status: u8) {
        self.lock().default_reading = (distance_mm, status);
    }

    /// Inject already-buffered history samples, oldest first, honoring the
    /// configured capacity and overrun accounting.
    pub fn push_history(&self, distances: &[u8]) {
        let mut st = self.lock();
        for &d in distances {
            st.record_history(d);
        }
    }

    pub fn set_model_id(&self, model_id: u8) {
        self.lock().model_id = model_id;
    }

    /// Interrupt-status polls a measurement takes to complete.
    pub fn set_latency_polls(&self, polls: u8) {
        self.lock().latency_polls = polls;
    }

    pub fn set_als_value(&self, raw: u16) {
        self.lock().als_value = raw;
    }

    /// Raw register-file value (plain registers only).
    pub fn register(&self, addr: u16) -> u8 {
        self.lock().regs.get(&addr).copied().unwrap_or(0)
    }

    /// Every single-byte write issued so far, in order.
    pub fn write_log(&self) -> Vec<(u16, u8)> {
        self.lock().write_log.clone()
    }

    /// Values written to one register, in order.
    pub fn writes_to(&self, addr: u16) -> Vec<u8> {
        self.lock()
            .write_log
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, v)| *v)
            .collect()
    }
}

impl RegisterBus for ScriptedSensor {
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

/// A bus that always fails; useful for exercising transport error mapping.
pub struct NoopBus;

impl RegisterBus for NoopBus {
    fn write(
        &mut self,
        _reg: u16,
        _bytes: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("noop bus")))
    }

    fn read(
        &mut self,
        _reg: u16,
        _buf: &mut [u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("noop bus")))
    }
}
