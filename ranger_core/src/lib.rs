#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core ranging engine (transport-agnostic).
//!
//! This crate drives a time-of-flight distance sensor through the
//! `ranger_traits::RegisterBus` seam. All register protocol sequencing lives
//! here; the actual bus (Linux I2C, simulator) lives in `ranger_hardware`.
//!
//! ## Architecture
//!
//! - **Register map**: typed addresses and widths (`regmap`, `registers`)
//! - **State machine**: trigger/poll/read/clear cycle (`device`)
//! - **History**: on-device ring buffer drain (`history`)
//! - **Calibration**: part-to-part offset procedure (`calibration`)
//! - **Session**: mode facade with a uniform `next_range` (`session`)
//! - **Sampler**: background acquisition thread (`sampler`)
//!
//! ## Polling
//!
//! The device reports completion through a status register, never a blocking
//! call. The state machine only exposes trigger/poll primitives; blocking
//! waits are built on top with the `Clock` abstraction, so the wait policy
//! stays a caller decision and tests stay deterministic.

// Module declarations
pub mod calibration;
pub mod device;
pub mod error;
pub mod history;
pub mod mocks;
pub mod regmap;
pub mod registers;
pub mod sample;
pub mod sampler;
pub mod session;
pub mod util;

pub use calibration::{CalibrationCfg, CalibrationOutcome};
pub use device::{AlsGain, Device, DeviceState};
pub use error::{BuildError, RangeError, Result};
pub use history::History;
pub use regmap::{HISTORY_WINDOW_LEN, MODEL_ID, RegWidth, Register};
pub use registers::Registers;
pub use sample::{AmbientSample, RangeSample, RangeStatus};
pub use sampler::RangeSampler;
pub use session::{AcquisitionMode, RangeSession, SessionBuilder, Timeouts};
