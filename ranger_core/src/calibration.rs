//! Part-to-part offset calibration.
//!
//! Optical and manufacturing variance shifts every part's readings by a
//! fixed amount. The application-note procedure measures a reference target
//! at a known distance with the offset register zeroed, derives the
//! correction, and programs it back; the device then applies it to every
//! subsequent measurement. The register is volatile: callers that want the
//! correction to survive a power cycle persist the returned outcome and
//! re-apply it at session start.

use crate::device::{self, Device, DeviceState};
use crate::error::{RangeError, Result};
use crate::util::div_round_nearest_i32;
use ranger_traits::{Clock, RegisterBus};
use tracing::{debug, info};

/// Tunable constants of the calibration procedure. The sample count and
/// rounding rule follow the application note; both stay configurable rather
/// than hard-coded.
#[derive(Debug, Clone)]
pub struct CalibrationCfg {
    /// Number of single-shot measurements averaged for the raw reading.
    pub samples: u8,
    /// Poll budget per measurement, in milliseconds.
    pub sample_budget_ms: u64,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            samples: 10,
            sample_budget_ms: 500,
        }
    }
}

/// Result of a successful calibration, suitable for persisting.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationOutcome {
    pub reference_mm: u16,
    pub mean_raw_mm: u16,
    pub offset_mm: i8,
}

/// Run the offset calibration against a reference target placed at
/// `reference_mm`.
///
/// On any failure — transport, timeout, or an offset the register cannot
/// represent — the previously programmed offset is restored, so a botched
/// run never corrupts an existing calibration.
pub fn run<B: RegisterBus>(
    device: &mut Device<B>,
    clock: &dyn Clock,
    reference_mm: u16,
    cfg: &CalibrationCfg,
) -> Result<CalibrationOutcome> {
    if device.state() != DeviceState::Idle {
        return Err(eyre::Report::new(RangeError::DeviceBusy(
            "device must be idle for calibration",
        )));
    }
    if cfg.samples == 0 {
        return Err(eyre::Report::new(RangeError::InvalidMode(
            "calibration needs at least one sample",
        )));
    }

    let previous = device.read_offset_mm()?;
    // Zero the register so the raw measurements are unbiased.
    device.write_offset_mm(0)?;

    let mean_raw = match measure_mean(device, clock, cfg) {
        Ok(mean) => mean,
        Err(e) => {
            device.write_offset_mm(previous)?;
            return Err(e);
        }
    };

    let offset = i32::from(reference_mm) - mean_raw;
    let Ok(offset_mm) = i8::try_from(offset) else {
        device.write_offset_mm(previous)?;
        return Err(eyre::Report::new(RangeError::CalibrationOutOfRange {
            offset_mm: offset,
        }));
    };

    device.write_offset_mm(offset_mm)?;
    info!(
        reference_mm,
        mean_raw_mm = mean_raw,
        offset_mm,
        "offset calibration written"
    );
    Ok(CalibrationOutcome {
        reference_mm,
        mean_raw_mm: mean_raw as u16,
        offset_mm,
    })
}

/// Average `cfg.samples` single-shot readings, rounding to nearest with ties
/// away from zero. Degraded readings are excluded from the mean.
fn measure_mean<B: RegisterBus>(
    device: &mut Device<B>,
    clock: &dyn Clock,
    cfg: &CalibrationCfg,
) -> Result<i32> {
    let mut sum = 0i32;
    let mut valid = 0i32;
    for _ in 0..cfg.samples {
        device.start_single_shot()?;
        device::wait_ready(device, clock, cfg.sample_budget_ms)?;
        let sample = device.read_result()?;
        if sample.status.is_valid() {
            sum += i32::from(sample.distance_mm);
            valid += 1;
        } else {
            debug!(
                status = sample.status.name(),
                "discarding degraded calibration sample"
            );
        }
    }
    if valid == 0 {
        return Err(
            eyre::Report::new(RangeError::Timeout).wrap_err("no valid calibration samples"),
        );
    }
    Ok(div_round_nearest_i32(sum, valid))
}
