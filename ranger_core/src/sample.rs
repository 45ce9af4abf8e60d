//! Value types produced by the ranging engine.

/// Device-reported status of a single range measurement.
///
/// The status nibble of the range status register decodes into this closed
/// set. A degraded reading is normal operation, not a driver fault, so the
/// code rides on the sample instead of surfacing as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeStatus {
    /// Valid measurement
    Valid,
    /// System error detected at power-on; no measurement possible
    SystemError1,
    /// System error detected at power-on; no measurement possible
    SystemError5,
    /// Early convergence estimate check failed
    EceFailure,
    /// Did not converge within the maximum convergence time
    NoConvergence,
    /// Ignore-threshold check failed
    RangeIgnore,
    /// Ambient conditions too noisy
    SignalToNoise,
    /// Raw measurement underflow
    RawUnderflow,
    /// Raw measurement overflow
    RawOverflow,
    /// Range value underflow
    RangeUnderflow,
    /// Range value overflow
    RangeOverflow,
    /// Reserved/undocumented code
    Unknown(u8),
}

impl RangeStatus {
    /// Decode the upper-nibble error code of the range status register.
    pub fn from_nibble(code: u8) -> Self {
        match code {
            0 => RangeStatus::Valid,
            1 => RangeStatus::SystemError1,
            5 => RangeStatus::SystemError5,
            6 => RangeStatus::EceFailure,
            7 => RangeStatus::NoConvergence,
            8 => RangeStatus::RangeIgnore,
            11 => RangeStatus::SignalToNoise,
            12 => RangeStatus::RawUnderflow,
            13 => RangeStatus::RawOverflow,
            14 => RangeStatus::RangeUnderflow,
            15 => RangeStatus::RangeOverflow,
            other => RangeStatus::Unknown(other),
        }
    }

    /// Whether the distance carried alongside this status is trustworthy.
    pub fn is_valid(self) -> bool {
        matches!(self, RangeStatus::Valid)
    }

    /// Short stable name, used by the CLI's structured output.
    pub fn name(self) -> &'static str {
        match self {
            RangeStatus::Valid => "valid",
            RangeStatus::SystemError1 => "system_error_1",
            RangeStatus::SystemError5 => "system_error_5",
            RangeStatus::EceFailure => "ece_failure",
            RangeStatus::NoConvergence => "no_convergence",
            RangeStatus::RangeIgnore => "range_ignore",
            RangeStatus::SignalToNoise => "signal_to_noise",
            RangeStatus::RawUnderflow => "raw_underflow",
            RangeStatus::RawOverflow => "raw_overflow",
            RangeStatus::RangeUnderflow => "range_underflow",
            RangeStatus::RangeOverflow => "range_overflow",
            RangeStatus::Unknown(_) => "unknown",
        }
    }
}

/// One range measurement.
#[derive(Debug, Clone, Copy)]
pub struct RangeSample {
    /// Distance in millimeters, after the device applied any programmed
    /// part-to-part offset.
    pub distance_mm: u16,
    /// Device-reported measurement status.
    pub status: RangeStatus,
    /// Session-monotonic sequence index.
    pub seq: u64,
    /// Set when the device reported that buffered samples were overwritten
    /// before this batch could be drained. The reading itself is still
    /// valid; data before it is gone.
    pub overrun: bool,
}

/// One ambient light measurement.
#[derive(Debug, Clone, Copy)]
pub struct AmbientSample {
    /// Raw sensor count.
    pub raw: u16,
    /// Illuminance in lux, derived from the raw count, the configured gain
    /// and the 100 ms integration period.
    pub lux: f32,
}
