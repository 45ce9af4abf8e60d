use thiserror::Error;

/// Typed failures of the ranging engine.
///
/// Degraded-but-valid readings are not represented here: the device reports
/// them in-band through [`crate::RangeStatus`] on the sample itself.
#[derive(Debug, Error, Clone)]
pub enum RangeError {
    /// Bus-level failure. Never retried by the core; the caller owns retry
    /// policy, since masking a transport fault could hide an unplugged
    /// sensor.
    #[error("transport error: {0}")]
    Transport(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    /// Width or window misuse of the documented register map.
    #[error("invalid access to register {addr:#06x}")]
    InvalidRegister { addr: u16 },
    #[error("invalid mode: {0}")]
    InvalidMode(&'static str),
    #[error("device busy: {0}")]
    DeviceBusy(&'static str),
    #[error("result not ready")]
    ResultNotReady,
    #[error("history capacity {requested} exceeds hardware maximum {max}")]
    CapacityExceeded { requested: u8, max: u8 },
    /// Computed offset does not fit the signed 8-bit offset register. The
    /// previous calibration is left in place.
    #[error("calibration offset {offset_mm} mm outside the register range")]
    CalibrationOutOfRange { offset_mm: i32 },
    #[error("unexpected device: model id {model_id:#04x}")]
    UnexpectedDevice { model_id: u8 },
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing register bus")]
    MissingBus,
    #[error("missing acquisition mode")]
    MissingMode,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

/// Map a trait-boundary error from [`ranger_traits::RegisterBus`] to a typed
/// [`RangeError`].
///
/// Attempts to downcast the concrete hardware error first, then falls back
/// to string-based heuristics.
pub fn map_bus_error(e: &(dyn std::error::Error + 'static)) -> RangeError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<ranger_hardware::HwError>() {
            return match hw {
                ranger_hardware::HwError::Timeout => RangeError::Timeout,
                other => RangeError::Transport(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        RangeError::Timeout
    } else {
        RangeError::Transport(s)
    }
}
