//! Human-readable error descriptions and structured JSON error formatting.

use ranger_core::{BuildError, RangeError};

/// Map an eyre::Report to a human-readable explanation with likely causes
/// and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingBus => {
                "What happened: No register bus was provided to the ranging engine.\nLikely causes: Bus initialization failed before the session was built.\nHow to fix: Check the [sensor] bus/address settings, or run with --sim.".to_string()
            }
            BuildError::MissingMode => {
                "What happened: No acquisition mode was selected.\nLikely causes: The session builder was not given a mode.\nHow to fix: Pick a subcommand (range, watch, history).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML or on the command line.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(re) = err.downcast_ref::<RangeError>() {
        return match re {
            RangeError::Transport(detail) => format!(
                "What happened: A bus transaction failed ({detail}).\nLikely causes: Wrong [sensor] bus/address, wiring, or power.\nHow to fix: Verify the wiring and config; run with --sim to rule out the driver."
            ),
            RangeError::Timeout => {
                "What happened: The sensor did not produce a result within the poll budget.\nLikely causes: Sensor unpowered or mid-reset, or timeouts.sensor_ms too low.\nHow to fix: Check power, or raise timeouts.sensor_ms in the config.".to_string()
            }
            RangeError::UnexpectedDevice { model_id } => format!(
                "What happened: The device at the configured address reported model id {model_id:#04x}.\nLikely causes: Wrong bus address, or a different part on the bus.\nHow to fix: Fix [sensor] address in the config."
            ),
            RangeError::CalibrationOutOfRange { offset_mm } => format!(
                "What happened: The computed offset ({offset_mm} mm) does not fit the offset register; the previous calibration was kept.\nLikely causes: Wrong --reference-mm, or the target is not at the stated distance.\nHow to fix: Re-check the reference target placement and distance."
            ),
            RangeError::CapacityExceeded { requested, max } => format!(
                "What happened: History capacity {requested} exceeds the hardware maximum of {max}.\nHow to fix: Pass --capacity {max} or less."
            ),
            other => format!(
                "What happened: {other}.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {err}"
    )
}

/// Stable exit codes per failure class; everything unclassified returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<RangeError>() {
        Some(RangeError::Transport(_)) => 2,
        Some(RangeError::Timeout) => 3,
        Some(RangeError::CalibrationOutOfRange { .. }) => 4,
        Some(RangeError::UnexpectedDevice { .. }) => 5,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<RangeError>() {
        Some(RangeError::Transport(_)) => "Transport",
        Some(RangeError::Timeout) => "Timeout",
        Some(RangeError::CalibrationOutOfRange { .. }) => "CalibrationOutOfRange",
        Some(RangeError::UnexpectedDevice { .. }) => "UnexpectedDevice",
        Some(RangeError::CapacityExceeded { .. }) => "CapacityExceeded",
        Some(RangeError::DeviceBusy(_)) => "DeviceBusy",
        _ => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "message": humanize(err),
    })
    .to_string()
}
