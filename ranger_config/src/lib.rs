#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the ranging driver.
//!
//! The `Config` struct and sub-structs are deserialized from TOML and
//! validated as a whole; every field has a sensible default so an absent
//! file or section still yields a working sim setup.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SensorCfg {
    /// Linux I2C bus index (e.g. 1 for /dev/i2c-1).
    pub bus: u8,
    /// Sensor bus address.
    pub address: u8,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            bus: 1,
            address: 0x29,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RangingCfg {
    /// Continuous-mode inter-measurement period in milliseconds
    /// (20..=2550, floored to 10 ms steps by the device).
    pub period_ms: u16,
    /// History-mode buffer capacity (1..=16 slots).
    pub history_capacity: u8,
}

impl Default for RangingCfg {
    fn default() -> Self {
        Self {
            period_ms: 100,
            history_capacity: 16,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimeoutsCfg {
    /// Poll budget per measurement (ms). Also accepts alias "sample_ms".
    #[serde(alias = "sample_ms")]
    pub sensor_ms: u64,
}

impl Default for TimeoutsCfg {
    fn default() -> Self {
        Self { sensor_ms: 150 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationSection {
    /// Ground-truth distance of the reference target in millimeters.
    pub reference_mm: u16,
    /// Single-shot measurements averaged per calibration run.
    pub samples: u8,
    /// Persisted part-to-part offset, re-applied at session start. The
    /// on-device register is volatile across power cycles.
    pub offset_mm: Option<i8>,
}

impl Default for CalibrationSection {
    fn default() -> Self {
        Self {
            reference_mm: 50,
            samples: 10,
            offset_mm: None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub sensor: SensorCfg,
    pub ranging: RangingCfg,
    pub timeouts: TimeoutsCfg,
    pub calibration: CalibrationSection,
    pub logging: Logging,
}

impl Config {
    /// Parse from TOML text without validating.
    pub fn from_toml_str(text: &str) -> eyre::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Validate cross-field constraints. Returns the first violation.
    pub fn validate(&self) -> eyre::Result<()> {
        if !(20..=2550).contains(&self.ranging.period_ms) {
            eyre::bail!(
                "ranging.period_ms must be between 20 and 2550, got {}",
                self.ranging.period_ms
            );
        }
        if !(1..=16).contains(&self.ranging.history_capacity) {
            eyre::bail!(
                "ranging.history_capacity must be between 1 and 16, got {}",
                self.ranging.history_capacity
            );
        }
        if self.timeouts.sensor_ms == 0 {
            eyre::bail!("timeouts.sensor_ms must be >= 1");
        }
        if self.calibration.samples == 0 {
            eyre::bail!("calibration.samples must be >= 1");
        }
        if let Some(rotation) = self.logging.rotation.as_deref()
            && !matches!(rotation, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {rotation}");
        }
        Ok(())
    }
}
