//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "ranger", version, about = "Time-of-flight ranging CLI")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/ranger.toml")]
    pub config: PathBuf,

    /// Emit samples and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Use the simulated sensor instead of real hardware
    #[arg(long, action = ArgAction::SetTrue)]
    pub sim: bool,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Take single-shot range measurements
    Range {
        /// Number of measurements
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Stream continuous measurements until ctrl-c
    Watch {
        /// Inter-measurement period (ms); defaults to the config value
        #[arg(long)]
        period_ms: Option<u16>,
        /// Stop after this many samples
        #[arg(long)]
        count: Option<u64>,
    },
    /// Drain the on-device history buffer
    History {
        /// Buffer capacity; defaults to the config value
        #[arg(long)]
        capacity: Option<u8>,
        /// Number of drain rounds
        #[arg(long, default_value_t = 1)]
        drains: u32,
    },
    /// Run the part-to-part offset calibration against a reference target
    Calibrate {
        /// Ground-truth target distance (mm); defaults to the config value
        #[arg(long)]
        reference_mm: Option<u16>,
    },
    /// Take one ambient light measurement
    Ambient,
    /// Probe the sensor and report its state
    Status,
}
