mod cli;
mod error_fmt;
mod run;

use clap::Parser;
use cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use eyre::{Result, WrapErr};
use ranger_config::Config;
use ranger_traits::RegisterBus;
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    if let Err(err) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", error_fmt::format_error_json(&err));
        } else {
            eprintln!("{}", error_fmt::humanize(&err));
        }
        std::process::exit(error_fmt::exit_code_for_error(&err));
    }
}

fn real_main(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config)?;
    config.validate()?;
    init_logging(&cli, &config);
    dispatch(cli, &config)
}

fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&content).wrap_err_with(|| format!("failed to parse config {}", path.display()))
}

/// Console logs go to stderr (stdout carries the samples); an optional JSON
/// file appender comes from the [logging] section.
fn init_logging(cli: &Cli, config: &Config) {
    let level = config
        .logging
        .level
        .clone()
        .unwrap_or_else(|| cli.log_level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if let Some(file) = &config.logging.file {
        let path = Path::new(file);
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let name = path.file_name().unwrap_or_else(|| "ranger.log".as_ref());
        let appender = match config.logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_writer(non_blocking)
            .init();
    } else if cli.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn dispatch(cli: Cli, config: &Config) -> Result<()> {
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    if !cli.sim {
        let bus = ranger_hardware::LinuxI2cBus::open(config.sensor.bus, config.sensor.address)
            .wrap_err("failed to open the i2c bus")?;
        return run_command(cli, config, bus);
    }

    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    if !cli.sim {
        tracing::info!("built without hardware support; using the simulated sensor");
    }
    run_command(cli, config, ranger_hardware::SimulatedSensor::new())
}

fn run_command<B: RegisterBus + Send + 'static>(cli: Cli, config: &Config, bus: B) -> Result<()> {
    match cli.cmd {
        Commands::Range { count } => run::range(bus, config, cli.json, count),
        Commands::Watch { period_ms, count } => run::watch(bus, config, cli.json, period_ms, count),
        Commands::History { capacity, drains } => {
            run::history(bus, config, cli.json, capacity, drains)
        }
        Commands::Calibrate { reference_mm } => run::calibrate(bus, config, cli.json, reference_mm),
        Commands::Ambient => run::ambient(bus, config, cli.json),
        Commands::Status => run::status(bus, config, cli.json),
    }
}
