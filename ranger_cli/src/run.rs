//! Command implementations, generic over the register bus.

use eyre::Result;
use ranger_config::Config;
use ranger_core::{
    AcquisitionMode, AlsGain, CalibrationCfg, RangeSample, RangeSampler, RangeSession, Timeouts,
};
use ranger_traits::{MonotonicClock, RegisterBus};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn build_session<B: RegisterBus>(
    bus: B,
    config: &Config,
    mode: AcquisitionMode,
) -> Result<RangeSession<B>> {
    let mut builder = RangeSession::builder()
        .with_bus(bus)
        .with_mode(mode)
        .with_timeouts(Timeouts {
            sensor_ms: config.timeouts.sensor_ms,
        })
        .with_calibration(CalibrationCfg {
            samples: config.calibration.samples,
            ..CalibrationCfg::default()
        });
    if let Some(offset_mm) = config.calibration.offset_mm {
        tracing::info!(offset_mm, "re-applying persisted offset");
        builder = builder.with_initial_offset(offset_mm);
    }
    builder.build()
}

fn emit_sample(sample: &RangeSample, json: bool) {
    if json {
        let line = serde_json::json!({
            "seq": sample.seq,
            "distance_mm": sample.distance_mm,
            "status": sample.status.name(),
            "overrun": sample.overrun,
        });
        println!("{line}");
    } else {
        let overrun = if sample.overrun { "  (overrun)" } else { "" };
        if sample.status.is_valid() {
            println!("#{:<4} {:>4} mm{overrun}", sample.seq, sample.distance_mm);
        } else {
            println!("#{:<4} ---- ({}){overrun}", sample.seq, sample.status.name());
        }
    }
}

pub fn range<B: RegisterBus>(bus: B, config: &Config, json: bool, count: u32) -> Result<()> {
    let mut session = build_session(bus, config, AcquisitionMode::SingleShot)?;
    for _ in 0..count {
        let sample = session.next_range()?;
        emit_sample(&sample, json);
    }
    session.stop()
}

pub fn watch<B: RegisterBus + Send + 'static>(
    bus: B,
    config: &Config,
    json: bool,
    period_ms: Option<u16>,
    count: Option<u64>,
) -> Result<()> {
    let period_ms = period_ms.unwrap_or(config.ranging.period_ms);
    let session = build_session(bus, config, AcquisitionMode::Continuous { period_ms })?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = stop.clone();
    ctrlc::set_handler(move || stop_handler.store(true, Ordering::SeqCst))?;

    let sampler = RangeSampler::spawn(session, MonotonicClock::new());
    let stall_threshold_ms = (u64::from(period_ms) + config.timeouts.sensor_ms) * 4;
    let mut seen = 0u64;
    let mut stall_reported = false;

    tracing::info!(period_ms, "watching; ctrl-c to stop");
    while !stop.load(Ordering::SeqCst) {
        if let Some(sample) = sampler.latest() {
            emit_sample(&sample, json);
            stall_reported = false;
            seen += 1;
            if count.is_some_and(|n| seen >= n) {
                break;
            }
        } else if sampler.stalled_for_now() > stall_threshold_ms && !stall_reported {
            tracing::warn!(
                stalled_ms = sampler.stalled_for_now(),
                "no samples arriving from the sensor"
            );
            stall_reported = true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    Ok(())
}

pub fn history<B: RegisterBus>(
    bus: B,
    config: &Config,
    json: bool,
    capacity: Option<u8>,
    drains: u32,
) -> Result<()> {
    let capacity = capacity.unwrap_or(config.ranging.history_capacity);
    let mut session = build_session(bus, config, AcquisitionMode::History { capacity })?;

    for round in 0..drains {
        let batch = session.drain_history()?;
        if batch.is_empty() && !json {
            println!("(no new samples)");
        }
        for sample in &batch {
            emit_sample(sample, json);
        }
        // Leave the device time to buffer more before the next round.
        if round + 1 < drains {
            std::thread::sleep(Duration::from_millis(u64::from(config.ranging.period_ms)));
        }
    }
    session.stop()
}

pub fn calibrate<B: RegisterBus>(
    bus: B,
    config: &Config,
    json: bool,
    reference_mm: Option<u16>,
) -> Result<()> {
    let reference_mm = reference_mm.unwrap_or(config.calibration.reference_mm);
    let mut session = build_session(bus, config, AcquisitionMode::SingleShot)?;
    let outcome = session.calibrate(reference_mm)?;

    if json {
        let line = serde_json::json!({
            "reference_mm": outcome.reference_mm,
            "mean_raw_mm": outcome.mean_raw_mm,
            "offset_mm": outcome.offset_mm,
        });
        println!("{line}");
    } else {
        println!(
            "offset {} mm written (reference {} mm, measured {} mm)",
            outcome.offset_mm, outcome.reference_mm, outcome.mean_raw_mm
        );
        println!(
            "persist it with `offset_mm = {}` under [calibration] to survive power cycles",
            outcome.offset_mm
        );
    }
    session.stop()
}

pub fn ambient<B: RegisterBus>(bus: B, config: &Config, json: bool) -> Result<()> {
    let mut session = build_session(bus, config, AcquisitionMode::SingleShot)?;
    let reading = session.ambient(AlsGain::X1)?;

    if json {
        let line = serde_json::json!({
            "raw": reading.raw,
            "lux": reading.lux,
        });
        println!("{line}");
    } else {
        println!("{:.2} lux (raw {})", reading.lux, reading.raw);
    }
    session.stop()
}

pub fn status<B: RegisterBus>(bus: B, config: &Config, json: bool) -> Result<()> {
    let mut session = build_session(bus, config, AcquisitionMode::SingleShot)?;
    let offset_mm = session.offset_mm()?;

    if json {
        let line = serde_json::json!({
            "state": format!("{:?}", session.device_state()),
            "offset_mm": offset_mm,
        });
        println!("{line}");
    } else {
        println!("device: {:?}", session.device_state());
        println!("part-to-part offset: {offset_mm} mm");
    }
    session.stop()
}
