use ranger_core::mocks::ScriptedSensor;
use ranger_core::{
    AcquisitionMode, AlsGain, BuildError, DeviceState, RangeError, RangeSession, Timeouts,
};

const RANGE_START: u16 = 0x0018;
const RANGE_OFFSET: u16 = 0x0024;
const HISTORY_CTRL: u16 = 0x0012;

fn fast_sensor() -> ScriptedSensor {
    let sensor = ScriptedSensor::new();
    sensor.set_latency_polls(0);
    sensor
}

fn session(sensor: &ScriptedSensor, mode: AcquisitionMode) -> RangeSession<ScriptedSensor> {
    RangeSession::builder()
        .with_bus(sensor.clone())
        .with_mode(mode)
        .with_timeouts(Timeouts { sensor_ms: 50 })
        .build()
        .unwrap()
}

#[test]
fn single_shot_triggers_and_waits_per_call() {
    let sensor = fast_sensor();
    sensor.push_single(33, 0);
    sensor.push_single(34, 0);
    let mut session = session(&sensor, AcquisitionMode::SingleShot);

    let first = session.next_range().unwrap();
    let second = session.next_range().unwrap();
    assert_eq!(first.distance_mm, 33);
    assert_eq!(second.distance_mm, 34);
    assert_eq!(second.seq, first.seq + 1);
    assert_eq!(session.device_state(), DeviceState::Idle);
}

#[test]
fn continuous_returns_samples_without_retriggering() {
    let sensor = fast_sensor();
    sensor.push_single(10, 0);
    sensor.push_single(11, 0);
    let mut session = session(&sensor, AcquisitionMode::Continuous { period_ms: 20 });

    assert_eq!(session.next_range().unwrap().distance_mm, 10);
    assert_eq!(session.next_range().unwrap().distance_mm, 11);
    // The only single-shot-code write is the continuous start itself; the
    // session never issued a per-sample trigger.
    assert_eq!(sensor.writes_to(RANGE_START), vec![0x03]);
}

#[test]
fn switching_out_of_continuous_stops_it_before_the_next_trigger() {
    let sensor = fast_sensor();
    let mut session = session(&sensor, AcquisitionMode::Continuous { period_ms: 100 });
    session.next_range().unwrap();

    session.switch_mode(AcquisitionMode::SingleShot).unwrap();
    // Continuous mode is fully torn down before any new trigger can land.
    assert_eq!(sensor.register(RANGE_START), 0x00);
    assert_eq!(session.device_state(), DeviceState::Idle);

    let sample = session.next_range().unwrap();
    assert!(sample.status.is_valid());
}

#[test]
fn history_mode_serves_buffered_samples_through_next_range() {
    let sensor = fast_sensor();
    let mut session = session(&sensor, AcquisitionMode::History { capacity: 8 });
    sensor.push_history(&[3, 4]);

    assert_eq!(session.next_range().unwrap().distance_mm, 3);
    assert_eq!(session.next_range().unwrap().distance_mm, 4);

    // Nothing buffered and nothing arriving: the wait policy times out.
    let err = session.next_range().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RangeError>(),
        Some(RangeError::Timeout)
    ));
}

#[test]
fn drain_history_never_blocks() {
    let sensor = fast_sensor();
    let mut session = session(&sensor, AcquisitionMode::History { capacity: 8 });
    sensor.push_history(&[5, 6, 7]);

    let batch = session.drain_history().unwrap();
    assert_eq!(batch.len(), 3);
    assert!(session.drain_history().unwrap().is_empty());
}

#[test]
fn switching_modes_disables_history_buffering() {
    let sensor = fast_sensor();
    let mut session = session(&sensor, AcquisitionMode::History { capacity: 8 });
    session.switch_mode(AcquisitionMode::SingleShot).unwrap();

    // The history control register was cleared during the switch.
    assert_eq!(sensor.register(HISTORY_CTRL), 0x00);
    let err = session.drain_history().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RangeError>(),
        Some(RangeError::InvalidMode(_))
    ));
}

#[test]
fn stop_is_idempotent_and_blocks_further_acquisition() {
    let sensor = fast_sensor();
    let mut session = session(&sensor, AcquisitionMode::Continuous { period_ms: 20 });
    session.stop().unwrap();
    session.stop().unwrap();
    assert_eq!(session.device_state(), DeviceState::Idle);

    let err = session.next_range().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RangeError>(),
        Some(RangeError::InvalidMode(_))
    ));

    // switch_mode brings the session back.
    session.switch_mode(AcquisitionMode::SingleShot).unwrap();
    session.next_range().unwrap();
}

#[test]
fn calibrate_requires_ranging_stopped() {
    let sensor = fast_sensor();
    let mut session = session(&sensor, AcquisitionMode::Continuous { period_ms: 20 });
    let err = session.calibrate(100).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RangeError>(),
        Some(RangeError::DeviceBusy(_))
    ));

    session.switch_mode(AcquisitionMode::SingleShot).unwrap();
    sensor.set_default_reading(95, 0);
    let outcome = session.calibrate(100).unwrap();
    assert_eq!(outcome.offset_mm, 5);
    assert_eq!(session.offset_mm().unwrap(), 5);
}

#[test]
fn builder_reports_missing_pieces() {
    let err = RangeSession::<ScriptedSensor>::builder()
        .try_build()
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingBus)
    ));

    let err = RangeSession::builder()
        .with_bus(fast_sensor())
        .try_build()
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingMode)
    ));
}

#[test]
fn builder_validates_configuration() {
    let err = RangeSession::builder()
        .with_bus(fast_sensor())
        .with_mode(AcquisitionMode::Continuous { period_ms: 5 })
        .build()
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));

    let err = RangeSession::builder()
        .with_bus(fast_sensor())
        .with_mode(AcquisitionMode::SingleShot)
        .with_timeouts(Timeouts { sensor_ms: 0 })
        .build()
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));

    // Capacity violations surface as the typed history error.
    let err = RangeSession::builder()
        .with_bus(fast_sensor())
        .with_mode(AcquisitionMode::History { capacity: 17 })
        .build()
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RangeError>(),
        Some(RangeError::CapacityExceeded { .. })
    ));
}

#[test]
fn persisted_offset_is_applied_at_build() {
    let sensor = fast_sensor();
    let _session = RangeSession::builder()
        .with_bus(sensor.clone())
        .with_mode(AcquisitionMode::SingleShot)
        .with_initial_offset(-4)
        .build()
        .unwrap();
    assert_eq!(sensor.register(RANGE_OFFSET) as i8, -4);
}

#[test]
fn ambient_measurement_reads_the_sixteen_bit_result() {
    let sensor = fast_sensor();
    sensor.set_als_value(640);
    let mut session = session(&sensor, AcquisitionMode::SingleShot);

    let ambient = session.ambient(AlsGain::X1).unwrap();
    assert_eq!(ambient.raw, 640);
    assert!((ambient.lux - 204.8).abs() < 0.01);

    // Gain divides the derived lux.
    sensor.set_als_value(640);
    let ambient = session.ambient(AlsGain::X10).unwrap();
    assert!((ambient.lux - 20.48).abs() < 0.01);
}
