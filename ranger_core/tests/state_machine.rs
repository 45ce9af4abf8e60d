use ranger_core::mocks::ScriptedSensor;
use ranger_core::{Device, DeviceState, RangeError, RangeStatus};
use rstest::rstest;

const RANGE_START: u16 = 0x0018;
const INTERMEASUREMENT_PERIOD: u16 = 0x001B;
const FRESH_OUT_OF_RESET: u16 = 0x0016;

fn poll_until_ready(dev: &mut Device<ScriptedSensor>) {
    for _ in 0..16 {
        if dev.poll_ready().unwrap() {
            return;
        }
    }
    panic!("measurement never became ready");
}

#[test]
fn probe_rejects_an_unexpected_model_id() {
    let sensor = ScriptedSensor::new();
    sensor.set_model_id(0xA0);
    let err = Device::new(sensor).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RangeError>(),
        Some(RangeError::UnexpectedDevice { model_id: 0xA0 })
    ));
}

#[test]
fn init_loads_tuning_and_clears_fresh_out_of_reset() {
    let sensor = ScriptedSensor::new();
    let _dev = Device::new(sensor.clone()).unwrap();
    // Flag cleared and a couple of spot-checked tuning values landed.
    assert_eq!(sensor.register(FRESH_OUT_OF_RESET), 0x00);
    assert_eq!(sensor.register(0x010A), 0x30);
    assert_eq!(sensor.register(0x0011), 0x10);
}

#[test]
fn single_shot_walks_the_full_cycle() {
    let sensor = ScriptedSensor::new();
    sensor.push_single(42, 0);
    let mut dev = Device::new(sensor.clone()).unwrap();
    assert_eq!(dev.state(), DeviceState::Idle);

    dev.start_single_shot().unwrap();
    assert_eq!(dev.state(), DeviceState::Triggered);

    // Latency is two polls: the first observes the device mid-measurement.
    assert!(!dev.poll_ready().unwrap());
    assert_eq!(dev.state(), DeviceState::MeasurementInProgress);
    poll_until_ready(&mut dev);
    assert_eq!(dev.state(), DeviceState::ResultReady);

    let sample = dev.read_result().unwrap();
    assert_eq!(sample.distance_mm, 42);
    assert_eq!(sample.status, RangeStatus::Valid);
    assert_eq!(sample.seq, 0);
    assert_eq!(dev.state(), DeviceState::Idle);
}

#[test]
fn trigger_while_busy_is_rejected_until_the_cycle_completes() {
    let sensor = ScriptedSensor::new();
    let mut dev = Device::new(sensor).unwrap();
    dev.start_single_shot().unwrap();

    let err = dev.start_single_shot().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RangeError>(),
        Some(RangeError::DeviceBusy(_))
    ));

    // Still busy mid-measurement.
    let _ = dev.poll_ready().unwrap();
    let err = dev.start_single_shot().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RangeError>(),
        Some(RangeError::DeviceBusy(_))
    ));

    poll_until_ready(&mut dev);
    dev.read_result().unwrap();
    // Back to idle: a new trigger succeeds.
    dev.start_single_shot().unwrap();
}

#[test]
fn read_result_before_ready_is_rejected() {
    let sensor = ScriptedSensor::new();
    let mut dev = Device::new(sensor).unwrap();
    dev.start_single_shot().unwrap();
    let err = dev.read_result().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RangeError>(),
        Some(RangeError::ResultNotReady)
    ));
}

#[test]
fn poll_outside_an_acquisition_is_rejected() {
    let sensor = ScriptedSensor::new();
    let mut dev = Device::new(sensor).unwrap();
    let err = dev.poll_ready().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RangeError>(),
        Some(RangeError::InvalidMode(_))
    ));
}

#[test]
fn stop_is_idempotent_from_any_state() {
    let sensor = ScriptedSensor::new();
    let mut dev = Device::new(sensor).unwrap();

    dev.stop().unwrap();
    assert_eq!(dev.state(), DeviceState::Idle);
    dev.stop().unwrap();
    assert_eq!(dev.state(), DeviceState::Idle);

    dev.start_single_shot().unwrap();
    dev.stop().unwrap();
    assert_eq!(dev.state(), DeviceState::Idle);
}

#[test]
fn continuous_rearms_after_every_interrupt_clear() {
    let sensor = ScriptedSensor::new();
    sensor.push_single(10, 0);
    sensor.push_single(11, 0);
    let mut dev = Device::new(sensor.clone()).unwrap();

    dev.start_continuous(100).unwrap();
    assert_eq!(dev.state(), DeviceState::Continuous);
    // 100 ms encodes as (100 / 10) - 1. (The tuning block writes this
    // register too, so only the last write matters.)
    assert_eq!(
        sensor.writes_to(INTERMEASUREMENT_PERIOD).last(),
        Some(&9u8)
    );

    poll_until_ready(&mut dev);
    let first = dev.read_result().unwrap();
    assert_eq!(first.distance_mm, 10);
    assert_eq!(dev.state(), DeviceState::Continuous);

    // The read cleared the interrupt; the device re-armed on its own.
    poll_until_ready(&mut dev);
    let second = dev.read_result().unwrap();
    assert_eq!(second.distance_mm, 11);
    assert_eq!(second.seq, first.seq + 1);

    dev.stop().unwrap();
    assert_eq!(dev.state(), DeviceState::Idle);
    // Stop toggled the start register back out of continuous mode.
    assert_eq!(sensor.register(RANGE_START), 0x00);
}

#[rstest]
#[case(10)]
#[case(2560)]
#[case(0)]
fn continuous_rejects_out_of_range_periods(#[case] period_ms: u16) {
    let sensor = ScriptedSensor::new();
    let mut dev = Device::new(sensor).unwrap();
    let err = dev.start_continuous(period_ms).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RangeError>(),
        Some(RangeError::InvalidMode(_))
    ));
}

#[test]
fn continuous_period_floors_to_ten_millisecond_steps() {
    let sensor = ScriptedSensor::new();
    let mut dev = Device::new(sensor.clone()).unwrap();
    dev.start_continuous(157).unwrap();
    // 157 ms floors to 150 ms, encoded as 14.
    assert_eq!(
        sensor.writes_to(INTERMEASUREMENT_PERIOD).last(),
        Some(&14u8)
    );
}

#[test]
fn degraded_status_rides_on_the_sample() {
    let sensor = ScriptedSensor::new();
    sensor.push_single(0, 11); // too much ambient noise
    let mut dev = Device::new(sensor).unwrap();
    dev.start_single_shot().unwrap();
    poll_until_ready(&mut dev);
    let sample = dev.read_result().unwrap();
    assert_eq!(sample.status, RangeStatus::SignalToNoise);
    assert!(!sample.status.is_valid());
}
