use ranger_core::mocks::ScriptedSensor;
use ranger_core::{Device, History, RangeError};

fn device(sensor: &ScriptedSensor) -> Device<ScriptedSensor> {
    Device::new(sensor.clone()).unwrap()
}

#[test]
fn drain_yields_buffered_samples_in_insertion_order() {
    let sensor = ScriptedSensor::new();
    let mut dev = device(&sensor);
    let mut history = History::new();

    history.enable(&mut dev, 16).unwrap();
    sensor.push_history(&[10, 11, 12, 13, 14]);

    let batch = history.drain(&mut dev).unwrap();
    let distances: Vec<u16> = batch.iter().map(|s| s.distance_mm).collect();
    assert_eq!(distances, vec![10, 11, 12, 13, 14]);
    assert_eq!(history.cursor(), 5);
    assert!(batch.iter().all(|s| !s.overrun));
    // Sequence indices are assigned in insertion order.
    let seqs: Vec<u64> = batch.iter().map(|s| s.seq).collect();
    assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
}

#[test]
fn drain_with_no_new_data_is_empty() {
    let sensor = ScriptedSensor::new();
    let mut dev = device(&sensor);
    let mut history = History::new();

    history.enable(&mut dev, 16).unwrap();
    sensor.push_history(&[7, 8]);
    assert_eq!(history.drain(&mut dev).unwrap().len(), 2);

    // Nothing new arrived: the next drain does not block and yields nothing.
    assert!(history.drain(&mut dev).unwrap().is_empty());
    assert_eq!(history.cursor(), 2);
}

#[test]
fn cursor_wraps_modulo_capacity() {
    let sensor = ScriptedSensor::new();
    let mut dev = device(&sensor);
    let mut history = History::new();

    history.enable(&mut dev, 4).unwrap();
    sensor.push_history(&[1, 2, 3]);
    history.drain(&mut dev).unwrap();
    assert_eq!(history.cursor(), 3);

    sensor.push_history(&[4, 5]);
    history.drain(&mut dev).unwrap();
    // 3 + 2 wraps modulo 4.
    assert_eq!(history.cursor(), 1);
}

#[test]
fn overrun_flags_the_affected_batch() {
    let sensor = ScriptedSensor::new();
    let mut dev = device(&sensor);
    let mut history = History::new();

    history.enable(&mut dev, 4).unwrap();
    // Six samples into four slots: the two oldest are gone.
    sensor.push_history(&[1, 2, 3, 4, 5, 6]);

    let batch = history.drain(&mut dev).unwrap();
    let distances: Vec<u16> = batch.iter().map(|s| s.distance_mm).collect();
    assert_eq!(distances, vec![3, 4, 5, 6]);
    assert!(batch.iter().all(|s| s.overrun));

    // The overrun report does not repeat once acknowledged.
    sensor.push_history(&[7]);
    let batch = history.drain(&mut dev).unwrap();
    assert_eq!(batch.len(), 1);
    assert!(!batch[0].overrun);
}

#[test]
fn enable_validates_capacity() {
    let sensor = ScriptedSensor::new();
    let mut dev = device(&sensor);
    let mut history = History::new();

    let err = history.enable(&mut dev, 17).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RangeError>(),
        Some(RangeError::CapacityExceeded {
            requested: 17,
            max: 16
        })
    ));

    let err = history.enable(&mut dev, 0).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RangeError>(),
        Some(RangeError::InvalidMode(_))
    ));
}

#[test]
fn enable_requires_an_idle_device() {
    let sensor = ScriptedSensor::new();
    let mut dev = device(&sensor);
    let mut history = History::new();

    dev.start_single_shot().unwrap();
    let err = history.enable(&mut dev, 8).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RangeError>(),
        Some(RangeError::DeviceBusy(_))
    ));
}

#[test]
fn drain_after_disable_is_rejected() {
    let sensor = ScriptedSensor::new();
    let mut dev = device(&sensor);
    let mut history = History::new();

    history.enable(&mut dev, 8).unwrap();
    history.disable(&mut dev).unwrap();
    let err = history.drain(&mut dev).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RangeError>(),
        Some(RangeError::InvalidMode(_))
    ));

    // Disable is valid in any state, repeatedly.
    history.disable(&mut dev).unwrap();
}

#[test]
fn reenable_resets_the_cursor() {
    let sensor = ScriptedSensor::new();
    let mut dev = device(&sensor);
    let mut history = History::new();

    history.enable(&mut dev, 8).unwrap();
    sensor.push_history(&[1, 2, 3]);
    history.drain(&mut dev).unwrap();
    assert_eq!(history.cursor(), 3);

    history.disable(&mut dev).unwrap();
    history.enable(&mut dev, 8).unwrap();
    assert_eq!(history.cursor(), 0);
}
