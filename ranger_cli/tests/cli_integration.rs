use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn ranger() -> Command {
    Command::cargo_bin("ranger").unwrap()
}

#[test]
fn range_against_the_simulator_prints_a_distance() {
    ranger()
        .args(["--sim", "range"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mm"));
}

#[test]
fn json_output_is_one_parseable_object_per_sample() {
    let output = ranger()
        .args(["--sim", "--json", "range", "--count", "3"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    for line in lines {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value["distance_mm"].is_u64());
        assert_eq!(value["status"], "valid");
    }
}

#[test]
fn watch_with_a_count_terminates() {
    ranger()
        .args(["--sim", "watch", "--count", "2", "--period-ms", "20"])
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .success()
        .stdout(predicate::str::contains("mm"));
}

#[test]
fn history_drains_the_buffer() {
    ranger()
        .args(["--sim", "history", "--capacity", "8", "--drains", "2"])
        .assert()
        .success();
}

#[test]
fn calibrate_reports_a_small_offset_against_the_sim_target() {
    // The simulated scene sits at 100 mm; calibrating against a 100 mm
    // reference must land within the sim's ±1 mm wobble.
    let output = ranger()
        .args(["--sim", "--json", "calibrate", "--reference-mm", "100"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let value: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    let offset = value["offset_mm"].as_i64().unwrap();
    assert!((-1..=1).contains(&offset), "offset {offset} too large");
}

#[test]
fn ambient_reports_lux() {
    ranger()
        .args(["--sim", "ambient"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lux"));
}

#[test]
fn status_reports_the_programmed_offset() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "[calibration]\noffset_mm = 7").unwrap();

    ranger()
        .args(["--sim", "status"])
        .arg("--config")
        .arg(config.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("7 mm"));
}

#[test]
fn invalid_config_fails_with_a_helpful_message() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "[ranging]\nperiod_ms = 5").unwrap();

    ranger()
        .args(["--sim", "range"])
        .arg("--config")
        .arg(config.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("period_ms"));
}

#[test]
fn capacity_violations_exit_nonzero_with_the_typed_reason() {
    let output = ranger()
        .args(["--sim", "--json", "history", "--capacity", "17"])
        .output()
        .unwrap();
    assert!(!output.status.success());

    let stderr = String::from_utf8(output.stderr).unwrap();
    let value: serde_json::Value = serde_json::from_str(stderr.trim()).unwrap();
    assert_eq!(value["reason"], "CapacityExceeded");
}
