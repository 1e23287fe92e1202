//! Loading and writing configuration files.

use impydance::config::{self, Axis, Configuration, DEFAULT_DEVICE};
use impydance::measurement::MeasurementFunction;
use impydance::{ErrorKind, ImpError};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn write_file(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("impydance.cfg");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_default_file_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("impydance.cfg");
    config::write_default(&path).unwrap();

    let loaded = config::load(&path).unwrap();
    assert_eq!(loaded, Configuration::default());
    assert_eq!(loaded.device, DEFAULT_DEVICE);
}

#[test]
fn test_custom_configuration_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.cfg");
    let custom = Configuration {
        device: "USB0::0xF4EC::0xEE38::574C21101::INSTR".to_string(),
        frequencies: Axis::Count {
            start: 50.0,
            stop: 50_000.0,
            count: 7,
        },
        voltage: 1.25,
        voltages: Axis::Points(vec![0.1, 0.5, 1.0]),
        frequency: 10_000.0,
        function: MeasurementFunction::CpD,
        settle: Duration::from_millis(20),
        timeout: Duration::from_millis(2500),
    };
    config::write_config(&path, &custom).unwrap();
    assert_eq!(config::load(&path).unwrap(), custom);
}

#[test]
fn test_range_keys_are_parsed() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "device = USB0::1::INSTR\n\
         freq_start = 100\n\
         freq_stop = 1000\n\
         freq_step = 300\n\
         voltage = 0.5\n\
         measurement = rx\n",
    );
    let loaded = config::load(&path).unwrap();
    assert_eq!(
        loaded.frequencies.values().unwrap(),
        vec![100.0, 400.0, 700.0, 1000.0]
    );
    assert_eq!(loaded.function, MeasurementFunction::Rx);
}

#[test]
fn test_missing_device_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "freq = 100, 200\nvoltage = 0.5\n");
    let err = config::load(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(err.to_string().contains("missing key 'device'"));
}

#[test]
fn test_missing_frequency_axis_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "device = USB0::1::INSTR\nvoltage = 0.5\n");
    let err = config::load(&path).unwrap_err();
    assert!(err.to_string().contains("'freq'"));
}

#[test]
fn test_unparseable_frequency_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "device = USB0::1::INSTR\nfreq = 100, lots\nvoltage = 0.5\n",
    );
    let err = config::load(&path).unwrap_err();
    assert!(matches!(err, ImpError::Configuration(_)));
}

#[test]
fn test_zero_step_is_rejected_at_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "device = USB0::1::INSTR\nfreq_start = 100\nfreq_stop = 1000\nfreq_step = 0\nvoltage = 0.5\n",
    );
    let err = config::load(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_out_of_range_voltage_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "device = USB0::1::INSTR\nfreq = 100\nvoltage = 3\n");
    let err = config::load(&path).unwrap_err();
    assert!(err.to_string().contains("AC voltage 3 V"));
}

#[test]
fn test_unknown_function_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "device = USB0::1::INSTR\nfreq = 100\nvoltage = 0.5\nmeasurement = QQQ\n",
    );
    assert!(config::load(&path).is_err());
}

#[test]
fn test_missing_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = config::load(dir.path().join("nope.cfg")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_unwritable_path_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing-dir").join("impydance.cfg");
    let err = config::write_default(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_voltage_list_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "device = USB0::1::INSTR\nfreq = 100, 1000\nvoltage = 0.2, 0.4, 0.6\n",
    );
    let loaded = config::load(&path).unwrap();
    assert_eq!(loaded.voltage, 0.2);
    assert_eq!(loaded.voltages.values().unwrap(), vec![0.2, 0.4, 0.6]);
}

#[test]
fn test_single_voltage_is_the_amplitude_axis() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "device = USB0::1::INSTR\nfreq = 100\nvoltage = 0.5\n");
    let loaded = config::load(&path).unwrap();
    assert_eq!(loaded.voltages, Axis::Points(vec![0.5]));
}

#[test]
fn test_voltage_list_outside_limits_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "device = USB0::1::INSTR\nfreq = 100\nvoltage = 0.5, 2.5\n",
    );
    let err = config::load(&path).unwrap_err();
    assert!(err.to_string().contains("AC voltage 2.5 V"));
}
