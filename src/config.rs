//! Configuration management.
//!
//! A configuration file is plain `key = value` text (INI without sections),
//! read through the `config` crate so that any key can also be overridden from
//! the environment with an `IMPYDANCE_` prefix (e.g. `IMPYDANCE_DEVICE`).
//!
//! ```text
//! device = USB0::0xF4EC::0xEE38::000000000000::INSTR
//! freq = 100, 200, 500, 1000
//! voltage = 0.5
//! volt_start = 0.2
//! volt_stop = 2
//! volt_step = 0.2
//! frequency = 1000
//! measurement = ZTD
//! ```
//!
//! A sweep axis is either an explicit list (`freq = ...`) or a linear range
//! (`freq_start`, `freq_stop` plus one of `freq_step` / `freq_count`).
//! `voltage` may also be a list: frequency sweeps hold its first entry and,
//! without any `volt*` keys, amplitude sweeps step through all of it.
//! Loading either produces a fully validated [`Configuration`] or fails; there
//! is no partially loaded state.

use crate::error::{AppResult, ImpError};
use crate::instrument::session::{validate_frequency, validate_voltage};
use crate::measurement::MeasurementFunction;
use crate::sweep;
use config::{Config, Environment, FileFormat};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// File name used when none is given on the command line.
pub const DEFAULT_CONFIG_FILE: &str = "impydance.cfg";

/// Placeholder resource string written by `cfg`; replace with the real device.
pub const DEFAULT_DEVICE: &str = "USB0::0xF4EC::0xEE38::000000000000::INSTR";

/// Quasi-logarithmic default frequency list in Hz.
pub const FREQ_QLOG_RANGE: [f64; 12] = [
    100.0, 200.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0, 20000.0, 50000.0, 100000.0, 200000.0,
    500000.0,
];

/// AC test level for frequency sweeps in V.
pub const DEFAULT_VOLTAGE: f64 = 0.5;

/// Measurement frequency for amplitude sweeps in Hz.
pub const DEFAULT_FREQUENCY: f64 = 1000.0;

/// Default amplitude axis: 0.2 V to 2.0 V in 0.2 V steps.
pub const DEFAULT_VOLTAGE_AXIS: (f64, f64, f64) = (0.2, 2.0, 0.2);

/// Delay between setting a step value and fetching the reading.
pub const DEFAULT_SETTLE_MS: u64 = 100;

/// Instrument I/O timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

const ENV_PREFIX: &str = "IMPYDANCE";

/// Values a sweep steps through.
#[derive(Debug, Clone, PartialEq)]
pub enum Axis {
    /// Explicit values, visited in the given order.
    Points(Vec<f64>),
    /// `start`, `start + step`, ... up to and including `stop`.
    Step {
        /// First value.
        start: f64,
        /// Last value, included when a whole number of steps reaches it.
        stop: f64,
        /// Increment; negative for descending axes.
        step: f64,
    },
    /// `count` evenly spaced values from `start` to `stop` inclusive.
    Count {
        /// First value.
        start: f64,
        /// Last value.
        stop: f64,
        /// Number of values, including both ends.
        count: usize,
    },
}

impl Axis {
    /// Expands the axis into its step values.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty list, a zero step, a step
    /// pointing away from `stop`, or a zero count.
    pub fn values(&self) -> AppResult<Vec<f64>> {
        match self {
            Axis::Points(points) if points.is_empty() => {
                Err(ImpError::config("axis has no points"))
            }
            Axis::Points(points) => Ok(points.clone()),
            Axis::Step { start, stop, step } => sweep::step_values(*start, *stop, *step),
            Axis::Count { start, stop, count } => sweep::count_values(*start, *stop, *count),
        }
    }

    fn entries(&self, prefix: &str) -> Vec<(String, String)> {
        match self {
            Axis::Points(points) => vec![(
                prefix.to_string(),
                points
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            )],
            Axis::Step { start, stop, step } => vec![
                (format!("{prefix}_start"), start.to_string()),
                (format!("{prefix}_stop"), stop.to_string()),
                (format!("{prefix}_step"), step.to_string()),
            ],
            Axis::Count { start, stop, count } => vec![
                (format!("{prefix}_start"), start.to_string()),
                (format!("{prefix}_stop"), stop.to_string()),
                (format!("{prefix}_count"), count.to_string()),
            ],
        }
    }
}

/// Everything a sweep command needs to know.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    /// VISA resource string of the meter.
    pub device: String,
    /// Frequencies visited by a frequency sweep, in Hz.
    pub frequencies: Axis,
    /// AC level held during a frequency sweep, in V.
    pub voltage: f64,
    /// AC levels visited by an amplitude sweep, in V.
    pub voltages: Axis,
    /// Frequency held during an amplitude sweep, in Hz.
    pub frequency: f64,
    /// Quantities read back at every step.
    pub function: MeasurementFunction,
    /// Wait between setting a step value and fetching.
    pub settle: Duration,
    /// Instrument I/O timeout.
    pub timeout: Duration,
}

impl Default for Configuration {
    fn default() -> Self {
        let (start, stop, step) = DEFAULT_VOLTAGE_AXIS;
        Self {
            device: DEFAULT_DEVICE.to_string(),
            frequencies: Axis::Points(FREQ_QLOG_RANGE.to_vec()),
            voltage: DEFAULT_VOLTAGE,
            voltages: Axis::Step { start, stop, step },
            frequency: DEFAULT_FREQUENCY,
            function: MeasurementFunction::default(),
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl Configuration {
    /// Checks every value against the instrument limits.
    ///
    /// # Errors
    ///
    /// Returns `ImpError::Configuration` naming the first offending value.
    pub fn validate(&self) -> AppResult<()> {
        if self.device.trim().is_empty() {
            return Err(ImpError::config("device must not be empty"));
        }
        for f in self.frequencies.values()? {
            validate_frequency(f)?;
        }
        validate_voltage(self.voltage)?;
        for v in self.voltages.values()? {
            validate_voltage(v)?;
        }
        validate_frequency(self.frequency)?;
        if self.timeout.is_zero() {
            return Err(ImpError::config("timeout_ms must be greater than 0"));
        }
        Ok(())
    }

    /// Renders the configuration in the on-disk format.
    pub fn to_file_contents(&self) -> String {
        let mut entries = vec![("device".to_string(), self.device.clone())];
        entries.extend(self.frequencies.entries("freq"));
        entries.push(("voltage".to_string(), self.voltage.to_string()));
        entries.extend(self.voltages.entries("volt"));
        entries.push(("frequency".to_string(), self.frequency.to_string()));
        entries.push(("measurement".to_string(), self.function.code().to_string()));
        entries.push(("settle_ms".to_string(), self.settle.as_millis().to_string()));
        entries.push(("timeout_ms".to_string(), self.timeout.as_millis().to_string()));

        let mut out = String::from(FILE_HEADER);
        for (key, value) in entries {
            out.push_str(&key);
            out.push_str(" = ");
            out.push_str(&value);
            out.push('\n');
        }
        out
    }
}

const FILE_HEADER: &str = "\
# Auto-generated configuration file for impydance.
# Frequencies are in Hz and must stay within 1 Hz - 500 kHz. AC voltages are
# in V, above 0 V and at most 2 V. A sweep axis is either a comma separated
# list (freq = 100, 200, 500) or a range with a step or a count
# (freq_start = 100, freq_stop = 1000, freq_step = 300).
# `frequency` is held during amplitude sweeps, `voltage` during frequency sweeps.
# `voltage` may be a list; without `volt` keys it is also the amplitude axis.
";

/// Keys as they appear in the file, before any typing.
#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    device: Option<String>,
    freq: Option<String>,
    freq_start: Option<String>,
    freq_stop: Option<String>,
    freq_step: Option<String>,
    freq_count: Option<String>,
    voltage: Option<String>,
    volt: Option<String>,
    volt_start: Option<String>,
    volt_stop: Option<String>,
    volt_step: Option<String>,
    volt_count: Option<String>,
    frequency: Option<String>,
    measurement: Option<String>,
    settle_ms: Option<String>,
    timeout_ms: Option<String>,
}

/// Writes the default configuration to `path`, replacing any existing file.
pub fn write_default<P: AsRef<Path>>(path: P) -> AppResult<()> {
    write_config(path, &Configuration::default())
}

/// Writes `config` to `path`, replacing any existing file.
pub fn write_config<P: AsRef<Path>>(path: P, config: &Configuration) -> AppResult<()> {
    let path = path.as_ref();
    fs::write(path, config.to_file_contents())?;
    tracing::info!(path = %path.display(), "configuration file written");
    Ok(())
}

/// Loads and validates the configuration stored at `path`.
///
/// # Errors
///
/// - `ImpError::Config` if the file is missing or not valid key-value text
/// - `ImpError::Configuration` if a required key is missing or a value does
///   not parse or violates an instrument limit
pub fn load<P: AsRef<Path>>(path: P) -> AppResult<Configuration> {
    let path = path.as_ref();
    let raw: RawSettings = Config::builder()
        .add_source(config::File::from(path).format(FileFormat::Ini))
        .add_source(Environment::with_prefix(ENV_PREFIX))
        .build()?
        .try_deserialize()?;

    let config = from_raw(raw)?;
    config.validate()?;
    tracing::debug!(path = %path.display(), device = %config.device, "configuration loaded");
    Ok(config)
}

fn from_raw(raw: RawSettings) -> AppResult<Configuration> {
    let device = required("device", raw.device)?;

    let frequencies = parse_axis(
        "freq",
        raw.freq,
        raw.freq_start,
        raw.freq_stop,
        raw.freq_step,
        raw.freq_count,
    )?
    .ok_or_else(|| {
        ImpError::config("missing key 'freq' (or 'freq_start'/'freq_stop' with a step or count)")
    })?;

    // `voltage` may list several levels: the first is held during frequency
    // sweeps, the whole list is the amplitude axis unless `volt*` keys exist.
    let levels = parse_list("voltage", &required("voltage", raw.voltage)?)?;
    let voltage = levels[0];
    if levels.len() > 1 {
        tracing::warn!(
            voltage,
            levels = levels.len(),
            "several voltages configured, frequency sweeps use the first"
        );
    }

    let voltages = match parse_axis(
        "volt",
        raw.volt,
        raw.volt_start,
        raw.volt_stop,
        raw.volt_step,
        raw.volt_count,
    )? {
        Some(axis) => axis,
        None => Axis::Points(levels),
    };

    let frequency = match raw.frequency {
        Some(value) => parse_number("frequency", &value)?,
        // Amplitude sweeps fall back to the first frequency of the frequency axis.
        None => frequencies
            .values()?
            .first()
            .copied()
            .unwrap_or(DEFAULT_FREQUENCY),
    };

    let function = match raw.measurement {
        Some(code) => code.parse()?,
        None => MeasurementFunction::default(),
    };

    let settle = match raw.settle_ms {
        Some(value) => Duration::from_millis(parse_integer("settle_ms", &value)?),
        None => Duration::from_millis(DEFAULT_SETTLE_MS),
    };
    let timeout = match raw.timeout_ms {
        Some(value) => Duration::from_millis(parse_integer("timeout_ms", &value)?),
        None => Duration::from_millis(DEFAULT_TIMEOUT_MS),
    };

    Ok(Configuration {
        device,
        frequencies,
        voltage,
        voltages,
        frequency,
        function,
        settle,
        timeout,
    })
}

fn required(key: &str, value: Option<String>) -> AppResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ImpError::config(format!("missing key '{key}'")))
}

fn parse_number(key: &str, value: &str) -> AppResult<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ImpError::config(format!("'{key}' must be a number, got '{}'", value.trim())))
}

fn parse_integer(key: &str, value: &str) -> AppResult<u64> {
    value.trim().parse::<u64>().map_err(|_| {
        ImpError::config(format!(
            "'{key}' must be a non-negative integer, got '{}'",
            value.trim()
        ))
    })
}

fn parse_list(key: &str, value: &str) -> AppResult<Vec<f64>> {
    let points = value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| parse_number(key, item))
        .collect::<AppResult<Vec<_>>>()?;
    if points.is_empty() {
        return Err(ImpError::config(format!("'{key}' lists no values")));
    }
    Ok(points)
}

fn parse_axis(
    prefix: &str,
    list: Option<String>,
    start: Option<String>,
    stop: Option<String>,
    step: Option<String>,
    count: Option<String>,
) -> AppResult<Option<Axis>> {
    let ranged = start.is_some() || stop.is_some() || step.is_some() || count.is_some();
    match (list, ranged) {
        (Some(_), true) => Err(ImpError::config(format!(
            "'{prefix}' cannot be combined with '{prefix}_start'/'{prefix}_stop'/'{prefix}_step'/'{prefix}_count'"
        ))),
        (Some(list), false) => Ok(Some(Axis::Points(parse_list(prefix, &list)?))),
        (None, false) => Ok(None),
        (None, true) => {
            let start_key = format!("{prefix}_start");
            let stop_key = format!("{prefix}_stop");
            let start = parse_number(&start_key, &required(&start_key, start)?)?;
            let stop = parse_number(&stop_key, &required(&stop_key, stop)?)?;
            match (step, count) {
                (Some(step), None) => Ok(Some(Axis::Step {
                    start,
                    stop,
                    step: parse_number(&format!("{prefix}_step"), &step)?,
                })),
                (None, Some(count)) => {
                    let count = parse_integer(&format!("{prefix}_count"), &count)?;
                    let count = usize::try_from(count).map_err(|_| {
                        ImpError::config(format!("'{prefix}_count' is too large"))
                    })?;
                    Ok(Some(Axis::Count { start, stop, count }))
                }
                (Some(_), Some(_)) => Err(ImpError::config(format!(
                    "give either '{prefix}_step' or '{prefix}_count', not both"
                ))),
                (None, None) => Err(ImpError::config(format!(
                    "missing key '{prefix}_step' (or '{prefix}_count')"
                ))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn raw_with_basics() -> RawSettings {
        RawSettings {
            device: Some("USB0::1::INSTR".into()),
            freq: Some("100, 1000".into()),
            voltage: Some("0.5".into()),
            ..Default::default()
        }
    }

    #[test]
    fn default_configuration_is_valid() {
        assert!(Configuration::default().validate().is_ok());
    }

    #[test]
    fn optional_keys_take_defaults() {
        let config = from_raw(raw_with_basics()).unwrap();
        assert_eq!(config.function, MeasurementFunction::ZThetaDeg);
        assert_eq!(config.settle, Duration::from_millis(DEFAULT_SETTLE_MS));
        assert_eq!(config.voltages, Axis::Points(vec![0.5]));
        // first point of the frequency list
        assert_eq!(config.frequency, 100.0);
    }

    #[test]
    #[traced_test]
    fn voltage_list_feeds_both_sweeps() {
        let raw = RawSettings {
            voltage: Some("0.2, 0.4, 0.6".into()),
            ..raw_with_basics()
        };
        let config = from_raw(raw).unwrap();
        assert_eq!(config.voltage, 0.2);
        assert_eq!(config.voltages, Axis::Points(vec![0.2, 0.4, 0.6]));
        assert!(logs_contain("frequency sweeps use the first"));
    }

    #[test]
    fn volt_keys_take_precedence_over_voltage_list() {
        let raw = RawSettings {
            voltage: Some("0.2, 0.4".into()),
            volt_start: Some("1".into()),
            volt_stop: Some("2".into()),
            volt_count: Some("3".into()),
            ..raw_with_basics()
        };
        let config = from_raw(raw).unwrap();
        assert_eq!(config.voltage, 0.2);
        assert_eq!(config.voltages.values().unwrap(), vec![1.0, 1.5, 2.0]);
    }

    #[test]
    fn step_and_count_together_are_rejected() {
        let raw = RawSettings {
            freq: None,
            freq_start: Some("100".into()),
            freq_stop: Some("1000".into()),
            freq_step: Some("300".into()),
            freq_count: Some("4".into()),
            ..raw_with_basics()
        };
        let err = from_raw(raw).unwrap_err();
        assert!(err.to_string().contains("not both"));
    }

    #[test]
    fn list_and_range_together_are_rejected() {
        let raw = RawSettings {
            freq_start: Some("100".into()),
            ..raw_with_basics()
        };
        assert!(from_raw(raw).is_err());
    }

    #[test]
    fn range_without_step_is_rejected() {
        let raw = RawSettings {
            freq: None,
            freq_start: Some("100".into()),
            freq_stop: Some("1000".into()),
            ..raw_with_basics()
        };
        let err = from_raw(raw).unwrap_err();
        assert!(err.to_string().contains("freq_step"));
    }

    #[test]
    fn bad_number_names_the_key() {
        let raw = RawSettings {
            voltage: Some("half a volt".into()),
            ..raw_with_basics()
        };
        let err = from_raw(raw).unwrap_err();
        assert!(err.to_string().contains("'voltage' must be a number"));
    }

    #[test]
    fn file_contents_use_axis_keys() {
        let contents = Configuration::default().to_file_contents();
        assert!(contents.contains("freq = 100, 200, 500"));
        assert!(contents.contains("volt_start = 0.2"));
        assert!(contents.contains("volt_step = 0.2"));
        assert!(contents.contains("measurement = ZTD"));
    }
}
