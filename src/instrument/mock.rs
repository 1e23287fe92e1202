//! Simulated LCR meter.
//!
//! Answers the same SCPI subset as the real instrument, computing readings
//! from a series RC network so sweeps produce physically sensible curves.
//! Used by `--simulate` and throughout the test suite.
//!
//! # Performance Characteristics
//!
//! Every call returns immediately; settling delays come only from the session.

use crate::error::{AppResult, ImpError};
use crate::instrument::transport::Transport;
use crate::measurement::MeasurementFunction;
use num_complex::Complex64;
use std::f64::consts::PI;
use std::sync::{Arc, Mutex, MutexGuard};

const MOCK_RESOURCE: &str = "SIM::LCR::INSTR";
const MOCK_IDN: &str = "B&K Precision,894,SIM000001,1.0.0,1.0";

#[derive(Debug)]
struct MockState {
    resistance: f64,
    capacitance: f64,
    function: MeasurementFunction,
    frequency: f64,
    voltage: f64,
    commands: Vec<String>,
    fetches: usize,
    fail_on_fetch: Option<usize>,
    rejected_prefix: Option<String>,
    closes: usize,
}

/// Simulated meter with a series RC device under test.
///
/// Cloning yields another handle to the same simulated instrument, so a test
/// can hand one clone to a session and inspect the traffic through another.
///
/// # Example
///
/// ```rust,ignore
/// let meter = MockLcrMeter::new().failing_at_fetch(3);
/// let mut session = Session::with_transport(meter.clone());
/// session.measure_at_frequency(1000.0)?;
/// assert_eq!(meter.fetch_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockLcrMeter {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockLcrMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLcrMeter {
    /// 100 Ohm in series with 1 uF, measured at 1 kHz / 1 V until told otherwise.
    pub fn new() -> Self {
        Self::with_network(100.0, 1e-6)
    }

    /// Series RC network with the given resistance (Ohm) and capacitance (F).
    pub fn with_network(resistance: f64, capacitance: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                resistance,
                capacitance,
                function: MeasurementFunction::default(),
                frequency: 1000.0,
                voltage: 1.0,
                commands: Vec::new(),
                fetches: 0,
                fail_on_fetch: None,
                rejected_prefix: None,
                closes: 0,
            })),
        }
    }

    /// Makes the `n`-th `FETCH?` (1-based) time out.
    pub fn failing_at_fetch(self, n: usize) -> Self {
        self.lock().fail_on_fetch = Some(n);
        self
    }

    /// Makes every command starting with `prefix` fail as if the meter rejected it.
    pub fn rejecting(self, prefix: &str) -> Self {
        self.lock().rejected_prefix = Some(prefix.to_string());
        self
    }

    /// Every command and query received so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    /// Number of `FETCH?` queries answered or failed so far.
    pub fn fetch_count(&self) -> usize {
        self.lock().fetches
    }

    /// How often the transport was closed.
    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MockState {
    fn check_open(&self) -> AppResult<()> {
        if self.closes > 0 {
            Err(ImpError::device("simulated meter is closed"))
        } else {
            Ok(())
        }
    }

    fn check_rejected(&self, command: &str) -> AppResult<()> {
        match &self.rejected_prefix {
            Some(prefix) if command.starts_with(prefix.as_str()) => Err(ImpError::device(
                format!("instrument rejected command '{command}'"),
            )),
            _ => Ok(()),
        }
    }

    fn impedance(&self) -> Complex64 {
        let omega = 2.0 * PI * self.frequency;
        Complex64::new(self.resistance, -1.0 / (omega * self.capacitance))
    }

    fn reading(&self) -> (f64, f64) {
        use MeasurementFunction::*;
        let omega = 2.0 * PI * self.frequency;
        let z = self.impedance();
        let y = z.inv();
        let (r, x) = (z.re, z.im);
        let (g, b) = (y.re, y.im);
        match self.function {
            CpD => (b / omega, g / b.abs()),
            CpQ => (b / omega, b.abs() / g),
            CpG => (b / omega, g),
            CpRp => (b / omega, 1.0 / g),
            CsD => (-1.0 / (omega * x), r / x.abs()),
            CsQ => (-1.0 / (omega * x), x.abs() / r),
            CsRs => (-1.0 / (omega * x), r),
            LpQ => (-1.0 / (omega * b), b.abs() / g),
            LpD => (-1.0 / (omega * b), g / b.abs()),
            LpG => (-1.0 / (omega * b), g),
            LpRp => (-1.0 / (omega * b), 1.0 / g),
            LsD => (x / omega, r / x.abs()),
            LsQ => (x / omega, x.abs() / r),
            LsRs => (x / omega, r),
            Rx => (r, x),
            ZThetaDeg => (z.norm(), z.arg().to_degrees()),
            ZThetaRad => (z.norm(), z.arg()),
            Gb => (g, b),
            YThetaDeg => (y.norm(), y.arg().to_degrees()),
            YThetaRad => (y.norm(), y.arg()),
        }
    }
}

fn parse_setting(command: &str, prefix: &str, unit: &str) -> AppResult<f64> {
    command
        .strip_prefix(prefix)
        .map(|rest| rest.trim().trim_end_matches(unit).trim())
        .and_then(|value| value.parse::<f64>().ok())
        .ok_or_else(|| ImpError::device(format!("malformed command '{command}'")))
}

impl Transport for MockLcrMeter {
    fn write(&mut self, command: &str) -> AppResult<()> {
        let mut state = self.lock();
        state.check_open()?;
        state.commands.push(command.to_string());
        state.check_rejected(command)?;

        if let Some(code) = command.strip_prefix("FUNC:IMP ") {
            state.function = code
                .parse()
                .map_err(|_| ImpError::device(format!("unsupported function '{code}'")))?;
        } else if command.starts_with("FREQ ") {
            state.frequency = parse_setting(command, "FREQ ", "Hz")?;
        } else if command.starts_with("VOLT ") {
            state.voltage = parse_setting(command, "VOLT ", "V")?;
        } else {
            return Err(ImpError::device(format!("unknown command '{command}'")));
        }
        Ok(())
    }

    fn query(&mut self, command: &str) -> AppResult<String> {
        let mut state = self.lock();
        state.check_open()?;
        state.commands.push(command.to_string());
        state.check_rejected(command)?;

        match command {
            "*IDN?" => Ok(MOCK_IDN.to_string()),
            "FETCH?" => {
                state.fetches += 1;
                if state.fail_on_fetch == Some(state.fetches) {
                    return Err(ImpError::device("timed out waiting for FETCH? response"));
                }
                let (primary, secondary) = state.reading();
                Ok(format!("{primary:+.5E},{secondary:+.5E},+0"))
            }
            other => Err(ImpError::device(format!("unknown query '{other}'"))),
        }
    }

    fn close(&mut self) -> AppResult<()> {
        self.lock().closes += 1;
        Ok(())
    }

    fn resource(&self) -> &str {
        MOCK_RESOURCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::transport::parse_reading_pair;

    fn fetch(meter: &mut MockLcrMeter, function: &str, frequency: f64) -> (f64, f64) {
        meter.write(&format!("FUNC:IMP {function}")).unwrap();
        meter.write(&format!("FREQ {frequency}Hz")).unwrap();
        parse_reading_pair(&meter.query("FETCH?").unwrap()).unwrap()
    }

    #[test]
    fn series_rc_impedance_at_1khz() {
        let mut meter = MockLcrMeter::new();
        let (z, theta) = fetch(&mut meter, "ZTD", 1000.0);
        // |Z| = sqrt(100^2 + 159.155^2)
        assert!((z - 187.96).abs() < 0.01, "|Z| = {z}");
        assert!((theta + 57.86).abs() < 0.01, "theta = {theta}");
    }

    #[test]
    fn series_capacitance_recovers_the_network() {
        let mut meter = MockLcrMeter::new();
        let (cs, rs) = fetch(&mut meter, "CSRS", 5000.0);
        assert!((cs - 1e-6).abs() < 1e-10);
        assert!((rs - 100.0).abs() < 1e-3);
    }

    #[test]
    fn fails_on_requested_fetch() {
        let mut meter = MockLcrMeter::new().failing_at_fetch(2);
        assert!(meter.query("FETCH?").is_ok());
        assert!(matches!(meter.query("FETCH?"), Err(ImpError::Device(_))));
        assert!(meter.query("FETCH?").is_ok());
        assert_eq!(meter.fetch_count(), 3);
    }

    #[test]
    fn unknown_function_is_rejected() {
        let mut meter = MockLcrMeter::new();
        assert!(meter.write("FUNC:IMP XYZ").is_err());
    }

    #[test]
    fn closed_meter_refuses_traffic() {
        let mut meter = MockLcrMeter::new();
        meter.close().unwrap();
        assert!(meter.query("*IDN?").is_err());
        assert_eq!(meter.close_count(), 1);
    }
}
