//! Frequency and amplitude sweeps.
//!
//! A [`Sweep`] is a fully validated plan: the ordered step values, the value
//! held fixed and the measurement function. Building one performs every check
//! that can fail on configuration grounds, so a sweep that starts talking to
//! the instrument only fails on device errors.
//!
//! Execution is fail-fast. The first failing step aborts the pass (and, in
//! batch mode, all remaining repetitions) and the error is returned to the
//! caller; no partial [`SweepResult`] escapes.

use crate::config::{Axis, Configuration};
use crate::error::{AppResult, ImpError};
use crate::instrument::session::{validate_frequency, validate_voltage, Session};
use crate::instrument::transport::Transport;
use crate::measurement::{MeasurementFunction, Sample, SweepResult};
use std::fmt;

/// Number of passes in batch mode.
pub const BATCH_REPETITIONS: usize = 5;

/// Upper bound on the number of steps one axis may expand to.
pub const MAX_STEPS: usize = 100_000;

/// Relative tolerance used when deciding whether the last step reaches `stop`.
const SNAP_TOLERANCE: f64 = 1e-9;

/// Which instrument parameter is varied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepKind {
    /// Step the test frequency, hold the AC level.
    Frequency,
    /// Step the AC level, hold the test frequency.
    Amplitude,
}

impl SweepKind {
    /// Header of the swept-value column.
    pub fn column_header(self) -> &'static str {
        match self {
            SweepKind::Frequency => "Freq [Hz]",
            SweepKind::Amplitude => "Ampl. [V]",
        }
    }

    /// Human-readable description of the fixed value.
    pub fn describe_fixed(self, fixed: f64) -> String {
        match self {
            SweepKind::Frequency => format!("AC voltage: {fixed:.3} V"),
            SweepKind::Amplitude => format!("Frequency: {fixed:.0} Hz"),
        }
    }
}

impl fmt::Display for SweepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepKind::Frequency => f.write_str("frequency"),
            SweepKind::Amplitude => f.write_str("amplitude"),
        }
    }
}

/// Position of a sample within a (batch) run, passed to sample observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepInfo {
    /// Zero-based repetition index.
    pub repetition: usize,
    /// Zero-based step index within the repetition.
    pub index: usize,
    /// Number of steps per repetition.
    pub total: usize,
}

/// Rounds to 1e-9 so that accumulated float error does not leak into
/// commands and output files.
fn round_nano(value: f64) -> f64 {
    (value * 1e9).round() / 1e9
}

/// Expands `start..=stop` in increments of `step`.
///
/// # Errors
///
/// Returns a configuration error if any input is not finite, `step` is zero,
/// `step` points away from `stop`, or the axis would exceed [`MAX_STEPS`].
///
/// # Examples
///
/// ```
/// let values = impydance::sweep::step_values(100.0, 1000.0, 300.0).unwrap();
/// assert_eq!(values, vec![100.0, 400.0, 700.0, 1000.0]);
/// ```
pub fn step_values(start: f64, stop: f64, step: f64) -> AppResult<Vec<f64>> {
    if !(start.is_finite() && stop.is_finite() && step.is_finite()) {
        return Err(ImpError::config(format!(
            "sweep range must be finite (start {start}, stop {stop}, step {step})"
        )));
    }
    if step == 0.0 {
        return Err(ImpError::config("sweep step must not be zero"));
    }
    if start == stop {
        return Ok(vec![start]);
    }
    if (stop - start).signum() != step.signum() {
        return Err(ImpError::config(format!(
            "sweep step {step} does not lead from {start} to {stop}"
        )));
    }

    let span = (stop - start) / step;
    if span + 1.0 > MAX_STEPS as f64 {
        return Err(ImpError::config(format!(
            "sweep from {start} to {stop} in steps of {step} exceeds {MAX_STEPS} points"
        )));
    }
    let last = (span + SNAP_TOLERANCE).floor() as usize;

    let mut values: Vec<f64> = (0..=last)
        .map(|i| round_nano(start + step * i as f64))
        .collect();
    if let Some(tail) = values.last_mut() {
        if (*tail - stop).abs() <= step.abs() * SNAP_TOLERANCE {
            *tail = stop;
        }
    }
    Ok(values)
}

/// `count` evenly spaced values from `start` to `stop`, both included.
///
/// A count of one yields `start` alone.
pub fn count_values(start: f64, stop: f64, count: usize) -> AppResult<Vec<f64>> {
    if !(start.is_finite() && stop.is_finite()) {
        return Err(ImpError::config(format!(
            "sweep range must be finite (start {start}, stop {stop})"
        )));
    }
    if count == 0 {
        return Err(ImpError::config("sweep point count must be greater than 0"));
    }
    if count > MAX_STEPS {
        return Err(ImpError::config(format!(
            "sweep point count {count} exceeds {MAX_STEPS}"
        )));
    }
    if count == 1 {
        return Ok(vec![start]);
    }

    let step = (stop - start) / (count - 1) as f64;
    let mut values: Vec<f64> = (0..count)
        .map(|i| round_nano(start + step * i as f64))
        .collect();
    values[count - 1] = stop;
    Ok(values)
}

/// A validated sweep plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    kind: SweepKind,
    points: Vec<f64>,
    fixed: f64,
    function: MeasurementFunction,
}

impl Sweep {
    /// Creates a sweep over explicit points.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `points` is empty or any point or the
    /// fixed value lies outside the instrument limits.
    pub fn new(
        kind: SweepKind,
        points: Vec<f64>,
        fixed: f64,
        function: MeasurementFunction,
    ) -> AppResult<Self> {
        if points.is_empty() {
            return Err(ImpError::config(format!("{kind} sweep has no points")));
        }
        match kind {
            SweepKind::Frequency => {
                points.iter().try_for_each(|&f| validate_frequency(f))?;
                validate_voltage(fixed)?;
            }
            SweepKind::Amplitude => {
                points.iter().try_for_each(|&v| validate_voltage(v))?;
                validate_frequency(fixed)?;
            }
        }
        Ok(Self {
            kind,
            points,
            fixed,
            function,
        })
    }

    /// Creates a sweep from the axis of `config` that matches `kind`.
    pub fn from_config(kind: SweepKind, config: &Configuration) -> AppResult<Self> {
        let (axis, fixed): (&Axis, f64) = match kind {
            SweepKind::Frequency => (&config.frequencies, config.voltage),
            SweepKind::Amplitude => (&config.voltages, config.frequency),
        };
        Self::new(kind, axis.values()?, fixed, config.function)
    }

    /// Which variable is stepped.
    pub fn kind(&self) -> SweepKind {
        self.kind
    }

    /// Step values in visiting order.
    pub fn points(&self) -> &[f64] {
        &self.points
    }

    /// Value held during the sweep.
    pub fn fixed(&self) -> f64 {
        self.fixed
    }

    /// Function the meter is set to before the first step.
    pub fn function(&self) -> MeasurementFunction {
        self.function
    }

    /// Sets the measurement function and the fixed parameter on the meter.
    fn prepare<T: Transport>(&self, session: &mut Session<T>) -> AppResult<()> {
        match self.kind {
            SweepKind::Frequency => session.configure(self.function, self.fixed),
            SweepKind::Amplitude => {
                session.configure(self.function, self.points[0])?;
                session.set_frequency(self.fixed)
            }
        }
    }

    fn measure<T: Transport>(&self, session: &mut Session<T>, value: f64) -> AppResult<Sample> {
        match self.kind {
            SweepKind::Frequency => session.measure_at_frequency(value),
            SweepKind::Amplitude => session.measure_at_voltage(value),
        }
    }

    /// Runs one pass.
    pub fn run<T: Transport>(&self, session: &mut Session<T>) -> AppResult<SweepResult> {
        self.run_with(session, |_, _| {})
    }

    /// Runs one pass, reporting every sample to `on_sample` as it arrives.
    pub fn run_with<T, F>(&self, session: &mut Session<T>, mut on_sample: F) -> AppResult<SweepResult>
    where
        T: Transport,
        F: FnMut(StepInfo, &Sample),
    {
        self.prepare(session)?;
        self.pass(session, 0, &mut on_sample)
    }

    /// Runs `repetitions` passes back to back.
    ///
    /// The first failing step aborts every remaining repetition.
    pub fn run_batch_with<T, F>(
        &self,
        session: &mut Session<T>,
        repetitions: usize,
        mut on_sample: F,
    ) -> AppResult<Vec<SweepResult>>
    where
        T: Transport,
        F: FnMut(StepInfo, &Sample),
    {
        if repetitions == 0 {
            return Err(ImpError::config("batch needs at least one repetition"));
        }
        self.prepare(session)?;
        let mut results = Vec::with_capacity(repetitions);
        for repetition in 0..repetitions {
            tracing::info!(
                kind = %self.kind,
                repetition = repetition + 1,
                of = repetitions,
                "starting sweep pass"
            );
            results.push(self.pass(session, repetition, &mut on_sample)?);
        }
        Ok(results)
    }

    fn pass<T, F>(
        &self,
        session: &mut Session<T>,
        repetition: usize,
        on_sample: &mut F,
    ) -> AppResult<SweepResult>
    where
        T: Transport,
        F: FnMut(StepInfo, &Sample),
    {
        let total = self.points.len();
        let mut samples = Vec::with_capacity(total);
        for (index, &value) in self.points.iter().enumerate() {
            let sample = self.measure(session, value).map_err(|err| {
                tracing::error!(
                    kind = %self.kind,
                    step = index + 1,
                    of = total,
                    value,
                    error = %err,
                    "sweep step failed, aborting"
                );
                err
            })?;
            tracing::debug!(step = index + 1, of = total, value, "sample acquired");
            on_sample(
                StepInfo {
                    repetition,
                    index,
                    total,
                },
                &sample,
            );
            samples.push(sample);
        }
        Ok(SweepResult {
            kind: self.kind,
            function: self.function,
            fixed: self.fixed,
            samples,
        })
    }
}
