//! Sweep command pipeline.
//!
//! `fsweep` and `asweep` both run the same sequence: plan the sweep from the
//! configuration, run it once or [`BATCH_REPETITIONS`] times, write the table
//! if an output path was given, and close the session. The binary and the
//! integration tests share this code path.

use crate::config::Configuration;
use crate::data::{ResultWriter, WriteMode};
use crate::error::AppResult;
use crate::instrument::{Session, Transport};
use crate::measurement::{Sample, SweepResult};
use crate::sweep::{StepInfo, Sweep, SweepKind, BATCH_REPETITIONS};
use std::path::Path;

/// What a sweep command was asked to do.
#[derive(Debug, Clone, Copy)]
pub struct SweepRequest<'a> {
    /// Which variable is swept.
    pub kind: SweepKind,
    /// Repeat the sweep [`BATCH_REPETITIONS`] times.
    pub batch: bool,
    /// Destination file; `None` (or an empty path) keeps results in memory only.
    pub output: Option<&'a Path>,
    /// Replace or append to an existing output file.
    pub mode: WriteMode,
}

impl<'a> SweepRequest<'a> {
    /// Single pass, no output file, truncating writes.
    pub fn new(kind: SweepKind) -> Self {
        Self {
            kind,
            batch: false,
            output: None,
            mode: WriteMode::Truncate,
        }
    }

    /// Enables or disables batch mode.
    pub fn batch(mut self, batch: bool) -> Self {
        self.batch = batch;
        self
    }

    /// Sets the destination file.
    pub fn output(mut self, output: Option<&'a Path>) -> Self {
        self.output = output.filter(|p| !p.as_os_str().is_empty());
        self
    }

    /// Sets how an existing output file is treated.
    pub fn mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Number of passes the request runs.
    pub fn repetitions(&self) -> usize {
        if self.batch {
            BATCH_REPETITIONS
        } else {
            1
        }
    }
}

/// Runs the sweep on an open session and writes the results.
///
/// The session settles for `config.settle` before every fetch. Nothing is
/// written unless every repetition completed.
pub fn run_sweep<T, F>(
    config: &Configuration,
    session: &mut Session<T>,
    request: &SweepRequest<'_>,
    on_sample: F,
) -> AppResult<Vec<SweepResult>>
where
    T: Transport,
    F: FnMut(StepInfo, &Sample),
{
    let sweep = Sweep::from_config(request.kind, config)?;
    session.set_settle(config.settle);
    tracing::info!(
        kind = %request.kind,
        points = sweep.points().len(),
        repetitions = request.repetitions(),
        function = %sweep.function(),
        settle_ms = config.settle.as_millis() as u64,
        "sweep planned"
    );

    let results = sweep.run_batch_with(session, request.repetitions(), on_sample)?;

    match request.output {
        Some(path) => ResultWriter::new(path).with_mode(request.mode).write(&results)?,
        None => tracing::info!("no output file given, results not saved"),
    }
    Ok(results)
}

/// Like [`run_sweep`], but takes ownership of the session and closes it on
/// every path.
pub fn execute_sweep<T, F>(
    config: &Configuration,
    mut session: Session<T>,
    request: &SweepRequest<'_>,
    on_sample: F,
) -> AppResult<Vec<SweepResult>>
where
    T: Transport,
    F: FnMut(StepInfo, &Sample),
{
    let outcome = run_sweep(config, &mut session, request, on_sample);
    let closed = session.close();
    let results = outcome?;
    closed?;
    Ok(results)
}
