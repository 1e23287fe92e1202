//! Tab-delimited result files.
//!
//! A file holds one table per write:
//!
//! ```text
//! # Timestamp: 18/10/2026 14:03:11
//! # frequency sweep, function ZTD, AC voltage: 0.500 V, 5 repetition(s)
//! Freq [Hz]   Z [Ohm] #1   Theta [Deg] #1   Z [Ohm] #2   ...
//! 100         1.59...e3    -8.96...e1       1.59...e3    ...
//! ```
//!
//! Repetitions of a batch run become extra column pairs, aligned by step
//! index. The whole table is rendered in memory before the file is touched.

use crate::error::{AppResult, ImpError};
use crate::measurement::SweepResult;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// What to do with an existing file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the file.
    #[default]
    Truncate,
    /// Add the table after the existing contents, separated by a blank line.
    Append,
}

/// Writes sweep results to a delimited text file.
#[derive(Debug, Clone)]
pub struct ResultWriter {
    path: PathBuf,
    mode: WriteMode,
}

impl ResultWriter {
    /// Writer for `path`, truncating by default.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            mode: WriteMode::default(),
        }
    }

    /// Sets how an existing file is treated.
    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Destination file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `results` (one entry per repetition) as a single table.
    ///
    /// # Errors
    ///
    /// - `ImpError::Processing` if `results` is empty or the repetitions do not
    ///   share the same step values
    /// - `ImpError::Io` if the file cannot be written
    pub fn write(&self, results: &[SweepResult]) -> AppResult<()> {
        let table = render(results)?;
        match self.mode {
            WriteMode::Truncate => fs::write(&self.path, &table)?,
            WriteMode::Append => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?;
                if file.metadata()?.len() > 0 {
                    file.write_all(b"\n")?;
                }
                file.write_all(&table)?;
                file.flush()?;
            }
        }
        tracing::info!(
            path = %self.path.display(),
            repetitions = results.len(),
            rows = results[0].len(),
            mode = ?self.mode,
            "results written"
        );
        Ok(())
    }
}

/// Renders `results` as comment lines followed by a tab-delimited table.
pub fn render(results: &[SweepResult]) -> AppResult<Vec<u8>> {
    let first = results
        .first()
        .ok_or_else(|| ImpError::Processing("no sweep results to write".to_string()))?;
    for (n, other) in results.iter().enumerate().skip(1) {
        if other.kind != first.kind
            || other.function != first.function
            || !other.values().eq(first.values())
        {
            return Err(ImpError::Processing(format!(
                "repetition {} does not match the steps of repetition 1",
                n + 1
            )));
        }
    }

    let mut out = Vec::new();
    let timestamp = chrono::Local::now().format("%d/%m/%Y %H:%M:%S");
    writeln!(out, "# Timestamp: {timestamp}")?;
    writeln!(
        out,
        "# {} sweep, function {}, {}, {} repetition(s)",
        first.kind,
        first.function,
        first.kind.describe_fixed(first.fixed),
        results.len()
    )?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(out);

    let (primary, secondary) = first.function.headers();
    let suffix = |n: usize| {
        if results.len() > 1 {
            format!(" #{}", n + 1)
        } else {
            String::new()
        }
    };
    let mut header = vec![first.kind.column_header().to_string()];
    for n in 0..results.len() {
        header.push(format!("{primary}{}", suffix(n)));
        header.push(format!("{secondary}{}", suffix(n)));
    }
    writer.write_record(&header)?;

    for (index, sample) in first.samples.iter().enumerate() {
        let mut row = Vec::with_capacity(1 + 2 * results.len());
        row.push(sample.value.to_string());
        for result in results {
            let s = &result.samples[index];
            row.push(format!("{:.8e}", s.primary));
            row.push(format!("{:.8e}", s.secondary));
        }
        writer.write_record(&row)?;
    }

    writer
        .into_inner()
        .map_err(|e| ImpError::Io(e.into_error()))
}
