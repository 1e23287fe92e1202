//! # impydance
//!
//! Frequency and amplitude sweeps on a BK894-family LCR meter.
//!
//! The library is organised leaves first:
//!
//! - **`error`**: the `ImpError` enum shared by every module.
//! - **`measurement`**: measurement function codes, samples and sweep results.
//! - **`config`**: loading, validating and writing the key-value configuration file.
//! - **`instrument`**: the `Transport` capability, the VISA driver, a simulated
//!   meter, and the `Session` that speaks the meter's command set.
//! - **`sweep`**: step generation and the fail-fast sweep loop, single or batch.
//! - **`data`**: the tab-delimited result writer.
//! - **`app`**: the `fsweep`/`asweep` pipeline shared by the CLI and tests.
//! - **`logging`**: tracing subscriber setup.

pub mod app;
pub mod config;
pub mod data;
pub mod error;
pub mod instrument;
pub mod logging;
pub mod measurement;
pub mod sweep;

pub use error::{AppResult, ErrorKind, ImpError};
