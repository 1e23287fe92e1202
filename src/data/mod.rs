//! Persisting sweep results.

pub mod storage;

pub use storage::{ResultWriter, WriteMode};
