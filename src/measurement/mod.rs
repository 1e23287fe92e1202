//! Measurement data types shared by the session, the sweep engine and the
//! result writer.

mod function;
mod sample;

pub use function::MeasurementFunction;
pub use sample::{Sample, SweepResult};
