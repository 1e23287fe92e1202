use crate::measurement::MeasurementFunction;
use crate::sweep::SweepKind;

/// One reading taken at a single sweep step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Swept value: frequency in Hz or AC level in V.
    pub value: f64,
    /// First quantity of the measurement function (e.g. |Z|).
    pub primary: f64,
    /// Second quantity of the measurement function (e.g. theta).
    pub secondary: f64,
}

impl Sample {
    /// Sample taken at `value`.
    pub fn new(value: f64, primary: f64, secondary: f64) -> Self {
        Self {
            value,
            primary,
            secondary,
        }
    }
}

/// All samples of one sweep pass, in step order.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepResult {
    /// Which variable was swept.
    pub kind: SweepKind,
    /// Function the readings were taken with.
    pub function: MeasurementFunction,
    /// Value held constant during the pass (V for frequency sweeps, Hz for amplitude sweeps).
    pub fixed: f64,
    /// One sample per step.
    pub samples: Vec<Sample>,
}

impl SweepResult {
    /// Number of steps measured.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if no step was measured.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Swept values in step order.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.value)
    }
}
