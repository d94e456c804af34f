//! Result types for training and adjustment.

use crate::factors::{AdjustmentFactorSet, FactorField};
use crate::partition::FailedCell;
use crate::series::{Field, Series};

/// The output of [`train`](crate::train).
#[derive(Debug, Clone)]
pub struct Trained {
    /// Factors trained on the (optionally SSR-transformed) inputs.
    primary: AdjustmentFactorSet,
    /// Factors trained on the frequency-adapted historical series.
    frequency_adapted: Option<AdjustmentFactorSet>,
}

impl Trained {
    pub(crate) fn new(
        primary: AdjustmentFactorSet,
        frequency_adapted: Option<AdjustmentFactorSet>,
    ) -> Self {
        Self {
            primary,
            frequency_adapted,
        }
    }

    pub fn primary(&self) -> &AdjustmentFactorSet {
        &self.primary
    }

    pub fn frequency_adapted(&self) -> Option<&AdjustmentFactorSet> {
        self.frequency_adapted.as_ref()
    }

    /// Consumes `self` and returns the primary factor set.
    pub fn into_primary(self) -> AdjustmentFactorSet {
        self.primary
    }
}

/// The output of [`train_field`](crate::train_field).
#[derive(Debug, Clone)]
pub struct TrainedField {
    factors: FactorField,
    frequency_adapted: Option<FactorField>,
    failed: Vec<FailedCell>,
}

impl TrainedField {
    pub(crate) fn new(
        factors: FactorField,
        frequency_adapted: Option<FactorField>,
        failed: Vec<FailedCell>,
    ) -> Self {
        Self {
            factors,
            frequency_adapted,
            failed,
        }
    }

    pub fn factors(&self) -> &FactorField {
        &self.factors
    }

    pub fn frequency_adapted(&self) -> Option<&FactorField> {
        self.frequency_adapted.as_ref()
    }

    /// Cells left missing under `MarkMissing`.
    pub fn failed(&self) -> &[FailedCell] {
        &self.failed
    }

    /// Consumes `self` and returns the primary factor field.
    pub fn into_factors(self) -> FactorField {
        self.factors
    }
}

/// The output of [`adjust`](crate::adjust).
#[derive(Debug, Clone)]
pub struct Adjusted {
    series: Series,
    /// Values that fell outside the factor curve's range.
    extrapolated: usize,
    /// Factors limited by `max_factor`.
    capped: usize,
}

impl Adjusted {
    pub(crate) fn new(series: Series, extrapolated: usize, capped: usize) -> Self {
        Self {
            series,
            extrapolated,
            capped,
        }
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    /// Consumes `self` and returns the adjusted series.
    pub fn into_series(self) -> Series {
        self.series
    }

    /// Number of values outside the range of their factor curve.
    pub fn extrapolated(&self) -> usize {
        self.extrapolated
    }

    /// Number of factors reduced by the configured cap.
    pub fn capped(&self) -> usize {
        self.capped
    }
}

/// The output of [`adjust_field`](crate::adjust_field).
#[derive(Debug, Clone)]
pub struct AdjustedField {
    field: Field,
    failed: Vec<FailedCell>,
}

impl AdjustedField {
    pub(crate) fn new(field: Field, failed: Vec<FailedCell>) -> Self {
        Self { field, failed }
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    /// Cells filled with `NaN` under `MarkMissing`.
    pub fn failed(&self) -> &[FailedCell] {
        &self.failed
    }

    pub fn into_field(self) -> Field {
        self.field
    }
}
