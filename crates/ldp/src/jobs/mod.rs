//! Job definitions
//!
//! A job turns one partition (all observations of one Business ID) into
//! output rows for the columns it owns. Loading, schema changes and writing
//! are handled by [`crate::pipeline::Pipeline`]; a job only computes.

pub mod change;
pub mod dispersion;
pub mod predictions;
pub mod r_squared;
pub mod range;
pub mod regression;
pub mod slope;

pub use change::{ChangeIndicatorJob, ChangeJob};
pub use dispersion::{StandardDeviationJob, VolatilityJob};
pub use predictions::{LinearPredictionsConfig, LinearPredictionsJob};
pub use r_squared::LinearR2Job;
pub use range::{RangeMembershipConfig, RangeMembershipJob};
pub use regression::{LinearRegressionJob, QuadraticRegressionJob, RegressionConfig};
pub use slope::{SlopeConfig, SlopeJob, SlopeTrendJob};

use crate::error::{JobError, Result};
use chrono::NaiveDate;
use ldp_data::schema::{LDP_TABLE, derived_column_info};
use ldp_data::{CellValue, Column, KeyScope, NullPolicy, Observation, OutputRow, Partition};
use ldp_stats::StatsError;
use std::fmt;

/// Rows produced for one partition.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionOutput {
    /// Rows to write, realized rows first
    pub rows: Vec<OutputRow>,
    /// Whether the partition had too little data for the statistic
    pub skipped: bool,
}

impl PartitionOutput {
    /// Output of a partition the statistic was computed for.
    pub const fn computed(rows: Vec<OutputRow>) -> Self {
        Self {
            rows,
            skipped: false,
        }
    }

    /// Output of a partition with insufficient data; cells are null.
    pub const fn skipped(rows: Vec<OutputRow>) -> Self {
        Self {
            rows,
            skipped: true,
        }
    }
}

/// A per-entity statistics job.
pub trait Job: fmt::Debug {
    /// Registry name, as used on the command line.
    fn name(&self) -> &'static str;

    /// One-line description.
    fn description(&self) -> &'static str;

    /// Table the job reads.
    fn source_table(&self) -> &'static str {
        LDP_TABLE
    }

    /// Table the job writes.
    fn target_table(&self) -> &'static str {
        self.source_table()
    }

    /// Derived columns the job writes, in cell order.
    fn columns(&self) -> &[Column];

    /// Additional columns read alongside `Value`.
    fn inputs(&self) -> &[Column] {
        &[]
    }

    /// Null handling of `Value`, taken from the schema registry by default.
    fn null_policy(&self) -> NullPolicy {
        self.columns()
            .first()
            .and_then(|c| derived_column_info(*c))
            .map_or(NullPolicy::Drop, |info| info.null_policy)
    }

    /// Key scope of the written columns, taken from the schema registry by default.
    fn scope(&self) -> KeyScope {
        self.columns()
            .first()
            .and_then(|c| derived_column_info(*c))
            .map_or(KeyScope::Row, |info| info.scope)
    }

    /// Whether the job owns the forecast rows of every entity it writes.
    fn regenerates_forecasts(&self) -> bool {
        false
    }

    /// Compute the output rows of one partition.
    fn compute(&self, partition: &Partition) -> Result<PartitionOutput>;
}

/// Reference date for the day axis of the slope fits.
pub fn slope_origin() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 1).unwrap_or_default()
}

/// Output row for a realized observation.
pub(crate) fn realized_row(
    partition: &Partition,
    observation: &Observation,
    cells: Vec<CellValue>,
) -> OutputRow {
    OutputRow::realized(
        observation.key_date,
        partition.business_id.clone(),
        observation.value,
        cells,
    )
}

/// Realized rows with the same cells on every row.
///
/// Entity-scoped jobs use this too: the targeted writer issues one update per
/// entity, while a table replace needs every row.
pub(crate) fn broadcast_rows(partition: &Partition, cells: &[CellValue]) -> Vec<OutputRow> {
    partition
        .observations
        .iter()
        .map(|o| realized_row(partition, o, cells.to_vec()))
        .collect()
}

/// Turn insufficient data into `None`; other statistics errors propagate.
pub(crate) fn sufficient<T>(result: ldp_stats::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(StatsError::InsufficientData { .. }) => Ok(None),
        Err(e) => Err(JobError::Stats(e)),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::available_jobs;

    #[test]
    fn test_slope_origin() {
        assert_eq!(slope_origin(), NaiveDate::from_ymd_opt(2022, 1, 1).unwrap());
    }

    #[test]
    fn test_defaults_follow_schema_registry() {
        for info in available_jobs() {
            let job = (info.build)();
            for column in job.columns() {
                let entry = derived_column_info(*column).unwrap();
                assert_eq!(entry.scope, job.scope(), "{} scope", job.name());
                assert_eq!(entry.null_policy, job.null_policy(), "{} policy", job.name());
            }
        }
    }
}
