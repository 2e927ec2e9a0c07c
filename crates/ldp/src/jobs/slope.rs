//! Slope of an entity's values, and of its changes, over calendar days.

use super::{Job, PartitionOutput, broadcast_rows, slope_origin, sufficient};
use crate::error::Result;
use chrono::NaiveDate;
use ldp_data::{CellValue, Column, Partition};
use ldp_stats::{LinearFit, day_offset, paired_differences};
use serde::{Deserialize, Serialize};

/// Configuration shared by the slope jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlopeConfig {
    /// Day zero of the x axis (default: 2022-01-01)
    pub origin: NaiveDate,
}

impl Default for SlopeConfig {
    fn default() -> Self {
        Self {
            origin: slope_origin(),
        }
    }
}

fn fitted_slope(partition: &Partition, x: Vec<f64>, y: Vec<f64>) -> Result<PartitionOutput> {
    match sufficient(LinearFit::fit(&x, &y))? {
        Some(fit) => Ok(PartitionOutput::computed(broadcast_rows(
            partition,
            &[CellValue::Real(fit.slope)],
        ))),
        None => Ok(PartitionOutput::skipped(broadcast_rows(
            partition,
            &[CellValue::Null],
        ))),
    }
}

/// OLS slope of Value against days since the origin (`Steigung`).
#[derive(Debug, Default)]
pub struct SlopeJob {
    config: SlopeConfig,
}

impl SlopeJob {
    /// Create with a configuration.
    pub const fn with_config(config: SlopeConfig) -> Self {
        Self { config }
    }
}

impl Job for SlopeJob {
    fn name(&self) -> &'static str {
        "slope"
    }

    fn description(&self) -> &'static str {
        "OLS slope of Value over days since 2022-01-01"
    }

    fn columns(&self) -> &[Column] {
        &[Column::Steigung]
    }

    fn compute(&self, partition: &Partition) -> Result<PartitionOutput> {
        let (x, y): (Vec<f64>, Vec<f64>) = partition
            .observations
            .iter()
            .filter_map(|o| Some((day_offset(o.key_date, self.config.origin), o.value?)))
            .unzip();
        fitted_slope(partition, x, y)
    }
}

/// OLS slope of the change series against days since the origin (`SteigungTrend`).
///
/// A change exists between neighbouring observations that both have a value
/// and is dated at the later one.
#[derive(Debug, Default)]
pub struct SlopeTrendJob {
    config: SlopeConfig,
}

impl SlopeTrendJob {
    /// Create with a configuration.
    pub const fn with_config(config: SlopeConfig) -> Self {
        Self { config }
    }
}

impl Job for SlopeTrendJob {
    fn name(&self) -> &'static str {
        "slope-trend"
    }

    fn description(&self) -> &'static str {
        "OLS slope of the change series over days since 2022-01-01"
    }

    fn columns(&self) -> &[Column] {
        &[Column::SteigungTrend]
    }

    fn compute(&self, partition: &Partition) -> Result<PartitionOutput> {
        let (x, y): (Vec<f64>, Vec<f64>) = paired_differences(&partition.values())
            .into_iter()
            .map(|(i, diff)| {
                let date = partition.observations[i].key_date;
                (day_offset(date, self.config.origin), diff)
            })
            .unzip();
        fitted_slope(partition, x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::testing::{daily, series};
    use approx::assert_abs_diff_eq;

    fn slope(output: &PartitionOutput) -> Option<f64> {
        output.rows[0].cells[0].as_f64()
    }

    #[test]
    fn test_slope_per_day() {
        // one observation per day, rising 1.4 per day on average
        let output = SlopeJob::default()
            .compute(&series("A", &[10.0, 12.0, 11.0, 15.0]))
            .unwrap();

        assert_eq!(output.rows.len(), 4);
        assert!(output.rows.iter().all(|r| r.cells == output.rows[0].cells));
        assert_abs_diff_eq!(slope(&output).unwrap(), 1.4, epsilon = 1e-9);
    }

    #[test]
    fn test_slope_independent_of_origin() {
        let partition = series("A", &[10.0, 12.0, 11.0, 15.0]);
        let shifted = SlopeJob::with_config(SlopeConfig {
            origin: NaiveDate::from_ymd_opt(1999, 6, 1).unwrap(),
        });

        let a = slope(&SlopeJob::default().compute(&partition).unwrap()).unwrap();
        let b = slope(&shifted.compute(&partition).unwrap()).unwrap();
        assert_abs_diff_eq!(a, b, epsilon = 1e-9);
    }

    #[test]
    fn test_constant_series_has_zero_slope() {
        let output = SlopeJob::default().compute(&series("A", &[5.0, 5.0, 5.0])).unwrap();
        assert_eq!(slope(&output), Some(0.0));
    }

    #[test]
    fn test_single_point_is_null() {
        let output = SlopeJob::default().compute(&series("A", &[5.0])).unwrap();
        assert!(output.skipped);
        assert_eq!(slope(&output), None);
    }

    #[test]
    fn test_trend_of_quadratic_growth() {
        // values i², changes 2i - 1 on day i: slope 2 per day
        let values: Vec<f64> = (0..6).map(|i| f64::from(i * i)).collect();
        let output = SlopeTrendJob::default().compute(&series("A", &values)).unwrap();

        assert_abs_diff_eq!(slope(&output).unwrap(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_trend_needs_two_changes() {
        let output = SlopeTrendJob::default()
            .compute(&series("A", &[1.0, 2.0]))
            .unwrap();
        assert!(output.skipped);

        let output = SlopeTrendJob::default()
            .compute(&daily("A", &[Some(1.0), Some(2.0), None, Some(4.0)]))
            .unwrap();
        assert!(output.skipped);
    }
}
