//! Membership in the mean ± k·std band of an entity.

use super::{Job, PartitionOutput, realized_row};
use crate::error::Result;
use ldp_data::{CellValue, Column, Partition};
use ldp_stats::RangeBand;
use serde::{Deserialize, Serialize};

/// Configuration for [`RangeMembershipJob`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeMembershipConfig {
    /// Band half-width in standard deviations (default: 2.0)
    pub multiplier: f64,
}

impl Default for RangeMembershipConfig {
    fn default() -> Self {
        Self { multiplier: 2.0 }
    }
}

/// Flags every value inside `[mean - k·std, mean + k·std]` of its entity.
///
/// Mean and sample standard deviation are computed once per partition over
/// its non-null values. A row without a value is outside the band.
/// Partitions with fewer than two values get null flags.
#[derive(Debug)]
pub struct RangeMembershipJob {
    name: &'static str,
    description: &'static str,
    columns: [Column; 1],
    config: RangeMembershipConfig,
}

impl RangeMembershipJob {
    /// `Within_Range` over zero-filled values.
    pub fn within_range() -> Self {
        Self {
            name: "within-range",
            description: "Value within mean ± 2 std of its Business ID (nulls as 0)",
            columns: [Column::WithinRange],
            config: RangeMembershipConfig::default(),
        }
    }

    /// `Within_2Std_Range` over non-null values.
    pub fn within_2std_range() -> Self {
        Self {
            name: "within-2std-range",
            description: "Value within mean ± 2 std of its Business ID (nulls excluded)",
            columns: [Column::Within2StdRange],
            config: RangeMembershipConfig::default(),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: RangeMembershipConfig) -> Self {
        self.config = config;
        self
    }

    /// Current configuration.
    pub const fn config(&self) -> &RangeMembershipConfig {
        &self.config
    }
}

impl Job for RangeMembershipJob {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn compute(&self, partition: &Partition) -> Result<PartitionOutput> {
        let band = RangeBand::from_values(&partition.realized_values(), self.config.multiplier);

        let rows = partition
            .observations
            .iter()
            .map(|o| {
                let flag = band.map(|b| o.value.is_some_and(|v| b.contains(v)));
                realized_row(partition, o, vec![CellValue::from(flag)])
            })
            .collect();

        Ok(match band {
            Some(_) => PartitionOutput::computed(rows),
            None => PartitionOutput::skipped(rows),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::testing::{daily, series};

    #[test]
    fn test_example_series_all_within() {
        let output = RangeMembershipJob::within_range()
            .compute(&series("A", &[10.0, 12.0, 11.0, 15.0]))
            .unwrap();

        assert!(output.rows.iter().all(|r| r.cells == vec![CellValue::Bool(true)]));
    }

    #[test]
    fn test_outlier_flagged() {
        let mut values = vec![10.0; 9];
        values.push(100.0);
        let output = RangeMembershipJob::within_2std_range()
            .compute(&series("A", &values))
            .unwrap();

        assert_eq!(output.rows[0].cells, vec![CellValue::Bool(true)]);
        assert_eq!(output.rows[9].cells, vec![CellValue::Bool(false)]);
    }

    #[test]
    fn test_constant_series_is_within() {
        let output = RangeMembershipJob::within_range()
            .compute(&series("A", &[5.0, 5.0, 5.0]))
            .unwrap();

        assert!(output.rows.iter().all(|r| r.cells == vec![CellValue::Bool(true)]));
    }

    #[test]
    fn test_single_row_is_null() {
        let output = RangeMembershipJob::within_range()
            .compute(&series("A", &[5.0]))
            .unwrap();

        assert!(output.skipped);
        assert_eq!(output.rows[0].cells, vec![CellValue::Null]);
    }

    #[test]
    fn test_narrow_band() {
        let job = RangeMembershipJob::within_range()
            .with_config(RangeMembershipConfig { multiplier: 0.5 });
        let output = job.compute(&series("A", &[10.0, 12.0, 11.0, 15.0])).unwrap();

        // mean 12, std 2.16: band [10.92, 13.08]
        let flags: Vec<CellValue> = output.rows.iter().map(|r| r.cells[0]).collect();
        assert_eq!(
            flags,
            vec![
                CellValue::Bool(false),
                CellValue::Bool(true),
                CellValue::Bool(true),
                CellValue::Bool(false)
            ]
        );
        assert_eq!(job.config().multiplier, 0.5);
    }

    #[test]
    fn test_null_value_is_outside_band() {
        let output = RangeMembershipJob::within_2std_range()
            .compute(&daily("A", &[Some(1.0), None, Some(2.0)]))
            .unwrap();

        assert_eq!(output.rows.len(), 3);
        assert_eq!(output.rows[1].cells, vec![CellValue::Bool(false)]);
        assert_eq!(output.rows[0].cells, vec![CellValue::Bool(true)]);
    }

    #[test]
    fn test_all_null_partition_gets_null_flags() {
        let output = RangeMembershipJob::within_2std_range()
            .compute(&daily("A", &[None, None]))
            .unwrap();

        assert!(output.skipped);
        assert!(output.rows.iter().all(|r| r.cells == vec![CellValue::Null]));
    }
}
