//! Sample standard deviation of an entity's values.

use super::{Job, PartitionOutput, broadcast_rows};
use crate::error::Result;
use ldp_data::{CellValue, Column, Partition};
use ldp_stats::sample_std;

/// Writes the partition's sample std to every row (`Volatility`).
///
/// Values are zero-filled by default, so null observations pull the
/// volatility towards zero.
#[derive(Debug, Default)]
pub struct VolatilityJob;

impl Job for VolatilityJob {
    fn name(&self) -> &'static str {
        "volatility"
    }

    fn description(&self) -> &'static str {
        "Sample standard deviation of Value per Business ID, on every row"
    }

    fn columns(&self) -> &[Column] {
        &[Column::Volatility]
    }

    fn compute(&self, partition: &Partition) -> Result<PartitionOutput> {
        let std = sample_std(&partition.realized_values());
        let rows = broadcast_rows(partition, &[CellValue::from(std)]);
        Ok(match std {
            Some(_) => PartitionOutput::computed(rows),
            None => PartitionOutput::skipped(rows),
        })
    }
}

/// Writes the sample std of non-null values once per entity (`Standard Deviation`).
#[derive(Debug, Default)]
pub struct StandardDeviationJob;

impl Job for StandardDeviationJob {
    fn name(&self) -> &'static str {
        "standard-deviation"
    }

    fn description(&self) -> &'static str {
        "Sample standard deviation of non-null Value per Business ID"
    }

    fn columns(&self) -> &[Column] {
        &[Column::StandardDeviation]
    }

    fn compute(&self, partition: &Partition) -> Result<PartitionOutput> {
        let std = sample_std(&partition.realized_values());
        let rows = broadcast_rows(partition, &[CellValue::from(std)]);
        Ok(match std {
            Some(_) => PartitionOutput::computed(rows),
            None => PartitionOutput::skipped(rows),
        })
    }
}
