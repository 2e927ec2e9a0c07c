//! Period-over-period change and its direction.

use super::{Job, PartitionOutput, realized_row};
use crate::error::Result;
use ldp_data::{CellValue, Column, Partition};
use ldp_stats::{ChangeIndicator, paired_differences};

/// Change of every row against the previous row of its entity.
///
/// The first row has no predecessor and gets 0. A row whose value or whose
/// predecessor's value is null gets a null change.
fn changes(partition: &Partition) -> Vec<Option<f64>> {
    let values = partition.values();
    let mut out = vec![None; values.len()];
    if let Some(first) = out.first_mut() {
        *first = Some(0.0);
    }
    for (i, diff) in paired_differences(&values) {
        out[i] = Some(diff);
    }
    out
}

/// Writes `Change = Value[i] - Value[i-1]`.
#[derive(Debug, Default)]
pub struct ChangeJob;

impl Job for ChangeJob {
    fn name(&self) -> &'static str {
        "change"
    }

    fn description(&self) -> &'static str {
        "Difference to the previous period per Business ID"
    }

    fn columns(&self) -> &[Column] {
        &[Column::Change]
    }

    fn compute(&self, partition: &Partition) -> Result<PartitionOutput> {
        let rows = partition
            .observations
            .iter()
            .zip(changes(partition))
            .map(|(o, change)| realized_row(partition, o, vec![CellValue::from(change)]))
            .collect();
        Ok(PartitionOutput::computed(rows))
    }
}

/// Writes the sign of the change as -1, 0 or 1.
#[derive(Debug, Default)]
pub struct ChangeIndicatorJob;

impl Job for ChangeIndicatorJob {
    fn name(&self) -> &'static str {
        "change-indicator"
    }

    fn description(&self) -> &'static str {
        "Direction of the change to the previous period (-1, 0, 1)"
    }

    fn columns(&self) -> &[Column] {
        &[Column::ChangeIndicator]
    }

    fn compute(&self, partition: &Partition) -> Result<PartitionOutput> {
        let rows = partition
            .observations
            .iter()
            .zip(changes(partition))
            .map(|(o, change)| {
                let cell = change.map_or(CellValue::Null, |c| {
                    CellValue::Integer(ChangeIndicator::from_change(c).as_i64())
                });
                realized_row(partition, o, vec![cell])
            })
            .collect();
        Ok(PartitionOutput::computed(rows))
    }
}
