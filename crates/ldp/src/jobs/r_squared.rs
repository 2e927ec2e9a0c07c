//! R² of stored linear predictions.

use super::{Job, PartitionOutput, realized_row};
use crate::error::Result;
use ldp_data::schema::PREDICTIONS_TABLE;
use ldp_data::{CellValue, Column, Partition};
use ldp_stats::r_squared_percent;

/// Recomputes `BG_linear` from the `LinearPredictedValue` already stored in
/// `ldp_predictions`.
///
/// Only realized rows count: forecast rows are never loaded, and rows without
/// a value or a stored prediction are left null.
#[derive(Debug, Default)]
pub struct LinearR2Job;

impl Job for LinearR2Job {
    fn name(&self) -> &'static str {
        "linear-r2"
    }

    fn description(&self) -> &'static str {
        "R² in percent of stored linear predictions over realized rows"
    }

    fn source_table(&self) -> &'static str {
        PREDICTIONS_TABLE
    }

    fn columns(&self) -> &[Column] {
        &[Column::BgLinear]
    }

    fn inputs(&self) -> &[Column] {
        &[Column::LinearPredictedValue]
    }

    fn compute(&self, partition: &Partition) -> Result<PartitionOutput> {
        let scored: Vec<Option<(f64, f64)>> = partition
            .observations
            .iter()
            .map(|o| o.value.zip(o.input(0)))
            .collect();
        let (actual, predicted): (Vec<f64>, Vec<f64>) = scored.iter().flatten().copied().unzip();

        if actual.len() < 2 {
            let rows = partition
                .observations
                .iter()
                .map(|o| realized_row(partition, o, vec![CellValue::Null]))
                .collect();
            return Ok(PartitionOutput::skipped(rows));
        }

        let r2 = r_squared_percent(&actual, &predicted)?;
        let rows = partition
            .observations
            .iter()
            .zip(&scored)
            .map(|(o, point)| {
                let cell = point.map_or(CellValue::Null, |_| CellValue::Real(r2));
                realized_row(partition, o, vec![cell])
            })
            .collect();

        Ok(PartitionOutput::computed(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::testing::day;
    use approx::assert_abs_diff_eq;
    use ldp_data::Observation;

    fn observation(offset: i64, value: Option<f64>, prediction: Option<f64>) -> Observation {
        let mut o = Observation::new(day(offset), value);
        o.inputs = vec![prediction];
        o
    }

    #[test]
    fn test_r2_over_scored_rows() {
        let partition = Partition::new(
            "A",
            vec![
                observation(0, Some(10.0), Some(9.9)),
                observation(1, Some(12.0), Some(11.3)),
                observation(2, Some(11.0), Some(12.7)),
                observation(3, Some(15.0), Some(14.1)),
                observation(4, Some(99.0), None),
            ],
        );
        let output = LinearR2Job.compute(&partition).unwrap();

        assert_abs_diff_eq!(output.rows[0].cells[0].as_f64().unwrap(), 70.0, epsilon = 1e-9);
        assert_eq!(output.rows[3].cells, output.rows[0].cells);
        assert_eq!(output.rows[4].cells, vec![CellValue::Null]);
    }

    #[test]
    fn test_needs_two_scored_rows() {
        let partition = Partition::new(
            "A",
            vec![observation(0, Some(1.0), Some(1.0)), observation(1, Some(2.0), None)],
        );
        let output = LinearR2Job.compute(&partition).unwrap();

        assert!(output.skipped);
        assert!(output.rows.iter().all(|r| r.cells[0].is_null()));
    }
}
