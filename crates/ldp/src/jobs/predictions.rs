//! Linear predictions over calendar days, kept in a companion table.

use super::{Job, PartitionOutput, realized_row, sufficient};
use crate::error::Result;
use ldp_data::schema::PREDICTIONS_TABLE;
use ldp_data::{CellValue, Column, OutputRow, Partition};
use ldp_stats::{ForecastCadence, LinearFit, Regression, day_offset, future_dates};
use serde::{Deserialize, Serialize};

/// Configuration for [`LinearPredictionsJob`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearPredictionsConfig {
    /// Days between forecast rows (default: 91)
    pub step_days: u32,
    /// Number of forecast rows per entity (default: 3)
    pub forecast_periods: usize,
}

impl Default for LinearPredictionsConfig {
    fn default() -> Self {
        Self {
            step_days: 91,
            forecast_periods: 3,
        }
    }
}

/// Fits Value against days since the entity's first date and writes the
/// in-sample predictions plus forecasts to `ldp_predictions`.
///
/// Only rows with a value are written. The first date counts rows with a
/// null value; forecasts start after the last row that has one.
#[derive(Debug, Default)]
pub struct LinearPredictionsJob {
    config: LinearPredictionsConfig,
}

impl LinearPredictionsJob {
    /// Create with a configuration.
    pub const fn with_config(config: LinearPredictionsConfig) -> Self {
        Self { config }
    }
}

impl Job for LinearPredictionsJob {
    fn name(&self) -> &'static str {
        "linear-predictions"
    }

    fn description(&self) -> &'static str {
        "Linear fit over days since first observation, with 91-day forecasts into ldp_predictions"
    }

    fn target_table(&self) -> &'static str {
        PREDICTIONS_TABLE
    }

    fn columns(&self) -> &[Column] {
        &[Column::LinearPredictedValue]
    }

    fn regenerates_forecasts(&self) -> bool {
        true
    }

    fn compute(&self, partition: &Partition) -> Result<PartitionOutput> {
        let realized: Vec<_> = partition
            .observations
            .iter()
            .filter(|o| o.value.is_some())
            .collect();
        let (Some(origin), Some(last)) = (partition.first_date(), realized.last().map(|o| o.key_date))
        else {
            // No rows: the writer clears the entity and its forecasts
            return Ok(PartitionOutput::skipped(Vec::new()));
        };

        let x: Vec<f64> = realized.iter().map(|o| day_offset(o.key_date, origin)).collect();
        let y: Vec<f64> = realized.iter().filter_map(|o| o.value).collect();

        let Some(fit) = sufficient(LinearFit::fit(&x, &y))? else {
            let rows = realized
                .iter()
                .map(|o| realized_row(partition, o, vec![CellValue::Null]))
                .collect();
            return Ok(PartitionOutput::skipped(rows));
        };

        let mut rows: Vec<OutputRow> = realized
            .iter()
            .zip(&x)
            .map(|(o, &xi)| realized_row(partition, o, vec![CellValue::Real(fit.predict(xi))]))
            .collect();

        let cadence = ForecastCadence::Days(self.config.step_days);
        rows.extend(
            future_dates(last, cadence, self.config.forecast_periods)
                .into_iter()
                .map(|date| {
                    let prediction = fit.predict(day_offset(date, origin));
                    OutputRow::forecast(
                        date,
                        partition.business_id.clone(),
                        vec![CellValue::Real(prediction)],
                    )
                }),
        );

        Ok(PartitionOutput::computed(rows))
    }
}
