//! Linear and quadratic trend regressions with forecast rows.
//!
//! The x axis is the zero-based position of a row in its date-sorted
//! partition, counting rows with a null value. The fit uses the rows that
//! have a value; predictions are written for every row. Forecast rows
//! continue the index after the last row and carry the predictions and the
//! R² of the in-sample fit.

use super::{Job, PartitionOutput, broadcast_rows, realized_row, sufficient};
use crate::error::Result;
use ldp_data::schema::BACKUP_TABLE;
use ldp_data::{CellValue, Column, OutputRow, Partition};
use ldp_stats::{
    ForecastCadence, LinearFit, PolynomialFit, Regression, future_dates, r_squared_percent,
};
use serde::{Deserialize, Serialize};

/// Configuration for the regression jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionConfig {
    /// Number of forecast rows per entity (default: 3)
    pub forecast_periods: usize,
    /// Spacing of forecast dates (default: quarter ends)
    pub cadence: ForecastCadence,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            forecast_periods: 3,
            cadence: ForecastCadence::QuarterEnd,
        }
    }
}

/// Index and value of every row that has a value.
fn indexed_points(partition: &Partition) -> (Vec<f64>, Vec<f64>) {
    partition
        .observations
        .iter()
        .enumerate()
        .filter_map(|(i, o)| Some((i as f64, o.value?)))
        .unzip()
}

/// Forecast rows after the partition's last date, x continuing the row index.
fn forecast_rows(
    partition: &Partition,
    config: &RegressionConfig,
    cells: impl Fn(f64) -> Vec<CellValue>,
) -> Vec<OutputRow> {
    let Some(last) = partition.last_date() else {
        return Vec::new();
    };
    let start = partition.len();
    future_dates(last, config.cadence, config.forecast_periods)
        .into_iter()
        .enumerate()
        .map(|(k, date)| {
            OutputRow::forecast(date, partition.business_id.clone(), cells((start + k) as f64))
        })
        .collect()
}

/// Linear trend over the row index (`LinearPredictedValue`, `LinearBestimmtheitsgrad`).
#[derive(Debug, Default)]
pub struct LinearRegressionJob {
    config: RegressionConfig,
}

impl LinearRegressionJob {
    /// Create with a configuration.
    pub const fn with_config(config: RegressionConfig) -> Self {
        Self { config }
    }
}

impl Job for LinearRegressionJob {
    fn name(&self) -> &'static str {
        "linear-regression"
    }

    fn description(&self) -> &'static str {
        "Linear trend over the row index with R² and quarterly forecasts"
    }

    fn columns(&self) -> &[Column] {
        &[Column::LinearPredictedValue, Column::LinearBestimmtheitsgrad]
    }

    fn regenerates_forecasts(&self) -> bool {
        true
    }

    fn compute(&self, partition: &Partition) -> Result<PartitionOutput> {
        let (x, y) = indexed_points(partition);
        let Some(fit) = sufficient(LinearFit::fit(&x, &y))? else {
            return Ok(PartitionOutput::skipped(broadcast_rows(
                partition,
                &[CellValue::Null, CellValue::Null],
            )));
        };
        let r2 = r_squared_percent(&y, &fit.predict_all(&x))?;
        let cells = |x: f64| vec![CellValue::Real(fit.predict(x)), CellValue::Real(r2)];

        let mut rows: Vec<OutputRow> = partition
            .observations
            .iter()
            .enumerate()
            .map(|(i, o)| realized_row(partition, o, cells(i as f64)))
            .collect();
        rows.extend(forecast_rows(partition, &self.config, cells));

        Ok(PartitionOutput::computed(rows))
    }
}

/// Linear and quadratic trends over the row index on the `backup` table.
///
/// The quadratic fit needs three distinct points; with only two, the
/// quadratic columns stay null while the linear ones are written.
#[derive(Debug, Default)]
pub struct QuadraticRegressionJob {
    config: RegressionConfig,
}

impl QuadraticRegressionJob {
    /// Create with a configuration.
    pub const fn with_config(config: RegressionConfig) -> Self {
        Self { config }
    }
}

impl Job for QuadraticRegressionJob {
    fn name(&self) -> &'static str {
        "quadratic-regression"
    }

    fn description(&self) -> &'static str {
        "Linear and quadratic trends over the row index with R² and quarterly forecasts"
    }

    fn source_table(&self) -> &'static str {
        BACKUP_TABLE
    }

    fn columns(&self) -> &[Column] {
        &[
            Column::LinearPredictedValue,
            Column::QuadratischePredictedValue,
            Column::LinearBestimmtheitsgrad,
            Column::QuadratischBestimmtheitsgrad,
        ]
    }

    fn regenerates_forecasts(&self) -> bool {
        true
    }

    fn compute(&self, partition: &Partition) -> Result<PartitionOutput> {
        let (x, y) = indexed_points(partition);
        let Some(linear) = sufficient(LinearFit::fit(&x, &y))? else {
            return Ok(PartitionOutput::skipped(broadcast_rows(
                partition,
                &[CellValue::Null; 4],
            )));
        };
        let quadratic = sufficient(PolynomialFit::fit(&x, &y, 2))?;

        let linear_r2 = r_squared_percent(&y, &linear.predict_all(&x))?;
        let quadratic_r2 = quadratic
            .as_ref()
            .map(|q| r_squared_percent(&y, &q.predict_all(&x)))
            .transpose()?;

        let cells = |x: f64| {
            vec![
                CellValue::Real(linear.predict(x)),
                CellValue::from(quadratic.as_ref().map(|q| q.predict(x))),
                CellValue::Real(linear_r2),
                CellValue::from(quadratic_r2),
            ]
        };

        let mut rows: Vec<OutputRow> = partition
            .observations
            .iter()
            .enumerate()
            .map(|(i, o)| realized_row(partition, o, cells(i as f64)))
            .collect();
        rows.extend(forecast_rows(partition, &self.config, cells));

        Ok(PartitionOutput::computed(rows))
    }
}
