//! Pipeline runner
//!
//! Runs one job through its four stages against a [`SqliteStore`]:
//! schema check, load, per-partition computation and write. The stages are
//! public so callers can drive them one at a time; [`Pipeline::run`]
//! composes them.

use crate::error::{JobError, Result};
use crate::jobs::Job;
use ldp_data::{
    Column, ColumnStatus, MeasurementFrame, NullPolicy, SqliteStore, WritePlan, WriteStrategy,
    WriteSummary,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, warn};

/// Configuration for a pipeline run
///
/// Unset fields fall back to the job's defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Table to read instead of the job's source table
    pub table: Option<String>,
    /// Table to write instead of the job's target table
    pub target_table: Option<String>,
    /// Write strategy (default: targeted)
    pub writer: WriteStrategy,
    /// Null handling instead of the registry's policy for the job
    pub null_policy: Option<NullPolicy>,
}

/// Pipeline stage, reported to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Checking and adding columns
    Schema,
    /// Reading the source table
    Load,
    /// Computing partitions
    Compute,
    /// Writing results
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Schema => "Checking schema",
            Self::Load => "Loading rows",
            Self::Compute => "Computing partitions",
            Self::Write => "Writing results",
        };
        f.write_str(label)
    }
}

/// Output of the compute stage.
#[derive(Debug, Clone)]
pub struct ComputedPlan {
    /// Rows to write
    pub plan: WritePlan,
    /// Partitions processed
    pub partitions: usize,
    /// Partitions with too little data for the statistic
    pub skipped_partitions: usize,
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    /// Job name
    pub job: String,
    /// Table read
    pub source_table: String,
    /// Table written
    pub table: String,
    /// Write strategy used
    pub writer: WriteStrategy,
    /// Null handling applied by the loader
    pub null_policy: NullPolicy,
    /// Rows loaded after null handling
    pub rows_loaded: usize,
    /// Partitions processed
    pub partitions: usize,
    /// Partitions with too little data for the statistic
    pub skipped_partitions: usize,
    /// Realized rows updated or inserted
    pub rows_written: usize,
    /// Forecast rows inserted
    pub forecast_rows: usize,
    /// Earlier forecast rows removed
    pub forecast_rows_removed: usize,
    /// Rows of entities without usable data whose earlier outputs were cleared
    pub rows_cleared: usize,
    /// Columns added by the schema stage
    pub schema_changes: Vec<String>,
}

/// One job bound to a store and a configuration.
#[derive(Debug)]
pub struct Pipeline<'a> {
    store: &'a SqliteStore,
    job: &'a dyn Job,
    config: PipelineConfig,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline.
    pub fn new(store: &'a SqliteStore, job: &'a dyn Job, config: PipelineConfig) -> Self {
        Self { store, job, config }
    }

    /// Table the loader reads.
    pub fn source_table(&self) -> &str {
        self.config
            .table
            .as_deref()
            .unwrap_or_else(|| self.job.source_table())
    }

    /// Table the writer writes.
    ///
    /// Jobs that write back to their source follow a `table` override.
    pub fn target_table(&self) -> &str {
        if let Some(table) = self.config.target_table.as_deref() {
            return table;
        }
        if self.job.target_table() == self.job.source_table() {
            self.source_table()
        } else {
            self.job.target_table()
        }
    }

    /// Null handling applied by the loader.
    pub fn null_policy(&self) -> NullPolicy {
        self.config
            .null_policy
            .unwrap_or_else(|| self.job.null_policy())
    }

    /// Reject overrides that cannot name a table.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("table", &self.config.table),
            ("target_table", &self.config.target_table),
        ] {
            if value.as_deref().is_some_and(|t| t.trim().is_empty()) {
                return Err(JobError::Config(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }

    /// Make sure the target table has every column the job writes.
    ///
    /// Failures are logged and tolerated; a column that is really missing
    /// makes the write stage fail instead. Returns the columns added.
    pub fn ensure_schema(&self) -> Vec<Column> {
        let table = self.target_table();
        let mut added = Vec::new();

        if table != self.source_table() {
            if let Err(e) = self.store.ensure_table(table, self.job.columns()) {
                warn!(table, error = %e, "could not create target table");
            }
        }

        let mut columns = self.job.columns().to_vec();
        if self.job.regenerates_forecasts() {
            columns.push(Column::Forecast);
        }

        for column in columns {
            match self.store.ensure_column(table, column) {
                Ok(ColumnStatus::Added) => added.push(column),
                Ok(ColumnStatus::Existing) => {
                    debug!(table, column = column.name(), "column exists");
                }
                Err(e) => warn!(table, column = column.name(), error = %e, "schema change failed"),
            }
        }

        added
    }

    /// Read the source table with the configured null policy.
    pub fn load(&self) -> Result<MeasurementFrame> {
        let table = self.source_table();
        let policy = self.null_policy();
        info!(job = self.job.name(), table, null_policy = %policy, "loading rows");

        let frame = self.store.load_frame(table, self.job.inputs(), policy)?;
        info!(rows = frame.height(), entities = frame.business_ids().len(), "rows loaded");
        Ok(frame)
    }

    /// Run the job over every partition of the frame.
    pub fn compute(&self, frame: &MeasurementFrame) -> Result<ComputedPlan> {
        let mut plan = WritePlan::new(
            self.target_table(),
            self.job.scope(),
            self.job.columns().to_vec(),
        );
        plan.regenerates_forecasts = self.job.regenerates_forecasts();
        plan.entities = frame.business_ids().to_vec();

        let mut partitions = 0;
        let mut skipped_partitions = 0;
        for partition in frame.partitions()? {
            let output = self.job.compute(&partition)?;
            partitions += 1;
            if output.skipped {
                skipped_partitions += 1;
                info!(
                    job = self.job.name(),
                    business_id = %partition.business_id,
                    rows = partition.len(),
                    "insufficient data, outputs left null"
                );
            } else {
                debug!(business_id = %partition.business_id, rows = output.rows.len(), "partition computed");
            }
            plan.rows.extend(output.rows);
        }

        Ok(ComputedPlan {
            plan,
            partitions,
            skipped_partitions,
        })
    }

    /// Write a plan with the configured strategy.
    pub fn write(&self, plan: &WritePlan) -> Result<WriteSummary> {
        let result = match self.config.writer {
            WriteStrategy::Targeted => self.store.apply_targeted(plan),
            WriteStrategy::Replace => self.store.replace_table(plan),
        };
        result.map_err(|e| {
            error!(job = self.job.name(), table = %plan.table, error = %e, "write failed, transaction rolled back");
            JobError::from(e)
        })
    }

    /// Run every stage.
    pub fn run(&self) -> Result<JobReport> {
        self.run_with_progress(|_| {})
    }

    /// Run every stage, calling `progress` as each one starts.
    pub fn run_with_progress(&self, mut progress: impl FnMut(Stage)) -> Result<JobReport> {
        self.validate()?;

        progress(Stage::Schema);
        let added = self.ensure_schema();

        progress(Stage::Load);
        let frame = self.load()?;

        progress(Stage::Compute);
        let computed = self.compute(&frame)?;

        progress(Stage::Write);
        let summary = self.write(&computed.plan)?;

        let report = JobReport {
            job: self.job.name().to_string(),
            source_table: self.source_table().to_string(),
            table: self.target_table().to_string(),
            writer: self.config.writer,
            null_policy: self.null_policy(),
            rows_loaded: frame.height(),
            partitions: computed.partitions,
            skipped_partitions: computed.skipped_partitions,
            rows_written: summary.rows_updated + summary.rows_inserted,
            forecast_rows: summary.forecast_rows,
            forecast_rows_removed: summary.forecast_rows_removed,
            rows_cleared: summary.rows_cleared,
            schema_changes: added.iter().map(|c| c.name().to_string()).collect(),
        };

        info!(
            job = %report.job,
            table = %report.table,
            partitions = report.partitions,
            skipped = report.skipped_partitions,
            rows_written = report.rows_written,
            forecast_rows = report.forecast_rows,
            "job finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{ChangeJob, LinearPredictionsJob, LinearRegressionJob};

    #[test]
    fn test_tables_follow_overrides() {
        let store = SqliteStore::in_memory().unwrap();

        let job = ChangeJob;
        let config = PipelineConfig {
            table: Some("staging".to_string()),
            ..Default::default()
        };
        let pipeline = Pipeline::new(&store, &job, config);
        assert_eq!(pipeline.source_table(), "staging");
        assert_eq!(pipeline.target_table(), "staging");

        let job = LinearPredictionsJob::default();
        let config = PipelineConfig {
            table: Some("staging".to_string()),
            ..Default::default()
        };
        let pipeline = Pipeline::new(&store, &job, config);
        assert_eq!(pipeline.source_table(), "staging");
        assert_eq!(pipeline.target_table(), "ldp_predictions");
    }

    #[test]
    fn test_empty_table_override_is_rejected() {
        let store = SqliteStore::in_memory().unwrap();
        let job = ChangeJob;
        let config = PipelineConfig {
            target_table: Some("  ".to_string()),
            ..Default::default()
        };

        let pipeline = Pipeline::new(&store, &job, config);
        assert!(matches!(pipeline.run(), Err(JobError::Config(_))));
    }

    #[test]
    fn test_null_policy_override() {
        let store = SqliteStore::in_memory().unwrap();
        let job = ChangeJob;

        let pipeline = Pipeline::new(&store, &job, PipelineConfig::default());
        assert_eq!(pipeline.null_policy(), NullPolicy::FillZero);

        let config = PipelineConfig {
            null_policy: Some(NullPolicy::Drop),
            ..Default::default()
        };
        let pipeline = Pipeline::new(&store, &job, config);
        assert_eq!(pipeline.null_policy(), NullPolicy::Drop);
    }

    #[test]
    fn test_schema_failure_is_not_fatal() {
        let store = SqliteStore::in_memory().unwrap();
        let job = LinearRegressionJob::default();
        let pipeline = Pipeline::new(&store, &job, PipelineConfig::default());

        // No table yet: nothing can be added, and the load stage reports the error
        assert!(pipeline.ensure_schema().is_empty());
        assert!(matches!(
            pipeline.load(),
            Err(JobError::Data(ldp_data::DataError::TableNotFound(_)))
        ));
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(Stage::Write.to_string(), "Writing results");
    }
}
