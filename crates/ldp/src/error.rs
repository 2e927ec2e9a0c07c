//! Error types for job execution.

use ldp_data::DataError;
use ldp_stats::StatsError;
use thiserror::Error;

/// Result type for job operations.
pub type Result<T> = std::result::Result<T, JobError>;

/// Errors that end a job run.
#[derive(Debug, Error)]
pub enum JobError {
    /// Reading or writing the database failed
    #[error(transparent)]
    Data(#[from] DataError),

    /// A statistic could not be computed for a reason other than missing data
    #[error("Statistics error: {0}")]
    Stats(#[from] StatsError),

    /// No job is registered under the name
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    /// Invalid pipeline configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}
