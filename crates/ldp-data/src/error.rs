//! Error types for data operations.

use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while reading or writing the measurement tables.
#[derive(Debug, Error)]
pub enum DataError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// A `Key Date` cell that is not a recognised date
    #[error("Invalid date {value:?} for business id {business_id}")]
    InvalidDate {
        /// Raw cell content
        value: String,
        /// Entity the row belongs to
        business_id: String,
    },

    /// Table does not exist
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Column required by the read query is missing
    #[error("Missing column {column} in table {table}")]
    MissingColumn {
        /// Table that was queried
        table: String,
        /// Column that was expected
        column: String,
    },

    /// Write plan and table disagree
    #[error("Write error: {0}")]
    Write(String),
}
