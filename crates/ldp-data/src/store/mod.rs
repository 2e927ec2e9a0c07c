//! Storage layer for the measurement tables.

pub mod sqlite;

pub use sqlite::{ColumnStatus, SqliteStore};
