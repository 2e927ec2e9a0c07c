#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ldp/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod frame;
pub mod record;
pub mod schema;
pub mod store;
pub mod write;

pub use error::{DataError, Result};
pub use frame::{MeasurementFrame, RawMeasurement};
pub use record::{BusinessId, NullPolicy, Observation, Partition};
pub use schema::{Column, KeyScope};
pub use store::{ColumnStatus, SqliteStore};
pub use write::{CellValue, OutputRow, WritePlan, WriteStrategy, WriteSummary};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
