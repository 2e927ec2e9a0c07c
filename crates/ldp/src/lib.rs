#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ldp/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod jobs;
pub mod pipeline;
pub mod registry;

// Re-export sub-crates
pub use ldp_data as data;
pub use ldp_stats as stats;

pub use error::{JobError, Result};
pub use jobs::{Job, PartitionOutput};
pub use pipeline::{JobReport, Pipeline, PipelineConfig};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
