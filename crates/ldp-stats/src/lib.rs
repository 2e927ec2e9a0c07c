#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ldp/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod calendar;
pub mod change;
pub mod descriptive;
pub mod ols;

pub use calendar::{ForecastCadence, day_offset, future_dates};
pub use change::{ChangeIndicator, differences, paired_differences};
pub use descriptive::{RangeBand, mean, sample_std};
pub use ols::{LinearFit, PolynomialFit, Regression, r_squared, r_squared_percent};

use thiserror::Error;

/// Errors raised by the statistics primitives.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatsError {
    /// Too few observations for the requested statistic
    #[error("Insufficient data: need at least {required} points, got {actual}")]
    InsufficientData {
        /// Required number of points
        required: usize,
        /// Points available
        actual: usize,
    },

    /// Inputs of different lengths
    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// The system could not be solved
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),
}

/// Result type for statistics operations.
pub type Result<T> = std::result::Result<T, StatsError>;
