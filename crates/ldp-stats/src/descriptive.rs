//! Descriptive statistics over a series of values.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    ArrayView1::from(values).mean()
}

/// Sample standard deviation (n - 1 denominator).
///
/// Returns `None` when fewer than two values are given.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    Some(ArrayView1::from(values).std(1.0))
}

/// Closed band `[mean - k·std, mean + k·std]` of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeBand {
    /// Series mean
    pub mean: f64,
    /// Sample standard deviation of the series
    pub std: f64,
    /// Width multiplier
    pub k: f64,
}

impl RangeBand {
    /// Band of `values` with multiplier `k`.
    ///
    /// Returns `None` when the sample standard deviation is undefined.
    pub fn from_values(values: &[f64], k: f64) -> Option<Self> {
        let std = sample_std(values)?;
        let mean = mean(values)?;
        Some(Self { mean, std, k })
    }

    /// Lower edge.
    pub fn lower(&self) -> f64 {
        self.mean - self.k * self.std
    }

    /// Upper edge.
    pub fn upper(&self) -> f64 {
        self.mean + self.k * self.std
    }

    /// Whether `value` lies inside the band, edges included.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower() && value <= self.upper()
    }
}
