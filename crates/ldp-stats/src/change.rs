//! First differences of a series.

use serde::{Deserialize, Serialize};

/// Differences between consecutive values.
///
/// The first element is always 0.0; there is no prior value to compare with.
pub fn differences(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    if !values.is_empty() {
        out.push(0.0);
    }
    out.extend(values.windows(2).map(|w| w[1] - w[0]));
    out
}

/// Differences between neighbours where both values are present.
///
/// Returns `(index, difference)` pairs, `index` being the position of the later value.
pub fn paired_differences(values: &[Option<f64>]) -> Vec<(usize, f64)> {
    values
        .windows(2)
        .enumerate()
        .filter_map(|(i, w)| match (w[0], w[1]) {
            (Some(prev), Some(next)) => Some((i + 1, next - prev)),
            _ => None,
        })
        .collect()
}

/// Direction of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeIndicator {
    /// Negative change
    Down,
    /// No change
    Flat,
    /// Positive change
    Up,
}

impl ChangeIndicator {
    /// Classify a change with strict comparisons against zero.
    pub fn from_change(change: f64) -> Self {
        if change > 0.0 {
            Self::Up
        } else if change < 0.0 {
            Self::Down
        } else {
            Self::Flat
        }
    }

    /// Stored integer code: -1, 0 or 1.
    pub const fn as_i64(&self) -> i64 {
        match self {
            Self::Down => -1,
            Self::Flat => 0,
            Self::Up => 1,
        }
    }
}
