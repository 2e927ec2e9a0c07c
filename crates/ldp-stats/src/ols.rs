//! Ordinary least squares fits.
//!
//! [`LinearFit`] uses the closed form slope `Sxy / Sxx`. [`PolynomialFit`]
//! solves the normal equations `(XᵀX) β = Xᵀy` on a centered and scaled
//! abscissa with Gaussian elimination and partial pivoting.

use crate::{Result, StatsError};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// A fitted model that maps x to a predicted y.
pub trait Regression {
    /// Predict a single point.
    fn predict(&self, x: f64) -> f64;

    /// Predict every point of `xs`.
    fn predict_all(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.predict(x)).collect()
    }
}

/// Straight line `y = intercept + slope · x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    /// Slope
    pub slope: f64,
    /// Intercept
    pub intercept: f64,
}

impl LinearFit {
    /// Fit a line through `(x, y)`.
    ///
    /// # Errors
    /// Requires equal lengths and at least two distinct x values.
    pub fn fit(x: &[f64], y: &[f64]) -> Result<Self> {
        check_lengths(x, y)?;
        let distinct = distinct_count(x);
        if distinct < 2 {
            return Err(StatsError::InsufficientData {
                required: 2,
                actual: distinct,
            });
        }

        let x_view = ArrayView1::from(x);
        let y_view = ArrayView1::from(y);
        let x_mean = x_view.mean().unwrap_or(0.0);
        let y_mean = y_view.mean().unwrap_or(0.0);

        let dx = x_view.mapv(|v| v - x_mean);
        let dy = y_view.mapv(|v| v - y_mean);
        let sxx = dx.dot(&dx);
        let sxy = dx.dot(&dy);

        let slope = sxy / sxx;
        Ok(Self {
            slope,
            intercept: y_mean - slope * x_mean,
        })
    }
}

impl Regression for LinearFit {
    fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Polynomial of fixed degree fitted by least squares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialFit {
    degree: usize,
    shift: f64,
    scale: f64,
    // Coefficients of the transformed abscissa, lowest power first
    coefficients: Vec<f64>,
}

impl PolynomialFit {
    /// Fit a polynomial of `degree` through `(x, y)`.
    ///
    /// # Errors
    /// Requires equal lengths and at least `degree + 1` distinct x values.
    pub fn fit(x: &[f64], y: &[f64], degree: usize) -> Result<Self> {
        check_lengths(x, y)?;
        let distinct = distinct_count(x);
        if distinct < degree + 1 {
            return Err(StatsError::InsufficientData {
                required: degree + 1,
                actual: distinct,
            });
        }

        let shift = ArrayView1::from(x).mean().unwrap_or(0.0);
        let spread = x.iter().map(|v| (v - shift).abs()).fold(0.0, f64::max);
        let scale = if spread > 0.0 { spread } else { 1.0 };

        let design = Array2::from_shape_fn((x.len(), degree + 1), |(i, j)| {
            ((x[i] - shift) / scale).powi(j as i32)
        });
        let targets = ArrayView1::from(y);

        let xtx = design.t().dot(&design);
        let xty = design.t().dot(&targets);
        let coefficients = solve(xtx, xty)?.to_vec();

        Ok(Self {
            degree,
            shift,
            scale,
            coefficients,
        })
    }

    /// Polynomial degree.
    pub const fn degree(&self) -> usize {
        self.degree
    }
}

impl Regression for PolynomialFit {
    fn predict(&self, x: f64) -> f64 {
        let z = (x - self.shift) / self.scale;
        // Horner
        self.coefficients.iter().rev().fold(0.0, |acc, c| acc * z + c)
    }
}

/// Coefficient of determination of `predicted` against `actual`.
///
/// A constant `actual` yields 1.0 when matched exactly and 0.0 otherwise.
pub fn r_squared(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;
    if actual.is_empty() {
        return Err(StatsError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }

    let actual = ArrayView1::from(actual);
    let residuals = &actual - &ArrayView1::from(predicted);
    let ss_res = residuals.dot(&residuals);

    let first = actual[0];
    if actual.iter().all(|&v| v == first) {
        let tolerance = 1e-9 * first.abs().max(1.0);
        let exact = residuals.iter().all(|r| r.abs() <= tolerance);
        return Ok(if exact { 1.0 } else { 0.0 });
    }

    let mean = actual.mean().unwrap_or(0.0);
    let centered = actual.mapv(|v| v - mean);
    let ss_tot = centered.dot(&centered);

    Ok(1.0 - ss_res / ss_tot)
}

/// Coefficient of determination scaled to percent.
pub fn r_squared_percent(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    r_squared(actual, predicted).map(|r| r * 100.0)
}

fn check_lengths(x: &[f64], y: &[f64]) -> Result<()> {
    if x.len() != y.len() {
        return Err(StatsError::LengthMismatch {
            expected: x.len(),
            actual: y.len(),
        });
    }
    Ok(())
}

fn distinct_count(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted.len()
}

fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>> {
    let n = b.len();
    let norm = a.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let tolerance = norm * 1e-12;

    for k in 0..n {
        let pivot = (k..n)
            .max_by(|&i, &j| a[[i, k]].abs().total_cmp(&a[[j, k]].abs()))
            .unwrap_or(k);
        if a[[pivot, k]].abs() <= tolerance {
            return Err(StatsError::DegenerateInput(
                "normal equations are singular".to_string(),
            ));
        }
        if pivot != k {
            for j in 0..n {
                a.swap([k, j], [pivot, j]);
            }
            b.swap(k, pivot);
        }

        for i in (k + 1)..n {
            let factor = a[[i, k]] / a[[k, k]];
            for j in k..n {
                a[[i, j]] -= factor * a[[k, j]];
            }
            b[i] -= factor * b[k];
        }
    }

    let mut solution = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let tail: f64 = ((i + 1)..n).map(|j| a[[i, j]] * solution[j]).sum();
        solution[i] = (b[i] - tail) / a[[i, i]];
    }
    Ok(solution)
}
