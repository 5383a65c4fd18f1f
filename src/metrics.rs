//! Scalar error metrics over paired prediction/target series
//!
//! Provides the four regression error metrics used as fitness signals:
//! - Root-mean-square error (RMSE)
//! - Mean absolute error (MAE)
//! - Median absolute error (robust to outliers)
//! - Coefficient of determination (R²)
//!
//! Every accepted input representation is normalized into one canonical
//! `Array1<f64>` buffer before any arithmetic runs, so all four metrics
//! share a single failure channel.

use ndarray::{Array1, Array2};

use crate::error::{FeatselError, Result};

/// An ordered sequence of numeric values convertible to a canonical buffer.
///
/// Two-dimensional inputs are flattened row-major, so a metric over an
/// `(n, 1)` target matrix and a flat prediction vector of length `n`
/// compares the same `n` pairs. Nested vectors must be rectangular.
pub trait ValueSeries {
    /// Convert to a flat `f64` buffer.
    fn to_buffer(&self) -> Result<Array1<f64>>;
}

impl ValueSeries for Array1<f64> {
    fn to_buffer(&self) -> Result<Array1<f64>> {
        Ok(self.clone())
    }
}

impl ValueSeries for Array2<f64> {
    fn to_buffer(&self) -> Result<Array1<f64>> {
        Ok(Array1::from_iter(self.iter().copied()))
    }
}

impl ValueSeries for [f64] {
    fn to_buffer(&self) -> Result<Array1<f64>> {
        Ok(Array1::from_iter(self.iter().copied()))
    }
}

impl ValueSeries for Vec<f64> {
    fn to_buffer(&self) -> Result<Array1<f64>> {
        self.as_slice().to_buffer()
    }
}

impl ValueSeries for [f32] {
    fn to_buffer(&self) -> Result<Array1<f64>> {
        Ok(Array1::from_iter(self.iter().map(|&v| f64::from(v))))
    }
}

impl ValueSeries for Vec<f32> {
    fn to_buffer(&self) -> Result<Array1<f64>> {
        self.as_slice().to_buffer()
    }
}

impl ValueSeries for Vec<Vec<f64>> {
    fn to_buffer(&self) -> Result<Array1<f64>> {
        let width = self.first().map(|row| row.len()).unwrap_or(0);
        if let Some(bad) = self.iter().find(|row| row.len() != width) {
            return Err(FeatselError::ShapeOrTypeError(format!(
                "ragged nested input: expected row length {}, got {}",
                width,
                bad.len()
            )));
        }
        Ok(Array1::from_iter(self.iter().flatten().copied()))
    }
}

impl<T: ValueSeries + ?Sized> ValueSeries for &T {
    fn to_buffer(&self) -> Result<Array1<f64>> {
        (**self).to_buffer()
    }
}

/// Normalize both series and check they form valid pairs.
fn paired_buffers(
    predicted: &(impl ValueSeries + ?Sized),
    actual: &(impl ValueSeries + ?Sized),
) -> Result<(Array1<f64>, Array1<f64>)> {
    let y_hat = predicted.to_buffer()?;
    let y = actual.to_buffer()?;

    if y_hat.len() != y.len() {
        return Err(FeatselError::ShapeOrTypeError(format!(
            "length mismatch: predicted has {} values, actual has {}",
            y_hat.len(),
            y.len()
        )));
    }
    if y.is_empty() {
        return Err(FeatselError::ShapeOrTypeError(
            "empty series: metrics require at least one pair".to_string(),
        ));
    }

    Ok((y_hat, y))
}

/// Root-mean-square error: √(mean((predicted − actual)²)).
pub fn rmse(
    predicted: &(impl ValueSeries + ?Sized),
    actual: &(impl ValueSeries + ?Sized),
) -> Result<f64> {
    let (y_hat, y) = paired_buffers(predicted, actual)?;
    let n = y.len() as f64;
    let mse = y_hat
        .iter()
        .zip(y.iter())
        .map(|(p, a)| (p - a).powi(2))
        .sum::<f64>()
        / n;
    Ok(mse.sqrt())
}

/// Mean absolute error: mean(|predicted − actual|).
pub fn mean_absolute_error(
    predicted: &(impl ValueSeries + ?Sized),
    actual: &(impl ValueSeries + ?Sized),
) -> Result<f64> {
    let (y_hat, y) = paired_buffers(predicted, actual)?;
    let n = y.len() as f64;
    Ok(y_hat
        .iter()
        .zip(y.iter())
        .map(|(p, a)| (p - a).abs())
        .sum::<f64>()
        / n)
}

/// Median absolute error: median(|predicted − actual|).
///
/// For even-length input the median is the mean of the two middle values.
pub fn median_absolute_error(
    predicted: &(impl ValueSeries + ?Sized),
    actual: &(impl ValueSeries + ?Sized),
) -> Result<f64> {
    let (y_hat, y) = paired_buffers(predicted, actual)?;
    let mut abs_errors: Vec<f64> = y_hat
        .iter()
        .zip(y.iter())
        .map(|(p, a)| (p - a).abs())
        .collect();
    abs_errors.sort_by(|a, b| a.total_cmp(b));

    let mid = abs_errors.len() / 2;
    if abs_errors.len() % 2 == 1 {
        Ok(abs_errors[mid])
    } else {
        Ok((abs_errors[mid - 1] + abs_errors[mid]) / 2.0)
    }
}

/// Coefficient of determination: 1 − (Σ(predicted − actual)² / Σ(actual − mean)²).
///
/// Fails with [`FeatselError::DegenerateVarianceError`] when the actual
/// values are constant, since the denominator is zero.
pub fn r_squared(
    predicted: &(impl ValueSeries + ?Sized),
    actual: &(impl ValueSeries + ?Sized),
) -> Result<f64> {
    let (y_hat, y) = paired_buffers(predicted, actual)?;
    let n = y.len() as f64;
    let y_mean = y.iter().sum::<f64>() / n;

    let ss_res: f64 = y_hat
        .iter()
        .zip(y.iter())
        .map(|(p, a)| (p - a).powi(2))
        .sum();
    let ss_tot: f64 = y.iter().map(|a| (a - y_mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return Err(FeatselError::DegenerateVarianceError);
    }

    Ok(1.0 - ss_res / ss_tot)
}
