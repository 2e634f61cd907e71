//! Forecasting collaborators for the composite index.
//!
//! The index pipeline hands these modules one clean scalar series; they hand
//! back point predictions (and, for the additive model, uncertainty bounds).
//!
//! Submodules:
//! - `lstm` — `rust_lstm` sequence regressor with JSON run checkpoints
//! - `additive` — MFLES trend plus seasonality forecast with bounds
//! - `decompose` — STL seasonal decomposition
//! - `scenario` — post-cutoff scenario multiplication

pub mod additive;
pub mod decompose;
pub mod lstm;
pub mod scenario;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{Result, WaterError};

/// One day of a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

// ---------------------------------------------------------------------------
// Sequences and scaling
// ---------------------------------------------------------------------------

/// Sliding windows: `x[i] = series[i..i + len]`, `y[i] = series[i + len]`.
pub fn create_sequences(series: &[f64], seq_length: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    if seq_length == 0 || series.len() <= seq_length {
        return (Vec::new(), Vec::new());
    }
    (0..series.len() - seq_length)
        .map(|i| (series[i..i + seq_length].to_vec(), series[i + seq_length]))
        .unzip()
}

/// Maps the fitted range onto [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub min: f64,
    pub max: f64,
}

impl MinMaxScaler {
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(WaterError::InsufficientData { needed: 1, got: 0 });
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok(Self { min, max })
    }

    fn range(&self) -> f64 {
        let range = self.max - self.min;
        if range.abs() < 1e-12 { 1.0 } else { range }
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.min) / self.range()
    }

    pub fn inverse(&self, scaled: f64) -> f64 {
        scaled * self.range() + self.min
    }
}

// ---------------------------------------------------------------------------
// Accuracy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyMetrics {
    pub rmse: f64,
    pub mae: f64,
}

pub fn accuracy(actual: &[f64], predicted: &[f64]) -> Result<AccuracyMetrics> {
    if actual.is_empty() {
        return Err(WaterError::InsufficientData { needed: 1, got: 0 });
    }
    if actual.len() != predicted.len() {
        return Err(WaterError::InvalidParameter(format!(
            "{} actual values but {} predictions",
            actual.len(),
            predicted.len()
        )));
    }
    let n = actual.len() as f64;
    let mse = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / n;
    let mae = actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).sum::<f64>() / n;
    Ok(AccuracyMetrics { rmse: mse.sqrt(), mae })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_sequences_windows() {
        let series: Vec<f64> = (0..6).map(|v| v as f64).collect();
        let (x, y) = create_sequences(&series, 3);
        assert_eq!(x, vec![vec![0.0, 1.0, 2.0], vec![1.0, 2.0, 3.0], vec![2.0, 3.0, 4.0]]);
        assert_eq!(y, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_create_sequences_too_short_is_empty() {
        let (x, y) = create_sequences(&[1.0, 2.0], 2);
        assert!(x.is_empty() && y.is_empty());
    }

    #[test]
    fn test_min_max_scaler_inverts() {
        let scaler = MinMaxScaler::fit(&[-2.0, 0.0, 6.0]).unwrap();
        assert_eq!(scaler.transform(-2.0), 0.0);
        assert_eq!(scaler.transform(6.0), 1.0);
        assert!((scaler.inverse(scaler.transform(1.5)) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_constant_series_scales_without_dividing_by_zero() {
        let scaler = MinMaxScaler::fit(&[3.0, 3.0]).unwrap();
        assert_eq!(scaler.transform(3.0), 0.0);
    }

    #[test]
    fn test_accuracy_metrics() {
        let m = accuracy(&[1.0, 2.0, 3.0], &[1.0, 2.0, 6.0]).unwrap();
        assert!((m.rmse - 3.0f64.sqrt()).abs() < 1e-12);
        assert!((m.mae - 1.0).abs() < 1e-12);
        assert!(accuracy(&[1.0], &[]).is_err());
    }
}
