//! Seasonal decomposition of the index segment: `observed = trend + seasonal + resid`.
//!
//! Backed by STL (LOESS-based seasonal-trend decomposition) from
//! `anofox_forecast`; this module only guards the inputs and summarizes the
//! components for the report.

use anofox_forecast::seasonality::STL;
use serde::Serialize;

use crate::model::{Result, WaterError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decomposition {
    pub period: usize,
    pub observed: Vec<f64>,
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub resid: Vec<f64>,
    /// 0..1, how much of the detrended variance the seasonal component explains.
    pub seasonal_strength: f64,
    pub trend_strength: f64,
}

/// Decomposes `values` with the given period. Needs at least two full periods.
pub fn seasonal_decompose(values: &[f64], period: usize) -> Result<Decomposition> {
    if period < 2 {
        return Err(WaterError::InvalidParameter(format!(
            "seasonal period must be at least 2, got {}",
            period
        )));
    }
    if values.len() < 2 * period {
        return Err(WaterError::InsufficientData {
            needed: 2 * period,
            got: values.len(),
        });
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(WaterError::InvalidParameter(
            "decomposition input contains non-finite values".to_string(),
        ));
    }

    let stl = STL::new(period)
        .decompose(values)
        .ok_or(WaterError::InsufficientData {
            needed: 2 * period,
            got: values.len(),
        })?;

    Ok(Decomposition {
        period,
        observed: values.to_vec(),
        seasonal_strength: stl.seasonal_strength(),
        trend_strength: stl.trend_strength(),
        trend: stl.trend,
        seasonal: stl.seasonal,
        resid: stl.remainder,
    })
}

impl Decomposition {
    /// Peak-to-trough range of the seasonal component.
    pub fn seasonal_amplitude(&self) -> f64 {
        let max = self.seasonal.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = self.seasonal.iter().copied().fold(f64::INFINITY, f64::min);
        max - min
    }

    /// Change in trend between the first and last day.
    pub fn trend_change(&self) -> Option<f64> {
        Some(self.trend.last()? - self.trend.first()?)
    }

    /// Population standard deviation of the residuals.
    pub fn resid_std(&self) -> Option<f64> {
        let resid: Vec<Option<f64>> = self.resid.iter().copied().map(Some).collect();
        crate::analysis::stats::std_dev(&resid, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: usize = 12;

    fn trend_plus_cycle(n: usize, amplitude: f64) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let phase = 2.0 * std::f64::consts::PI * i as f64 / PERIOD as f64;
                10.0 + 0.1 * i as f64 + amplitude * phase.sin()
            })
            .collect()
    }

    #[test]
    fn test_components_add_back_to_observed() {
        let values = trend_plus_cycle(120, 5.0);
        let d = seasonal_decompose(&values, PERIOD).unwrap();

        assert_eq!(d.period, PERIOD);
        assert_eq!(d.trend.len(), values.len());
        for i in 0..values.len() {
            let rebuilt = d.trend[i] + d.seasonal[i] + d.resid[i];
            assert!((rebuilt - values[i]).abs() < 1e-9, "day {}", i);
        }
    }

    #[test]
    fn test_strong_cycle_is_reported() {
        let d = seasonal_decompose(&trend_plus_cycle(120, 5.0), PERIOD).unwrap();

        assert!(d.seasonal_strength > 0.5, "strength {}", d.seasonal_strength);
        let amplitude = d.seasonal_amplitude();
        assert!(amplitude > 5.0 && amplitude < 15.0, "amplitude {}", amplitude);
        // 0.1 per day over 119 days
        let change = d.trend_change().unwrap();
        assert!((change - 11.9).abs() < 3.0, "trend change {}", change);
        assert!(d.resid_std().unwrap() < 2.0);
    }

    #[test]
    fn test_requires_two_full_periods() {
        let result = seasonal_decompose(&trend_plus_cycle(23, 1.0), PERIOD);
        assert!(matches!(
            result,
            Err(WaterError::InsufficientData { needed: 24, got: 23 })
        ));
    }

    #[test]
    fn test_rejects_degenerate_period_and_nan() {
        assert!(matches!(
            seasonal_decompose(&[1.0; 10], 1),
            Err(WaterError::InvalidParameter(_))
        ));
        let mut values = trend_plus_cycle(48, 1.0);
        values[5] = f64::NAN;
        assert!(matches!(
            seasonal_decompose(&values, PERIOD),
            Err(WaterError::InvalidParameter(_))
        ));
    }
}
