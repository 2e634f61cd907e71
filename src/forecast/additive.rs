//! Additive trend + seasonality forecast of the composite index.
//!
//! Fitted with MFLES from `anofox_forecast`, forced into additive mode: a
//! boosted sum of a median baseline, a piecewise linear trend and a Fourier
//! seasonal term. The seasonal period is the longest configured period the
//! history covers at least once.
//!
//! History days carry the in-sample fit with `yhat ± z·σ` bounds, σ being the
//! residual standard deviation. Days past the history carry the model's own
//! intervals, which widen with the horizon.

use anofox_forecast::core::TimeSeries;
use anofox_forecast::models::{Forecaster, MFLES};
use anofox_forecast::utils::quantile_normal;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::config::AdditiveConfig;
use crate::forecast::ForecastPoint;
use crate::model::{Result, WaterError};

/// MFLES refuses shorter series.
pub const MIN_HISTORY: usize = 4;

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Longest configured period (at least 2) that fits inside `len` observations.
pub fn season_length(len: usize, periods: &[usize]) -> Option<usize> {
    periods.iter().copied().filter(|&p| p >= 2 && p <= len).max()
}

/// A fitted additive model.
#[derive(Debug, Clone)]
pub struct AdditiveModel {
    config: AdditiveConfig,
    dates: Vec<NaiveDate>,
    season_length: usize,
    model: MFLES,
}

impl AdditiveModel {
    /// Fits the model to `history`, which must be sorted by date.
    pub fn fit(history: &[(NaiveDate, f64)], config: &AdditiveConfig) -> Result<Self> {
        if !(config.interval_width > 0.0 && config.interval_width < 1.0) {
            return Err(WaterError::InvalidParameter(format!(
                "interval_width must be in (0, 1), got {}",
                config.interval_width
            )));
        }
        if history.len() < MIN_HISTORY {
            return Err(WaterError::InsufficientData {
                needed: MIN_HISTORY,
                got: history.len(),
            });
        }
        if history.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(WaterError::InvalidParameter(
                "history dates must be strictly increasing".to_string(),
            ));
        }
        if history.iter().any(|(_, v)| !v.is_finite()) {
            return Err(WaterError::InvalidParameter(
                "history contains non-finite values".to_string(),
            ));
        }

        let season_length = season_length(history.len(), &config.seasonal_periods).ok_or_else(|| {
            WaterError::InvalidParameter(format!(
                "no seasonal period in {:?} fits {} observations",
                config.seasonal_periods,
                history.len()
            ))
        })?;

        let (dates, values): (Vec<NaiveDate>, Vec<f64>) = history.iter().copied().unzip();
        let series = TimeSeries::univariate(dates.iter().copied().map(midnight).collect(), values)?;

        let mut model = MFLES::new(vec![season_length])
            .with_max_rounds(config.max_rounds)
            .multiplicative(false);
        model.fit(&series)?;

        Ok(Self {
            config: config.clone(),
            dates,
            season_length,
            model,
        })
    }

    pub fn season_length(&self) -> usize {
        self.season_length
    }

    /// Residual standard deviation in original units.
    pub fn sigma(&self) -> f64 {
        let residuals = self.model.residuals().unwrap_or(&[]);
        if residuals.is_empty() {
            return 0.0;
        }
        let n = residuals.len() as f64;
        let mean = residuals.iter().sum::<f64>() / n;
        (residuals.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt()
    }

    /// In-sample fit on every history day.
    pub fn fitted(&self) -> Result<Vec<ForecastPoint>> {
        let fitted = self.model.fitted_values().ok_or(WaterError::InsufficientData {
            needed: MIN_HISTORY,
            got: 0,
        })?;
        let half_width = quantile_normal(0.5 + self.config.interval_width / 2.0) * self.sigma();
        Ok(self
            .dates
            .iter()
            .zip(fitted)
            .map(|(&date, &yhat)| ForecastPoint {
                date,
                yhat,
                yhat_lower: yhat - half_width,
                yhat_upper: yhat + half_width,
            })
            .collect())
    }

    /// The `horizon_days` days after the last history day.
    pub fn predict_future(&self) -> Result<Vec<ForecastPoint>> {
        let horizon = self.config.horizon_days;
        let Some(&last) = self.dates.last() else {
            return Ok(Vec::new());
        };
        if horizon == 0 {
            return Ok(Vec::new());
        }

        let forecast = self
            .model
            .predict_with_intervals(horizon, self.config.interval_width)?;
        let yhat = forecast.primary();
        let (lower, upper) = if forecast.has_lower() && forecast.has_upper() {
            (forecast.lower_series(0)?, forecast.upper_series(0)?)
        } else {
            // A perfect in-sample fit comes back without intervals.
            (yhat, yhat)
        };

        Ok((0..yhat.len())
            .map(|h| ForecastPoint {
                date: last + Duration::days(h as i64 + 1),
                yhat: yhat[h],
                yhat_lower: lower[h],
                yhat_upper: upper[h],
            })
            .collect())
    }

    /// History fit followed by the future horizon.
    pub fn forecast(&self) -> Result<Vec<ForecastPoint>> {
        let mut points = self.fitted()?;
        points.extend(self.predict_future()?);
        Ok(points)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + Duration::days(offset)
    }

    fn noisy_cycle(n: i64) -> Vec<(NaiveDate, f64)> {
        let mut rng = StdRng::seed_from_u64(3);
        (0..n)
            .map(|i| {
                let weekly = (2.0 * std::f64::consts::PI * i as f64 / 7.0).sin();
                (day(i), 0.01 * i as f64 + weekly + rng.gen_range(-0.3..0.3))
            })
            .collect()
    }

    #[test]
    fn test_season_length_picks_longest_covered_period() {
        assert_eq!(season_length(800, &[365, 7]), Some(365));
        assert_eq!(season_length(300, &[365, 7]), Some(7));
        assert_eq!(season_length(5, &[365, 7]), None);
        assert_eq!(season_length(100, &[1]), None);
    }

    #[test]
    fn test_forecast_covers_history_then_horizon() {
        let history = noisy_cycle(200);
        let config = AdditiveConfig {
            horizon_days: 10,
            ..AdditiveConfig::default()
        };
        let model = AdditiveModel::fit(&history, &config).unwrap();
        let forecast = model.forecast().unwrap();

        assert_eq!(model.season_length(), 7);
        assert_eq!(forecast.len(), 210);
        assert_eq!(forecast[0].date, day(0));
        assert_eq!(forecast[199].date, day(199));
        assert_eq!(forecast[200].date, day(200));
        assert_eq!(forecast[209].date, day(209));
        assert!(forecast.iter().all(|p| p.yhat.is_finite()));
    }

    #[test]
    fn test_bounds_bracket_prediction() {
        let model = AdditiveModel::fit(&noisy_cycle(400), &AdditiveConfig::default()).unwrap();

        assert_eq!(model.season_length(), 365);
        assert!(model.sigma() > 0.0);
        for point in model.forecast().unwrap() {
            assert!(point.yhat_lower < point.yhat, "{}", point.date);
            assert!(point.yhat < point.yhat_upper, "{}", point.date);
        }
    }

    #[test]
    fn test_future_intervals_widen() {
        let config = AdditiveConfig {
            horizon_days: 30,
            ..AdditiveConfig::default()
        };
        let model = AdditiveModel::fit(&noisy_cycle(200), &config).unwrap();
        let future = model.predict_future().unwrap();

        assert_eq!(future.len(), 30);
        let width = |p: &ForecastPoint| p.yhat_upper - p.yhat_lower;
        assert!(width(&future[29]) > width(&future[0]));
    }

    #[test]
    fn test_rejects_short_or_unsorted_history() {
        let config = AdditiveConfig::default();
        assert!(matches!(
            AdditiveModel::fit(&[(day(0), 1.0)], &config),
            Err(WaterError::InsufficientData { .. })
        ));
        let unsorted = [(day(1), 1.0), (day(0), 2.0), (day(2), 3.0), (day(3), 4.0)];
        assert!(AdditiveModel::fit(&unsorted, &config).is_err());
    }

    #[test]
    fn test_rejects_bad_interval_width() {
        let config = AdditiveConfig {
            interval_width: 1.0,
            ..AdditiveConfig::default()
        };
        assert!(matches!(
            AdditiveModel::fit(&noisy_cycle(20), &config),
            Err(WaterError::InvalidParameter(_))
        ));
    }
}
