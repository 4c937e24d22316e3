//! Forecast generation
//!
//! Fits a trend-plus-seasonality model with uncertainty bounds to a
//! normalized series and projects it forward a computed number of
//! steps. The model is a closed-form least-squares fit: linear trend
//! over the sample index, plus a daily seasonal profile derived from
//! per-phase residual means when the series covers at least two
//! periods. Bounds are z-scaled residual deviation, widening with
//! horizon distance.

use crate::error::StageError;
use crate::models::{ForecastPoint, Series};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Fixed margin added on top of the steps needed to reach the
/// requested end time
pub const SAFETY_MARGIN_STEPS: usize = 5;

/// z-score for the uncertainty band (~95% under normal residuals)
const CONFIDENCE_Z: f64 = 1.96;

/// Seasonal cycle length the model looks for
const SEASONAL_CYCLE: Duration = Duration::days(1);

/// Minimum full cycles of history before seasonality is fit
const MIN_SEASONAL_CYCLES: usize = 2;

/// Seam for forecast implementations.
pub trait Forecaster: Send + Sync {
    /// Emit exactly `steps` forecast points at `step` spacing after
    /// the series' last historical timestamp.
    fn forecast(
        &self,
        series: &Series,
        steps: usize,
        step: Duration,
    ) -> Result<Vec<ForecastPoint>, StageError>;
}

/// Number of forecast steps needed to reach `requested_end`.
///
/// When the requested end lies beyond the last historical point, the
/// gap is divided by the step frequency, rounded up, padded with the
/// safety margin, and floored at the default horizon. Otherwise the
/// default horizon is used as-is.
pub fn forecast_steps(
    last_historical: DateTime<Utc>,
    requested_end: DateTime<Utc>,
    step: Duration,
    default_horizon: usize,
) -> usize {
    let step_ms = step.num_milliseconds();
    if requested_end <= last_historical || step_ms <= 0 {
        return default_horizon;
    }
    let gap_ms = (requested_end - last_historical).num_milliseconds();
    let needed = ((gap_ms + step_ms - 1) / step_ms) as usize + SAFETY_MARGIN_STEPS;
    default_horizon.max(needed)
}

/// Least-squares trend + daily seasonal profile forecaster
#[derive(Debug, Clone, Default)]
pub struct SeasonalTrendForecaster;

impl SeasonalTrendForecaster {
    pub fn new() -> Self {
        Self
    }

    fn fit_trend(values: &[f64]) -> (f64, f64) {
        let n = values.len() as f64;
        let sum_x: f64 = (0..values.len()).map(|i| i as f64).sum();
        let sum_y: f64 = values.iter().sum();
        let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
        let sum_x2: f64 = (0..values.len()).map(|i| (i as f64).powi(2)).sum();
        let denom = n * sum_x2 - sum_x.powi(2);
        if denom.abs() < f64::EPSILON {
            return (0.0, sum_y / n);
        }
        let slope = (n * sum_xy - sum_x * sum_y) / denom;
        let intercept = (sum_y - slope * sum_x) / n;
        (slope, intercept)
    }

    /// Per-phase mean of residuals, or `None` when the series does not
    /// cover enough full cycles for the profile to be meaningful.
    fn fit_seasonal(residuals: &[f64], step: Duration) -> Option<Vec<f64>> {
        let step_ms = step.num_milliseconds();
        if step_ms <= 0 {
            return None;
        }
        let period = (SEASONAL_CYCLE.num_milliseconds() / step_ms) as usize;
        if period < 2 || residuals.len() < period * MIN_SEASONAL_CYCLES {
            return None;
        }
        let mut sums = vec![0.0f64; period];
        let mut counts = vec![0usize; period];
        for (i, r) in residuals.iter().enumerate() {
            sums[i % period] += r;
            counts[i % period] += 1;
        }
        Some(
            sums.iter()
                .zip(&counts)
                .map(|(s, c)| if *c > 0 { s / *c as f64 } else { 0.0 })
                .collect(),
        )
    }

    fn residual_sigma(residuals: &[f64]) -> f64 {
        if residuals.len() < 2 {
            return 0.0;
        }
        let mean: f64 = residuals.iter().sum::<f64>() / residuals.len() as f64;
        let var: f64 = residuals.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
            / (residuals.len() - 1) as f64;
        var.sqrt()
    }
}

impl Forecaster for SeasonalTrendForecaster {
    fn forecast(
        &self,
        series: &Series,
        steps: usize,
        step: Duration,
    ) -> Result<Vec<ForecastPoint>, StageError> {
        let values: Vec<f64> = series.values().collect();
        let n = values.len();

        let (slope, intercept) = Self::fit_trend(&values);
        if !slope.is_finite() || !intercept.is_finite() {
            return Err(StageError::ModelUnavailable(
                "degenerate trend fit".to_string(),
            ));
        }

        let trend_residuals: Vec<f64> = values
            .iter()
            .enumerate()
            .map(|(i, y)| y - (intercept + slope * i as f64))
            .collect();

        let seasonal = Self::fit_seasonal(&trend_residuals, step);
        let deseasonalized: Vec<f64> = match &seasonal {
            Some(profile) => trend_residuals
                .iter()
                .enumerate()
                .map(|(i, r)| r - profile[i % profile.len()])
                .collect(),
            None => trend_residuals,
        };
        let sigma = Self::residual_sigma(&deseasonalized);

        debug!(
            samples = n,
            steps,
            slope,
            seasonal = seasonal.is_some(),
            sigma,
            "Fitted forecast model"
        );

        let last_ts = series.last_timestamp();
        let mut points = Vec::with_capacity(steps);
        for k in 1..=steps {
            let idx = (n - 1 + k) as f64;
            let seasonal_part = seasonal
                .as_ref()
                .map(|p| p[(n - 1 + k) % p.len()])
                .unwrap_or(0.0);
            let value = intercept + slope * idx + seasonal_part;
            // Band widens with distance from the last observation.
            let half_width = CONFIDENCE_Z * sigma * (1.0 + k as f64 / n as f64).sqrt();
            points.push(ForecastPoint {
                timestamp: last_ts + step * k as i32,
                value,
                lower: value - half_width,
                upper: value + half_width,
                trend: None,
                acceleration: None,
            });
        }
        Ok(points)
    }
}

/// Forecaster stub for the degraded mode where no model backend is
/// present; every call surfaces as "forecast unavailable".
#[derive(Debug, Clone, Default)]
pub struct UnavailableForecaster;

impl Forecaster for UnavailableForecaster {
    fn forecast(
        &self,
        _series: &Series,
        _steps: usize,
        _step: Duration,
    ) -> Result<Vec<ForecastPoint>, StageError> {
        Err(StageError::ModelUnavailable(
            "forecasting backend not present".to_string(),
        ))
    }
}
