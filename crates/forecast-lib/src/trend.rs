//! Trend and acceleration derivation over forecast points
//!
//! First differences of the point estimates give velocity, second
//! differences give acceleration. The tail entries with no look-ahead
//! repeat the last computed difference so every point carries a value.
//! Fewer than three points leaves both unset; the classifier treats
//! absent dynamics as absent, not zero.

use crate::models::ForecastPoint;

/// Minimum points for differences to be meaningful
pub const MIN_POINTS_FOR_DYNAMICS: usize = 3;

/// Annotate forecast points in place with trend and acceleration.
pub fn annotate_dynamics(points: &mut [ForecastPoint]) {
    let n = points.len();
    if n < MIN_POINTS_FOR_DYNAMICS {
        return;
    }

    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let diffs: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let accels: Vec<f64> = diffs.windows(2).map(|w| w[1] - w[0]).collect();

    for (i, point) in points.iter_mut().enumerate() {
        // Last one (trend) and last two (acceleration) reuse the
        // final computed difference.
        point.trend = Some(diffs[i.min(diffs.len() - 1)]);
        point.acceleration = Some(accels[i.min(accels.len() - 1)]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn points_from(values: &[f64]) -> Vec<ForecastPoint> {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| ForecastPoint {
                timestamp: base + Duration::seconds(60 * i as i64),
                value: *v,
                lower: *v - 1.0,
                upper: *v + 1.0,
                trend: None,
                acceleration: None,
            })
            .collect()
    }

    #[test]
    fn test_fewer_than_three_points_leaves_dynamics_unset() {
        let mut points = points_from(&[1.0, 2.0]);
        annotate_dynamics(&mut points);
        assert!(points.iter().all(|p| p.trend.is_none()));
        assert!(points.iter().all(|p| p.acceleration.is_none()));
    }

    #[test]
    fn test_differences_and_tail_padding() {
        // values 1, 3, 6 -> diffs [2, 3] -> accel [1]
        let mut points = points_from(&[1.0, 3.0, 6.0]);
        annotate_dynamics(&mut points);
        assert_eq!(points[0].trend, Some(2.0));
        assert_eq!(points[1].trend, Some(3.0));
        assert_eq!(points[2].trend, Some(3.0)); // padded
        assert_eq!(points[0].acceleration, Some(1.0));
        assert_eq!(points[1].acceleration, Some(1.0)); // padded
        assert_eq!(points[2].acceleration, Some(1.0)); // padded
    }

    #[test]
    fn test_longer_window_pads_only_the_tail() {
        // values 0, 2, 3, 3 -> diffs [2, 1, 0] -> accel [-1, -1]
        let mut points = points_from(&[0.0, 2.0, 3.0, 3.0]);
        annotate_dynamics(&mut points);
        assert_eq!(points[0].trend, Some(2.0));
        assert_eq!(points[1].trend, Some(1.0));
        assert_eq!(points[2].trend, Some(0.0));
        assert_eq!(points[3].trend, Some(0.0)); // padded
        assert_eq!(points[0].acceleration, Some(-1.0));
        assert_eq!(points[1].acceleration, Some(-1.0));
        assert_eq!(points[2].acceleration, Some(-1.0)); // padded
        assert_eq!(points[3].acceleration, Some(-1.0)); // padded
    }
}
