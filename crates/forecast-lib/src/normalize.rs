//! Series normalization
//!
//! Turns raw backend samples into a clean, ordered series: parse,
//! drop malformed and non-finite values, sort ascending, deduplicate
//! by timestamp keeping the later-received value. Individual bad
//! samples never fail the stage; only the minimum-length contract can.

use crate::error::StageError;
use crate::models::{Sample, Series};
use crate::upstream::RawSample;
use chrono::DateTime;
use tracing::warn;

/// Minimum valid points required before a series can be forecast
pub const MIN_SERIES_LEN: usize = 2;

/// Normalize raw samples into a [`Series`].
pub fn normalize(raw: &[RawSample]) -> Result<Series, StageError> {
    let mut samples: Vec<Sample> = Vec::with_capacity(raw.len());

    for RawSample(epoch, value_str) in raw {
        let value = match value_str.parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            Ok(v) => {
                warn!(epoch, value = %v, "Dropping non-finite sample");
                continue;
            }
            Err(e) => {
                warn!(epoch, value = %value_str, error = %e, "Dropping unparsable sample");
                continue;
            }
        };

        // Fractional epoch seconds, kept at millisecond precision.
        let millis = (epoch * 1000.0).round() as i64;
        let Some(timestamp) = DateTime::from_timestamp_millis(millis) else {
            warn!(epoch, "Dropping sample with out-of-range timestamp");
            continue;
        };

        samples.push(Sample { timestamp, value });
    }

    // Stable sort keeps arrival order among equal timestamps, so the
    // later-received value ends up last within each run.
    samples.sort_by_key(|s| s.timestamp);

    let mut deduped: Vec<Sample> = Vec::with_capacity(samples.len());
    for sample in samples {
        match deduped.last_mut() {
            Some(last) if last.timestamp == sample.timestamp => *last = sample,
            _ => deduped.push(sample),
        }
    }

    if deduped.len() < MIN_SERIES_LEN {
        return Err(StageError::InsufficientData {
            got: deduped.len(),
            min: MIN_SERIES_LEN,
        });
    }

    Ok(Series::from_validated(deduped))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(f64, &str)]) -> Vec<RawSample> {
        pairs
            .iter()
            .map(|(ts, v)| RawSample(*ts, v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_input_is_insufficient() {
        let err = normalize(&[]).unwrap_err();
        assert!(matches!(
            err,
            StageError::InsufficientData { got: 0, min: 2 }
        ));
    }

    #[test]
    fn test_single_valid_point_is_insufficient() {
        let err = normalize(&raw(&[(100.0, "1.0"), (200.0, "NaN"), (300.0, "oops")]))
            .unwrap_err();
        assert!(matches!(
            err,
            StageError::InsufficientData { got: 1, min: 2 }
        ));
    }

    #[test]
    fn test_malformed_and_non_finite_samples_are_dropped() {
        let series = normalize(&raw(&[
            (100.0, "1.0"),
            (160.0, "not-a-number"),
            (220.0, "inf"),
            (280.0, "-inf"),
            (340.0, "2.0"),
        ]))
        .unwrap();
        assert_eq!(series.len(), 2);
        let values: Vec<f64> = series.values().collect();
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_samples_are_sorted_ascending() {
        let series = normalize(&raw(&[(300.0, "3.0"), (100.0, "1.0"), (200.0, "2.0")])).unwrap();
        let timestamps: Vec<i64> = series
            .samples()
            .iter()
            .map(|s| s.timestamp.timestamp())
            .collect();
        assert_eq!(timestamps, vec![100, 200, 300]);
    }

    #[test]
    fn test_duplicate_timestamp_keeps_later_received_value() {
        let series = normalize(&raw(&[
            (100.0, "1.0"),
            (200.0, "5.0"),
            (200.0, "7.0"),
            (300.0, "3.0"),
        ]))
        .unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.samples()[1].value, 7.0);
    }

    #[test]
    fn test_fractional_epochs_keep_millisecond_precision() {
        let series = normalize(&raw(&[(100.25, "1.0"), (100.75, "2.0")])).unwrap();
        let ms: Vec<i64> = series
            .samples()
            .iter()
            .map(|s| s.timestamp.timestamp_millis())
            .collect();
        assert_eq!(ms, vec![100250, 100750]);
    }
}
