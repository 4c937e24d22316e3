//! Core data models for the forecast service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cleaned observation from the monitoring backend
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// An ordered historical series ready for model fitting.
///
/// Invariants (enforced by the normalizer, the only constructor path):
/// strictly ascending timestamps, no duplicate timestamps, all values
/// finite, at least two samples. Built fresh per query, never persisted.
#[derive(Debug, Clone)]
pub struct Series {
    samples: Vec<Sample>,
}

impl Series {
    /// Construct from samples the normalizer has already validated.
    pub(crate) fn from_validated(samples: Vec<Sample>) -> Self {
        debug_assert!(samples.len() >= 2);
        debug_assert!(samples.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.value)
    }

    /// Timestamp of the most recent historical observation.
    pub fn last_timestamp(&self) -> DateTime<Utc> {
        self.samples[self.samples.len() - 1].timestamp
    }
}

/// A single forecast step with uncertainty bounds.
///
/// `lower <= value <= upper` always holds. `trend` and `acceleration`
/// are populated by the trend analyzer when the forecast window has at
/// least three points, and left unset otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
    pub trend: Option<f64>,
    pub acceleration: Option<f64>,
}

/// Severity grade attached to an anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Qualitative trajectory label derived from trend/acceleration signs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendLabel {
    #[serde(rename = "Increasing rapidly")]
    IncreasingRapidly,
    #[serde(rename = "Increasing but slowing")]
    IncreasingButSlowing,
    #[serde(rename = "Decreasing rapidly")]
    DecreasingRapidly,
    #[serde(rename = "Decreasing but slowing")]
    DecreasingButSlowing,
    #[serde(rename = "Stable")]
    Stable,
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrendLabel::IncreasingRapidly => "Increasing rapidly",
            TrendLabel::IncreasingButSlowing => "Increasing but slowing",
            TrendLabel::DecreasingRapidly => "Decreasing rapidly",
            TrendLabel::DecreasingButSlowing => "Decreasing but slowing",
            TrendLabel::Stable => "Stable",
        };
        write!(f, "{}", s)
    }
}

/// A forecast point that crossed its category threshold.
///
/// Produced per request and returned or logged, never stored.
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyEvent {
    pub timestamp: DateTime<Utc>,
    /// Service identity parsed from the backend query expression
    pub service: String,
    pub metric_name: String,
    pub query: String,
    pub forecast_value: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub confidence: f64,
    pub threshold: f64,
    /// Category label, e.g. "High Latency (ms)"
    pub category: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acceleration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<TrendLabel>,
}

/// An anomaly reshaped for the dashboard's annotation channel
#[derive(Debug, Clone, Serialize)]
pub struct AnnotationEvent {
    /// Millisecond epoch timestamp
    pub time: i64,
    pub title: String,
    pub tags: Vec<String>,
    pub text: String,
}

// Dashboard query protocol (SimpleJSON-shaped) wire types

/// Requested time range, RFC 3339 instants
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// A single requested target within a query
#[derive(Debug, Clone, Deserialize)]
pub struct QueryTarget {
    pub target: String,
    #[serde(rename = "refId")]
    pub ref_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Inbound query payload from the dashboard
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    #[serde(rename = "panelId")]
    pub panel_id: Option<i64>,
    pub range: TimeRange,
    #[serde(rename = "intervalMs")]
    pub interval_ms: Option<i64>,
    pub targets: Vec<QueryTarget>,
    #[serde(rename = "maxDataPoints")]
    pub max_data_points: Option<i64>,
}

/// One named output channel: `[value, epoch_ms]` pairs, or empty with
/// an error message when a pipeline stage failed for its target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetSeries {
    pub target: String,
    pub datapoints: Vec<(f64, i64)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TargetSeries {
    pub fn new(target: impl Into<String>, datapoints: Vec<(f64, i64)>) -> Self {
        Self {
            target: target.into(),
            datapoints,
            error: None,
        }
    }

    pub fn errored(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            datapoints: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// Inbound annotation query payload
#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationRequest {
    pub range: TimeRange,
    /// The annotation definition is opaque to us; the assembler checks
    /// all catalog metrics regardless of its contents.
    pub annotation: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_request_deserializes_dashboard_payload() {
        let payload = serde_json::json!({
            "panelId": 3,
            "range": {"from": "2025-01-01T00:00:00Z", "to": "2025-01-01T01:00:00Z"},
            "intervalMs": 60000,
            "targets": [{"target": "Customer API Active Users", "refId": "A", "type": "timeserie"}],
            "maxDataPoints": 500
        });
        let req: QueryRequest = serde_json::from_value(payload).unwrap();
        assert_eq!(req.targets.len(), 1);
        assert_eq!(req.targets[0].target, "Customer API Active Users");
        assert!(req.range.to > req.range.from);
    }

    #[test]
    fn test_target_series_datapoints_serialize_as_pairs() {
        let series = TargetSeries::new("x - Forecast", vec![(1.5, 1000), (2.5, 2000)]);
        let json = serde_json::to_value(&series).unwrap();
        assert_eq!(json["datapoints"][0][0], 1.5);
        assert_eq!(json["datapoints"][0][1], 1000);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_errored_series_carries_message_and_no_points() {
        let series = TargetSeries::errored("x - Forecast", "no historical data");
        let json = serde_json::to_value(&series).unwrap();
        assert_eq!(json["datapoints"].as_array().unwrap().len(), 0);
        assert_eq!(json["error"], "no historical data");
    }

    #[test]
    fn test_trend_label_display_matches_wire_form() {
        assert_eq!(
            TrendLabel::IncreasingButSlowing.to_string(),
            "Increasing but slowing"
        );
        let json = serde_json::to_value(TrendLabel::DecreasingRapidly).unwrap();
        assert_eq!(json, "Decreasing rapidly");
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Severity::Critical).unwrap(), "critical");
        assert_eq!(Severity::Warning.to_string(), "warning");
    }
}
