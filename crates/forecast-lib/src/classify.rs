//! Rule-based anomaly classification over forecast points
//!
//! A small ordered table of category rules replaces nested branching:
//! each rule carries a match predicate over the metric's display name
//! and query text, a unit-aware threshold selector, a rate gate, and a
//! severity-tier multiplier. A point is anomalous only when its
//! estimate strictly exceeds the effective threshold.

use crate::models::{AnomalyEvent, ForecastPoint, Severity, TrendLabel};
use crate::targets;
use tracing::warn;

/// Latency threshold when the query is in seconds
pub const LATENCY_THRESHOLD_SECONDS: f64 = 0.1;
/// Latency threshold when the query carries a milliseconds unit
pub const LATENCY_THRESHOLD_MILLISECONDS: f64 = LATENCY_THRESHOLD_SECONDS * 1000.0;
/// Error-rate threshold in errors/second (rate metrics only)
pub const ERROR_RATE_THRESHOLD: f64 = 0.1;
/// Active-user gauge threshold
pub const USER_LOAD_THRESHOLD: f64 = 100.0;
/// Transaction-rate threshold in transactions/second
pub const TRANSACTION_RATE_THRESHOLD: f64 = 50.0;

/// One category rule in the dispatch table.
///
/// Predicates receive the lowercased display name and query text.
pub struct MetricRule {
    /// Short identifier for logs
    pub category: &'static str,
    /// Whether this rule applies to the metric at all
    pub matches: fn(name: &str, query: &str) -> bool,
    /// Effective threshold, unit-sensitive where applicable
    pub threshold: fn(query: &str) -> f64,
    /// Human-readable category label for the anomaly record
    pub label: fn(query: &str) -> &'static str,
    /// Only fire when the query is rate-normalized or a cumulative counter
    pub rate_gated: bool,
    /// Values below `threshold * multiplier` grade as warning,
    /// at or above as critical
    pub severity_multiplier: f64,
}

fn latency_matches(name: &str, _query: &str) -> bool {
    name.contains("latency") || name.contains("duration")
}

fn latency_threshold(query: &str) -> f64 {
    if query.contains("milliseconds") {
        LATENCY_THRESHOLD_MILLISECONDS
    } else {
        LATENCY_THRESHOLD_SECONDS
    }
}

fn latency_label(query: &str) -> &'static str {
    if query.contains("milliseconds") {
        "High Latency (ms)"
    } else {
        "High Latency (s)"
    }
}

fn error_rate_matches(name: &str, query: &str) -> bool {
    name.contains("error rate") || name.contains("500 errors") || query.contains("early_warning_signals")
}

fn error_rate_threshold(_query: &str) -> f64 {
    ERROR_RATE_THRESHOLD
}

fn error_rate_label(_query: &str) -> &'static str {
    "High Error Rate"
}

fn user_load_matches(name: &str, _query: &str) -> bool {
    name.contains("active users")
}

fn user_load_threshold(_query: &str) -> f64 {
    USER_LOAD_THRESHOLD
}

fn user_load_label(_query: &str) -> &'static str {
    "High User Load"
}

fn transaction_rate_matches(name: &str, query: &str) -> bool {
    name.contains("transaction rate")
        || name.contains("transaction service rate")
        || query.contains("transactions_total")
}

fn transaction_rate_threshold(_query: &str) -> f64 {
    TRANSACTION_RATE_THRESHOLD
}

fn transaction_rate_label(_query: &str) -> &'static str {
    "High Transaction Rate"
}

/// Ordered category table; first match wins.
pub static RULES: &[MetricRule] = &[
    MetricRule {
        category: "latency",
        matches: latency_matches,
        threshold: latency_threshold,
        label: latency_label,
        rate_gated: false,
        severity_multiplier: 1.5,
    },
    MetricRule {
        category: "error_rate",
        matches: error_rate_matches,
        threshold: error_rate_threshold,
        label: error_rate_label,
        rate_gated: true,
        severity_multiplier: 2.0,
    },
    MetricRule {
        category: "user_load",
        matches: user_load_matches,
        threshold: user_load_threshold,
        label: user_load_label,
        rate_gated: false,
        severity_multiplier: 1.2,
    },
    MetricRule {
        category: "transaction_rate",
        matches: transaction_rate_matches,
        threshold: transaction_rate_threshold,
        label: transaction_rate_label,
        rate_gated: true,
        severity_multiplier: 1.5,
    },
];

/// A query is rate-like when it is already rate-normalized or built
/// on a cumulative counter.
fn is_rate_like(query: &str) -> bool {
    query.contains("rate(") || query.contains("_total")
}

/// Confidence shrinks as the uncertainty band widens relative to the
/// estimate: `1 - (upper - lower) / (2 * value)`, 0 at value == 0.
/// Deliberately unclamped; a band wider than twice the estimate reads
/// as negative confidence.
fn confidence(point: &ForecastPoint) -> f64 {
    if point.value != 0.0 {
        round2(1.0 - (point.upper - point.lower) / (2.0 * point.value))
    } else {
        0.0
    }
}

fn severity(value: f64, threshold: f64, multiplier: f64) -> Severity {
    if value < threshold * multiplier {
        Severity::Warning
    } else {
        Severity::Critical
    }
}

fn trend_label(trend: f64, acceleration: f64) -> TrendLabel {
    if trend > 0.0 && acceleration > 0.0 {
        TrendLabel::IncreasingRapidly
    } else if trend > 0.0 {
        TrendLabel::IncreasingButSlowing
    } else if trend < 0.0 && acceleration < 0.0 {
        TrendLabel::DecreasingRapidly
    } else if trend < 0.0 {
        TrendLabel::DecreasingButSlowing
    } else {
        TrendLabel::Stable
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Find the applicable rule for a metric, if any.
pub fn rule_for(name: &str, query: &str) -> Option<&'static MetricRule> {
    let lname = name.to_lowercase();
    let lquery = query.to_lowercase();
    RULES.iter().find(|r| (r.matches)(&lname, &lquery))
}

/// Classify forecast points against the metric's category rule.
///
/// Metrics matching no category are never anomalous. Non-anomalous
/// points produce no record.
pub fn classify(points: &[ForecastPoint], metric_name: &str, query: &str) -> Vec<AnomalyEvent> {
    let Some(rule) = rule_for(metric_name, query) else {
        return Vec::new();
    };

    let lquery = query.to_lowercase();
    if rule.rate_gated && !is_rate_like(&lquery) {
        return Vec::new();
    }

    let threshold = (rule.threshold)(&lquery);
    let label = (rule.label)(&lquery);
    let service = targets::service_of(query);

    let mut anomalies = Vec::new();
    for point in points {
        if point.value <= threshold {
            continue;
        }

        let severity = severity(point.value, threshold, rule.severity_multiplier);
        let prediction = match (point.trend, point.acceleration) {
            (Some(t), Some(a)) => Some(trend_label(t, a)),
            _ => None,
        };

        let event = AnomalyEvent {
            timestamp: point.timestamp,
            service: service.to_string(),
            metric_name: metric_name.to_string(),
            query: query.to_string(),
            forecast_value: round4(point.value),
            lower_bound: round4(point.lower),
            upper_bound: round4(point.upper),
            confidence: confidence(point),
            threshold,
            category: label.to_string(),
            severity,
            trend: point.trend.map(round4),
            acceleration: point.acceleration.map(round4),
            prediction,
        };

        warn!(
            event = "anomaly_detected",
            category = %event.category,
            rule = rule.category,
            metric = %event.metric_name,
            service = %event.service,
            timestamp = %event.timestamp,
            forecast_value = event.forecast_value,
            threshold = event.threshold,
            confidence = event.confidence,
            severity = %event.severity,
            prediction = ?event.prediction,
            "Forecast point crossed threshold"
        );

        anomalies.push(event);
    }
    anomalies
}
