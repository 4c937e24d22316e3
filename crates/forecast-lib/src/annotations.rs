//! Annotation assembly
//!
//! Re-runs the normalize -> forecast -> classify pipeline over a
//! widened lookback window for every catalog metric, restricts the
//! classification to the requested range, and reshapes anomalies into
//! dashboard annotation events. Annotations are additive: metrics
//! without usable history or forecast are skipped silently.

use crate::models::{AnnotationEvent, AnnotationRequest, AnomalyEvent, TimeRange};
use crate::pipeline::QueryPipeline;
use crate::targets;
use tracing::debug;

impl QueryPipeline {
    /// Serve one annotation query. Never fails; per-metric problems
    /// only shrink the result.
    pub async fn run_annotations(&self, request: &AnnotationRequest) -> Vec<AnnotationEvent> {
        let mut events = Vec::new();
        let lookback_range = TimeRange {
            from: request.range.from - self.config.annotation_lookback,
            to: request.range.to,
        };

        for entry in targets::METRICS {
            let output = match self.process_target(*entry, lookback_range).await {
                Ok(output) => output,
                Err(err) => {
                    debug!(
                        metric = entry.name,
                        kind = err.kind(),
                        "Skipping metric for annotations"
                    );
                    continue;
                }
            };

            events.extend(
                output
                    .anomalies
                    .iter()
                    .filter(|a| {
                        a.timestamp >= request.range.from && a.timestamp <= request.range.to
                    })
                    .map(to_annotation),
            );
        }

        self.metrics.add_annotations_emitted(events.len());
        self.logger
            .log_annotations(targets::METRICS.len(), events.len());
        events
    }
}

/// Reshape an anomaly into a discrete annotation event.
pub fn to_annotation(anomaly: &AnomalyEvent) -> AnnotationEvent {
    AnnotationEvent {
        time: anomaly.timestamp.timestamp_millis(),
        title: format!("Anomaly: {}", anomaly.category),
        tags: vec![
            anomaly.service.clone(),
            anomaly.metric_name.clone(),
            "forecast".to_string(),
        ],
        text: format!(
            "Metric: {}\nService: {}\nForecasted Value: {:.4}\nThreshold: {}\nConfidence: ({:.4} - {:.4})",
            anomaly.metric_name,
            anomaly.service,
            anomaly.forecast_value,
            anomaly.threshold,
            anomaly.lower_bound,
            anomaly.upper_bound,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_annotation_reshaping() {
        let anomaly = AnomalyEvent {
            timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            service: "customer-api-service".to_string(),
            metric_name: "Customer API Deposit p50 Latency (ms)".to_string(),
            query: "q".to_string(),
            forecast_value: 310.1234,
            lower_bound: 295.0,
            upper_bound: 326.0,
            confidence: 0.95,
            threshold: 100.0,
            category: "High Latency (ms)".to_string(),
            severity: Severity::Critical,
            trend: Some(2.0),
            acceleration: Some(-1.0),
            prediction: None,
        };

        let annotation = to_annotation(&anomaly);
        assert_eq!(annotation.time, 1_735_689_600_000);
        assert_eq!(annotation.title, "Anomaly: High Latency (ms)");
        assert_eq!(
            annotation.tags,
            vec![
                "customer-api-service".to_string(),
                "Customer API Deposit p50 Latency (ms)".to_string(),
                "forecast".to_string()
            ]
        );
        assert!(annotation.text.contains("Forecasted Value: 310.1234"));
        assert!(annotation.text.contains("Threshold: 100"));
        assert!(annotation.text.contains("(295.0000 - 326.0000)"));
    }
}
