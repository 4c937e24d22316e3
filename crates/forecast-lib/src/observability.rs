//! Observability infrastructure for the forecast service
//!
//! Provides:
//! - Prometheus self-instrumentation (query/fit latency, targets
//!   served, anomalies, stage errors)
//! - Structured JSON logging with tracing

use prometheus::{register_histogram, register_int_gauge, Histogram, IntGauge};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    query_latency_seconds: Histogram,
    upstream_latency_seconds: Histogram,
    model_fit_latency_seconds: Histogram,
    targets_processed: IntGauge,
    anomalies_detected: IntGauge,
    annotations_emitted: IntGauge,
    upstream_errors: IntGauge,
    forecast_errors: IntGauge,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            query_latency_seconds: register_histogram!(
                "forecast_service_query_latency_seconds",
                "Time spent serving one dashboard query request",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register query_latency_seconds"),

            upstream_latency_seconds: register_histogram!(
                "forecast_service_upstream_latency_seconds",
                "Time spent fetching history from the monitoring backend",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register upstream_latency_seconds"),

            model_fit_latency_seconds: register_histogram!(
                "forecast_service_model_fit_latency_seconds",
                "Time spent fitting and projecting the forecast model",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register model_fit_latency_seconds"),

            targets_processed: register_int_gauge!(
                "forecast_service_targets_processed_total",
                "Total number of query targets processed"
            )
            .expect("Failed to register targets_processed"),

            anomalies_detected: register_int_gauge!(
                "forecast_service_anomalies_detected_total",
                "Total number of forecast anomalies detected"
            )
            .expect("Failed to register anomalies_detected"),

            annotations_emitted: register_int_gauge!(
                "forecast_service_annotations_emitted_total",
                "Total number of annotation events returned"
            )
            .expect("Failed to register annotations_emitted"),

            upstream_errors: register_int_gauge!(
                "forecast_service_upstream_errors_total",
                "Total number of upstream fetch failures"
            )
            .expect("Failed to register upstream_errors"),

            forecast_errors: register_int_gauge!(
                "forecast_service_forecast_errors_total",
                "Total number of forecast stage failures"
            )
            .expect("Failed to register forecast_errors"),
        }
    }
}

/// Lightweight handle to the global metrics instance; clones share the
/// same underlying registry entries.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_query_latency(&self, duration_secs: f64) {
        self.inner().query_latency_seconds.observe(duration_secs);
    }

    pub fn observe_upstream_latency(&self, duration_secs: f64) {
        self.inner().upstream_latency_seconds.observe(duration_secs);
    }

    pub fn observe_model_fit_latency(&self, duration_secs: f64) {
        self.inner().model_fit_latency_seconds.observe(duration_secs);
    }

    pub fn inc_targets_processed(&self) {
        self.inner().targets_processed.inc();
    }

    pub fn add_anomalies_detected(&self, count: usize) {
        self.inner().anomalies_detected.add(count as i64);
    }

    pub fn add_annotations_emitted(&self, count: usize) {
        self.inner().annotations_emitted.add(count as i64);
    }

    pub fn inc_upstream_errors(&self) {
        self.inner().upstream_errors.inc();
    }

    pub fn inc_forecast_errors(&self) {
        self.inner().forecast_errors.inc();
    }
}

/// Structured logger for service events
///
/// Emits consistent event-tagged records for queries, stage failures
/// and lifecycle transitions.
#[derive(Clone)]
pub struct StructuredLogger {
    service_name: String,
}

impl StructuredLogger {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    /// Log completion of one dashboard query request
    pub fn log_query(&self, panel_id: Option<i64>, targets: usize, channels: usize, anomalies: usize) {
        info!(
            event = "query_served",
            service = %self.service_name,
            panel_id = ?panel_id,
            targets = targets,
            channels = channels,
            anomalies = anomalies,
            "Served dashboard query"
        );
    }

    /// Log a per-target stage failure that was degraded to an error channel
    pub fn log_stage_failure(&self, target: &str, kind: &str, message: &str) {
        warn!(
            event = "stage_failure",
            service = %self.service_name,
            target = %target,
            kind = %kind,
            message = %message,
            "Pipeline stage failed, emitting error channels"
        );
    }

    /// Log completion of an annotation request
    pub fn log_annotations(&self, metrics_checked: usize, events: usize) {
        info!(
            event = "annotations_served",
            service = %self.service_name,
            metrics_checked = metrics_checked,
            events = events,
            "Served annotation query"
        );
    }

    /// Log service startup
    pub fn log_startup(&self, version: &str, backend_url: &str) {
        info!(
            event = "service_started",
            service = %self.service_name,
            version = %version,
            backend_url = %backend_url,
            "Forecast service started"
        );
    }

    /// Log service shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service_name,
            reason = %reason,
            "Forecast service shutting down"
        );
    }
}
