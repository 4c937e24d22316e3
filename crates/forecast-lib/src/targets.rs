//! Metric catalog: display name to backend query resolution
//!
//! The catalog is a static, ordered table fixed at startup. Unknown
//! display names resolve to the configured default entry rather than
//! failing the request.

/// One catalog entry: dashboard display name and its PromQL expression
#[derive(Debug, Clone, Copy)]
pub struct MetricEntry {
    pub name: &'static str,
    pub query: &'static str,
}

/// Display name of the default entry used for unresolvable targets
pub const DEFAULT_METRIC: &str = "Customer API Error Rate Signal";

/// The full metric table, in the order exposed by `list targets`
pub const METRICS: &[MetricEntry] = &[
    MetricEntry {
        name: "Customer API Error Rate Signal",
        query: r#"rate(bank_bank_early_warning_signals_total{service_name="customer-api-service", route="POST:/api/accounts/10002/deposit", signal="ERROR_RATE_APPROACHING_THRESHOLD"}[5m])"#,
    },
    MetricEntry {
        name: "Transaction Service Error Rate Signal",
        query: r#"rate(bank_bank_early_warning_signals_total{service_name="transaction-service", route="POST:/api/transactions", signal="ERROR_RATE_APPROACHING_THRESHOLD"}[5m])"#,
    },
    MetricEntry {
        name: "Transaction Service 500 Errors",
        query: r#"rate(bank_http_server_duration_milliseconds_count{service_name="transaction-service", http_status_code="500", route="POST:/api/transactions"}[5m])"#,
    },
    MetricEntry {
        name: "Customer API Withdrawal p99 Latency",
        query: r#"bank_bank_baseline_latency_seconds{service_name="customer-api-service", route="POST:/api/accounts/10002/withdrawal", p99="0.0509"}"#,
    },
    MetricEntry {
        name: "Cross-Service Latency (Customer->Transaction)",
        query: r#"sum(rate(bank_bank_cross_service_latency_seconds_sum{service_name="transaction-service", route="POST:/api/transactions", source="customer-api-service"}[5m])) / sum(rate(bank_bank_cross_service_latency_seconds_count{service_name="transaction-service", route="POST:/api/transactions", source="customer-api-service"}[5m]))"#,
    },
    MetricEntry {
        name: "Customer API Deposit p50 Latency (ms)",
        query: r#"sum(rate(bank_http_server_duration_milliseconds_sum{service_name="customer-api-service", route="POST:/api/accounts/10001/deposit", http_status_code="200"}[5m])) / sum(rate(bank_http_server_duration_milliseconds_count{service_name="customer-api-service", route="POST:/api/accounts/10001/deposit", http_status_code="200"}[5m]))"#,
    },
    MetricEntry {
        name: "Customer API Active Users",
        query: r#"bank_bank_active_users{service_name="customer-api-service"}"#,
    },
    MetricEntry {
        name: "Transaction Service Rate",
        query: r#"rate(bank_bank_transactions_total{service_name="transaction-service", route="POST:/api/transactions"}[5m])"#,
    },
];

/// Ordered display names for the `list targets` operation.
pub fn metric_names() -> Vec<&'static str> {
    METRICS.iter().map(|m| m.name).collect()
}

/// Look up a display name without any fallback.
pub fn lookup(name: &str) -> Option<MetricEntry> {
    METRICS.iter().copied().find(|m| m.name == name)
}

/// Resolve a requested target, falling back to the default entry for
/// unknown names. Returns the entry actually used and whether a
/// fallback happened (for logging).
pub fn resolve(name: &str) -> (MetricEntry, bool) {
    match lookup(name) {
        Some(entry) => (entry, false),
        None => {
            let default = lookup(DEFAULT_METRIC)
                .unwrap_or(METRICS[0]);
            (default, true)
        }
    }
}

/// Extract the `service_name` label value from a query expression,
/// for tagging anomalies and annotations. "unknown" when absent.
pub fn service_of(query: &str) -> &str {
    const NEEDLE: &str = "service_name=\"";
    if let Some(start) = query.find(NEEDLE) {
        let rest = &query[start + NEEDLE.len()..];
        if let Some(end) = rest.find('"') {
            return &rest[..end];
        }
    }
    "unknown"
}
