//! Query orchestration
//!
//! Drives the per-target pipeline: resolve target, fetch history,
//! normalize, forecast, clip, slice to the requested window, classify.
//! A stage failure for one target becomes error-annotated empty
//! channels for that target only; sibling targets in the same request
//! are unaffected. The response always carries four channels per
//! target (historical echo, forecast, lower bound, upper bound).

use crate::classify;
use crate::error::StageError;
use crate::forecast::{forecast_steps, Forecaster};
use crate::models::{AnomalyEvent, ForecastPoint, QueryRequest, Series, TargetSeries, TimeRange};
use crate::normalize::normalize;
use crate::observability::{ServiceMetrics, StructuredLogger};
use crate::targets::{self, MetricEntry};
use crate::upstream::UpstreamClient;
use chrono::Duration;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Channel name suffixes, in response order
const CHANNEL_SUFFIXES: [&str; 4] = [
    " - Historical",
    " - Forecast",
    " - Forecast Lower",
    " - Forecast Upper",
];

/// Tunables for the pipeline, fixed at startup
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Sampling step for backend range queries
    pub query_step: Duration,
    /// Duration between forecast points
    pub forecast_step: Duration,
    /// Minimum forecast horizon in steps
    pub default_horizon: usize,
    /// History prepended to annotation windows
    pub annotation_lookback: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            query_step: Duration::seconds(60),
            forecast_step: Duration::seconds(60),
            default_horizon: 60,
            annotation_lookback: Duration::days(1),
        }
    }
}

/// Result of one successfully processed target
pub(crate) struct TargetOutput {
    pub(crate) history: Series,
    pub(crate) points: Vec<ForecastPoint>,
    pub(crate) anomalies: Vec<AnomalyEvent>,
}

/// Per-request orchestrator; stateless across requests apart from the
/// immutable catalog, rules and configuration.
pub struct QueryPipeline {
    pub(crate) upstream: UpstreamClient,
    pub(crate) forecaster: Arc<dyn Forecaster>,
    pub(crate) config: PipelineConfig,
    pub(crate) metrics: ServiceMetrics,
    pub(crate) logger: StructuredLogger,
}

impl QueryPipeline {
    pub fn new(
        upstream: UpstreamClient,
        forecaster: Arc<dyn Forecaster>,
        config: PipelineConfig,
        metrics: ServiceMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            upstream,
            forecaster,
            config,
            metrics,
            logger,
        }
    }

    /// Serve one dashboard query. Never fails: every per-target error
    /// is degraded into error channels.
    pub async fn run_query(&self, request: &QueryRequest) -> Vec<TargetSeries> {
        let started = Instant::now();
        let mut channels = Vec::with_capacity(request.targets.len() * 4);
        let mut total_anomalies = 0usize;

        for target in &request.targets {
            let (entry, fell_back) = targets::resolve(&target.target);
            if fell_back {
                warn!(
                    requested = %target.target,
                    using = entry.name,
                    "Unknown target name, falling back to default metric"
                );
            }
            self.metrics.inc_targets_processed();

            match self.process_target(entry, request.range).await {
                Ok(output) => {
                    total_anomalies += output.anomalies.len();
                    self.metrics.add_anomalies_detected(output.anomalies.len());
                    channels.extend(assemble_channels(entry.name, &output));
                }
                Err(err) => {
                    match err {
                        StageError::UpstreamUnavailable(_) | StageError::UpstreamQueryError(_) => {
                            self.metrics.inc_upstream_errors()
                        }
                        _ => self.metrics.inc_forecast_errors(),
                    }
                    self.logger
                        .log_stage_failure(entry.name, err.kind(), &err.to_string());
                    channels.extend(error_channels(entry.name, &err));
                }
            }
        }

        self.logger.log_query(
            request.panel_id,
            request.targets.len(),
            channels.len(),
            total_anomalies,
        );
        self.metrics
            .observe_query_latency(started.elapsed().as_secs_f64());
        channels
    }

    /// Run the fallible stage chain for one resolved target.
    pub(crate) async fn process_target(
        &self,
        entry: MetricEntry,
        range: TimeRange,
    ) -> Result<TargetOutput, StageError> {
        let fetch_started = Instant::now();
        let raw = self
            .upstream
            .range_query(entry.query, range.from, range.to, self.config.query_step.to_std().unwrap_or_default())
            .await?;
        self.metrics
            .observe_upstream_latency(fetch_started.elapsed().as_secs_f64());

        if raw.is_empty() {
            return Err(StageError::NoData);
        }

        let history = normalize(&raw)?;
        let last_historical = history.last_timestamp();

        let steps = forecast_steps(
            last_historical,
            range.to,
            self.config.forecast_step,
            self.config.default_horizon,
        );
        debug!(target = entry.name, steps, "Forecasting");

        let fit_started = Instant::now();
        let mut points = self
            .forecaster
            .forecast(&history, steps, self.config.forecast_step)?;
        self.metrics
            .observe_model_fit_latency(fit_started.elapsed().as_secs_f64());

        // Keep only future points inside the requested window.
        points.retain(|p| {
            p.timestamp > last_historical && p.timestamp >= range.from && p.timestamp <= range.to
        });

        if is_rate_or_count(entry.name) {
            clip_non_negative(&mut points);
        }

        crate::trend::annotate_dynamics(&mut points);

        let anomalies = classify::classify(&points, entry.name, entry.query);

        Ok(TargetOutput {
            history,
            points,
            anomalies,
        })
    }
}

/// Rate/count metrics must not show negative forecasts or bounds.
fn is_rate_or_count(name: &str) -> bool {
    let lname = name.to_lowercase();
    lname.contains("rate") || lname.contains("count")
}

fn clip_non_negative(points: &mut [ForecastPoint]) {
    for p in points.iter_mut() {
        p.value = p.value.max(0.0);
        p.lower = p.lower.max(0.0);
        p.upper = p.upper.max(0.0);
    }
}

/// Build the four populated channels for a successful target.
fn assemble_channels(name: &str, output: &TargetOutput) -> Vec<TargetSeries> {
    let historical = output
        .history
        .samples()
        .iter()
        .map(|s| (s.value, s.timestamp.timestamp_millis()))
        .collect();
    let forecast = output
        .points
        .iter()
        .map(|p| (p.value, p.timestamp.timestamp_millis()))
        .collect();
    let lower = output
        .points
        .iter()
        .map(|p| (p.lower, p.timestamp.timestamp_millis()))
        .collect();
    let upper = output
        .points
        .iter()
        .map(|p| (p.upper, p.timestamp.timestamp_millis()))
        .collect();

    vec![
        TargetSeries::new(format!("{}{}", name, CHANNEL_SUFFIXES[0]), historical),
        TargetSeries::new(format!("{}{}", name, CHANNEL_SUFFIXES[1]), forecast),
        TargetSeries::new(format!("{}{}", name, CHANNEL_SUFFIXES[2]), lower),
        TargetSeries::new(format!("{}{}", name, CHANNEL_SUFFIXES[3]), upper),
    ]
}

/// Build the four error-annotated empty channels for a failed target.
fn error_channels(name: &str, err: &StageError) -> Vec<TargetSeries> {
    let message = err.to_string();
    CHANNEL_SUFFIXES
        .iter()
        .map(|suffix| TargetSeries::errored(format!("{}{}", name, suffix), message.clone()))
        .collect()
}
