//! Forecast Service - Metrics forecasting and anomaly detection
//!
//! This binary serves the dashboard JSON datasource protocol: it
//! fetches historical series from the monitoring backend, forecasts
//! them forward with uncertainty bounds, classifies threshold
//! crossings, and answers query and annotation requests.

use anyhow::Result;
use forecast_lib::forecast::SeasonalTrendForecaster;
use forecast_lib::health::{components, HealthRegistry};
use forecast_lib::upstream::UpstreamClient;
use forecast_lib::{QueryPipeline, ServiceMetrics, StructuredLogger};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting forecast-service");

    // Load configuration
    let config = config::ServiceConfig::load()?;
    info!(backend = %config.prometheus_url, port = config.api_port, "Service configured");

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::UPSTREAM).await;
    health_registry.register(components::FORECASTER).await;

    // Initialize metrics and structured logger
    let metrics = ServiceMetrics::new();
    let logger = StructuredLogger::new("forecast-service");
    logger.log_startup(SERVICE_VERSION, &config.prometheus_url);

    // Build the query pipeline
    let upstream = UpstreamClient::new(&config.prometheus_url, config.upstream_timeout())?;
    let pipeline = Arc::new(QueryPipeline::new(
        upstream,
        Arc::new(SeasonalTrendForecaster::new()),
        config.pipeline_config(),
        metrics.clone(),
        logger.clone(),
    ));

    // Create shared application state
    let app_state = Arc::new(api::AppState::new(pipeline, health_registry.clone()));

    // Mark service as ready after initialization
    health_registry.set_ready(true).await;

    // Start the API server
    let _api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}
