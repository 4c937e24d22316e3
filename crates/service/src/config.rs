//! Service configuration

use anyhow::Result;
use forecast_lib::PipelineConfig;
use serde::Deserialize;

/// Forecast service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the monitoring backend
    #[serde(default = "default_prometheus_url")]
    pub prometheus_url: String,

    /// API server port for the dashboard protocol and health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Sampling step for backend range queries, in seconds
    #[serde(default = "default_query_step")]
    pub query_step_secs: u64,

    /// Duration between forecast points, in seconds
    #[serde(default = "default_forecast_step")]
    pub forecast_step_secs: u64,

    /// Minimum forecast horizon in steps
    #[serde(default = "default_horizon")]
    pub default_horizon_steps: usize,

    /// History prepended to annotation windows, in seconds
    #[serde(default = "default_annotation_lookback")]
    pub annotation_lookback_secs: u64,

    /// Request timeout for backend queries, in seconds
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,
}

fn default_prometheus_url() -> String {
    "http://localhost:9090".to_string()
}

fn default_api_port() -> u16 {
    8088
}

fn default_query_step() -> u64 {
    60
}

fn default_forecast_step() -> u64 {
    60
}

fn default_horizon() -> usize {
    60
}

fn default_annotation_lookback() -> u64 {
    86_400
}

fn default_upstream_timeout() -> u64 {
    30
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            prometheus_url: default_prometheus_url(),
            api_port: default_api_port(),
            query_step_secs: default_query_step(),
            forecast_step_secs: default_forecast_step(),
            default_horizon_steps: default_horizon(),
            annotation_lookback_secs: default_annotation_lookback(),
            upstream_timeout_secs: default_upstream_timeout(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("FORECAST"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            query_step: chrono::Duration::seconds(self.query_step_secs as i64),
            forecast_step: chrono::Duration::seconds(self.forecast_step_secs as i64),
            default_horizon: self.default_horizon_steps,
            annotation_lookback: chrono::Duration::seconds(self.annotation_lookback_secs as i64),
        }
    }

    pub fn upstream_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.upstream_timeout_secs)
    }
}
