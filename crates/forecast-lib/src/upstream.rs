//! Monitoring backend client
//!
//! Thin HTTP client for the Prometheus `query_range` API. All failures
//! map into the stage-error taxonomy at this boundary; nothing here
//! panics or leaks transport errors upward.

use crate::error::StageError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// One raw sample as delivered by the backend: fractional epoch
/// seconds and a value that may still be a malformed or non-finite
/// string. The normalizer owns validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSample(pub f64, pub String);

#[derive(Debug, Deserialize)]
struct RangeResponse {
    status: String,
    #[serde(default)]
    data: Option<RangeData>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default, rename = "errorType")]
    error_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RangeData {
    #[serde(default)]
    result: Vec<RangeResult>,
}

#[derive(Debug, Deserialize)]
struct RangeResult {
    #[serde(default)]
    values: Vec<RawSample>,
}

/// Client for the backend's range-query endpoint
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: Url,
}

impl UpstreamClient {
    /// Build a client with a bounded request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = Url::parse(base_url)?;
        Ok(Self { client, base_url })
    }

    /// Run a range query over `[start, end]` at `step` resolution.
    ///
    /// Returns the raw samples of the first matching series. Multiple
    /// series are a query-shape smell; the extras are dropped with a
    /// warning. An empty result set yields `Ok(vec![])`, which the
    /// orchestrator turns into `NoData`.
    pub async fn range_query(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Vec<RawSample>, StageError> {
        let url = self
            .base_url
            .join("/api/v1/query_range")
            .map_err(|e| StageError::UpstreamQueryError(e.to_string()))?;

        let start_ts = start.timestamp().to_string();
        let end_ts = end.timestamp().to_string();
        let step_param = format!("{}s", step.as_secs());

        debug!(query = %query, start = %start_ts, end = %end_ts, step = %step_param, "Fetching range data");

        let response = self
            .client
            .get(url)
            .query(&[
                ("query", query),
                ("start", start_ts.as_str()),
                ("end", end_ts.as_str()),
                ("step", step_param.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    StageError::UpstreamUnavailable(e.to_string())
                } else {
                    StageError::UpstreamQueryError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StageError::UpstreamQueryError(format!(
                "status {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: RangeResponse = response
            .json()
            .await
            .map_err(|e| StageError::UpstreamQueryError(format!("malformed body: {}", e)))?;

        if parsed.status != "success" {
            return Err(StageError::UpstreamQueryError(format!(
                "backend status '{}': {} - {}",
                parsed.status,
                parsed.error_type.unwrap_or_default(),
                parsed.error.unwrap_or_default()
            )));
        }

        let mut result = parsed.data.map(|d| d.result).unwrap_or_default();
        if result.is_empty() {
            return Ok(Vec::new());
        }
        if result.len() > 1 {
            warn!(
                series = result.len(),
                query = %query,
                "Query returned multiple series, using the first"
            );
        }
        let samples = result.swap_remove(0).values;
        debug!(samples = samples.len(), query = %query, "Fetched range data");
        Ok(samples)
    }
}
