//! Stage error taxonomy for the forecast pipeline
//!
//! Every fallible stage returns one of these kinds; the orchestrator
//! converts them into error-annotated empty channels for the affected
//! target instead of letting them escape to the protocol caller.

use thiserror::Error;

/// Errors produced by individual pipeline stages.
#[derive(Debug, Error)]
pub enum StageError {
    /// Network-level failure talking to the monitoring backend
    #[error("monitoring backend unreachable: {0}")]
    UpstreamUnavailable(String),

    /// Backend answered but with a non-success status or malformed payload
    #[error("monitoring backend query failed: {0}")]
    UpstreamQueryError(String),

    /// Backend answered successfully but returned zero samples
    #[error("no historical data available for query")]
    NoData,

    /// Fewer than the minimum valid points survived normalization
    #[error("insufficient data: {got} valid point(s), need at least {min}")]
    InsufficientData { got: usize, min: usize },

    /// Forecasting capability could not produce a model
    #[error("forecasting model unavailable: {0}")]
    ModelUnavailable(String),

    /// Metric name does not resolve to a known backend query
    #[error("unknown metric target: {0}")]
    InvalidTarget(String),
}

impl StageError {
    /// Short operator-facing cause, used in the protocol error field.
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::UpstreamUnavailable(_) => "upstream_unavailable",
            StageError::UpstreamQueryError(_) => "upstream_query_error",
            StageError::NoData => "no_data",
            StageError::InsufficientData { .. } => "insufficient_data",
            StageError::ModelUnavailable(_) => "model_unavailable",
            StageError::InvalidTarget(_) => "invalid_target",
        }
    }
}
