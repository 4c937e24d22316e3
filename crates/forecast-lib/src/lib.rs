//! Forecast library for the metrics forecast service
//!
//! This crate provides the core functionality for:
//! - Fetching historical series from the monitoring backend
//! - Series normalization and validation
//! - Trend+seasonality forecasting with uncertainty bounds
//! - Rule-based anomaly classification
//! - Dashboard protocol response and annotation assembly
//! - Health checks and observability

pub mod annotations;
pub mod classify;
pub mod error;
pub mod forecast;
pub mod health;
pub mod models;
pub mod normalize;
pub mod observability;
pub mod pipeline;
pub mod targets;
pub mod trend;
pub mod upstream;

pub use error::StageError;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
pub use pipeline::{PipelineConfig, QueryPipeline};
