//! End-to-end pipeline tests against a stubbed monitoring backend

use chrono::{DateTime, Utc};
use forecast_lib::forecast::{SeasonalTrendForecaster, UnavailableForecaster};
use forecast_lib::models::{AnnotationRequest, QueryRequest, QueryTarget, TimeRange};
use forecast_lib::observability::{ServiceMetrics, StructuredLogger};
use forecast_lib::pipeline::{PipelineConfig, QueryPipeline};
use forecast_lib::upstream::UpstreamClient;
use std::sync::Arc;

const BASE_EPOCH: i64 = 1_735_689_600; // 2025-01-01T00:00:00Z

fn ts(offset_secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(BASE_EPOCH + offset_secs, 0).unwrap()
}

fn pipeline_for(server_url: &str) -> QueryPipeline {
    let upstream = UpstreamClient::new(server_url, std::time::Duration::from_secs(5)).unwrap();
    QueryPipeline::new(
        upstream,
        Arc::new(SeasonalTrendForecaster::new()),
        PipelineConfig::default(),
        ServiceMetrics::new(),
        StructuredLogger::new("forecast-service-test"),
    )
}

fn unavailable_pipeline_for(server_url: &str) -> QueryPipeline {
    let upstream = UpstreamClient::new(server_url, std::time::Duration::from_secs(5)).unwrap();
    QueryPipeline::new(
        upstream,
        Arc::new(UnavailableForecaster),
        PipelineConfig::default(),
        ServiceMetrics::new(),
        StructuredLogger::new("forecast-service-test"),
    )
}

/// Prometheus range-response body with samples every 60s from the base
/// epoch.
fn prometheus_body(values: &[f64]) -> String {
    let pairs: Vec<serde_json::Value> = values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            serde_json::json!([(BASE_EPOCH + 60 * i as i64) as f64, v.to_string()])
        })
        .collect();
    serde_json::json!({
        "status": "success",
        "data": {"resultType": "matrix", "result": [{"metric": {}, "values": pairs}]}
    })
    .to_string()
}

async fn mock_range(server: &mut mockito::ServerGuard, body: String) -> mockito::Mock {
    server
        .mock(
            "GET",
            mockito::Matcher::Regex(r"^/api/v1/query_range.*".to_string()),
        )
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await
}

fn query(target: &str, from_offset: i64, to_offset: i64) -> QueryRequest {
    QueryRequest {
        panel_id: Some(1),
        range: TimeRange {
            from: ts(from_offset),
            to: ts(to_offset),
        },
        interval_ms: Some(60_000),
        targets: vec![QueryTarget {
            target: target.to_string(),
            ref_id: Some("A".to_string()),
            kind: Some("timeserie".to_string()),
        }],
        max_data_points: None,
    }
}

#[tokio::test]
async fn test_successful_target_yields_four_populated_channels() {
    let mut server = mockito::Server::new_async().await;
    let _m = mock_range(&mut server, prometheus_body(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0])).await;

    let pipeline = pipeline_for(&server.url());
    // History ends at +300s, window extends to +900s.
    let response = pipeline
        .run_query(&query("Customer API Active Users", 0, 900))
        .await;

    assert_eq!(response.len(), 4);
    assert_eq!(response[0].target, "Customer API Active Users - Historical");
    assert_eq!(response[1].target, "Customer API Active Users - Forecast");
    assert_eq!(response[2].target, "Customer API Active Users - Forecast Lower");
    assert_eq!(response[3].target, "Customer API Active Users - Forecast Upper");

    // Historical echo carries the normalized history.
    assert_eq!(response[0].datapoints.len(), 6);
    assert_eq!(response[0].datapoints[0], (10.0, BASE_EPOCH * 1000));
    assert!(response[0].error.is_none());

    // Forecast points sit strictly after history, within the window.
    assert!(!response[1].datapoints.is_empty());
    let last_hist_ms = (BASE_EPOCH + 300) * 1000;
    let window_end_ms = (BASE_EPOCH + 900) * 1000;
    for (_, t) in &response[1].datapoints {
        assert!(*t > last_hist_ms);
        assert!(*t <= window_end_ms);
    }

    // Lower <= point <= upper channel-wise, same timestamps.
    for ((v, t), ((l, lt), (u, ut))) in response[1]
        .datapoints
        .iter()
        .zip(response[2].datapoints.iter().zip(&response[3].datapoints))
    {
        assert_eq!(t, lt);
        assert_eq!(t, ut);
        assert!(l <= v && v <= u);
    }
}

#[tokio::test]
async fn test_unknown_target_falls_back_to_default_metric() {
    let mut server = mockito::Server::new_async().await;
    let _m = mock_range(&mut server, prometheus_body(&[0.01, 0.02, 0.01, 0.02])).await;

    let pipeline = pipeline_for(&server.url());
    let response = pipeline.run_query(&query("No Such Metric", 0, 600)).await;

    assert_eq!(response.len(), 4);
    for channel in &response {
        assert!(channel.target.starts_with("Customer API Error Rate Signal - "));
    }
    assert!(response[1].error.is_none());
}

#[tokio::test]
async fn test_empty_upstream_result_yields_error_channels() {
    let mut server = mockito::Server::new_async().await;
    let body =
        r#"{"status":"success","data":{"resultType":"matrix","result":[]}}"#.to_string();
    let _m = mock_range(&mut server, body).await;

    let pipeline = pipeline_for(&server.url());
    let response = pipeline
        .run_query(&query("Customer API Active Users", 0, 600))
        .await;

    assert_eq!(response.len(), 4);
    for channel in &response {
        assert!(channel.datapoints.is_empty());
        assert!(channel
            .error
            .as_deref()
            .unwrap()
            .contains("no historical data"));
    }
}

#[tokio::test]
async fn test_upstream_failure_isolated_per_target() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock(
            "GET",
            mockito::Matcher::Regex(r"^/api/v1/query_range.*".to_string()),
        )
        .with_status(502)
        .with_body("bad gateway")
        .create_async()
        .await;

    let pipeline = pipeline_for(&server.url());
    let mut request = query("Customer API Active Users", 0, 600);
    request.targets.push(QueryTarget {
        target: "Transaction Service Rate".to_string(),
        ref_id: Some("B".to_string()),
        kind: None,
    });
    let response = pipeline.run_query(&request).await;

    // Both targets degrade independently; the response stays
    // shape-complete with four channels each.
    assert_eq!(response.len(), 8);
    assert!(response
        .iter()
        .all(|c| c.error.is_some() && c.datapoints.is_empty()));
    assert!(response[4].target.starts_with("Transaction Service Rate"));
}

#[tokio::test]
async fn test_insufficient_data_yields_error_channels() {
    let mut server = mockito::Server::new_async().await;
    let body = serde_json::json!({
        "status": "success",
        "data": {"resultType": "matrix", "result": [
            {"metric": {}, "values": [[BASE_EPOCH as f64, "1.0"], [(BASE_EPOCH + 60) as f64, "garbage"]]}
        ]}
    })
    .to_string();
    let _m = mock_range(&mut server, body).await;

    let pipeline = pipeline_for(&server.url());
    let response = pipeline
        .run_query(&query("Customer API Active Users", 0, 600))
        .await;

    for channel in &response {
        assert!(channel.error.as_deref().unwrap().contains("insufficient data"));
    }
}

#[tokio::test]
async fn test_model_unavailable_yields_error_channels() {
    let mut server = mockito::Server::new_async().await;
    let _m = mock_range(&mut server, prometheus_body(&[1.0, 2.0, 3.0])).await;

    let pipeline = unavailable_pipeline_for(&server.url());
    let response = pipeline
        .run_query(&query("Customer API Active Users", 0, 600))
        .await;

    assert_eq!(response.len(), 4);
    for channel in &response {
        assert!(channel
            .error
            .as_deref()
            .unwrap()
            .contains("forecasting model unavailable"));
    }
}

#[tokio::test]
async fn test_rate_metric_forecast_is_clipped_at_zero() {
    let mut server = mockito::Server::new_async().await;
    // Steeply decreasing rate: the trend extrapolates below zero.
    let _m = mock_range(
        &mut server,
        prometheus_body(&[50.0, 40.0, 30.0, 20.0, 10.0, 5.0]),
    )
    .await;

    let pipeline = pipeline_for(&server.url());
    let response = pipeline
        .run_query(&query("Transaction Service Rate", 0, 1800))
        .await;

    let forecast = &response[1];
    let lower = &response[2];
    assert!(!forecast.datapoints.is_empty());
    assert!(forecast.datapoints.iter().all(|(v, _)| *v >= 0.0));
    assert!(lower.datapoints.iter().all(|(v, _)| *v >= 0.0));
    // The decreasing trend actually hits the floor somewhere.
    assert!(forecast.datapoints.iter().any(|(v, _)| *v == 0.0));
}

#[tokio::test]
async fn test_annotations_are_emitted_for_threshold_crossings() {
    let mut server = mockito::Server::new_async().await;
    // Every catalog metric sees a value of 150 sustained: well above
    // the error-rate, user-load, transaction-rate and ms-latency
    // thresholds.
    let _m = mock_range(
        &mut server,
        prometheus_body(&[150.0, 150.0, 150.0, 150.0, 150.0, 150.0]),
    )
    .await;

    let pipeline = pipeline_for(&server.url());
    let request = AnnotationRequest {
        range: TimeRange {
            from: ts(0),
            to: ts(1800),
        },
        annotation: serde_json::json!({"name": "forecast anomalies"}),
    };
    let annotations = pipeline.run_annotations(&request).await;

    assert!(!annotations.is_empty());
    let from_ms = BASE_EPOCH * 1000;
    let to_ms = (BASE_EPOCH + 1800) * 1000;
    for a in &annotations {
        assert!(a.time >= from_ms && a.time <= to_ms);
        assert!(a.title.starts_with("Anomaly: "));
        assert!(a.tags.contains(&"forecast".to_string()));
        assert!(a.text.contains("Threshold: "));
    }
    // The user-load gauge (threshold 100, flat 150 forecast) must be
    // among them.
    assert!(annotations
        .iter()
        .any(|a| a.title == "Anomaly: High User Load"));
}

#[tokio::test]
async fn test_annotations_skip_metrics_without_data() {
    let mut server = mockito::Server::new_async().await;
    let body =
        r#"{"status":"success","data":{"resultType":"matrix","result":[]}}"#.to_string();
    let _m = mock_range(&mut server, body).await;

    let pipeline = pipeline_for(&server.url());
    let request = AnnotationRequest {
        range: TimeRange {
            from: ts(0),
            to: ts(600),
        },
        annotation: serde_json::json!({}),
    };
    let annotations = pipeline.run_annotations(&request).await;
    assert!(annotations.is_empty());
}
