/// Metrics and telemetry for the contest backend
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - HTTP request counts and latencies
/// - Token lifecycle operations (issue, revoke, rotate)
/// - Media uploads and enrichment jobs
use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};
use std::time::Instant;

lazy_static! {
    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .unwrap();

    /// Active HTTP requests
    pub static ref HTTP_REQUESTS_ACTIVE: IntGauge = register_int_gauge!(
        "http_requests_active",
        "Number of HTTP requests currently being processed"
    )
    .unwrap();

    /// Token operations by operation and outcome
    pub static ref TOKEN_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "token_operations_total",
        "Total number of token service operations",
        &["operation", "outcome"]
    )
    .unwrap();

    /// Media uploads by kind and outcome
    pub static ref MEDIA_UPLOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "media_uploads_total",
        "Total number of media uploads",
        &["kind", "outcome"]
    )
    .unwrap();

    /// Background enrichment jobs by status
    pub static ref ENRICHMENT_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "enrichment_jobs_total",
        "Total number of media enrichment jobs",
        &["status"]
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record a token service operation
pub fn record_token_operation(operation: &str, outcome: &str) {
    TOKEN_OPERATIONS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}

/// Record a media upload
pub fn record_media_upload(kind: &str, success: bool) {
    MEDIA_UPLOADS_TOTAL
        .with_label_values(&[kind, if success { "success" } else { "failure" }])
        .inc();
}

/// Record a background enrichment job
pub fn record_enrichment_job(success: bool) {
    ENRICHMENT_JOBS_TOTAL
        .with_label_values(&[if success { "success" } else { "failure" }])
        .inc();
}

/// Request metrics middleware
///
/// Labels by the matched route template so path parameters don't explode
/// label cardinality.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    HTTP_REQUESTS_ACTIVE.inc();
    let started = Instant::now();
    let response = next.run(request).await;
    HTTP_REQUESTS_ACTIVE.dec();

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/api/v1/carousel", 200, 0.05);
        let metrics = render_metrics();
        assert!(metrics.contains("http_requests_total"));
        assert!(metrics.contains("http_request_duration_seconds"));
    }

    #[test]
    fn test_record_token_operation() {
        record_token_operation("rotate", "replay");
        let metrics = render_metrics();
        assert!(metrics.contains("token_operations_total"));
        assert!(metrics.contains("replay"));
    }

    #[test]
    fn test_record_media_upload() {
        record_media_upload("gallery", true);
        record_enrichment_job(false);
        let metrics = render_metrics();
        assert!(metrics.contains("media_uploads_total"));
        assert!(metrics.contains("enrichment_jobs_total"));
    }
}
