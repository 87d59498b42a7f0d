//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder.
///
/// Pipeline metrics recorded by the worker crates land in the same registry.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "vidgen_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vidgen_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vidgen_http_requests_in_flight";
    pub const RATE_LIMIT_HITS_TOTAL: &str = "vidgen_rate_limit_hits_total";
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", route_label(path)),
        ("status", status.to_string()),
    ];
    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_rate_limit_hit(path: &str) {
    counter!(names::RATE_LIMIT_HITS_TOTAL, "path" => route_label(path)).increment(1);
}

/// Collapse per-file asset paths so label cardinality stays bounded.
fn route_label(path: &str) -> String {
    match path.strip_prefix("/temp/") {
        Some(_) => "/temp/:file".to_string(),
        None => path.to_string(),
    }
}

pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}
