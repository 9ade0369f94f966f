//! Prometheus metrics for the API server.
//!
//! Pipeline metrics are recorded by `facedet_media::metrics`; this module
//! adds the HTTP layer and installs the recorder.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "facedet_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "facedet_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "facedet_http_requests_in_flight";
    pub const IMAGES_RECEIVED_BYTES: &str = "facedet_images_received_bytes";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path).to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record the size of an uploaded image.
pub fn record_image_received(bytes: usize, upload: &'static str) {
    histogram!(names::IMAGES_RECEIVED_BYTES, "upload" => upload).record(bytes as f64);
}

/// Sanitize path for metrics labels.
///
/// Unrouted paths collapse into one label so probes cannot create a series
/// per URL.
fn sanitize_path(path: &str) -> &str {
    const KNOWN: &[&str] = &[
        "/",
        "/detect/faces/image",
        "/health",
        "/healthz",
        "/ready",
        "/metrics",
        "/tracing/status",
    ];

    if KNOWN.contains(&path) {
        path
    } else {
        "/:unknown"
    }
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("/detect/faces/image"), "/detect/faces/image");
        assert_eq!(sanitize_path("/health"), "/health");
        assert_eq!(sanitize_path("/wp-admin/12345"), "/:unknown");
        assert_eq!(sanitize_path("/detect/faces/image/"), "/:unknown");
    }
}
