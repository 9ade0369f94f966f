//! Pipeline metrics, recorded through the `metrics` facade.
//!
//! No recorder is installed here; the binary decides where these go.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const PIPELINE_REQUESTS_TOTAL: &str = "facedet_pipeline_requests_total";
    pub const PIPELINE_FAILURES_TOTAL: &str = "facedet_pipeline_failures_total";
    pub const PIPELINE_DURATION_SECONDS: &str = "facedet_pipeline_duration_seconds";
    pub const DETECTIONS_PER_REQUEST: &str = "facedet_detections_per_request";
    pub const BOXES_CLIPPED_TOTAL: &str = "facedet_boxes_clipped_total";
    pub const BOXES_SKIPPED_TOTAL: &str = "facedet_boxes_skipped_total";
    pub const MODEL_LEASE_WAIT_SECONDS: &str = "facedet_model_lease_wait_seconds";
    pub const MODEL_LEASE_TIMEOUTS_TOTAL: &str = "facedet_model_lease_timeouts_total";
}

/// Record a successfully completed request.
pub fn record_pipeline_success(detections: usize, duration_secs: f64) {
    counter!(names::PIPELINE_REQUESTS_TOTAL, "outcome" => "success").increment(1);
    histogram!(names::PIPELINE_DURATION_SECONDS, "outcome" => "success").record(duration_secs);
    histogram!(names::DETECTIONS_PER_REQUEST).record(detections as f64);
}

/// Record a failed request by the stage it failed at and the error kind.
pub fn record_pipeline_failure(stage: &str, kind: &str, duration_secs: f64) {
    counter!(names::PIPELINE_REQUESTS_TOTAL, "outcome" => "failure").increment(1);
    let labels = [("stage", stage.to_string()), ("kind", kind.to_string())];
    counter!(names::PIPELINE_FAILURES_TOTAL, &labels).increment(1);
    histogram!(names::PIPELINE_DURATION_SECONDS, "outcome" => "failure").record(duration_secs);
}

/// Record boxes that needed clipping or were dropped while rendering.
pub fn record_boxes_adjusted(clipped: usize, skipped: usize) {
    if clipped > 0 {
        counter!(names::BOXES_CLIPPED_TOTAL).increment(clipped as u64);
    }
    if skipped > 0 {
        counter!(names::BOXES_SKIPPED_TOTAL).increment(skipped as u64);
    }
}

/// Record how long a request waited for a model handle.
pub fn record_lease_wait(duration_secs: f64) {
    histogram!(names::MODEL_LEASE_WAIT_SECONDS).record(duration_secs);
}

/// Record a request that gave up waiting for a model handle.
pub fn record_lease_timeout() {
    counter!(names::MODEL_LEASE_TIMEOUTS_TOTAL).increment(1);
}
