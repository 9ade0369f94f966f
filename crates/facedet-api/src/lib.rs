//! Axum HTTP API server for face detection.
//!
//! This crate provides:
//! - `POST /detect/faces/image` returning the annotated image
//! - Health, readiness and trace exporter probes
//! - Prometheus metrics and OTLP trace export

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::{ApiConfig, PipelineSettings, TelemetryConfig};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::{build_pipeline, AppState};
pub use telemetry::Telemetry;
