//! Health, readiness and tracing status handlers.

use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::Redirect;
use axum::Json;
use chrono::Utc;
use opentelemetry::trace::TraceContextExt;
use serde::Serialize;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::state::AppState;

/// Default OTLP gRPC port when the endpoint omits one.
const OTLP_GRPC_PORT: u16 = 4317;

/// Exporter reachability probe timeout.
const EXPORTER_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        message: "Face Detection API is operational".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// `GET /` sends clients to the health document.
pub async fn root() -> Redirect {
    Redirect::temporary("/health")
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub model: ModelCheck,
}

#[derive(Serialize)]
pub struct ModelCheck {
    pub status: String,
    pub name: String,
    pub pool_size: usize,
    pub idle: usize,
    pub in_flight: usize,
    pub confidence_threshold: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Readiness check endpoint (readiness probe).
/// Ready once at least one model handle is loaded.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let engine = state.pipeline.engine();
    let stats = engine.pool_stats();
    let loaded = stats.capacity > 0;

    let response = ReadinessResponse {
        status: if loaded { "ready" } else { "unavailable" }.to_string(),
        checks: ReadinessChecks {
            model: ModelCheck {
                status: if loaded { "ok" } else { "error" }.to_string(),
                name: engine.model_name().to_string(),
                pool_size: stats.capacity,
                idle: stats.idle,
                in_flight: stats.in_flight,
                confidence_threshold: engine.confidence_threshold(),
                error: (!loaded).then(|| "No model handles loaded".to_string()),
            },
        },
    };

    if loaded {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

/// Trace exporter status.
#[derive(Serialize)]
pub struct TracingStatusResponse {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub connection_status: String,
    pub service_name: String,
    pub details: ExporterDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_trace_id: Option<String>,
}

#[derive(Serialize)]
pub struct ExporterDetails {
    pub can_connect: bool,
    pub protocol: String,
    pub exporter_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Report whether the configured OTLP collector is reachable.
pub async fn tracing_status(State(state): State<AppState>) -> Json<TracingStatusResponse> {
    let telemetry = &state.telemetry;

    let Some(endpoint) = telemetry.otlp_endpoint.clone() else {
        return Json(TracingStatusResponse {
            enabled: false,
            endpoint: None,
            connection_status: "disabled".to_string(),
            service_name: telemetry.service_name.clone(),
            details: ExporterDetails {
                can_connect: false,
                protocol: "grpc".to_string(),
                exporter_type: "otlp".to_string(),
                latency_ms: None,
                error: None,
            },
            current_trace_id: None,
        });
    };

    let start = Instant::now();
    let probe = probe_endpoint(&endpoint).await;
    let can_connect = probe.is_ok();

    let current_trace_id = if can_connect {
        let span = tracing::info_span!("check_exporter_connection");
        let context = span.context();
        let span_ref = context.span();
        let span_context = span_ref.span_context();
        span_context
            .is_valid()
            .then(|| span_context.trace_id().to_string())
    } else {
        None
    };

    Json(TracingStatusResponse {
        enabled: true,
        endpoint: Some(endpoint),
        connection_status: if can_connect { "connected" } else { "disconnected" }.to_string(),
        service_name: telemetry.service_name.clone(),
        details: ExporterDetails {
            can_connect,
            protocol: "grpc".to_string(),
            exporter_type: "otlp".to_string(),
            latency_ms: can_connect.then(|| start.elapsed().as_millis() as u64),
            error: probe.err(),
        },
        current_trace_id,
    })
}

/// TCP connect to the endpoint's host and port.
async fn probe_endpoint(endpoint: &str) -> Result<(), String> {
    let (host, port) = endpoint_address(endpoint)?;

    match tokio::time::timeout(
        EXPORTER_CONNECT_TIMEOUT,
        tokio::net::TcpStream::connect((host.as_str(), port)),
    )
    .await
    {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!(
            "connection timed out after {}s",
            EXPORTER_CONNECT_TIMEOUT.as_secs()
        )),
    }
}

fn endpoint_address(endpoint: &str) -> Result<(String, u16), String> {
    let uri: Uri = endpoint
        .parse()
        .map_err(|e| format!("invalid endpoint {}: {}", endpoint, e))?;
    let host = uri
        .host()
        .ok_or_else(|| format!("endpoint {} has no host", endpoint))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    Ok((host, uri.port_u16().unwrap_or(OTLP_GRPC_PORT)))
}
