//! Logging and trace export setup.

use opentelemetry::trace::{TraceError, TracerProvider as _};
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{self as sdktrace, Sampler, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::TelemetryConfig;

/// Keeps the trace exporter alive; call [`Telemetry::shutdown`] before exit
/// to flush pending spans.
pub struct Telemetry {
    provider: Option<TracerProvider>,
}

impl Telemetry {
    /// Install the global subscriber.
    ///
    /// Logs are JSON when `LOG_FORMAT=json`. Spans are exported over OTLP
    /// when an endpoint is configured.
    pub fn init(config: &TelemetryConfig) -> Result<Self, TraceError> {
        let use_json = std::env::var("LOG_FORMAT")
            .map(|v| v.to_lowercase() == "json")
            .unwrap_or(false);

        let provider = config
            .otlp_endpoint
            .as_deref()
            .map(|endpoint| build_provider(endpoint, &config.service_name))
            .transpose()?;

        let otel_layer = provider.as_ref().map(|provider| {
            tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service_name.clone()))
        });

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("facedet=info"));

        if use_json {
            tracing_subscriber::registry()
                .with(otel_layer)
                .with(fmt::layer().json())
                .with(env_filter)
                .init();
        } else {
            tracing_subscriber::registry()
                .with(otel_layer)
                .with(
                    fmt::layer()
                        .with_ansi(true)
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false),
                )
                .with(env_filter)
                .init();
        }

        if let Some(endpoint) = &config.otlp_endpoint {
            info!(endpoint = %endpoint, service = %config.service_name, "OTLP trace export enabled");
        }

        Ok(Self { provider })
    }

    /// Flush and stop the exporter.
    pub fn shutdown(self) {
        if let Some(provider) = self.provider {
            if let Err(e) = provider.shutdown() {
                warn!("Trace exporter shutdown failed: {}", e);
            }
        }
    }
}

fn build_provider(endpoint: &str, service_name: &str) -> Result<TracerProvider, TraceError> {
    let provider = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(
            sdktrace::Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_resource(Resource::new(vec![KeyValue::new(
                    "service.name",
                    service_name.to_string(),
                )])),
        )
        .install_batch(runtime::Tokio)?;

    Ok(provider)
}
