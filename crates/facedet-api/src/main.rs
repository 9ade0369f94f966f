//! Face detection API server binary.

use std::net::SocketAddr;

use anyhow::Context;
use tracing::{error, info, warn};

use facedet_api::{
    create_router, metrics, ApiConfig, AppState, PipelineSettings, Telemetry, TelemetryConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let telemetry_config = TelemetryConfig::from_env();
    let telemetry = Telemetry::init(&telemetry_config).context("Failed to initialize tracing")?;

    info!("Starting facedet-api");

    // Load configuration
    let config = ApiConfig::from_env();
    let settings = PipelineSettings::from_env();
    info!("API config: host={}, port={}", config.host, config.port);
    info!(
        model = %settings.model_path.display(),
        pool_size = settings.model_pool_size,
        threshold = settings.confidence_threshold,
        format = settings.output_format.as_str(),
        "Pipeline config"
    );

    // Model sessions are committed synchronously
    let state = {
        let config = config.clone();
        let telemetry_config = telemetry_config.clone();
        tokio::task::spawn_blocking(move || AppState::new(config, &settings, telemetry_config))
            .await
            .context("Model loading task failed")?
    };
    let state = match state {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create application state: {}", e);
            telemetry.shutdown();
            std::process::exit(1);
        }
    };

    // Initialize metrics
    let metrics_handle = if config.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                warn!("Prometheus recorder not installed: {}", e);
                None
            }
        }
    } else {
        None
    };

    // Create router
    let app = create_router(state, metrics_handle);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid bind address")?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    telemetry.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
