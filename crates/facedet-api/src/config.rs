//! API configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use facedet_media::codec::DEFAULT_MAX_DIMENSION;
use facedet_media::detection::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MODEL_PATH};
use facedet_models::{OutputFormat, DEFAULT_JPEG_QUALITY};

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Request timeout, enforced between pipeline stages
    pub request_timeout: Duration,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Serve Prometheus metrics at /metrics
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(30),
            max_body_size: 10 * 1024 * 1024, // 10MB
            environment: "development".to_string(),
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("API_PORT", 8000),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["*".to_string()]),
            request_timeout: Duration::from_secs(env_or("REQUEST_TIMEOUT", 30)),
            max_body_size: env_or("MAX_BODY_SIZE", 10 * 1024 * 1024),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| parse_bool(&v))
                .unwrap_or(true),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

/// Model, rendering and output settings for the request pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub model_path: PathBuf,
    pub model_input_size: u32,
    pub model_pool_size: usize,
    pub model_acquire_timeout: Duration,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    pub output_format: OutputFormat,
    pub max_image_dimension: u32,
    pub box_stroke_width: u32,
    pub box_color: [u8; 3],
    pub draw_labels: bool,
    pub label_font_path: Option<PathBuf>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            model_input_size: 640,
            model_pool_size: 1,
            model_acquire_timeout: Duration::from_millis(5000),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            nms_threshold: 0.45,
            output_format: OutputFormat::default(),
            max_image_dimension: DEFAULT_MAX_DIMENSION,
            box_stroke_width: 2,
            box_color: [0, 255, 0],
            draw_labels: true,
            label_font_path: None,
        }
    }
}

impl PipelineSettings {
    /// Create settings from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let quality = env_or("JPEG_QUALITY", DEFAULT_JPEG_QUALITY);
        let output_format = match std::env::var("OUTPUT_FORMAT")
            .ok()
            .and_then(|s| s.parse::<OutputFormat>().ok())
        {
            Some(OutputFormat::Jpeg { .. }) | None => OutputFormat::jpeg(quality),
            Some(format) => format,
        };

        Self {
            model_path: std::env::var("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            model_input_size: env_or("MODEL_INPUT_SIZE", defaults.model_input_size),
            model_pool_size: env_or("MODEL_POOL_SIZE", defaults.model_pool_size),
            model_acquire_timeout: Duration::from_millis(env_or("MODEL_ACQUIRE_TIMEOUT_MS", 5000)),
            confidence_threshold: env_or("CONFIDENCE_THRESHOLD", defaults.confidence_threshold),
            nms_threshold: env_or("NMS_THRESHOLD", defaults.nms_threshold),
            output_format,
            max_image_dimension: env_or("MAX_IMAGE_DIMENSION", defaults.max_image_dimension),
            box_stroke_width: env_or("BOX_STROKE_WIDTH", defaults.box_stroke_width),
            box_color: std::env::var("BOX_COLOR")
                .ok()
                .and_then(|s| parse_hex_color(&s))
                .unwrap_or(defaults.box_color),
            draw_labels: std::env::var("DRAW_LABELS")
                .map(|v| parse_bool(&v))
                .unwrap_or(defaults.draw_labels),
            label_font_path: std::env::var("LABEL_FONT_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

/// OpenTelemetry exporter settings.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint; tracing export is off when unset
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: "face-detection".to_string(),
        }
    }
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        Self {
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            service_name: std::env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| "face-detection".to_string()),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

/// Parse `rrggbb` or `#rrggbb`.
pub fn parse_hex_color(value: &str) -> Option<[u8; 3]> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}
