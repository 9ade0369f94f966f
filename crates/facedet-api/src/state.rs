//! Application state.

use std::sync::Arc;

use facedet_media::{
    AnnotationRenderer, DecodeLimits, DetectionEngine, EngineConfig, HookChain, ImageCodec,
    LabelFont, LoggingHook, MediaResult, MetricsHook, OnnxFaceModel, OnnxModelConfig,
    PipelineConfig, RenderStyle, RequestPipeline,
};
use facedet_models::DEFAULT_FACE_LABEL;
use tracing::info;

use crate::config::{ApiConfig, PipelineSettings, TelemetryConfig};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub telemetry: TelemetryConfig,
    pub pipeline: RequestPipeline,
}

impl AppState {
    /// Load the face model and build the request pipeline.
    ///
    /// Blocking: reads the model file and commits every pool session.
    pub fn new(
        config: ApiConfig,
        settings: &PipelineSettings,
        telemetry: TelemetryConfig,
    ) -> MediaResult<Self> {
        let model = OnnxFaceModel::new(OnnxModelConfig {
            model_path: settings.model_path.clone(),
            input_size: settings.model_input_size,
            nms_threshold: settings.nms_threshold,
            // keep low-scoring candidates when the reporting threshold is low
            score_floor: settings.confidence_threshold.min(0.25),
            ..OnnxModelConfig::default()
        })?;

        let engine = DetectionEngine::new(
            &model,
            EngineConfig {
                confidence_threshold: settings.confidence_threshold,
                pool_size: settings.model_pool_size,
                acquire_timeout: settings.model_acquire_timeout,
                default_label: Some(DEFAULT_FACE_LABEL.to_string()),
            },
        )?;

        let pipeline = build_pipeline(&config, settings, engine)?;
        Ok(Self::with_pipeline(config, telemetry, pipeline))
    }

    /// State around an already built pipeline.
    pub fn with_pipeline(config: ApiConfig, telemetry: TelemetryConfig, pipeline: RequestPipeline) -> Self {
        Self {
            config,
            telemetry,
            pipeline,
        }
    }
}

/// Assemble codec, renderer and hooks around a loaded engine.
pub fn build_pipeline(
    config: &ApiConfig,
    settings: &PipelineSettings,
    engine: DetectionEngine,
) -> MediaResult<RequestPipeline> {
    let codec = ImageCodec::new(DecodeLimits {
        max_width: settings.max_image_dimension,
        max_height: settings.max_image_dimension,
        ..DecodeLimits::default()
    });

    let style = RenderStyle {
        stroke_width: settings.box_stroke_width,
        color: settings.box_color,
        label_background: settings.box_color,
        draw_labels: settings.draw_labels,
        ..RenderStyle::default()
    };
    let renderer = match &settings.label_font_path {
        Some(path) => {
            info!(font = %path.display(), "Label font loaded");
            AnnotationRenderer::new(style).with_font(LabelFont::from_file(path)?)
        }
        None => AnnotationRenderer::new(style),
    };

    let hooks = HookChain::new().with(LoggingHook).with(MetricsHook);

    Ok(RequestPipeline::new(
        codec,
        engine,
        renderer,
        PipelineConfig {
            output_format: settings.output_format,
            stage_deadline: Some(config.request_timeout),
        },
        Arc::new(hooks),
    ))
}
