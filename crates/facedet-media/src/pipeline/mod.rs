//! Request pipeline: decode, detect, annotate, encode.
//!
//! Each request runs the stages once, in order, with no retries. CPU-bound
//! stages run on the blocking pool; the raster is moved into each stage and
//! moved back out, so no stage shares mutable state with another request.

mod hooks;
mod state;

use std::sync::Arc;
use std::time::Duration;

use facedet_models::{AnnotatedResult, OutputFormat, PipelineStage};
use thiserror::Error;
use tracing::Instrument;

use crate::annotate::AnnotationRenderer;
use crate::codec::ImageCodec;
use crate::detection::DetectionEngine;
use crate::error::{MediaError, MediaResult};

pub use hooks::{HookChain, LoggingHook, MetricsHook, NoopHook, PipelineHook, PipelineOutcome, RequestInfo};
pub use state::RequestState;

/// Per-pipeline settings, fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Output encoding, independent of the input container
    pub output_format: OutputFormat,
    /// Checked between stages; once exceeded the next stage is not started.
    pub stage_deadline: Option<Duration>,
}

/// A request that did not complete. No partial result is produced.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {error}")]
pub struct PipelineFailure {
    /// Stage the request was working towards
    pub stage: PipelineStage,
    #[source]
    pub error: MediaError,
}

/// Composes codec, engine and renderer into one request traversal.
#[derive(Clone)]
pub struct RequestPipeline {
    codec: Arc<ImageCodec>,
    engine: DetectionEngine,
    renderer: Arc<AnnotationRenderer>,
    config: PipelineConfig,
    hook: Arc<dyn PipelineHook>,
}

impl RequestPipeline {
    pub fn new(
        codec: ImageCodec,
        engine: DetectionEngine,
        renderer: AnnotationRenderer,
        config: PipelineConfig,
        hook: Arc<dyn PipelineHook>,
    ) -> Self {
        Self {
            codec: Arc::new(codec),
            engine,
            renderer: Arc::new(renderer),
            config,
            hook,
        }
    }

    pub fn engine(&self) -> &DetectionEngine {
        &self.engine
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one encoded image under a freshly generated request id.
    pub async fn run<B>(&self, payload: B) -> Result<AnnotatedResult, PipelineFailure>
    where
        B: AsRef<[u8]> + Send + 'static,
    {
        self.run_with_id(uuid::Uuid::new_v4().to_string(), payload).await
    }

    /// Process one encoded image.
    pub async fn run_with_id<B>(
        &self,
        request_id: impl Into<String>,
        payload: B,
    ) -> Result<AnnotatedResult, PipelineFailure>
    where
        B: AsRef<[u8]> + Send + 'static,
    {
        let request = RequestInfo {
            request_id: request_id.into(),
            payload_bytes: payload.as_ref().len(),
        };
        let span = tracing::info_span!(
            "face_detection",
            request_id = %request.request_id,
            payload_bytes = request.payload_bytes
        );

        async move {
            let mut state = RequestState::new();
            self.hook.on_start(&request);

            match self.traverse(&mut state, payload).await {
                Ok(result) => {
                    self.hook.on_finish(&request, &PipelineOutcome::Done(&result));
                    Ok(result)
                }
                Err(error) => {
                    let stage = state.fail();
                    self.hook.on_finish(
                        &request,
                        &PipelineOutcome::Failed {
                            stage,
                            error: &error,
                            elapsed_ms: state.elapsed_ms(),
                        },
                    );
                    Err(PipelineFailure { stage, error })
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn traverse<B>(&self, state: &mut RequestState, payload: B) -> MediaResult<AnnotatedResult>
    where
        B: AsRef<[u8]> + Send + 'static,
    {
        // Received -> Decoded
        self.check_deadline(state, PipelineStage::Decoded)?;
        let codec = Arc::clone(&self.codec);
        let raster = blocking(move || codec.decode(payload.as_ref())).await?;
        state.advance(PipelineStage::Decoded)?;

        // Decoded -> Detected; the lease is released as soon as inference returns
        self.check_deadline(state, PipelineStage::Detected)?;
        let mut lease = self.engine.acquire().await?;
        let engine = self.engine.clone();
        let (raster, detections) = blocking(move || {
            let detections = engine.detect(&mut lease, &raster)?;
            Ok((raster, detections))
        })
        .await?;
        state.advance(PipelineStage::Detected)?;

        // Detected -> Annotated
        self.check_deadline(state, PipelineStage::Annotated)?;
        let renderer = Arc::clone(&self.renderer);
        let detection_count = detections.len();
        let rendered = blocking(move || renderer.render(raster, &detections)).await?;
        state.advance(PipelineStage::Annotated)?;

        // Annotated -> Encoded
        self.check_deadline(state, PipelineStage::Encoded)?;
        let codec = Arc::clone(&self.codec);
        let format = self.config.output_format;
        let encoded = blocking(move || codec.encode(&rendered.raster, format)).await?;
        state.advance(PipelineStage::Encoded)?;

        // Encoded -> Done
        let result = AnnotatedResult::new(encoded, format, detection_count, state.elapsed_ms());
        state.advance(PipelineStage::Done)?;
        Ok(result)
    }

    fn check_deadline(&self, state: &RequestState, next: PipelineStage) -> MediaResult<()> {
        match self.config.stage_deadline {
            Some(deadline) if state.elapsed() >= deadline => Err(MediaError::Timeout(next.to_string())),
            _ => Ok(()),
        }
    }
}

/// Run a CPU-bound stage on the blocking pool.
async fn blocking<T, F>(f: F) -> MediaResult<T>
where
    F: FnOnce() -> MediaResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| MediaError::internal(format!("Pipeline stage task failed: {}", e)))?
}
