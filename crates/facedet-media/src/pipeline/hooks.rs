//! Observers called at the start and end of every request.
//!
//! Hooks are injected at construction; the pipeline holds no global tracer
//! or recorder of its own.

use std::sync::Arc;

use facedet_models::{AnnotatedResult, PipelineStage};

use crate::error::MediaError;
use crate::metrics;

/// Identity of one request as seen by hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    pub request_id: String,
    pub payload_bytes: usize,
}

/// How a request ended.
#[derive(Debug)]
pub enum PipelineOutcome<'a> {
    Done(&'a AnnotatedResult),
    Failed {
        /// Stage the request was trying to reach
        stage: PipelineStage,
        error: &'a MediaError,
        elapsed_ms: f64,
    },
}

impl PipelineOutcome<'_> {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Done(_))
    }
}

pub trait PipelineHook: Send + Sync {
    fn on_start(&self, _request: &RequestInfo) {}

    fn on_finish(&self, _request: &RequestInfo, _outcome: &PipelineOutcome<'_>) {}
}

/// Hook that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHook;

impl PipelineHook for NoopHook {}

/// Structured `tracing` events for each request.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHook;

impl PipelineHook for LoggingHook {
    fn on_start(&self, request: &RequestInfo) {
        tracing::info!(
            request_id = %request.request_id,
            payload_bytes = request.payload_bytes,
            "Starting face detection request"
        );
    }

    fn on_finish(&self, request: &RequestInfo, outcome: &PipelineOutcome<'_>) {
        match outcome {
            PipelineOutcome::Done(result) => tracing::info!(
                request_id = %request.request_id,
                faces = result.detection_count(),
                format = %result.format(),
                output_bytes = result.encoded_bytes().len(),
                processing_time_ms = result.processing_time_ms(),
                "Face detection request completed"
            ),
            PipelineOutcome::Failed {
                stage,
                error,
                elapsed_ms,
            } if error.is_client_error() => tracing::warn!(
                request_id = %request.request_id,
                stage = %stage,
                kind = %error.kind(),
                error = %error,
                elapsed_ms,
                "Face detection request rejected"
            ),
            PipelineOutcome::Failed {
                stage,
                error,
                elapsed_ms,
            } => tracing::error!(
                request_id = %request.request_id,
                stage = %stage,
                kind = %error.kind(),
                error = %error,
                elapsed_ms,
                "Face detection request failed"
            ),
        }
    }
}

/// Pipeline counters and histograms through the `metrics` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsHook;

impl PipelineHook for MetricsHook {
    fn on_finish(&self, _request: &RequestInfo, outcome: &PipelineOutcome<'_>) {
        match outcome {
            PipelineOutcome::Done(result) => metrics::record_pipeline_success(
                result.detection_count(),
                result.processing_time_secs(),
            ),
            PipelineOutcome::Failed {
                stage,
                error,
                elapsed_ms,
            } => metrics::record_pipeline_failure(
                stage.as_str(),
                error.kind().as_str(),
                elapsed_ms / 1000.0,
            ),
        }
    }
}

/// Calls each hook in order.
#[derive(Clone, Default)]
pub struct HookChain {
    hooks: Vec<Arc<dyn PipelineHook>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hook: impl PipelineHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl PipelineHook for HookChain {
    fn on_start(&self, request: &RequestInfo) {
        for hook in &self.hooks {
            hook.on_start(request);
        }
    }

    fn on_finish(&self, request: &RequestInfo, outcome: &PipelineOutcome<'_>) {
        for hook in &self.hooks {
            hook.on_finish(request, outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Arc<Mutex<Vec<String>>>);

    impl PipelineHook for Recording {
        fn on_start(&self, request: &RequestInfo) {
            self.0.lock().unwrap().push(format!("start {}", request.request_id));
        }

        fn on_finish(&self, request: &RequestInfo, outcome: &PipelineOutcome<'_>) {
            self.0
                .lock()
                .unwrap()
                .push(format!("finish {} {}", request.request_id, outcome.is_success()));
        }
    }

    #[test]
    fn test_chain_calls_hooks_in_order() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let chain = HookChain::new()
            .with(Recording(Arc::clone(&events)))
            .with(LoggingHook)
            .with(Recording(Arc::clone(&events)));
        assert_eq!(chain.len(), 3);

        let request = RequestInfo {
            request_id: "r1".to_string(),
            payload_bytes: 10,
        };
        let error = MediaError::decode("empty");
        chain.on_start(&request);
        chain.on_finish(
            &request,
            &PipelineOutcome::Failed {
                stage: PipelineStage::Decoded,
                error: &error,
                elapsed_ms: 0.1,
            },
        );

        assert_eq!(
            *events.lock().unwrap(),
            vec!["start r1", "start r1", "finish r1 false", "finish r1 false"]
        );
    }
}
