//! Detection engine: sanitizes and filters model output.

use std::time::Duration;

use facedet_models::{Detection, DEFAULT_FACE_LABEL};
use tracing::{debug, info};

use super::model::{FaceModel, RawDetection};
use super::pool::{HandlePool, ModelLease, PoolStats};
use crate::error::{MediaError, MediaResult};
use crate::raster::Raster;

/// Default minimum confidence for a detection to be reported.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Default wait for a model handle before giving up.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the detection engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Detections scoring below this are dropped. Clamped into `[0, 1]`.
    pub confidence_threshold: f32,
    /// Number of independent model handles loaded at startup.
    pub pool_size: usize,
    /// Bounded wait for a free handle.
    pub acquire_timeout: Duration,
    /// Label assigned when the model emits none. `None` leaves detections unlabeled.
    pub default_label: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            pool_size: 1,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            default_label: Some(DEFAULT_FACE_LABEL.to_string()),
        }
    }
}

/// Runs face detection over rasters using a pool of pre-loaded handles.
#[derive(Clone)]
pub struct DetectionEngine {
    pool: HandlePool,
    model_name: String,
    confidence_threshold: f32,
    default_label: Option<String>,
}

impl DetectionEngine {
    /// Load `pool_size` handles from `model`.
    pub fn new(model: &dyn FaceModel, config: EngineConfig) -> MediaResult<Self> {
        let handles = (0..config.pool_size)
            .map(|_| model.load())
            .collect::<MediaResult<Vec<_>>>()?;

        let confidence_threshold = sanitize_threshold(config.confidence_threshold);

        info!(
            model = model.name(),
            pool_size = handles.len(),
            confidence_threshold,
            acquire_timeout_ms = config.acquire_timeout.as_millis() as u64,
            "Detection engine initialized"
        );

        Ok(Self {
            pool: HandlePool::new(handles, config.acquire_timeout),
            model_name: model.name().to_string(),
            confidence_threshold,
            default_label: config.default_label,
        })
    }

    /// Lease a model handle, waiting at most the configured timeout.
    pub async fn acquire(&self) -> MediaResult<ModelLease> {
        self.pool.acquire().await
    }

    /// Detect faces in `raster` using the leased handle.
    ///
    /// Returned detections are in model emission order, have finite
    /// coordinates, and confidences in `[threshold, 1]`. Boxes are NOT
    /// clipped to the raster here.
    pub fn detect(&self, lease: &mut ModelLease, raster: &Raster) -> MediaResult<Vec<Detection>> {
        raster.validate()?;

        let raw = lease.handle_mut()?.infer(raster).map_err(|e| match e {
            MediaError::Inference(_) => e,
            other => MediaError::inference(other.to_string()),
        })?;
        let candidates = raw.len();

        let detections: Vec<Detection> = raw
            .into_iter()
            .filter_map(|candidate| self.accept(candidate))
            .collect();

        debug!(
            model = %self.model_name,
            candidates,
            accepted = detections.len(),
            threshold = self.confidence_threshold,
            "Face detection completed"
        );

        Ok(detections)
    }

    fn accept(&self, candidate: RawDetection) -> Option<Detection> {
        if !candidate.score.is_finite() || !candidate.bbox.is_finite() {
            return None;
        }

        let confidence = candidate.score.clamp(0.0, 1.0);
        if confidence < self.confidence_threshold {
            return None;
        }

        let detection = Detection::new(candidate.bbox.ordered(), confidence);
        match candidate.label.or_else(|| self.default_label.clone()) {
            Some(label) => Some(detection.with_label(label)),
            None => Some(detection),
        }
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

fn sanitize_threshold(threshold: f32) -> f32 {
    if threshold.is_finite() {
        threshold.clamp(0.0, 1.0)
    } else {
        DEFAULT_CONFIDENCE_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::model::ModelHandle;
    use facedet_models::BoundingBox;

    struct Fixed(Vec<RawDetection>);

    impl FaceModel for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn load(&self) -> MediaResult<Box<dyn ModelHandle>> {
            Ok(Box::new(FixedHandle(self.0.clone())))
        }
    }

    struct FixedHandle(Vec<RawDetection>);

    impl ModelHandle for FixedHandle {
        fn infer(&mut self, _raster: &Raster) -> MediaResult<Vec<RawDetection>> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    impl FaceModel for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn load(&self) -> MediaResult<Box<dyn ModelHandle>> {
            Ok(Box::new(Failing))
        }
    }

    impl ModelHandle for Failing {
        fn infer(&mut self, _raster: &Raster) -> MediaResult<Vec<RawDetection>> {
            Err(MediaError::internal("session exploded"))
        }
    }

    fn raw(score: f32) -> RawDetection {
        RawDetection::new(BoundingBox::new(1.0, 1.0, 5.0, 5.0), score)
    }

    async fn run(model: &dyn FaceModel, config: EngineConfig) -> MediaResult<Vec<Detection>> {
        let engine = DetectionEngine::new(model, config)?;
        let mut lease = engine.acquire().await?;
        engine.detect(&mut lease, &Raster::filled(10, 10, [0, 0, 0]))
    }

    #[tokio::test]
    async fn test_confidence_filter() {
        let model = Fixed(vec![raw(0.49), raw(0.5), raw(0.9), raw(0.1)]);
        let detections = run(&model, EngineConfig::default()).await.unwrap();

        assert_eq!(detections.len(), 2);
        assert!(detections.iter().all(|d| d.confidence >= 0.5));
        assert_eq!(detections[0].confidence, 0.5);
        assert_eq!(detections[1].confidence, 0.9);
    }

    #[tokio::test]
    async fn test_drops_non_finite_and_clamps_scores() {
        let model = Fixed(vec![
            raw(f32::NAN),
            RawDetection::new(BoundingBox::new(f32::INFINITY, 0.0, 1.0, 1.0), 0.9),
            raw(1.7),
        ]);
        let detections = run(&model, EngineConfig::default()).await.unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].confidence, 1.0);
    }

    #[tokio::test]
    async fn test_default_label_and_model_label() {
        let model = Fixed(vec![raw(0.8), raw(0.8).with_label("person")]);
        let detections = run(&model, EngineConfig::default()).await.unwrap();
        assert_eq!(detections[0].label.as_deref(), Some("face"));
        assert_eq!(detections[1].label.as_deref(), Some("person"));

        let unlabeled = EngineConfig {
            default_label: None,
            ..EngineConfig::default()
        };
        let detections = run(&model, unlabeled).await.unwrap();
        assert_eq!(detections[0].label, None);
    }

    #[tokio::test]
    async fn test_inverted_boxes_are_ordered() {
        let model = Fixed(vec![RawDetection::new(BoundingBox::new(8.0, 9.0, 2.0, 3.0), 0.9)]);
        let detections = run(&model, EngineConfig::default()).await.unwrap();
        assert_eq!(detections[0].bbox, BoundingBox::new(2.0, 3.0, 8.0, 9.0));
    }

    #[tokio::test]
    async fn test_model_failure_is_inference_error() {
        let err = run(&Failing, EngineConfig::default()).await.unwrap_err();
        assert!(matches!(err, MediaError::Inference(ref m) if m.contains("session exploded")));
    }

    #[tokio::test]
    async fn test_invalid_raster_rejected() {
        let engine = DetectionEngine::new(&Fixed(vec![raw(0.9)]), EngineConfig::default()).unwrap();
        let mut lease = engine.acquire().await.unwrap();
        let mut raster = Raster::filled(4, 4, [0, 0, 0]);
        raster.data.truncate(5);
        let err = engine.detect(&mut lease, &raster).unwrap_err();
        assert!(matches!(err, MediaError::InvalidRaster(_)));
    }

    #[test]
    fn test_threshold_sanitized() {
        assert_eq!(sanitize_threshold(1.5), 1.0);
        assert_eq!(sanitize_threshold(-0.2), 0.0);
        assert_eq!(sanitize_threshold(f32::NAN), DEFAULT_CONFIDENCE_THRESHOLD);
    }

    #[test]
    fn test_pool_size_loads_handles() {
        let config = EngineConfig {
            pool_size: 3,
            ..EngineConfig::default()
        };
        let engine = DetectionEngine::new(&Fixed(Vec::new()), config).unwrap();
        assert_eq!(engine.pool_stats().capacity, 3);
        assert_eq!(engine.pool_stats().idle, 3);
    }
}
