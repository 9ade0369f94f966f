//! Detection model collaborator traits.
//!
//! The engine knows nothing about a model's internals. A [`FaceModel`] is a
//! factory that loads independent [`ModelHandle`]s; each handle runs one
//! inference at a time.

use facedet_models::BoundingBox;

use crate::error::MediaResult;
use crate::raster::Raster;

/// Untrusted candidate emitted by a model, in input-raster pixel space.
///
/// Coordinates may lie outside the raster, be inverted or even non-finite;
/// scores may lie outside `[0, 1]`. The engine sanitizes both.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub bbox: BoundingBox,
    pub score: f32,
    pub label: Option<String>,
}

impl RawDetection {
    pub fn new(bbox: BoundingBox, score: f32) -> Self {
        Self {
            bbox,
            score,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Loads inference handles for one model.
pub trait FaceModel: Send + Sync {
    /// Model name for logging.
    fn name(&self) -> &str;

    /// Load one independent handle. Called once per pool slot at startup.
    fn load(&self) -> MediaResult<Box<dyn ModelHandle>>;
}

/// A loaded model instance.
///
/// Requires exclusive access: the engine never runs two inferences on the
/// same handle concurrently.
pub trait ModelHandle: Send {
    fn infer(&mut self, raster: &Raster) -> MediaResult<Vec<RawDetection>>;
}
