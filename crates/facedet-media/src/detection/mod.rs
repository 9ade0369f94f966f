//! Face detection.
//!
//! - [`FaceModel`] / [`ModelHandle`]: the model collaborator contract
//! - [`DetectionEngine`]: pooled handles, confidence filtering and sanitizing
//! - [`OnnxFaceModel`]: YOLOv8-face through ONNX Runtime

mod engine;
mod letterbox;
mod model;
mod onnx;
mod pool;

pub use engine::{DetectionEngine, EngineConfig, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_CONFIDENCE_THRESHOLD};
pub use letterbox::{Letterbox, DEFAULT_PADDING_VALUE};
pub use model::{FaceModel, ModelHandle, RawDetection};
pub use onnx::{is_model_available_at, OnnxFaceModel, OnnxModelConfig, DEFAULT_MODEL_PATH};
pub use pool::{HandlePool, ModelLease, PoolStats};
