//! YOLOv8-face detector backed by ONNX Runtime.
//!
//! Uses ONNX Runtime for inference with automatic execution provider selection:
//! - CUDA on Linux with NVIDIA GPU (when `cuda` feature enabled)
//! - CoreML on macOS
//! - CPU fallback on all platforms
//!
//! Each loaded handle owns its own `Session`, so handles in the engine's
//! pool never contend on a lock.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use facedet_models::BoundingBox;
use ndarray::Array2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use super::letterbox::Letterbox;
use super::model::{FaceModel, ModelHandle, RawDetection};
use crate::error::{MediaError, MediaResult};
use crate::raster::Raster;

/// Default location of the face model.
pub const DEFAULT_MODEL_PATH: &str = "models/face_detection/yolov8n-face.onnx";

/// Configuration for the ONNX face model.
#[derive(Debug, Clone)]
pub struct OnnxModelConfig {
    /// Path to ONNX model file
    pub model_path: PathBuf,
    /// Square input size the model was exported with
    pub input_size: u32,
    /// IoU above which the weaker of two boxes is suppressed
    pub nms_threshold: f32,
    /// Candidates below this score are discarded before NMS
    pub score_floor: f32,
    /// Name of the detection output tensor
    pub output_name: String,
}

impl Default for OnnxModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            input_size: 640,
            nms_threshold: 0.45,
            score_floor: 0.25,
            output_name: "output0".to_string(),
        }
    }
}

/// Face model loaded from a YOLOv8-face ONNX export.
///
/// The file is read once; every [`FaceModel::load`] commits a fresh session
/// from the cached bytes.
pub struct OnnxFaceModel {
    config: OnnxModelConfig,
    model_bytes: Arc<Vec<u8>>,
    name: String,
}

impl OnnxFaceModel {
    /// Returns error if model file doesn't exist or cannot be read.
    pub fn new(config: OnnxModelConfig) -> MediaResult<Self> {
        if !is_model_available_at(&config.model_path) {
            return Err(MediaError::model_not_found(config.model_path.display().to_string()));
        }
        if config.input_size == 0 {
            return Err(MediaError::internal("Model input size must be positive"));
        }

        let model_bytes = std::fs::read(&config.model_path)?;
        let name = config
            .model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("onnx-face")
            .to_string();

        info!(
            model_path = %config.model_path.display(),
            input_size = config.input_size,
            bytes = model_bytes.len(),
            "Face model file loaded"
        );

        Ok(Self {
            config,
            model_bytes: Arc::new(model_bytes),
            name,
        })
    }

    pub fn config(&self) -> &OnnxModelConfig {
        &self.config
    }
}

impl FaceModel for OnnxFaceModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> MediaResult<Box<dyn ModelHandle>> {
        let session = create_session(&self.model_bytes)?;
        Ok(Box::new(OnnxHandle {
            session,
            config: self.config.clone(),
        }))
    }
}

struct OnnxHandle {
    session: Session,
    config: OnnxModelConfig,
}

impl ModelHandle for OnnxHandle {
    fn infer(&mut self, raster: &Raster) -> MediaResult<Vec<RawDetection>> {
        let image = raster.clone().into_rgb_image()?;
        let letterbox = Letterbox::compute(raster.width, raster.height, self.config.input_size);

        // 1. Letterbox, normalize to [0,1], NCHW
        let input = preprocess(&letterbox.apply(&image))?;

        // 2. Run inference
        let outputs = self
            .session
            .run(ort::inputs![input])
            .map_err(|e| MediaError::inference(format!("ONNX inference failed: {}", e)))?;

        let output = outputs
            .get(self.config.output_name.as_str())
            .ok_or_else(|| {
                MediaError::inference(format!("Missing {} tensor", self.config.output_name))
            })?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::inference(format!("Failed to extract tensor: {}", e)))?;
        let dims: Vec<i64> = shape.iter().copied().collect();

        // 3. Parse candidates, NMS, map back to raster space
        let candidates = parse_candidates(&dims, data, self.config.score_floor)?;
        let kept = non_maximum_suppression(candidates, self.config.nms_threshold);

        debug!(count = kept.len(), "ONNX face inference completed");

        Ok(kept
            .into_iter()
            .map(|c| RawDetection::new(letterbox.map_box(&c.bbox), c.score))
            .collect())
    }
}

/// HWC u8 canvas to a `[1, 3, H, W]` f32 tensor in `[0, 1]`.
fn preprocess(canvas: &image::RgbImage) -> MediaResult<Value> {
    let (w, h) = (canvas.width() as usize, canvas.height() as usize);
    let mut chw_data: Vec<f32> = vec![0.0; 3 * h * w];

    for (x, y, pixel) in canvas.enumerate_pixels() {
        let offset = y as usize * w + x as usize;
        for c in 0..3 {
            chw_data[c * h * w + offset] = pixel[c] as f32 / 255.0;
        }
    }

    let shape = vec![1usize, 3, h, w];
    Tensor::from_array((shape, chw_data.into_boxed_slice()))
        .map(Value::from)
        .map_err(|e| MediaError::inference(format!("Failed to create tensor: {}", e)))
}

/// Candidate box in model canvas space.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    bbox: BoundingBox,
    score: f32,
}

/// Parse a YOLOv8-face output of shape `[1, F, N]`.
///
/// Rows 0..4 are `cx, cy, w, h`, row 4 is the face score; any remaining rows
/// (landmarks) are ignored.
fn parse_candidates(shape: &[i64], data: &[f32], score_floor: f32) -> MediaResult<Vec<Candidate>> {
    let (features, boxes) = match shape {
        [1, f, n] | [f, n] => (*f as usize, *n as usize),
        _ => {
            return Err(MediaError::inference(format!(
                "Unexpected detector output shape: {:?}",
                shape
            )))
        }
    };

    if features < 5 {
        return Err(MediaError::inference(format!(
            "Detector output has {} features, expected at least 5",
            features
        )));
    }

    // [F, N] -> view as [N, F]
    let output = Array2::from_shape_vec((features, boxes), data.to_vec())
        .map_err(|e| MediaError::inference(format!("Failed to reshape output: {}", e)))?;
    let rows = output.t();

    Ok(rows
        .outer_iter()
        .filter_map(|row| {
            let score = row[4];
            (score >= score_floor).then(|| Candidate {
                bbox: BoundingBox::from_center(row[0], row[1], row[2], row[3]),
                score,
            })
        })
        .collect())
}

/// Class-agnostic NMS. Output is ordered by descending score.
fn non_maximum_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if keep.iter().all(|k| k.bbox.iou(&candidate.bbox) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

/// Create ONNX Runtime session with automatic execution provider selection.
fn create_session(model_bytes: &[u8]) -> MediaResult<Session> {
    let builder = Session::builder()
        .map_err(|e| MediaError::internal(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| MediaError::internal(format!("Failed to set optimization level: {}", e)))?;

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(model_bytes) {
                info!("Using CUDA execution provider for face detection");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, trying alternatives");
    }

    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(model_bytes) {
                info!("Using CoreML execution provider for face detection");
                return Ok(session);
            }
        }
        debug!("CoreML execution provider not available, using CPU");
    }

    info!("Using CPU execution provider for face detection");
    builder
        .commit_from_memory(model_bytes)
        .map_err(|e| MediaError::internal(format!("Failed to load ONNX model: {}", e)))
}

/// Check if the face model is available at a path.
pub fn is_model_available_at(path: impl AsRef<Path>) -> bool {
    path.as_ref().exists()
}
