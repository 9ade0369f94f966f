//! Face detections and the per-request result.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::output_format::OutputFormat;

/// Label attached to detections when the model does not name them.
pub const DEFAULT_FACE_LABEL: &str = "face";

/// A single face detection in input-raster pixel space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Detection {
    /// Box as reported by the detector (unclipped)
    pub bbox: BoundingBox,
    /// Detection confidence [0, 1]
    pub confidence: f32,
    /// Optional text drawn next to the box
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            bbox,
            confidence,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Text rendered for this detection, e.g. `face 0.93`.
    pub fn caption(&self) -> Option<String> {
        self.label
            .as_ref()
            .map(|label| format!("{} {:.2}", label, self.confidence))
    }
}

/// Output of one successful pipeline traversal.
///
/// Built once by the pipeline and never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedResult {
    encoded_bytes: Vec<u8>,
    format: OutputFormat,
    detection_count: usize,
    processing_time_ms: f64,
}

impl AnnotatedResult {
    pub fn new(
        encoded_bytes: Vec<u8>,
        format: OutputFormat,
        detection_count: usize,
        processing_time_ms: f64,
    ) -> Self {
        Self {
            encoded_bytes,
            format,
            detection_count,
            processing_time_ms,
        }
    }

    pub fn encoded_bytes(&self) -> &[u8] {
        &self.encoded_bytes
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn detection_count(&self) -> usize {
        self.detection_count
    }

    pub fn processing_time_ms(&self) -> f64 {
        self.processing_time_ms
    }

    pub fn processing_time_secs(&self) -> f64 {
        self.processing_time_ms / 1000.0
    }

    /// Processing time in seconds with two decimals (`X-Processing-Time`).
    pub fn processing_time_header(&self) -> String {
        format!("{:.2}", self.processing_time_secs())
    }

    /// Take ownership of the encoded image.
    pub fn into_bytes(self) -> Vec<u8> {
        self.encoded_bytes
    }
}
