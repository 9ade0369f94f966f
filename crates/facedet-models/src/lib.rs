//! Shared data models for the face detection service.
//!
//! This crate provides Serde-serializable types for:
//! - Bounding boxes and clipped pixel rectangles
//! - Face detections and the annotated result of a request
//! - Output image formats
//! - Request pipeline stages

pub mod bbox;
pub mod detection;
pub mod output_format;
pub mod stage;

// Re-export common types
pub use bbox::{BoundingBox, PixelRect};
pub use detection::{AnnotatedResult, Detection, DEFAULT_FACE_LABEL};
pub use output_format::{OutputFormat, OutputFormatParseError, DEFAULT_JPEG_QUALITY};
pub use stage::PipelineStage;
