#![deny(unreachable_patterns)]
//! Image processing core for the face detection service.
//!
//! This crate provides:
//! - Image decoding and deterministic encoding ([`ImageCodec`])
//! - Face detection over a pool of pre-loaded model handles ([`DetectionEngine`])
//! - A YOLOv8-face backend on ONNX Runtime ([`OnnxFaceModel`])
//! - Box and label overlays ([`AnnotationRenderer`])
//! - The per-request pipeline with injectable hooks ([`RequestPipeline`])

pub mod annotate;
pub mod codec;
pub mod detection;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod raster;

pub use annotate::{AnnotationRenderer, LabelFont, RenderOutput, RenderStyle};
pub use codec::{DecodeLimits, ImageCodec};
pub use detection::{
    DetectionEngine, EngineConfig, FaceModel, ModelHandle, ModelLease, OnnxFaceModel,
    OnnxModelConfig, PoolStats, RawDetection,
};
pub use error::{ErrorKind, MediaError, MediaResult};
pub use pipeline::{
    HookChain, LoggingHook, MetricsHook, NoopHook, PipelineConfig, PipelineFailure, PipelineHook,
    PipelineOutcome, RequestInfo, RequestPipeline,
};
pub use raster::{ChannelLayout, Raster};
