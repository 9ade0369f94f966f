//! Error types for the detection pipeline.

use std::fmt;

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while processing one request.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid raster: {0}")]
    InvalidRaster(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("No model handle became available within {0} ms")]
    ModelUnavailable(u64),

    #[error("Request deadline exceeded before the {0} stage")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable tag for each error, surfaced to callers alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Decode,
    UnsupportedFormat,
    Inference,
    InvalidRaster,
    Encode,
    ModelUnavailable,
    Timeout,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Decode => "decode_error",
            ErrorKind::UnsupportedFormat => "unsupported_format",
            ErrorKind::Inference => "inference_error",
            ErrorKind::InvalidRaster => "invalid_raster",
            ErrorKind::Encode => "encode_error",
            ErrorKind::ModelUnavailable => "model_unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MediaError {
    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Create an unsupported format error.
    pub fn unsupported_format(message: impl Into<String>) -> Self {
        Self::UnsupportedFormat(message.into())
    }

    /// Create an inference failure error.
    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference(message.into())
    }

    /// Create an invalid raster error.
    pub fn invalid_raster(message: impl Into<String>) -> Self {
        Self::InvalidRaster(message.into())
    }

    /// Create an encode error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode(message.into())
    }

    /// Create a model not found error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::ModelNotFound(path.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MediaError::Decode(_) => ErrorKind::Decode,
            MediaError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            MediaError::Inference(_) => ErrorKind::Inference,
            MediaError::InvalidRaster(_) => ErrorKind::InvalidRaster,
            MediaError::Encode(_) => ErrorKind::Encode,
            MediaError::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            MediaError::Timeout(_) => ErrorKind::Timeout,
            MediaError::ModelNotFound(_) | MediaError::Io(_) | MediaError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Returns true if the caller's input caused the failure.
    pub fn is_client_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Decode | ErrorKind::UnsupportedFormat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(MediaError::decode("x").kind(), ErrorKind::Decode);
        assert_eq!(MediaError::inference("x").kind().as_str(), "inference_error");
        assert_eq!(MediaError::ModelUnavailable(10).kind(), ErrorKind::ModelUnavailable);
        assert_eq!(MediaError::model_not_found("m.onnx").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_client_errors() {
        assert!(MediaError::decode("empty").is_client_error());
        assert!(MediaError::unsupported_format("gif").is_client_error());
        assert!(!MediaError::invalid_raster("len").is_client_error());
        assert!(!MediaError::encode("len").is_client_error());
    }
}
