//! Encoded output formats for annotated images.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default JPEG quality for annotated output.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Container used when re-encoding the annotated raster.
///
/// The pipeline always encodes with its configured format; the request's
/// input format is never carried over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum OutputFormat {
    /// Baseline JPEG with a fixed quality (1-100).
    Jpeg { quality: u8 },
    /// Lossless PNG.
    Png,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Jpeg {
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl OutputFormat {
    /// JPEG with the quality clamped to 1..=100.
    pub fn jpeg(quality: u8) -> Self {
        OutputFormat::Jpeg {
            quality: quality.clamp(1, 100),
        }
    }

    /// Returns the format name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg { .. } => "jpeg",
            OutputFormat::Png => "png",
        }
    }

    /// MIME type for the `Content-Type` header.
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg { .. } => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = OutputFormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::default()),
            "png" => Ok(OutputFormat::Png),
            _ => Err(OutputFormatParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown output format: {0}")]
pub struct OutputFormatParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!("jpeg".parse::<OutputFormat>().unwrap(), OutputFormat::default());
        assert_eq!("JPG".parse::<OutputFormat>().unwrap(), OutputFormat::jpeg(90));
        assert_eq!("png".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert!("gif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_jpeg_quality_clamped() {
        assert_eq!(OutputFormat::jpeg(0), OutputFormat::Jpeg { quality: 1 });
        assert_eq!(OutputFormat::jpeg(200), OutputFormat::Jpeg { quality: 100 });
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(OutputFormat::default().mime_type(), "image/jpeg");
        assert_eq!(OutputFormat::Png.mime_type(), "image/png");
    }
}
