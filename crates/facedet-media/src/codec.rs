//! Image container decoding and encoding.
//!
//! Decoding always normalizes to 8-bit RGB. Encoding is deterministic: the
//! same raster and format produce byte-identical output.

use std::io::Cursor;

use facedet_models::OutputFormat;
use image::codecs::gif::GifDecoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{PngDecoder, PngEncoder};
use image::codecs::webp::WebPDecoder;
use image::error::ImageError;
use image::io::{Limits, Reader};
use image::{AnimationDecoder, ColorType, ImageDecoder, ImageEncoder, ImageFormat};
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::raster::{ChannelLayout, Raster};

/// Default maximum accepted image edge, in pixels.
pub const DEFAULT_MAX_DIMENSION: u32 = 16_384;

/// Default decoder allocation budget (512 MiB).
pub const DEFAULT_MAX_ALLOC_BYTES: u64 = 512 * 1024 * 1024;

/// Decoder limits guarding against decompression bombs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_width: u32,
    pub max_height: u32,
    pub max_alloc_bytes: u64,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_DIMENSION,
            max_height: DEFAULT_MAX_DIMENSION,
            max_alloc_bytes: DEFAULT_MAX_ALLOC_BYTES,
        }
    }
}

/// Converts between encoded image bytes and [`Raster`]s.
#[derive(Debug, Clone, Default)]
pub struct ImageCodec {
    limits: DecodeLimits,
}

impl ImageCodec {
    pub fn new(limits: DecodeLimits) -> Self {
        Self { limits }
    }

    /// Identify the container from its magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    /// Decode an encoded image into an RGB raster.
    ///
    /// Empty input is rejected before any format sniffing. Unknown or corrupt
    /// containers fail with [`MediaError::Decode`]; recognized containers that
    /// cannot be processed (animations, formats not compiled in) fail with
    /// [`MediaError::UnsupportedFormat`].
    pub fn decode(&self, bytes: &[u8]) -> MediaResult<Raster> {
        if bytes.is_empty() {
            return Err(MediaError::decode("empty image payload"));
        }

        let format = Self::sniff(bytes)
            .ok_or_else(|| MediaError::decode("unrecognized image container"))?;

        reject_animation(bytes, format, &self.limits)?;

        let mut reader = Reader::with_format(Cursor::new(bytes), format);
        reader.limits(image_limits(&self.limits));

        let image = reader.decode().map_err(|e| map_decode_error(e, format))?;
        let rgb = image.into_rgb8();

        debug!(
            format = ?format,
            width = rgb.width(),
            height = rgb.height(),
            "Decoded input image"
        );

        let raster = Raster::from_rgb_image(rgb);
        if raster.width == 0 || raster.height == 0 {
            return Err(MediaError::decode("image has zero width or height"));
        }
        Ok(raster)
    }

    /// Encode a raster into the given output format.
    pub fn encode(&self, raster: &Raster, format: OutputFormat) -> MediaResult<Vec<u8>> {
        raster
            .validate()
            .map_err(|e| MediaError::encode(e.to_string()))?;

        let mut out = Vec::new();
        match format {
            OutputFormat::Jpeg { quality } => {
                // JPEG carries no alpha channel
                let rgb;
                let data = match raster.layout {
                    ChannelLayout::Rgb => raster.data.as_slice(),
                    ChannelLayout::Rgba => {
                        rgb = raster.clone().into_rgb_image()?.into_raw();
                        rgb.as_slice()
                    }
                };
                JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
                    .encode(data, raster.width, raster.height, ColorType::Rgb8)
                    .map_err(|e| MediaError::encode(format!("JPEG encoding failed: {}", e)))?;
            }
            OutputFormat::Png => {
                let color = match raster.layout {
                    ChannelLayout::Rgb => ColorType::Rgb8,
                    ChannelLayout::Rgba => ColorType::Rgba8,
                };
                PngEncoder::new(&mut out)
                    .write_image(&raster.data, raster.width, raster.height, color)
                    .map_err(|e| MediaError::encode(format!("PNG encoding failed: {}", e)))?;
            }
        }

        Ok(out)
    }

}

/// Multi-frame containers are recognized but not processed.
///
/// Container decoders are limited before any frame is read; a GIF frame
/// walk allocates a full logical-screen canvas per frame.
fn reject_animation(bytes: &[u8], format: ImageFormat, limits: &DecodeLimits) -> MediaResult<()> {
    match format {
        ImageFormat::Gif => {
            let mut decoder = GifDecoder::new(Cursor::new(bytes))
                .map_err(|e| map_decode_error(e, format))?;
            check_canvas(&mut decoder, format, limits)?;
            if decoder.into_frames().take(2).count() > 1 {
                return Err(MediaError::unsupported_format("animated GIF"));
            }
            Ok(())
        }
        ImageFormat::Png => {
            let mut decoder = PngDecoder::new(Cursor::new(bytes))
                .map_err(|e| map_decode_error(e, format))?;
            check_canvas(&mut decoder, format, limits)?;
            if decoder.is_apng() {
                return Err(MediaError::unsupported_format("animated PNG"));
            }
            Ok(())
        }
        ImageFormat::WebP => {
            let mut decoder = WebPDecoder::new(Cursor::new(bytes))
                .map_err(|e| map_decode_error(e, format))?;
            check_canvas(&mut decoder, format, limits)?;
            if decoder.has_animation() {
                return Err(MediaError::unsupported_format("animated WebP"));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Check the declared canvas against the decode limits before any pixel
/// buffer is allocated.
fn check_canvas<'a, D: ImageDecoder<'a>>(
    decoder: &mut D,
    format: ImageFormat,
    limits: &DecodeLimits,
) -> MediaResult<()> {
    let (width, height) = decoder.dimensions();
    let canvas_bytes = u64::from(width) * u64::from(height) * 4;
    if width > limits.max_width || height > limits.max_height || canvas_bytes > limits.max_alloc_bytes {
        return Err(MediaError::decode(format!(
            "image exceeds decode limits: {:?} canvas {}x{}",
            format, width, height
        )));
    }
    decoder
        .set_limits(image_limits(limits))
        .map_err(|e| map_decode_error(e, format))
}

fn image_limits(limits: &DecodeLimits) -> Limits {
    let mut out = Limits::default();
    out.max_image_width = Some(limits.max_width);
    out.max_image_height = Some(limits.max_height);
    out.max_alloc = Some(limits.max_alloc_bytes);
    out
}

fn map_decode_error(error: ImageError, format: ImageFormat) -> MediaError {
    match error {
        ImageError::Unsupported(e) => {
            MediaError::unsupported_format(format!("{:?}: {}", format, e))
        }
        ImageError::Limits(e) => MediaError::decode(format!("image exceeds decode limits: {}", e)),
        ImageError::IoError(e) => MediaError::decode(format!("truncated {:?} data: {}", format, e)),
        other => MediaError::decode(format!("malformed {:?} data: {}", format, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Raster {
        let image = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
        });
        Raster::from_rgb_image(image)
    }

    #[test]
    fn test_empty_input_is_decode_error() {
        let err = ImageCodec::default().decode(&[]).unwrap_err();
        assert!(matches!(err, MediaError::Decode(ref m) if m.contains("empty")));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = ImageCodec::default().decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, MediaError::Decode(_)));
    }

    #[test]
    fn test_truncated_png_is_decode_error() {
        let codec = ImageCodec::default();
        let bytes = codec.encode(&gradient(32, 32), OutputFormat::Png).unwrap();
        let err = codec.decode(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, MediaError::Decode(_)), "got {err:?}");
    }

    #[test]
    fn test_png_round_trip_is_exact() {
        let codec = ImageCodec::default();
        let raster = gradient(40, 30);
        let bytes = codec.encode(&raster, OutputFormat::Png).unwrap();
        assert_eq!(ImageCodec::sniff(&bytes), Some(ImageFormat::Png));
        assert_eq!(codec.decode(&bytes).unwrap(), raster);
    }

    #[test]
    fn test_jpeg_round_trip_within_tolerance() {
        let codec = ImageCodec::default();
        let raster = gradient(64, 48);
        let bytes = codec.encode(&raster, OutputFormat::default()).unwrap();
        let decoded = codec.decode(&bytes).unwrap();

        assert_eq!((decoded.width, decoded.height), (64, 48));
        assert_eq!(decoded.layout, ChannelLayout::Rgb);
        let total: u64 = raster
            .data
            .iter()
            .zip(&decoded.data)
            .map(|(a, b)| (*a as i16 - *b as i16).unsigned_abs() as u64)
            .sum();
        let mean = total as f64 / raster.data.len() as f64;
        assert!(mean < 4.0, "mean abs error too high: {mean}");
    }

    #[test]
    fn test_encode_is_deterministic() {
        let codec = ImageCodec::default();
        let raster = gradient(50, 50);
        for format in [OutputFormat::default(), OutputFormat::Png] {
            let a = codec.encode(&raster, format).unwrap();
            let b = codec.encode(&raster, format).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_encode_rejects_invalid_raster() {
        let mut raster = gradient(8, 8);
        raster.data.pop();
        let err = ImageCodec::default().encode(&raster, OutputFormat::Png).unwrap_err();
        assert!(matches!(err, MediaError::Encode(_)));
    }

    #[test]
    fn test_rgba_png_input_normalized_to_rgb() {
        let rgba = image::RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 128]));
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes)
            .write_image(rgba.as_raw(), 4, 4, ColorType::Rgba8)
            .unwrap();

        let raster = ImageCodec::default().decode(&bytes).unwrap();
        assert_eq!(raster.layout, ChannelLayout::Rgb);
        assert_eq!(raster.data.len(), 4 * 4 * 3);
        assert_eq!(raster.pixel(0, 0), Some(&[10u8, 20, 30][..]));
    }

    #[test]
    fn test_dimension_limits() {
        let codec = ImageCodec::new(DecodeLimits {
            max_width: 16,
            max_height: 16,
            max_alloc_bytes: DEFAULT_MAX_ALLOC_BYTES,
        });
        let bytes = ImageCodec::default().encode(&gradient(32, 8), OutputFormat::Png).unwrap();
        assert!(matches!(codec.decode(&bytes).unwrap_err(), MediaError::Decode(_)));
    }

    #[test]
    fn test_animated_gif_is_unsupported() {
        use image::codecs::gif::{GifEncoder, Repeat};
        use image::{Delay, Frame, RgbaImage};

        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            encoder.set_repeat(Repeat::Infinite).unwrap();
            let frames = [[255u8, 0, 0, 255], [0u8, 0, 255, 255]].map(|px| {
                Frame::from_parts(
                    RgbaImage::from_pixel(4, 4, image::Rgba(px)),
                    0,
                    0,
                    Delay::from_numer_denom_ms(100, 1),
                )
            });
            encoder.encode_frames(frames).unwrap();
        }

        let err = ImageCodec::default().decode(&bytes).unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedFormat(_)), "got {err:?}");
    }

    #[test]
    fn test_gif_screen_checked_before_frames() {
        // 8000x8000 logical screen holding a single 1x1 frame
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&[0x40, 0x1F, 0x40, 0x1F, 0x80, 0x00, 0x00]);
        bytes.extend_from_slice(&[0, 0, 0, 255, 255, 255]);
        bytes.extend_from_slice(&[0x2C, 0, 0, 0, 0, 1, 0, 1, 0, 0x00]);
        bytes.extend_from_slice(&[0x02, 0x02, 0x44, 0x01, 0x00, 0x3B]);

        let codec = ImageCodec::new(DecodeLimits {
            max_width: 64,
            max_height: 64,
            max_alloc_bytes: 1024 * 1024,
        });
        let err = codec.decode(&bytes).unwrap_err();
        assert!(
            matches!(err, MediaError::Decode(ref m) if m.contains("8000x8000")),
            "got {err:?}"
        );
    }

    fn riff_chunk(fourcc: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut chunk = fourcc.to_vec();
        chunk.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        chunk.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            chunk.push(0);
        }
        chunk
    }

    fn u24(value: u32) -> [u8; 3] {
        let b = value.to_le_bytes();
        [b[0], b[1], b[2]]
    }

    #[test]
    fn test_animated_webp_is_unsupported() {
        use image::codecs::webp::WebPEncoder;

        let mut still = Vec::new();
        let pixels = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 10, 10]));
        WebPEncoder::new_lossless(&mut still)
            .encode(pixels.as_raw(), 4, 4, ColorType::Rgb8)
            .unwrap();
        assert_eq!(ImageCodec::default().decode(&still).unwrap().width, 4);

        // Lift the VP8L chunk out of the still image
        let start = still.windows(4).position(|w| w == b"VP8L").unwrap();
        let size = u32::from_le_bytes(still[start + 4..start + 8].try_into().unwrap()) as usize;
        let vp8l = still[start + 8..start + 8 + size].to_vec();

        let mut vp8x = vec![0x02, 0, 0, 0];
        vp8x.extend_from_slice(&u24(3));
        vp8x.extend_from_slice(&u24(3));

        let mut body = b"WEBP".to_vec();
        body.extend(riff_chunk(b"VP8X", &vp8x));
        body.extend(riff_chunk(b"ANIM", &[0, 0, 0, 0, 0, 0]));
        for _ in 0..2 {
            let mut frame = Vec::new();
            frame.extend_from_slice(&u24(0));
            frame.extend_from_slice(&u24(0));
            frame.extend_from_slice(&u24(3));
            frame.extend_from_slice(&u24(3));
            frame.extend_from_slice(&u24(100));
            frame.push(0);
            frame.extend(riff_chunk(b"VP8L", &vp8l));
            body.extend(riff_chunk(b"ANMF", &frame));
        }

        let mut bytes = b"RIFF".to_vec();
        bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
        bytes.extend(body);

        assert_eq!(ImageCodec::sniff(&bytes), Some(ImageFormat::WebP));
        let err = ImageCodec::default().decode(&bytes).unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedFormat(_)), "got {err:?}");
    }

    #[test]
    fn test_single_frame_gif_decodes() {
        use image::codecs::gif::GifEncoder;
        use image::{Delay, Frame, RgbaImage};

        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            let frame = Frame::from_parts(
                RgbaImage::from_pixel(4, 4, image::Rgba([0, 255, 0, 255])),
                0,
                0,
                Delay::from_numer_denom_ms(100, 1),
            );
            encoder.encode_frames([frame]).unwrap();
        }

        let raster = ImageCodec::default().decode(&bytes).unwrap();
        assert_eq!((raster.width, raster.height), (4, 4));
    }
}
