//! Decoded pixel buffers passed between pipeline stages.
//!
//! A `Raster` is moved from stage to stage; no stage keeps a reference to a
//! raster it has handed on.

use image::{ImageBuffer, Rgb, RgbImage};

use crate::error::{MediaError, MediaResult};

/// Interleaved 8-bit channel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelLayout {
    Rgb,
    Rgba,
}

impl ChannelLayout {
    /// Number of bytes per pixel.
    pub fn channels(&self) -> usize {
        match self {
            ChannelLayout::Rgb => 3,
            ChannelLayout::Rgba => 4,
        }
    }
}

/// Row-major pixel buffer.
///
/// Invariant: `width > 0`, `height > 0` and
/// `data.len() == width * height * channels`. Fields are public so foreign
/// buffers can be wrapped cheaply; every stage re-checks the invariant with
/// [`Raster::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub layout: ChannelLayout,
    pub data: Vec<u8>,
}

impl Raster {
    /// Create a raster, rejecting buffers that violate the length invariant.
    pub fn new(width: u32, height: u32, layout: ChannelLayout, data: Vec<u8>) -> MediaResult<Self> {
        let raster = Self {
            width,
            height,
            layout,
            data,
        };
        raster.validate()?;
        Ok(raster)
    }

    /// RGB raster filled with a single color.
    pub fn filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let image = RgbImage::from_pixel(width, height, Rgb(color));
        Self::from_rgb_image(image)
    }

    /// Wrap an `image` RGB buffer without copying.
    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            layout: ChannelLayout::Rgb,
            data: image.into_raw(),
        }
    }

    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    /// Buffer length implied by the dimensions, `None` on overflow.
    pub fn expected_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.channels())
    }

    /// Check the dimension and buffer-length invariant.
    pub fn validate(&self) -> MediaResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MediaError::invalid_raster(format!(
                "zero-sized raster {}x{}",
                self.width, self.height
            )));
        }

        match self.expected_len() {
            Some(expected) if expected == self.data.len() => Ok(()),
            Some(expected) => Err(MediaError::invalid_raster(format!(
                "buffer length {} does not match {}x{}x{} = {}",
                self.data.len(),
                self.width,
                self.height,
                self.channels(),
                expected
            ))),
            None => Err(MediaError::invalid_raster(format!(
                "raster dimensions {}x{} overflow",
                self.width, self.height
            ))),
        }
    }

    /// Bytes of the pixel at `(x, y)`, `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let c = self.channels();
        let offset = (y as usize * self.width as usize + x as usize) * c;
        self.data.get(offset..offset + c)
    }

    /// Convert into an owned RGB image, dropping alpha if present.
    pub fn into_rgb_image(self) -> MediaResult<RgbImage> {
        self.validate()?;
        let (width, height) = (self.width, self.height);

        let data = match self.layout {
            ChannelLayout::Rgb => self.data,
            ChannelLayout::Rgba => self
                .data
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect(),
        };

        ImageBuffer::from_raw(width, height, data)
            .ok_or_else(|| MediaError::invalid_raster("failed to wrap raster buffer"))
    }
}
