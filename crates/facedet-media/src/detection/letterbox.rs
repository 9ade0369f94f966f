//! Letterbox mapping between raster space and the square model canvas.
//!
//! The raster is scaled to fit the canvas with its aspect ratio preserved
//! and centered; the remaining border is filled with a constant gray.
//! Inverse mapping: `x_raster = (x_canvas - pad_left) / scale`.

use facedet_models::BoundingBox;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

/// Padding value YOLOv8 exports are trained with.
pub const DEFAULT_PADDING_VALUE: u8 = 114;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub raw_width: u32,
    pub raw_height: u32,
    pub canvas_size: u32,
    /// Scale applied to the raster (min of the x/y scales)
    pub scale: f64,
    pub pad_left: u32,
    pub pad_top: u32,
    pub scaled_width: u32,
    pub scaled_height: u32,
    pub padding_value: u8,
}

impl Letterbox {
    pub fn compute(raw_w: u32, raw_h: u32, canvas_size: u32) -> Self {
        let scale_x = canvas_size as f64 / raw_w as f64;
        let scale_y = canvas_size as f64 / raw_h as f64;
        let scale = scale_x.min(scale_y);

        let scaled_w = ((raw_w as f64 * scale).round() as u32).clamp(1, canvas_size);
        let scaled_h = ((raw_h as f64 * scale).round() as u32).clamp(1, canvas_size);

        Self {
            raw_width: raw_w,
            raw_height: raw_h,
            canvas_size,
            scale,
            pad_left: (canvas_size - scaled_w) / 2,
            pad_top: (canvas_size - scaled_h) / 2,
            scaled_width: scaled_w,
            scaled_height: scaled_h,
            padding_value: DEFAULT_PADDING_VALUE,
        }
    }

    /// Resize `image` onto a padded square canvas.
    pub fn apply(&self, image: &RgbImage) -> RgbImage {
        let resized = imageops::resize(image, self.scaled_width, self.scaled_height, FilterType::Triangle);
        let fill = self.padding_value;
        let mut canvas = RgbImage::from_pixel(self.canvas_size, self.canvas_size, Rgb([fill, fill, fill]));
        imageops::replace(&mut canvas, &resized, self.pad_left as i64, self.pad_top as i64);
        canvas
    }

    /// Map a canvas point back to raster space. The result is not clamped.
    #[inline]
    pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
        let x_raw = (x as f64 - self.pad_left as f64) / self.scale;
        let y_raw = (y as f64 - self.pad_top as f64) / self.scale;
        (x_raw as f32, y_raw as f32)
    }

    pub fn map_box(&self, bbox: &BoundingBox) -> BoundingBox {
        let (x_min, y_min) = self.map_point(bbox.x_min, bbox.y_min);
        let (x_max, y_max) = self.map_point(bbox.x_max, bbox.y_max);
        BoundingBox::new(x_min, y_min, x_max, y_max)
    }
}
