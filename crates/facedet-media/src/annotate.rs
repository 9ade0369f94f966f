//! Box and label overlays.
//!
//! Every drawn pixel lies inside the clipped rectangle of the detection it
//! belongs to, so overlays can never leave the canvas. Later detections
//! paint over earlier ones.

use std::path::Path;
use std::sync::Arc;

use facedet_models::{Detection, PixelRect};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::metrics;
use crate::raster::Raster;

/// Padding between the label tab edge and its text.
const LABEL_PADDING: u32 = 2;

/// Visual style of the overlays.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderStyle {
    /// Outline thickness in pixels, drawn inward from the clipped edge
    pub stroke_width: u32,
    pub color: [u8; 3],
    pub draw_labels: bool,
    pub label_background: [u8; 3],
    pub label_text_color: [u8; 3],
    /// Glyph height in pixels
    pub label_scale: f32,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            stroke_width: 2,
            color: [0, 255, 0],
            draw_labels: true,
            label_background: [0, 255, 0],
            label_text_color: [0, 0, 0],
            label_scale: 14.0,
        }
    }
}

/// TrueType font used for label text.
#[derive(Clone)]
pub struct LabelFont(Arc<Font<'static>>);

impl LabelFont {
    pub fn from_bytes(bytes: Vec<u8>) -> MediaResult<Self> {
        Font::try_from_vec(bytes)
            .map(|font| Self(Arc::new(font)))
            .ok_or_else(|| MediaError::internal("Invalid TrueType font data"))
    }

    pub fn from_file(path: impl AsRef<Path>) -> MediaResult<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(bytes)
    }
}

impl std::fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LabelFont")
    }
}

/// Result of rendering one raster.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub raster: Raster,
    /// Detections that produced an overlay
    pub drawn: usize,
    /// Drawn detections whose box extended past the raster
    pub clipped: usize,
    /// Detections with no overlap with the raster
    pub skipped: usize,
}

/// Draws detection overlays onto rasters.
#[derive(Debug, Clone, Default)]
pub struct AnnotationRenderer {
    style: RenderStyle,
    font: Option<LabelFont>,
}

impl AnnotationRenderer {
    pub fn new(style: RenderStyle) -> Self {
        Self { style, font: None }
    }

    /// Render label text with `font`. Without a font only the label tab is drawn.
    pub fn with_font(mut self, font: LabelFont) -> Self {
        self.font = Some(font);
        self
    }

    pub fn style(&self) -> &RenderStyle {
        &self.style
    }

    /// Draw `detections` in order onto `raster`.
    ///
    /// With no detections the input raster is returned untouched.
    pub fn render(&self, raster: Raster, detections: &[Detection]) -> MediaResult<RenderOutput> {
        raster.validate()?;

        if detections.is_empty() {
            return Ok(RenderOutput {
                raster,
                drawn: 0,
                clipped: 0,
                skipped: 0,
            });
        }

        let (width, height) = (raster.width, raster.height);
        let mut canvas = raster.into_rgb_image()?;
        let (mut drawn, mut clipped, mut skipped) = (0, 0, 0);

        for (index, detection) in detections.iter().enumerate() {
            let Some(rect) = detection.bbox.clip(width, height) else {
                skipped += 1;
                debug!(index, bbox = ?detection.bbox, "Detection outside raster, skipped");
                continue;
            };

            if !detection.bbox.is_within(width, height) {
                clipped += 1;
                debug!(index, bbox = ?detection.bbox, clipped = ?rect, "Detection clipped to raster");
            }

            self.draw_outline(&mut canvas, rect);
            if self.style.draw_labels {
                if let Some(caption) = detection.caption() {
                    self.draw_label(&mut canvas, rect, &caption);
                }
            }
            drawn += 1;
        }

        metrics::record_boxes_adjusted(clipped, skipped);

        Ok(RenderOutput {
            raster: Raster::from_rgb_image(canvas),
            drawn,
            clipped,
            skipped,
        })
    }

    fn draw_outline(&self, canvas: &mut RgbImage, rect: PixelRect) {
        let color = Rgb(self.style.color);
        for inset in 0..self.style.stroke_width.max(1) {
            let Some(ring) = rect.inset(inset) else {
                break;
            };
            draw_hollow_rect_mut(canvas, to_rect(ring), color);
        }
    }

    /// Label tab anchored at the rect's top-left, cut to the rect.
    fn draw_label(&self, canvas: &mut RgbImage, rect: PixelRect, caption: &str) {
        let scale = Scale::uniform(self.style.label_scale.max(1.0));
        let text_width = match &self.font {
            Some(font) => text_size(scale, font.0.as_ref(), caption).0.max(0) as u32,
            // No font: size the tab from an average glyph width.
            None => (caption.chars().count() as f32 * scale.x * 0.5).ceil() as u32,
        };
        let tab_width = text_width + 2 * LABEL_PADDING;
        let tab_height = scale.y.ceil() as u32 + 2 * LABEL_PADDING;

        let tab = PixelRect {
            x_min: rect.x_min,
            y_min: rect.y_min,
            x_max: rect.x_min.saturating_add(tab_width),
            y_max: rect.y_min.saturating_add(tab_height),
        };
        let Some(visible) = tab.intersect(&rect) else {
            return;
        };

        let background = Rgb(self.style.label_background);
        let Some(font) = &self.font else {
            draw_filled_rect_mut(canvas, to_rect(visible), background);
            return;
        };

        // Render the whole tab off-canvas, then copy only the visible part.
        let mut tab_image = RgbImage::from_pixel(tab_width, tab_height, background);
        draw_text_mut(
            &mut tab_image,
            Rgb(self.style.label_text_color),
            LABEL_PADDING as i32,
            LABEL_PADDING as i32,
            scale,
            font.0.as_ref(),
            caption,
        );
        for dy in 0..visible.height() {
            for dx in 0..visible.width() {
                let pixel = *tab_image.get_pixel(dx, dy);
                canvas.put_pixel(visible.x_min + dx, visible.y_min + dy, pixel);
            }
        }
    }
}

fn to_rect(rect: PixelRect) -> Rect {
    Rect::at(rect.x_min as i32, rect.y_min as i32).of_size(rect.width(), rect.height())
}
