//! Bounding boxes in raster pixel space.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel coordinates, as emitted by a detector.
///
/// Values are not trusted: they may be negative, inverted, non-finite or
/// extend past the raster. Use [`BoundingBox::clip`] before drawing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    /// Left edge
    pub x_min: f32,
    /// Top edge
    pub y_min: f32,
    /// Right edge (exclusive)
    pub x_max: f32,
    /// Bottom edge (exclusive)
    pub y_max: f32,
}

impl BoundingBox {
    /// Create a box from its corners.
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Create a box from a center point and size (detector output layout).
    pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self::new(
            cx - width / 2.0,
            cy - height / 2.0,
            cx + width / 2.0,
            cy + height / 2.0,
        )
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }

    /// Box area, zero for inverted boxes.
    #[inline]
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// True when every coordinate is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x_min.is_finite()
            && self.y_min.is_finite()
            && self.x_max.is_finite()
            && self.y_max.is_finite()
    }

    /// Same box with each axis ordered so that min <= max.
    pub fn ordered(&self) -> BoundingBox {
        BoundingBox {
            x_min: self.x_min.min(self.x_max),
            y_min: self.y_min.min(self.y_max),
            x_max: self.x_min.max(self.x_max),
            y_max: self.y_min.max(self.y_max),
        }
    }

    /// True when the box lies fully inside `[0, width] x [0, height]`.
    pub fn is_within(&self, width: u32, height: u32) -> bool {
        let b = self.ordered();
        b.is_finite()
            && b.x_min >= 0.0
            && b.y_min >= 0.0
            && b.x_max <= width as f32
            && b.y_max <= height as f32
    }

    /// Compute Intersection over Union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x_min.max(other.x_min);
        let y1 = self.y_min.max(other.y_min);
        let x2 = self.x_max.min(other.x_max);
        let y2 = self.y_max.min(other.y_max);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Intersect the box with `[0, width] x [0, height]`.
    ///
    /// Edges are rounded outward to whole pixels before clamping. Returns
    /// `None` when the box is non-finite or the intersection is empty.
    pub fn clip(&self, width: u32, height: u32) -> Option<PixelRect> {
        if !self.is_finite() || width == 0 || height == 0 {
            return None;
        }

        let b = self.ordered();
        let x_min = b.x_min.floor().max(0.0);
        let y_min = b.y_min.floor().max(0.0);
        let x_max = b.x_max.ceil().min(width as f32);
        let y_max = b.y_max.ceil().min(height as f32);

        if x_min >= x_max || y_min >= y_max {
            return None;
        }

        Some(PixelRect {
            x_min: x_min as u32,
            y_min: y_min as u32,
            x_max: x_max as u32,
            y_max: y_max as u32,
        })
    }
}

/// Integer rectangle guaranteed to satisfy
/// `0 <= x_min < x_max <= W` and `0 <= y_min < y_max <= H` for the raster it
/// was clipped against. Max edges are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct PixelRect {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl PixelRect {
    #[inline]
    pub fn width(&self) -> u32 {
        self.x_max - self.x_min
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.y_max - self.y_min
    }

    /// True when pixel `(x, y)` lies inside the rectangle.
    #[inline]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x_min && x < self.x_max && y >= self.y_min && y < self.y_max
    }

    /// Rectangle shrunk by `inset` pixels on every side, or `None` once it
    /// collapses.
    pub fn inset(&self, inset: u32) -> Option<PixelRect> {
        let x_min = self.x_min.checked_add(inset)?;
        let y_min = self.y_min.checked_add(inset)?;
        let x_max = self.x_max.checked_sub(inset)?;
        let y_max = self.y_max.checked_sub(inset)?;

        (x_min < x_max && y_min < y_max).then_some(PixelRect {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }

    /// Overlap of two rectangles.
    pub fn intersect(&self, other: &PixelRect) -> Option<PixelRect> {
        let x_min = self.x_min.max(other.x_min);
        let y_min = self.y_min.max(other.y_min);
        let x_max = self.x_max.min(other.x_max);
        let y_max = self.y_max.min(other.y_max);

        (x_min < x_max && y_min < y_max).then_some(PixelRect {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }
}
