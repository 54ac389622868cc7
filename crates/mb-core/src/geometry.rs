//! Rotation-aware bounding boxes and viewport fitting.
//!
//! Items rotate around their anchor point `(x, y)`. Every piece of code that
//! needs an item's footprint (layout, hit testing, zoom-to-fit) goes through
//! [`rotated_bbox`] instead of assuming rotation is zero.

use crate::model::{CanvasItem, CanvasViewport};
use kurbo::{Affine, Rect};

/// Axis-aligned box enclosing a rotated rectangle.
///
/// `offset_x`/`offset_y` locate the box's top-left corner relative to the
/// rectangle's anchor (its unrotated top-left corner, the rotation pivot).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedBox {
    pub width: f64,
    pub height: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

/// Smallest axis-aligned box enclosing a `width × height` rectangle rotated
/// clockwise by `rotation_deg` around its anchor.
pub fn rotated_bbox(width: f64, height: f64, rotation_deg: f64) -> RotatedBox {
    let rect = Rect::new(0.0, 0.0, width, height);
    let bbox = Affine::rotate(rotation_deg.to_radians()).transform_rect_bbox(rect);
    RotatedBox {
        width: bbox.width(),
        height: bbox.height(),
        offset_x: bbox.x0,
        offset_y: bbox.y0,
    }
}

/// World-space axis-aligned bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// AABB overlap test.
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = (self.x + self.width).max(other.x + other.width);
        let y1 = (self.y + self.height).max(other.y + other.height);
        Bounds::new(x0, y0, x1 - x0, y1 - y0)
    }
}

/// World-space footprint of an item, rotation included.
pub fn item_bounds(item: &CanvasItem) -> Bounds {
    let (w, h) = item.scaled_size(None);
    let p = item.placement();
    let bbox = rotated_bbox(w, h, p.rotation);
    Bounds::new(p.x + bbox.offset_x, p.y + bbox.offset_y, bbox.width, bbox.height)
}

/// Union of the footprints of `items`, or `None` when there are none.
pub fn union_bounds<'a>(items: impl IntoIterator<Item = &'a CanvasItem>) -> Option<Bounds> {
    items
        .into_iter()
        .map(item_bounds)
        .reduce(|acc, b| acc.union(&b))
}

// ─── Viewport fitting ────────────────────────────────────────────────────

/// Viewport that fits `bounds` inside the screen, keeping `padding` screen
/// pixels free on every side. Keeps the screen size of `current`.
///
/// Returns `None` for degenerate bounds or a screen too small to fit.
pub fn contain_viewport(
    bounds: &Bounds,
    current: &CanvasViewport,
    padding: f64,
) -> Option<CanvasViewport> {
    if !(bounds.width > 0.0 && bounds.height > 0.0) {
        return None;
    }
    let scale_x = (current.width - padding * 2.0) / bounds.width;
    let scale_y = (current.height - padding * 2.0) / bounds.height;
    let scale = scale_x.min(scale_y);
    if !(scale.is_finite() && scale > 0.0) {
        return None;
    }
    Some(CanvasViewport {
        x: (current.width - bounds.width * scale) / 2.0 - bounds.x * scale,
        y: (current.height - bounds.height * scale) / 2.0 - bounds.y * scale,
        width: current.width,
        height: current.height,
        scale,
    })
}

/// Viewport with the same zoom as `current`, centered on `bounds`.
pub fn pan_viewport(bounds: &Bounds, current: &CanvasViewport) -> CanvasViewport {
    let (cx, cy) = bounds.center();
    CanvasViewport {
        x: current.width / 2.0 - cx * current.scale,
        y: current.height / 2.0 - cy * current.scale,
        ..*current
    }
}
