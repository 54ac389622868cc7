//! Core data model for canvas items.
//!
//! A canvas is an ordered list of items. List order is paint order: the
//! last item is drawn on top, so "bring to front" is a list move rather
//! than a z-index field. Items are either images or text blocks; both kinds
//! share a `Placement` (anchor position, rotation, uniform scale) and a
//! transient selection flag that never reaches storage.

use crate::id::ItemId;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

// ─── Placement ───────────────────────────────────────────────────────────

/// Position, rotation and uniform scale shared by every item kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub id: ItemId,
    /// World-space anchor point. Rotation pivots around it.
    pub x: f64,
    pub y: f64,
    /// Degrees, clockwise.
    pub rotation: f64,
    /// Uniform scale factor, always `> 0`.
    pub scale: f64,
    /// Transient, never persisted.
    pub is_selected: bool,
}

impl Placement {
    pub fn new(id: ItemId, x: f64, y: f64) -> Self {
        Self {
            id,
            x,
            y,
            rotation: 0.0,
            scale: 1.0,
            is_selected: false,
        }
    }
}

// ─── Images ──────────────────────────────────────────────────────────────

/// Folder, relative to a canvas folder, holding dropped or pasted images.
pub const TEMP_ASSET_DIR: &str = "temp-images";

/// Whether an image path lives under the canvas's managed asset folder.
pub fn is_temp_asset(path: &str) -> bool {
    path.replace('\\', "/")
        .strip_prefix(TEMP_ASSET_DIR)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Identifiers of filters applied to an image, in application order.
pub type FilterList = SmallVec<[String; 2]>;

/// Metadata for an image about to be placed on a canvas.
///
/// Library artifacts carry their artifact `id`; dropped files are described
/// by a `temp-images/…` path and their id is not kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageMeta {
    pub id: String,
    pub image_path: String,
    pub width: f64,
    pub height: f64,
    pub dominant_color: Option<String>,
    pub tone: Option<String>,
    pub page_url: Option<String>,
    pub tags: Vec<String>,
    pub created_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageItem {
    pub placement: Placement,
    pub image_path: String,
    /// Library artifact this image refers to: `Some` for library images,
    /// always `None` for temp images.
    pub artifact_id: Option<String>,
    /// Intrinsic size, before scaling.
    pub width: f64,
    pub height: f64,
    /// Per-axis factors; a negative sign flips the image on that axis.
    pub scale_x: f64,
    pub scale_y: f64,
    pub dominant_color: Option<String>,
    pub tone: Option<String>,
    pub filters: FilterList,
    pub page_url: Option<String>,
    pub tags: Vec<String>,
    pub created_at: Option<i64>,
}

impl ImageItem {
    /// Library images without an artifact id are identified by their path.
    pub fn from_meta(id: ItemId, meta: ImageMeta, x: f64, y: f64) -> Self {
        let artifact_id = if is_temp_asset(&meta.image_path) {
            None
        } else if meta.id.is_empty() {
            Some(meta.image_path.clone())
        } else {
            Some(meta.id)
        };
        Self {
            placement: Placement::new(id, x, y),
            image_path: meta.image_path,
            artifact_id,
            width: meta.width,
            height: meta.height,
            scale_x: 1.0,
            scale_y: 1.0,
            dominant_color: meta.dominant_color,
            tone: meta.tone,
            filters: FilterList::new(),
            page_url: meta.page_url,
            tags: meta.tags,
            created_at: meta.created_at,
        }
    }

    pub fn is_temp(&self) -> bool {
        is_temp_asset(&self.image_path)
    }
}

// ─── Text ────────────────────────────────────────────────────────────────

/// Horizontal text alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    pub placement: Placement,
    pub text: String,
    pub font_size: f64,
    pub fill: String,
    /// Measured size of the rendered text box, before scaling.
    pub width: f64,
    pub height: f64,
    pub scale_x: f64,
    pub align: Option<TextAlign>,
    /// Transient: asks the presentation layer to open the editor right away.
    pub is_auto_edit: bool,
}

// ─── Items ───────────────────────────────────────────────────────────────

/// An item placed on a canvas.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasItem {
    Image(ImageItem),
    Text(TextItem),
}

impl CanvasItem {
    pub fn id(&self) -> ItemId {
        self.placement().id
    }

    pub fn placement(&self) -> &Placement {
        match self {
            CanvasItem::Image(img) => &img.placement,
            CanvasItem::Text(txt) => &txt.placement,
        }
    }

    pub fn placement_mut(&mut self) -> &mut Placement {
        match self {
            CanvasItem::Image(img) => &mut img.placement,
            CanvasItem::Text(txt) => &mut txt.placement,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            CanvasItem::Image(_) => "image",
            CanvasItem::Text(_) => "text",
        }
    }

    pub fn as_image(&self) -> Option<&ImageItem> {
        match self {
            CanvasItem::Image(img) => Some(img),
            CanvasItem::Text(_) => None,
        }
    }

    pub fn is_selected(&self) -> bool {
        self.placement().is_selected
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.placement_mut().is_selected = selected;
    }

    /// Rendered size after uniform and per-axis scaling, before rotation.
    ///
    /// `fallback` substitutes for an unmeasured (zero) intrinsic size.
    pub fn scaled_size(&self, fallback: Option<(f64, f64)>) -> (f64, f64) {
        let pick = |value: f64, default: f64| {
            if value > 0.0 {
                value
            } else {
                fallback.map_or(value.max(0.0), |_| default)
            }
        };
        let (fw, fh) = fallback.unwrap_or((0.0, 0.0));
        match self {
            CanvasItem::Image(img) => {
                let s = img.placement.scale;
                (
                    pick(img.width, fw) * s * img.scale_x.abs(),
                    pick(img.height, fh) * s * img.scale_y.abs(),
                )
            }
            CanvasItem::Text(txt) => {
                let s = txt.placement.scale;
                (
                    pick(txt.width, fw) * s * txt.scale_x.abs(),
                    pick(txt.height, fh) * s,
                )
            }
        }
    }

    /// Clear every transient field (selection, auto-edit request).
    pub fn strip_transient(&mut self) {
        self.set_selected(false);
        if let CanvasItem::Text(txt) = self {
            txt.is_auto_edit = false;
        }
    }

    /// A copy with transient fields cleared.
    pub fn without_transient(&self) -> CanvasItem {
        let mut copy = self.clone();
        copy.strip_transient();
        copy
    }

    /// Equality of the persistent state, ignoring transient fields.
    pub fn same_persistent_state(&self, other: &CanvasItem) -> bool {
        self.without_transient() == other.without_transient()
    }

    /// Apply a partial update in place. Fields that do not exist on this
    /// item kind are ignored.
    pub fn apply_patch(&mut self, patch: &ItemPatch) {
        let p = self.placement_mut();
        if let Some(x) = patch.x {
            p.x = x;
        }
        if let Some(y) = patch.y {
            p.y = y;
        }
        if let Some(rotation) = patch.rotation {
            p.rotation = rotation;
        }
        if let Some(scale) = patch.scale {
            if scale.is_finite() && scale > 0.0 {
                p.scale = scale;
            } else {
                log::warn!("ignoring non-positive scale {scale} for item {}", p.id);
            }
        }

        match self {
            CanvasItem::Image(img) => {
                if let Some(sx) = patch.scale_x {
                    img.scale_x = sx;
                }
                if let Some(sy) = patch.scale_y {
                    img.scale_y = sy;
                }
                if let Some(w) = patch.width {
                    img.width = w;
                }
                if let Some(h) = patch.height {
                    img.height = h;
                }
                if let Some(filters) = &patch.filters {
                    img.filters = filters.clone();
                }
                if let Some(color) = &patch.dominant_color {
                    img.dominant_color = color.clone();
                }
                if let Some(tone) = &patch.tone {
                    img.tone = tone.clone();
                }
            }
            CanvasItem::Text(txt) => {
                if let Some(sx) = patch.scale_x {
                    txt.scale_x = sx;
                }
                if let Some(w) = patch.width {
                    txt.width = w;
                }
                if let Some(h) = patch.height {
                    txt.height = h;
                }
                if let Some(text) = &patch.text {
                    txt.text = text.clone();
                }
                if let Some(size) = patch.font_size {
                    txt.font_size = size;
                }
                if let Some(fill) = &patch.fill {
                    txt.fill = fill.clone();
                }
                if let Some(align) = patch.align {
                    txt.align = Some(align);
                }
            }
        }
    }
}

// ─── Patches ─────────────────────────────────────────────────────────────

/// A partial update to an item. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub rotation: Option<f64>,
    pub scale: Option<f64>,
    pub scale_x: Option<f64>,
    pub scale_y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub text: Option<String>,
    pub font_size: Option<f64>,
    pub fill: Option<String>,
    pub align: Option<TextAlign>,
    pub filters: Option<FilterList>,
    pub dominant_color: Option<Option<String>>,
    pub tone: Option<Option<String>>,
}

impl ItemPatch {
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn rotation(degrees: f64) -> Self {
        Self {
            rotation: Some(degrees),
            ..Self::default()
        }
    }

    pub fn scale(scale: f64) -> Self {
        Self {
            scale: Some(scale),
            ..Self::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn size(width: f64, height: f64) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }
}

// ─── Viewport ────────────────────────────────────────────────────────────

/// Affine map from world space to screen space:
/// `screen = world * scale + (x, y)`.
///
/// `width`/`height` are the on-screen size of the canvas view, used for
/// centering math.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasViewport {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub scale: f64,
}

impl Default for CanvasViewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            scale: 1.0,
        }
    }
}

impl CanvasViewport {
    pub fn world_to_screen(&self, wx: f64, wy: f64) -> (f64, f64) {
        (wx * self.scale + self.x, wy * self.scale + self.y)
    }

    pub fn screen_to_world(&self, sx: f64, sy: f64) -> (f64, f64) {
        ((sx - self.x) / self.scale, (sy - self.y) / self.scale)
    }

    /// The world point currently shown at the center of the screen.
    pub fn world_center(&self) -> (f64, f64) {
        self.screen_to_world(self.width / 2.0, self.height / 2.0)
    }

    /// All components finite and a positive zoom.
    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.width, self.height, self.scale]
            .iter()
            .all(|v| v.is_finite())
            && self.scale > 0.0
    }
}

// ─── Anchors ─────────────────────────────────────────────────────────────

/// A viewport bookmark: which canvas, and where the camera was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorData {
    /// Name of the canvas the bookmark belongs to.
    pub item_id: String,
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

impl AnchorData {
    pub fn capture(canvas_name: &str, viewport: &CanvasViewport) -> Self {
        Self {
            item_id: canvas_name.to_string(),
            x: viewport.x,
            y: viewport.y,
            scale: viewport.scale,
        }
    }

    pub fn canvas_name(&self) -> &str {
        &self.item_id
    }
}
