//! On-disk projection of canvas items.
//!
//! The item document is a JSON array of [`PersistedItem`]s, discriminated by
//! `type` and, for images, by `kind`. Transient fields never appear here.
//! Decoding is tolerant: a malformed entry is dropped with a warning instead
//! of failing the whole canvas load.

use crate::id::ItemId;
use crate::model::{CanvasItem, FilterList, ImageItem, Placement, TextAlign, TextItem};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Filter id recorded by older documents as `grayscale: true`.
const GRAYSCALE_FILTER: &str = "grayscale";

fn one() -> f64 {
    1.0
}

fn default_font_size() -> f64 {
    24.0
}

fn default_fill() -> String {
    "#000000".into()
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// Whether an image references a library artifact or owns its pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    /// Library artifact, identified by `id`. Older documents omit `kind`.
    #[default]
    Ref,
    /// Dropped or pasted image stored under the canvas's `temp-images/`.
    Temp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedImage {
    #[serde(default)]
    pub kind: ImageKind,
    pub canvas_id: ItemId,
    /// Artifact id; present exactly for `ref` images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub image: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "one")]
    pub scale: f64,
    #[serde(default = "one")]
    pub scale_x: f64,
    #[serde(default = "one")]
    pub scale_y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub dominant_color: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "FilterList::is_empty")]
    pub filters: FilterList,
    #[serde(default, skip_serializing_if = "is_false")]
    pub grayscale: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedText {
    pub canvas_id: ItemId,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "one")]
    pub scale: f64,
    #[serde(default = "one")]
    pub scale_x: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default = "default_fill")]
    pub fill: String,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<TextAlign>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PersistedItem {
    Image(PersistedImage),
    Text(PersistedText),
}

impl PersistedItem {
    pub fn from_item(item: &CanvasItem) -> Self {
        match item {
            CanvasItem::Image(img) => {
                let p = &img.placement;
                let (kind, id) = if img.is_temp() {
                    (ImageKind::Temp, None)
                } else {
                    let id = img
                        .artifact_id
                        .clone()
                        .unwrap_or_else(|| img.image_path.clone());
                    (ImageKind::Ref, Some(id))
                };
                PersistedItem::Image(PersistedImage {
                    kind,
                    canvas_id: p.id,
                    id,
                    image: img.image_path.clone(),
                    x: p.x,
                    y: p.y,
                    rotation: p.rotation,
                    scale: p.scale,
                    scale_x: img.scale_x,
                    scale_y: img.scale_y,
                    width: img.width,
                    height: img.height,
                    dominant_color: img.dominant_color.clone(),
                    tone: img.tone.clone(),
                    filters: img.filters.clone(),
                    grayscale: false,
                    page_url: img.page_url.clone(),
                    tags: img.tags.clone(),
                    created_at: img.created_at,
                })
            }
            CanvasItem::Text(txt) => {
                let p = &txt.placement;
                PersistedItem::Text(PersistedText {
                    canvas_id: p.id,
                    x: p.x,
                    y: p.y,
                    rotation: p.rotation,
                    scale: p.scale,
                    scale_x: txt.scale_x,
                    text: txt.text.clone(),
                    font_size: txt.font_size,
                    fill: txt.fill.clone(),
                    width: txt.width,
                    height: txt.height,
                    align: txt.align,
                })
            }
        }
    }

    pub fn canvas_id(&self) -> ItemId {
        match self {
            PersistedItem::Image(img) => img.canvas_id,
            PersistedItem::Text(txt) => txt.canvas_id,
        }
    }

    /// Rebuild the live item. `None` if the entry breaks an item invariant.
    pub fn into_item(self) -> Option<CanvasItem> {
        let scale = match &self {
            PersistedItem::Image(img) => img.scale,
            PersistedItem::Text(txt) => txt.scale,
        };
        if !(scale.is_finite() && scale > 0.0) {
            return None;
        }

        let item = match self {
            PersistedItem::Image(img) => {
                if img.image.is_empty() {
                    return None;
                }
                let mut filters = img.filters;
                if img.grayscale && !filters.iter().any(|f| f == GRAYSCALE_FILTER) {
                    filters.push(GRAYSCALE_FILTER.to_string());
                }
                let artifact_id = match img.kind {
                    ImageKind::Temp => None,
                    ImageKind::Ref => Some(img.id.unwrap_or_else(|| img.image.clone())),
                };
                CanvasItem::Image(ImageItem {
                    placement: Placement {
                        rotation: img.rotation,
                        scale,
                        ..Placement::new(img.canvas_id, img.x, img.y)
                    },
                    image_path: img.image,
                    artifact_id,
                    width: img.width,
                    height: img.height,
                    scale_x: img.scale_x,
                    scale_y: img.scale_y,
                    dominant_color: img.dominant_color,
                    tone: img.tone,
                    filters,
                    page_url: img.page_url,
                    tags: img.tags,
                    created_at: img.created_at,
                })
            }
            PersistedItem::Text(txt) => CanvasItem::Text(TextItem {
                placement: Placement {
                    rotation: txt.rotation,
                    scale,
                    ..Placement::new(txt.canvas_id, txt.x, txt.y)
                },
                text: txt.text,
                font_size: txt.font_size,
                fill: txt.fill,
                width: txt.width,
                height: txt.height,
                scale_x: txt.scale_x,
                align: txt.align,
                is_auto_edit: false,
            }),
        };
        Some(item)
    }
}

/// Project `items` to their persisted form, preserving list order.
pub fn encode_items(items: &[CanvasItem]) -> Vec<PersistedItem> {
    items.iter().map(PersistedItem::from_item).collect()
}

/// Rebuild items from a raw item document.
///
/// Entries missing required fields, with a non-positive scale, or reusing an
/// id already seen are skipped. A document that is not an array yields an
/// empty list.
pub fn decode_items(document: Value) -> Vec<CanvasItem> {
    let Value::Array(entries) = document else {
        if !document.is_null() {
            log::warn!("item document is not an array, treating canvas as empty");
        }
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let persisted = match serde_json::from_value::<PersistedItem>(entry) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("skipping malformed canvas entry #{index}: {e}");
                continue;
            }
        };
        let id = persisted.canvas_id();
        if !seen.insert(id) {
            log::warn!("skipping duplicate canvas entry #{index} ({id})");
            continue;
        }
        match persisted.into_item() {
            Some(item) => items.push(item),
            None => log::warn!("skipping invalid canvas entry #{index} ({id})"),
        }
    }
    items
}
