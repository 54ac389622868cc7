//! Hit testing: point → item lookup.
//!
//! Walks the item list in reverse (last painted = topmost) and tests each
//! item's rotated bounding box.

use crate::geometry::{Bounds, item_bounds};
use crate::id::ItemId;
use crate::model::CanvasItem;

/// Find the topmost item at world position (px, py).
/// Returns `None` if no item is hit (background).
pub fn hit_test(items: &[CanvasItem], px: f64, py: f64) -> Option<ItemId> {
    items
        .iter()
        .rev()
        .find(|item| item_bounds(item).contains(px, py))
        .map(CanvasItem::id)
}

/// Find all items whose bounds intersect the given rectangle, in paint
/// order. Used for marquee (box) selection.
pub fn hit_test_rect(items: &[CanvasItem], rect: &Bounds) -> Vec<ItemId> {
    items
        .iter()
        .filter(|item| item_bounds(item).intersects(rect))
        .map(CanvasItem::id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ImageItem, ImageMeta, ItemPatch};
    use pretty_assertions::assert_eq;

    fn square(id: &str, x: f64, y: f64, size: f64) -> CanvasItem {
        CanvasItem::Image(ImageItem::from_meta(
            ItemId::intern(id),
            ImageMeta {
                id: id.into(),
                image_path: format!("lib/{id}.png"),
                width: size,
                height: size,
                ..ImageMeta::default()
            },
            x,
            y,
        ))
    }

    #[test]
    fn hit_test_basic() {
        let items = vec![square("hit_a", 10.0, 10.0, 100.0), square("hit_b", 200.0, 200.0, 50.0)];

        assert_eq!(hit_test(&items, 50.0, 50.0), Some(ItemId::intern("hit_a")));
        assert_eq!(hit_test(&items, 220.0, 220.0), Some(ItemId::intern("hit_b")));
        assert_eq!(hit_test(&items, 150.0, 150.0), None);
    }

    #[test]
    fn hit_test_prefers_topmost() {
        let items = vec![square("under", 0.0, 0.0, 100.0), square("over", 50.0, 50.0, 100.0)];
        assert_eq!(hit_test(&items, 75.0, 75.0), Some(ItemId::intern("over")));
        assert_eq!(hit_test(&items, 25.0, 25.0), Some(ItemId::intern("under")));
    }

    #[test]
    fn hit_test_follows_rotation() {
        let mut item = square("turned", 100.0, 100.0, 50.0);
        item.apply_patch(&ItemPatch::rotation(180.0));
        let items = vec![item];
        // A half turn around the anchor puts the footprint up and to the left.
        assert_eq!(hit_test(&items, 75.0, 75.0), Some(ItemId::intern("turned")));
        assert_eq!(hit_test(&items, 125.0, 125.0), None);
    }

    #[test]
    fn marquee_selection() {
        let items = vec![
            square("m_a", 0.0, 0.0, 10.0),
            square("m_b", 50.0, 50.0, 10.0),
            square("m_c", 500.0, 500.0, 10.0),
        ];
        let hits = hit_test_rect(&items, &Bounds::new(5.0, 5.0, 50.0, 50.0));
        assert_eq!(hits, vec![ItemId::intern("m_a"), ItemId::intern("m_b")]);
    }
}
