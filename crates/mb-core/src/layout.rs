//! Automatic layout: guillotine bin packing and grid placement.
//!
//! The packer works on plain rectangles. Callers derive each rectangle from
//! an item's rotated bounding box ([`layout_entry`]) and translate packed
//! top-left corners back to anchor coordinates with the stored bbox offset
//! ([`pack_at`], [`pack_centered`]).

use crate::config::GridConfig;
use crate::geometry::{RotatedBox, rotated_bbox};
use crate::id::ItemId;
use crate::model::CanvasItem;

// ─── Packer ──────────────────────────────────────────────────────────────

/// Size of a rectangle to pack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackSize {
    pub width: f64,
    pub height: f64,
}

/// A packed rectangle. `x`/`y` is its top-left corner in the packed layout;
/// the gap lies to its right and below it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PackedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Result of a packing run. `rects` is in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Packing {
    pub container_width: f64,
    pub rects: Vec<PackedRect>,
}

impl Packing {
    /// Width and height actually covered by the rectangles (no trailing gap).
    pub fn extent(&self) -> (f64, f64) {
        self.rects.iter().fold((0.0, 0.0), |(w, h), r| {
            (w.max(r.x + r.width), h.max(r.y + r.height))
        })
    }
}

/// Free region of the container.
#[derive(Debug, Clone, Copy)]
struct Space {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

/// Square-ish container width: `max(ceil(sqrt(total inflated area)), widest)`.
pub fn estimate_width(sizes: &[PackSize], gap: f64) -> f64 {
    let (area, widest) = sizes.iter().fold((0.0f64, 0.0f64), |(area, widest), s| {
        let w = s.width + gap;
        let h = s.height + gap;
        (area + w * h, widest.max(w))
    });
    area.sqrt().ceil().max(widest)
}

/// Pack rectangles into a container of fixed width and unbounded height.
///
/// Rectangles are placed tallest first. Each one goes into the free space
/// nearest the top (then the left) that can hold it inflated by `gap`; the
/// space is then split into a right part as tall as the placed rectangle and
/// a part below spanning the full width of the space.
///
/// When `container_width` is `None`, [`estimate_width`] picks one. A
/// rectangle that fits nowhere (only possible with a forced narrow width) is
/// placed at the origin.
pub fn pack_rectangles(sizes: &[PackSize], gap: f64, container_width: Option<f64>) -> Packing {
    let gap = gap.max(0.0);
    let sizes: Vec<PackSize> = sizes
        .iter()
        .map(|s| PackSize {
            width: s.width.max(0.0),
            height: s.height.max(0.0),
        })
        .collect();

    let width = container_width
        .filter(|w| *w > 0.0)
        .unwrap_or_else(|| estimate_width(&sizes, gap));

    // Stable sort: equal heights keep their input order.
    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| sizes[b].height.total_cmp(&sizes[a].height));

    let mut spaces = vec![Space {
        x: 0.0,
        y: 0.0,
        w: width,
        h: f64::INFINITY,
    }];
    let mut rects = vec![PackedRect::default(); sizes.len()];

    for idx in order {
        let size = sizes[idx];
        let w = size.width + gap;
        let h = size.height + gap;

        let best = spaces
            .iter()
            .enumerate()
            .filter(|(_, s)| s.w >= w && s.h >= h)
            .min_by(|(_, a), (_, b)| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)))
            .map(|(i, _)| i);

        let Some(best) = best else {
            log::debug!(
                "pack: {}x{} does not fit in width {width}, placing at origin",
                size.width,
                size.height
            );
            rects[idx] = PackedRect {
                x: 0.0,
                y: 0.0,
                width: size.width,
                height: size.height,
            };
            continue;
        };

        let s = spaces.remove(best);
        rects[idx] = PackedRect {
            x: s.x,
            y: s.y,
            width: size.width,
            height: size.height,
        };

        let right = Space {
            x: s.x + w,
            y: s.y,
            w: s.w - w,
            h,
        };
        let below = Space {
            x: s.x,
            y: s.y + h,
            w: s.w,
            h: s.h - h,
        };
        spaces.extend([right, below].into_iter().filter(|sp| sp.w > 0.0 && sp.h > 0.0));
    }

    Packing {
        container_width: width,
        rects,
    }
}

// ─── Item placement ──────────────────────────────────────────────────────

/// An item's rotated footprint, ready for packing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutEntry {
    pub id: ItemId,
    pub bbox: RotatedBox,
}

/// New anchor position for an item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemPosition {
    pub id: ItemId,
    pub x: f64,
    pub y: f64,
}

/// Footprint of `item`; `fallback` stands in for an unmeasured size.
pub fn layout_entry(item: &CanvasItem, fallback: (f64, f64)) -> LayoutEntry {
    let (w, h) = item.scaled_size(Some(fallback));
    LayoutEntry {
        id: item.id(),
        bbox: rotated_bbox(w, h, item.placement().rotation),
    }
}

fn pack_entries(entries: &[LayoutEntry], gap: f64) -> Packing {
    let sizes: Vec<PackSize> = entries
        .iter()
        .map(|e| PackSize {
            width: e.bbox.width,
            height: e.bbox.height,
        })
        .collect();
    pack_rectangles(&sizes, gap, None)
}

fn to_positions(entries: &[LayoutEntry], packing: &Packing, ox: f64, oy: f64) -> Vec<ItemPosition> {
    entries
        .iter()
        .zip(&packing.rects)
        .map(|(e, r)| ItemPosition {
            id: e.id,
            x: ox + r.x - e.bbox.offset_x,
            y: oy + r.y - e.bbox.offset_y,
        })
        .collect()
}

/// Pack `entries` with the group's top-left corner at `origin`.
pub fn pack_at(entries: &[LayoutEntry], gap: f64, origin: (f64, f64)) -> Vec<ItemPosition> {
    let packing = pack_entries(entries, gap);
    to_positions(entries, &packing, origin.0, origin.1)
}

/// Pack `entries` and center the packed group on `center`.
pub fn pack_centered(entries: &[LayoutEntry], gap: f64, center: (f64, f64)) -> Vec<ItemPosition> {
    let packing = pack_entries(entries, gap);
    let (w, h) = packing.extent();
    to_positions(entries, &packing, center.0 - w / 2.0, center.1 - h / 2.0)
}

/// Default placement for the `index`-th item added without a position:
/// a fixed-column grid so sequential adds fan out instead of stacking.
pub fn grid_position(index: usize, grid: &GridConfig) -> (f64, f64) {
    let columns = grid.columns.max(1);
    let col = index % columns;
    let row = index / columns;
    (
        grid.base_x + col as f64 * grid.spacing_x,
        grid.base_y + row as f64 * grid.spacing_y,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sizes(list: &[(f64, f64)]) -> Vec<PackSize> {
        list.iter()
            .map(|&(width, height)| PackSize { width, height })
            .collect()
    }

    fn assert_no_overlap(packing: &Packing, gap: f64) {
        for (i, a) in packing.rects.iter().enumerate() {
            for b in packing.rects.iter().skip(i + 1) {
                let disjoint = a.x + a.width + gap <= b.x
                    || b.x + b.width + gap <= a.x
                    || a.y + a.height + gap <= b.y
                    || b.y + b.height + gap <= a.y;
                assert!(disjoint, "overlap between {a:?} and {b:?}");
            }
        }
    }

    #[test]
    fn tallest_rectangle_goes_first() {
        let input = sizes(&[(40.0, 30.0), (40.0, 50.0), (40.0, 30.0)]);
        let packing = pack_rectangles(&input, 5.0, None);

        assert_eq!(
            packing.rects[1],
            PackedRect {
                x: 0.0,
                y: 0.0,
                width: 40.0,
                height: 50.0
            }
        );
        assert_no_overlap(&packing, 5.0);
    }

    #[test]
    fn width_heuristic_is_square_ish() {
        let input = sizes(&[(40.0, 50.0), (40.0, 30.0), (40.0, 30.0)]);
        // (45*55 + 45*35 + 45*35) = 5625 → sqrt = 75
        assert_eq!(estimate_width(&input, 5.0), 75.0);

        let wide = sizes(&[(300.0, 10.0), (10.0, 10.0)]);
        assert_eq!(estimate_width(&wide, 0.0), 300.0);
    }

    #[test]
    fn rows_fill_left_to_right() {
        let input = sizes(&[(10.0, 10.0); 4]);
        let packing = pack_rectangles(&input, 0.0, Some(20.0));
        let corners: Vec<(f64, f64)> = packing.rects.iter().map(|r| (r.x, r.y)).collect();
        assert_eq!(corners, vec![(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0)]);
    }

    #[test]
    fn short_items_fill_gap_next_to_tall_one() {
        let input = sizes(&[(50.0, 100.0), (50.0, 40.0), (50.0, 40.0)]);
        let packing = pack_rectangles(&input, 0.0, Some(100.0));
        assert_eq!((packing.rects[1].x, packing.rects[1].y), (50.0, 0.0));
        assert_eq!((packing.rects[2].x, packing.rects[2].y), (50.0, 40.0));
    }

    #[test]
    fn placements_stay_inside_container() {
        let input = sizes(&[
            (120.0, 80.0),
            (30.0, 200.0),
            (64.0, 64.0),
            (10.0, 10.0),
            (250.0, 40.0),
            (90.0, 90.0),
        ]);
        let gap = 12.0;
        let packing = pack_rectangles(&input, gap, None);
        for r in &packing.rects {
            assert!(r.x >= 0.0 && r.x + r.width + gap <= packing.container_width, "{r:?}");
        }
        assert_no_overlap(&packing, gap);
    }

    #[test]
    fn oversized_rectangle_falls_back_to_origin() {
        let input = sizes(&[(500.0, 10.0)]);
        let packing = pack_rectangles(&input, 0.0, Some(100.0));
        assert_eq!((packing.rects[0].x, packing.rects[0].y), (0.0, 0.0));
    }

    #[test]
    fn empty_input_packs_nothing() {
        let packing = pack_rectangles(&[], 10.0, None);
        assert!(packing.rects.is_empty());
        assert_eq!(packing.extent(), (0.0, 0.0));
    }

    #[test]
    fn centered_group_is_centered() {
        let entries = [
            LayoutEntry {
                id: ItemId::intern("c1"),
                bbox: rotated_bbox(100.0, 100.0, 0.0),
            },
            LayoutEntry {
                id: ItemId::intern("c2"),
                bbox: rotated_bbox(100.0, 100.0, 0.0),
            },
        ];
        let positions = pack_centered(&entries, 0.0, (0.0, 0.0));
        // Width heuristic: sqrt(20000) → 142, so the pair stacks vertically.
        assert_eq!(positions[0].x, -50.0);
        assert_eq!(positions[0].y, -100.0);
        assert_eq!(positions[1].x, -50.0);
        assert_eq!(positions[1].y, 0.0);
    }

    #[test]
    fn rotated_entries_are_shifted_by_their_offset() {
        let entries = [LayoutEntry {
            id: ItemId::intern("rot"),
            bbox: RotatedBox {
                width: 80.0,
                height: 120.0,
                offset_x: -80.0,
                offset_y: 0.0,
            },
        }];
        let positions = pack_at(&entries, 20.0, (100.0, 100.0));
        // Footprint's left edge sits on x = 100, so the anchor is 80 further right.
        assert_eq!((positions[0].x, positions[0].y), (180.0, 100.0));
    }

    #[test]
    fn grid_wraps_after_configured_columns() {
        let grid = GridConfig::default();
        assert_eq!(grid_position(0, &grid), (120.0, 80.0));
        assert_eq!(grid_position(3, &grid), (120.0 + 3.0 * 260.0, 80.0));
        assert_eq!(grid_position(4, &grid), (120.0, 80.0 + 260.0));
    }
}
