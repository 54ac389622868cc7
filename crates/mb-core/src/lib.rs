pub mod config;
pub mod geometry;
pub mod hit;
pub mod id;
pub mod layout;
pub mod model;
pub mod persist;

pub use config::{ConfigError, EngineConfig, GridConfig, TextDefaults};
pub use geometry::{Bounds, RotatedBox, item_bounds, rotated_bbox, union_bounds};
pub use hit::{hit_test, hit_test_rect};
pub use id::ItemId;
pub use layout::{ItemPosition, LayoutEntry, PackSize, PackedRect, Packing, pack_rectangles};
pub use model::*;
pub use persist::{PersistedItem, decode_items, encode_items};
