pub mod anchors;
pub mod events;
pub mod history;
pub mod store;
pub mod viewport_writer;

pub use anchors::{ANCHOR_SLOTS, AnchorBook, AnchorError, AnchorTrigger};
pub use events::{EVENT_CAPACITY, StoreEvent};
pub use history::{History, Snapshot};
pub use store::{CanvasStore, StoreSnapshot};
pub use viewport_writer::ViewportWriter;
