//! Change notification for the presentation layer.

use mb_core::CanvasViewport;
use tokio::sync::broadcast;

/// Capacity of the store's event channel. Slow receivers that fall further
/// behind see `RecvError::Lagged` and should re-read a snapshot.
pub const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// The item list changed (add, update, remove, reorder, undo, redo).
    ItemsChanged,
    ViewportChanged(CanvasViewport),
    SelectionChanged,
    /// A different canvas was loaded.
    CanvasSwitched(String),
    HistoryChanged { can_undo: bool, can_redo: bool },
    AnchorTriggered { slot: String },
}

#[derive(Clone)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    /// Fire and forget; having no subscriber is not an error.
    pub(crate) fn emit(&self, event: StoreEvent) {
        let _ = self.tx.send(event);
    }
}
