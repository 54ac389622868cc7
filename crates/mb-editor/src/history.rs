//! Undo/Redo history.
//!
//! A linear stack of immutable, versioned snapshots of the item list plus a
//! pointer to the snapshot matching the live state. Undo and redo only move
//! the pointer; a commit after an undo drops everything above it.
//!
//! Snapshots are stored without transient fields (selection, auto-edit), so
//! selecting an item never creates a history entry.

use mb_core::CanvasItem;
use std::collections::VecDeque;
use std::sync::Arc;

/// An immutable item list recorded in history.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    version: u64,
    items: Arc<[CanvasItem]>,
}

impl Snapshot {
    /// Monotonic per-history counter; the initial snapshot is version 0
    /// after every reset.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn items(&self) -> &[CanvasItem] {
        &self.items
    }

    /// An independent, mutable copy of the snapshot.
    pub fn to_live(&self) -> Vec<CanvasItem> {
        self.items.to_vec()
    }

    /// Whether `live` matches this snapshot, ignoring transient fields.
    pub fn matches(&self, live: &[CanvasItem]) -> bool {
        self.items.len() == live.len()
            && self
                .items
                .iter()
                .zip(live)
                .all(|(snap, item)| snap.same_persistent_state(item))
    }
}

pub struct History {
    snapshots: VecDeque<Snapshot>,
    /// Index of the snapshot matching the live state.
    pointer: usize,
    /// Maximum number of snapshots kept.
    max_depth: usize,
    next_version: u64,
}

impl History {
    pub fn new(max_depth: usize, initial: &[CanvasItem]) -> Self {
        let mut history = Self {
            snapshots: VecDeque::with_capacity(max_depth.max(1)),
            pointer: 0,
            max_depth: max_depth.max(1),
            next_version: 0,
        };
        history.reset(initial);
        history
    }

    fn capture(&mut self, items: &[CanvasItem]) -> Snapshot {
        let version = self.next_version;
        self.next_version += 1;
        Snapshot {
            version,
            items: items.iter().map(CanvasItem::without_transient).collect(),
        }
    }

    /// Forget everything and start over from `items`.
    pub fn reset(&mut self, items: &[CanvasItem]) {
        self.next_version = 0;
        let initial = self.capture(items);
        self.snapshots.clear();
        self.snapshots.push_back(initial);
        self.pointer = 0;
    }

    /// Record `live` as a new step. Returns `false` (and records nothing)
    /// when it matches the current snapshot.
    pub fn commit(&mut self, live: &[CanvasItem]) -> bool {
        if self.current().matches(live) {
            return false;
        }

        self.snapshots.truncate(self.pointer + 1);
        let snapshot = self.capture(live);
        self.snapshots.push_back(snapshot);
        self.pointer = self.snapshots.len() - 1;

        if self.snapshots.len() > self.max_depth {
            self.snapshots.pop_front();
            self.pointer -= 1;
        }
        log::trace!(
            "history commit: {} snapshots, pointer {}",
            self.snapshots.len(),
            self.pointer
        );
        true
    }

    /// Step back. Returns a copy of the restored state, or `None` at the
    /// oldest snapshot.
    pub fn undo(&mut self) -> Option<Vec<CanvasItem>> {
        if self.pointer == 0 {
            return None;
        }
        self.pointer -= 1;
        Some(self.current().to_live())
    }

    /// Step forward. Returns a copy of the restored state, or `None` at the
    /// newest snapshot.
    pub fn redo(&mut self) -> Option<Vec<CanvasItem>> {
        if self.pointer + 1 >= self.snapshots.len() {
            return None;
        }
        self.pointer += 1;
        Some(self.current().to_live())
    }

    pub fn current(&self) -> &Snapshot {
        &self.snapshots[self.pointer]
    }

    pub fn can_undo(&self) -> bool {
        self.pointer > 0
    }

    pub fn can_redo(&self) -> bool {
        self.pointer + 1 < self.snapshots.len()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }
}
