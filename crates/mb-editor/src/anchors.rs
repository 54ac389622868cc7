//! Viewport bookmarks ("anchors").
//!
//! A fixed set of slots, each holding a canvas name plus a camera position.
//! The whole mapping is written back on every change. Anchors live outside
//! history: saving or restoring one is never undone.

use crate::events::StoreEvent;
use crate::store::CanvasStore;
use chrono::{DateTime, Utc};
use mb_core::{AnchorData, CanvasViewport};
use mb_storage::{PersistenceGateway, StorageError};
use std::collections::BTreeMap;

/// Slot keys, in display order.
pub const ANCHOR_SLOTS: [&str; 3] = ["1", "2", "3"];

#[derive(Debug, thiserror::Error)]
pub enum AnchorError {
    #[error("unknown anchor slot {0:?}")]
    UnknownSlot(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The most recent save or restore, for transient UI feedback.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorTrigger {
    pub slot: String,
    pub at: DateTime<Utc>,
}

fn check_slot(slot: &str) -> Result<(), AnchorError> {
    if ANCHOR_SLOTS.contains(&slot) {
        Ok(())
    } else {
        Err(AnchorError::UnknownSlot(slot.to_string()))
    }
}

pub struct AnchorBook {
    gateway: PersistenceGateway,
    anchors: BTreeMap<String, AnchorData>,
    last_triggered: Option<AnchorTrigger>,
}

impl AnchorBook {
    /// Read the stored mapping. Entries under unknown slots are dropped.
    pub async fn load(gateway: PersistenceGateway) -> Result<Self, AnchorError> {
        let mut anchors = gateway.load_anchors().await?;
        anchors.retain(|slot, _| {
            let known = ANCHOR_SLOTS.contains(&slot.as_str());
            if !known {
                log::warn!("dropping anchor in unknown slot {slot:?}");
            }
            known
        });
        log::debug!("loaded {} anchors", anchors.len());
        Ok(Self {
            gateway,
            anchors,
            last_triggered: None,
        })
    }

    pub fn get(&self, slot: &str) -> Option<&AnchorData> {
        self.anchors.get(slot)
    }

    pub fn anchors(&self) -> &BTreeMap<String, AnchorData> {
        &self.anchors
    }

    pub fn last_triggered(&self) -> Option<&AnchorTrigger> {
        self.last_triggered.as_ref()
    }

    fn trigger(&mut self, slot: &str, store: &CanvasStore) {
        self.last_triggered = Some(AnchorTrigger {
            slot: slot.to_string(),
            at: Utc::now(),
        });
        store.emit(StoreEvent::AnchorTriggered {
            slot: slot.to_string(),
        });
    }

    async fn persist(&self) -> Result<(), AnchorError> {
        self.gateway.save_anchors(&self.anchors).await?;
        Ok(())
    }

    /// Bookmark the store's current canvas and camera in `slot`.
    pub async fn save(&mut self, slot: &str, store: &CanvasStore) -> Result<AnchorData, AnchorError> {
        check_slot(slot)?;
        let anchor = AnchorData::capture(store.canvas_name(), store.viewport());
        self.anchors.insert(slot.to_string(), anchor.clone());
        self.trigger(slot, store);
        log::info!("saved anchor {slot} on canvas {}", anchor.canvas_name());
        self.persist().await?;
        Ok(anchor)
    }

    /// Jump to the bookmark in `slot`, switching canvas first when it
    /// belongs to another one. The screen size is kept. Returns `false`
    /// for an empty slot.
    pub async fn restore(&mut self, slot: &str, store: &mut CanvasStore) -> Result<bool, AnchorError> {
        check_slot(slot)?;
        let Some(anchor) = self.anchors.get(slot).cloned() else {
            return Ok(false);
        };
        if anchor.canvas_name() != store.canvas_name() {
            store.switch_canvas(anchor.canvas_name()).await?;
        }

        let current = store.viewport();
        let viewport = CanvasViewport {
            x: anchor.x,
            y: anchor.y,
            scale: anchor.scale,
            width: current.width,
            height: current.height,
        };
        let applied = store.set_viewport(viewport);
        self.trigger(slot, store);
        Ok(applied)
    }

    /// Empty `slot`. Returns whether it held an anchor.
    pub async fn delete(&mut self, slot: &str) -> Result<bool, AnchorError> {
        check_slot(slot)?;
        if self.anchors.remove(slot).is_none() {
            return Ok(false);
        }
        self.persist().await?;
        Ok(true)
    }
}
