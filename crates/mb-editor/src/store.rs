//! Canvas item store: the in-memory scene of the current canvas.
//!
//! The store owns the item list, selection, viewport and history of one
//! canvas at a time. Every mutation runs to completion against memory
//! before any I/O is awaited; persistence is handed to the gateway, whose
//! per-key ordering keeps reloads consistent with earlier saves.
//!
//! Mutations come in three strengths:
//!
//! - **transient** (`update_transient`): memory only, for drag feedback
//! - **silent** (`update_silent`, `bring_to_front`): persisted, not undoable
//! - **committing** (everything else): history step plus persistence

use crate::events::{EventBus, StoreEvent};
use crate::history::History;
use crate::viewport_writer::ViewportWriter;
use mb_core::geometry::{contain_viewport, pan_viewport};
use mb_core::layout::{grid_position, layout_entry, pack_at, pack_centered};
use mb_core::{
    Bounds, CanvasItem, CanvasViewport, EngineConfig, ImageItem, ImageMeta, ItemId, ItemPatch,
    Placement, TextItem, hit_test, hit_test_rect, item_bounds, union_bounds,
};
use mb_storage::service::validate_canvas_name;
use mb_storage::{
    CanvasMeta, DEFAULT_CANVAS, PersistenceGateway, StorageError, StorageResult, safe_canvas_name,
};
use smallvec::SmallVec;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Immutable read view for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    pub canvas_name: String,
    pub items: Arc<[CanvasItem]>,
    pub viewport: CanvasViewport,
    pub selected_ids: Vec<ItemId>,
    pub primary_id: Option<ItemId>,
    pub can_undo: bool,
    pub can_redo: bool,
}

#[derive(Debug, Default)]
struct Selection {
    ids: SmallVec<[ItemId; 4]>,
    /// The item that receives single-item actions.
    primary: Option<ItemId>,
}

impl Selection {
    fn clear(&mut self) -> bool {
        let changed = !self.ids.is_empty() || self.primary.is_some();
        self.ids.clear();
        self.primary = None;
        changed
    }

    /// Drop ids no longer on the canvas. Returns whether anything changed.
    fn retain_existing(&mut self, items: &[CanvasItem]) -> bool {
        let before = self.ids.len();
        self.ids.retain(|id| items.iter().any(|item| item.id() == *id));
        if self.primary.is_some_and(|p| !self.ids.contains(&p)) {
            self.primary = self.ids.first().copied();
        }
        before != self.ids.len()
    }
}

pub struct CanvasStore {
    config: EngineConfig,
    gateway: PersistenceGateway,
    canvas_name: String,
    items: Vec<CanvasItem>,
    viewport: CanvasViewport,
    selection: Selection,
    history: History,
    viewport_writer: ViewportWriter,
    events: EventBus,
    /// Background saves not known to be finished.
    saves: Vec<JoinHandle<()>>,
}

impl CanvasStore {
    /// An empty store on the `Default` canvas. Call
    /// [`init_canvas`](Self::init_canvas) to load the last active one.
    pub fn new(gateway: PersistenceGateway, config: EngineConfig) -> Self {
        let history = History::new(config.history_depth, &[]);
        let viewport_writer = ViewportWriter::new(gateway.clone(), config.viewport_debounce());
        Self {
            config,
            gateway,
            canvas_name: DEFAULT_CANVAS.to_string(),
            items: Vec::new(),
            viewport: CanvasViewport::default(),
            selection: Selection::default(),
            history,
            viewport_writer,
            events: EventBus::new(),
            saves: Vec::new(),
        }
    }

    // ─── Read access ─────────────────────────────────────────────────────

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn gateway(&self) -> &PersistenceGateway {
        &self.gateway
    }

    pub fn canvas_name(&self) -> &str {
        &self.canvas_name
    }

    pub fn items(&self) -> &[CanvasItem] {
        &self.items
    }

    pub fn item(&self, id: ItemId) -> Option<&CanvasItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn viewport(&self) -> &CanvasViewport {
        &self.viewport
    }

    pub fn selected_ids(&self) -> &[ItemId] {
        &self.selection.ids
    }

    pub fn primary_id(&self) -> Option<ItemId> {
        self.selection.primary
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            canvas_name: self.canvas_name.clone(),
            items: self.items.iter().cloned().collect(),
            viewport: self.viewport,
            selected_ids: self.selection.ids.to_vec(),
            primary_id: self.selection.primary,
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Topmost item at a world point.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<ItemId> {
        hit_test(&self.items, x, y)
    }

    /// Items touched by a world-space marquee, in paint order.
    pub fn hit_test_rect(&self, rect: &Bounds) -> Vec<ItemId> {
        hit_test_rect(&self.items, rect)
    }

    fn position_of(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    fn is_current(&self, name: &str) -> bool {
        safe_canvas_name(name) == safe_canvas_name(&self.canvas_name)
    }

    // ─── Persistence plumbing ────────────────────────────────────────────

    /// Run an already-queued gateway write in the background, logging its
    /// failure. In-memory state stays authoritative either way.
    fn track_save<F>(&mut self, what: &'static str, canvas: String, save: F)
    where
        F: Future<Output = StorageResult<()>> + Send + 'static,
    {
        self.saves.retain(|handle| !handle.is_finished());
        match Handle::try_current() {
            Ok(runtime) => self.saves.push(runtime.spawn(async move {
                if let Err(e) = save.await {
                    log::warn!("{what} for canvas {canvas} failed: {e}");
                }
            })),
            Err(_) => log::warn!("no runtime; dropped {what} for canvas {canvas}"),
        }
    }

    fn persist_items(&mut self) {
        let save = self.gateway.save_items(&self.canvas_name, &self.items);
        self.track_save("item save", self.canvas_name.clone(), save);
    }

    /// Wait until every background save issued so far has finished.
    pub async fn wait_for_saves(&mut self) {
        for handle in std::mem::take(&mut self.saves) {
            if let Err(e) = handle.await {
                log::warn!("save task did not complete: {e}");
            }
        }
    }

    pub(crate) fn emit(&self, event: StoreEvent) {
        self.events.emit(event);
    }

    fn emit_history(&self) {
        self.events.emit(StoreEvent::HistoryChanged {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        });
    }

    // ─── History ─────────────────────────────────────────────────────────

    /// Record the live item list as a history step and persist it. Does
    /// nothing when it matches the current step.
    pub fn commit(&mut self) -> bool {
        if !self.history.commit(&self.items) {
            return false;
        }
        self.persist_items();
        self.events.emit(StoreEvent::ItemsChanged);
        self.emit_history();
        true
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(items) => {
                self.restore(items);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(items) => {
                self.restore(items);
                true
            }
            None => false,
        }
    }

    fn restore(&mut self, items: Vec<CanvasItem>) {
        self.items = items;
        if self.selection.clear() {
            self.events.emit(StoreEvent::SelectionChanged);
        }
        self.persist_items();
        self.events.emit(StoreEvent::ItemsChanged);
        self.emit_history();
    }

    // ─── Adding items ────────────────────────────────────────────────────

    /// Append an image. Without a position it goes to the next default
    /// grid slot.
    pub fn add_image(&mut self, meta: ImageMeta, position: Option<(f64, f64)>) -> ItemId {
        let (x, y) =
            position.unwrap_or_else(|| grid_position(self.items.len(), &self.config.grid));
        let id = ItemId::image();
        self.items
            .push(CanvasItem::Image(ImageItem::from_meta(id, meta, x, y)));
        log::debug!("added image {id} at ({x}, {y})");
        self.commit();
        id
    }

    /// Append a text block with the default content, flagged for immediate
    /// editing.
    pub fn add_text(&mut self, x: f64, y: f64, font_size: Option<f64>) -> ItemId {
        let defaults = &self.config.text_defaults;
        let id = ItemId::text();
        self.items.push(CanvasItem::Text(TextItem {
            placement: Placement::new(id, x, y),
            text: defaults.text.clone(),
            font_size: font_size.unwrap_or(defaults.font_size),
            fill: defaults.fill.clone(),
            width: 0.0,
            height: 0.0,
            scale_x: 1.0,
            align: None,
            is_auto_edit: true,
        }));
        log::debug!("added text {id} at ({x}, {y})");
        self.commit();
        id
    }

    /// Insert many images packed compactly around `center`, as one history
    /// step. Returns the new ids in input order.
    pub fn add_many_centered(&mut self, metas: Vec<ImageMeta>, center: (f64, f64)) -> Vec<ItemId> {
        if metas.is_empty() {
            return Vec::new();
        }
        let mut added: Vec<CanvasItem> = metas
            .into_iter()
            .map(|meta| CanvasItem::Image(ImageItem::from_meta(ItemId::image(), meta, 0.0, 0.0)))
            .collect();
        let entries: Vec<_> = added
            .iter()
            .map(|item| layout_entry(item, self.config.fallback_image_size))
            .collect();
        let positions = pack_centered(&entries, self.config.layout_gap, center);
        for (item, pos) in added.iter_mut().zip(&positions) {
            item.apply_patch(&ItemPatch::position(pos.x, pos.y));
        }

        let ids = added.iter().map(CanvasItem::id).collect();
        log::debug!("inserting {} images around {center:?}", added.len());
        self.items.extend(added);
        self.commit();
        ids
    }

    // ─── Updating items ──────────────────────────────────────────────────

    /// Change an item in memory only: no history step, no write.
    pub fn update_transient(&mut self, id: ItemId, patch: &ItemPatch) -> bool {
        let Some(index) = self.position_of(id) else {
            return false;
        };
        self.items[index].apply_patch(patch);
        self.events.emit(StoreEvent::ItemsChanged);
        true
    }

    /// Change an item and record the change as a history step.
    pub fn update(&mut self, id: ItemId, patch: &ItemPatch) -> bool {
        let Some(index) = self.position_of(id) else {
            return false;
        };
        self.items[index].apply_patch(patch);
        self.commit();
        true
    }

    /// Change an item and persist it without a history step.
    pub fn update_silent(&mut self, id: ItemId, patch: &ItemPatch) -> bool {
        let Some(index) = self.position_of(id) else {
            return false;
        };
        self.items[index].apply_patch(patch);
        self.persist_items();
        self.events.emit(StoreEvent::ItemsChanged);
        true
    }

    /// Move an item to the top of the paint order. Persisted, not undoable.
    pub fn bring_to_front(&mut self, id: ItemId) -> bool {
        let Some(index) = self.position_of(id) else {
            return false;
        };
        if index + 1 == self.items.len() {
            return true;
        }
        let item = self.items.remove(index);
        self.items.push(item);
        self.persist_items();
        self.events.emit(StoreEvent::ItemsChanged);
        true
    }

    // ─── Removing items ──────────────────────────────────────────────────

    fn remove_where(&mut self, mut doomed: impl FnMut(&CanvasItem) -> bool) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !doomed(item));
        let removed = before - self.items.len();
        if removed > 0 {
            if self.selection.retain_existing(&self.items) {
                self.events.emit(StoreEvent::SelectionChanged);
            }
            self.commit();
        }
        removed
    }

    pub fn remove(&mut self, id: ItemId) -> bool {
        self.remove_where(|item| item.id() == id) > 0
    }

    /// Remove several items as one history step.
    pub fn remove_many(&mut self, ids: &[ItemId]) -> usize {
        self.remove_where(|item| ids.contains(&item.id()))
    }

    /// Remove every image showing `image_path`, e.g. after the library
    /// artifact was deleted.
    pub fn remove_image_by_path(&mut self, image_path: &str) -> usize {
        self.remove_where(|item| item.as_image().is_some_and(|img| img.image_path == image_path))
    }

    pub fn clear(&mut self) -> usize {
        self.remove_where(|_| true)
    }

    // ─── Selection ───────────────────────────────────────────────────────

    /// Replace the selection. Unknown ids are ignored; the first remaining
    /// id becomes primary.
    pub fn select(&mut self, ids: &[ItemId]) {
        let mut selected: SmallVec<[ItemId; 4]> = SmallVec::new();
        for &id in ids {
            if !selected.contains(&id) && self.position_of(id).is_some() {
                selected.push(id);
            }
        }
        for item in &mut self.items {
            item.set_selected(selected.contains(&item.id()));
        }
        self.selection.primary = selected.first().copied();
        self.selection.ids = selected;
        self.events.emit(StoreEvent::SelectionChanged);
    }

    pub fn clear_selection(&mut self) {
        for item in &mut self.items {
            item.set_selected(false);
        }
        if self.selection.clear() {
            self.events.emit(StoreEvent::SelectionChanged);
        }
    }

    // ─── Layout ──────────────────────────────────────────────────────────

    /// Pack image items without overlap, top-left at `start` (the
    /// configured start point by default), as one history step.
    ///
    /// `ids` limits the layout to those images; `None` or an empty slice
    /// lays out every image. Text items never move. Returns the number of
    /// items placed.
    pub fn auto_layout(&mut self, ids: Option<&[ItemId]>, start: Option<(f64, f64)>) -> usize {
        let ids = ids.filter(|ids| !ids.is_empty());
        let fallback = self.config.fallback_image_size;
        let entries: Vec<_> = self
            .items
            .iter()
            .filter(|item| item.as_image().is_some())
            .filter(|item| ids.is_none_or(|ids| ids.contains(&item.id())))
            .map(|item| layout_entry(item, fallback))
            .collect();
        if entries.is_empty() {
            return 0;
        }

        let origin = start.unwrap_or(self.config.auto_layout_start);
        let positions = pack_at(&entries, self.config.layout_gap, origin);
        for pos in &positions {
            if let Some(index) = self.position_of(pos.id) {
                self.items[index].apply_patch(&ItemPatch::position(pos.x, pos.y));
            }
        }
        log::debug!("auto layout placed {} images at {origin:?}", positions.len());
        self.commit();
        positions.len()
    }

    // ─── Viewport ────────────────────────────────────────────────────────

    /// Replace the viewport and schedule a coalesced write. Invalid
    /// viewports (non-finite, zero zoom) are rejected.
    pub fn set_viewport(&mut self, viewport: CanvasViewport) -> bool {
        if !viewport.is_valid() {
            log::warn!("rejecting invalid viewport {viewport:?}");
            return false;
        }
        self.viewport = viewport;
        self.viewport_writer.schedule(&self.canvas_name, viewport);
        self.events.emit(StoreEvent::ViewportChanged(viewport));
        true
    }

    /// Update the on-screen size. Screen size is not worth a write.
    pub fn set_dimensions(&mut self, width: f64, height: f64) {
        self.viewport.width = width;
        self.viewport.height = height;
        self.events.emit(StoreEvent::ViewportChanged(self.viewport));
    }

    /// Zoom so one item fills the screen, minus padding.
    pub fn contain_item(&mut self, id: ItemId) -> bool {
        let Some(item) = self.item(id) else {
            return false;
        };
        let bounds = item_bounds(item);
        match contain_viewport(&bounds, &self.viewport, self.config.contain_padding) {
            Some(viewport) => self.set_viewport(viewport),
            None => false,
        }
    }

    /// Center one item on screen, keeping the zoom.
    pub fn pan_to_item(&mut self, id: ItemId) -> bool {
        let Some(item) = self.item(id) else {
            return false;
        };
        let viewport = pan_viewport(&item_bounds(item), &self.viewport);
        self.set_viewport(viewport)
    }

    /// Zoom so every item is visible.
    pub fn contain_all(&mut self) -> bool {
        let Some(bounds) = union_bounds(&self.items) else {
            return false;
        };
        match contain_viewport(&bounds, &self.viewport, self.config.contain_padding) {
            Some(viewport) => self.set_viewport(viewport),
            None => false,
        }
    }

    /// Write the pending viewport now. Queued before this returns.
    pub fn flush_viewport(
        &self,
    ) -> impl Future<Output = StorageResult<()>> + Send + 'static + use<> {
        let flush = self.viewport_writer.flush();
        async move {
            match flush {
                Some(write) => write.await,
                None => Ok(()),
            }
        }
    }

    /// Forget the pending viewport write. Returns whether there was one.
    pub fn cancel_pending_viewport(&self) -> bool {
        self.viewport_writer.cancel()
    }

    pub fn has_pending_viewport(&self) -> bool {
        self.viewport_writer.has_pending()
    }

    /// Flush the viewport and wait for every background save.
    pub async fn shutdown(&mut self) -> StorageResult<()> {
        let flushed = self.flush_viewport().await;
        self.wait_for_saves().await;
        log::info!("canvas store for {} shut down", self.canvas_name);
        flushed
    }

    // ─── Canvases ────────────────────────────────────────────────────────

    /// Load the last active canvas (`Default` when none was recorded).
    pub async fn init_canvas(&mut self) -> StorageResult<()> {
        let name = match self.gateway.last_active_canvas().await {
            Ok(name) => name,
            Err(e) => {
                log::warn!("could not read last active canvas: {e}");
                DEFAULT_CANVAS.to_string()
            }
        };
        self.load_canvas(&name).await
    }

    /// Replace the in-memory scene with `name`'s stored state. Nothing
    /// changes when loading fails.
    async fn load_canvas(&mut self, name: &str) -> StorageResult<()> {
        let items = self.gateway.load_items(name);
        let viewport = self.gateway.load_viewport(name);
        let items = items.await?;
        let stored = viewport.await?;

        let (width, height) = (self.viewport.width, self.viewport.height);
        self.viewport = CanvasViewport {
            width,
            height,
            ..stored.unwrap_or_default()
        };
        self.canvas_name = name.to_string();
        self.items = items;
        self.selection.clear();
        self.history.reset(&self.items);
        log::info!("loaded canvas {name} with {} items", self.items.len());

        self.events.emit(StoreEvent::CanvasSwitched(name.to_string()));
        self.events.emit(StoreEvent::ItemsChanged);
        self.events.emit(StoreEvent::ViewportChanged(self.viewport));
        self.events.emit(StoreEvent::SelectionChanged);
        self.emit_history();
        Ok(())
    }

    async fn remember_active(&self, name: &str) {
        if let Err(e) = self.gateway.set_last_active_canvas(name).await {
            log::warn!("could not record last active canvas {name}: {e}");
        }
    }

    /// Make `name` the current canvas. The pending viewport write is
    /// dropped and the current viewport is saved to the old canvas before
    /// the new one is read. A no-op when `name` is already current.
    pub async fn switch_canvas(&mut self, name: &str) -> StorageResult<()> {
        self.switch_to(name, true).await
    }

    async fn switch_to(&mut self, name: &str, save_viewport: bool) -> StorageResult<()> {
        if self.is_current(name) {
            return Ok(());
        }
        self.viewport_writer.cancel();
        if save_viewport {
            let save = self.gateway.save_viewport(&self.canvas_name, &self.viewport);
            self.track_save("viewport save", self.canvas_name.clone(), save);
        }
        self.load_canvas(name).await?;
        self.remember_active(name).await;
        Ok(())
    }

    pub fn list_canvases(
        &self,
    ) -> impl Future<Output = StorageResult<Vec<CanvasMeta>>> + Send + 'static + use<> {
        self.gateway.list_canvases()
    }

    pub fn create_canvas(
        &self,
        name: &str,
    ) -> impl Future<Output = StorageResult<()>> + Send + 'static + use<> {
        self.gateway.create_canvas(name)
    }

    /// Rename a canvas. Renaming the current canvas keeps it current under
    /// its new name.
    pub async fn rename_canvas(&mut self, old_name: &str, new_name: &str) -> StorageResult<()> {
        let renaming_current = self.is_current(old_name);
        if renaming_current {
            // The flush below lands in the old folder, so refuse first.
            validate_canvas_name(new_name)?;
            if !self.gateway.canvas_exists(old_name).await? {
                return Err(StorageError::CanvasNotFound(old_name.to_string()));
            }
            if self.gateway.canvas_exists(new_name).await? {
                return Err(StorageError::CanvasExists(new_name.to_string()));
            }
            if let Some(write) = self.viewport_writer.flush() {
                self.track_save("viewport save", old_name.to_string(), write);
            }
        }
        self.gateway.rename_canvas(old_name, new_name).await?;

        if renaming_current {
            self.canvas_name = new_name.to_string();
            self.remember_active(new_name).await;
            self.events.emit(StoreEvent::CanvasSwitched(new_name.to_string()));
        }
        Ok(())
    }

    /// Delete a canvas. When it is the current one, the store first moves
    /// to the most recently modified other canvas, or reloads `Default`
    /// afterwards when there is none. A missing canvas is `CanvasNotFound`
    /// and leaves the store untouched.
    pub async fn delete_canvas(&mut self, name: &str) -> StorageResult<()> {
        if !self.gateway.canvas_exists(name).await? {
            return Err(StorageError::CanvasNotFound(name.to_string()));
        }
        if self.is_current(name) {
            self.viewport_writer.cancel();
            let doomed = safe_canvas_name(name);
            let next = self
                .gateway
                .list_canvases()
                .await?
                .into_iter()
                .find(|canvas| canvas.name != doomed);
            if let Some(next) = next {
                self.switch_to(&next.name, false).await?;
            }
        }

        self.gateway.delete_canvas(name).await?;

        if self.is_current(name) {
            self.load_canvas(DEFAULT_CANVAS).await?;
            self.remember_active(DEFAULT_CANVAS).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mb_storage::MemoryStorage;
    use pretty_assertions::assert_eq;

    fn store() -> CanvasStore {
        let gateway = PersistenceGateway::new(Arc::new(MemoryStorage::new()));
        CanvasStore::new(gateway, EngineConfig::default())
    }

    fn meta(path: &str, w: f64, h: f64) -> ImageMeta {
        ImageMeta {
            id: path.into(),
            image_path: path.into(),
            width: w,
            height: h,
            ..ImageMeta::default()
        }
    }

    #[tokio::test]
    async fn default_positions_fan_out_on_the_grid() {
        let mut store = store();
        let a = store.add_image(meta("lib/a.png", 10.0, 10.0), None);
        let b = store.add_image(meta("lib/b.png", 10.0, 10.0), None);

        let pa = store.item(a).unwrap().placement();
        let pb = store.item(b).unwrap().placement();
        assert_eq!((pa.x, pa.y), (120.0, 80.0));
        assert_eq!((pb.x, pb.y), (380.0, 80.0));
    }

    #[tokio::test]
    async fn text_is_flagged_for_editing_but_not_persisted_so() {
        let mut store = store();
        let id = store.add_text(5.0, 6.0, None);
        match store.item(id).unwrap() {
            CanvasItem::Text(txt) => {
                assert!(txt.is_auto_edit);
                assert_eq!(txt.font_size, 96.0);
                assert_eq!(txt.text, "Double click to edit");
            }
            other => panic!("expected text, got {other:?}"),
        }
        store.wait_for_saves().await;
        let loaded = store.gateway().load_items("Default").await.unwrap();
        assert!(matches!(&loaded[0], CanvasItem::Text(t) if !t.is_auto_edit));
    }

    #[tokio::test]
    async fn transient_updates_skip_history() {
        let mut store = store();
        let id = store.add_image(meta("lib/a.png", 10.0, 10.0), Some((0.0, 0.0)));
        store.update_transient(id, &ItemPatch::position(50.0, 50.0));
        assert!(store.can_undo());
        assert!(store.commit(), "drag end records one step");
        assert!(!store.commit());

        store.undo();
        assert_eq!(store.item(id).unwrap().placement().x, 0.0);
    }

    #[tokio::test]
    async fn bring_to_front_is_not_undoable() {
        let mut store = store();
        let a = store.add_image(meta("lib/a.png", 10.0, 10.0), None);
        let b = store.add_image(meta("lib/b.png", 10.0, 10.0), None);
        assert!(store.bring_to_front(a));

        let order: Vec<_> = store.items().iter().map(CanvasItem::id).collect();
        assert_eq!(order, vec![b, a]);
        store.wait_for_saves().await;
        let stored: Vec<_> = store
            .gateway()
            .load_items("Default")
            .await
            .unwrap()
            .iter()
            .map(CanvasItem::id)
            .collect();
        assert_eq!(stored, vec![b, a]);
    }

    #[tokio::test]
    async fn selection_mirrors_onto_items_and_survives_removal() {
        let mut store = store();
        let a = store.add_image(meta("lib/a.png", 10.0, 10.0), None);
        let b = store.add_image(meta("lib/b.png", 10.0, 10.0), None);
        store.select(&[a, b, ItemId::intern("ghost")]);
        assert_eq!(store.selected_ids(), &[a, b]);
        assert_eq!(store.primary_id(), Some(a));
        assert!(store.item(a).unwrap().is_selected());

        store.remove(a);
        assert_eq!(store.selected_ids(), &[b]);
        assert_eq!(store.primary_id(), Some(b));

        assert!(!store.commit(), "selection is not a history step");
        store.clear_selection();
        assert!(!store.item(b).unwrap().is_selected());
    }

    #[tokio::test]
    async fn remove_image_by_path_and_clear() {
        let mut store = store();
        store.add_image(meta("lib/a.png", 10.0, 10.0), None);
        store.add_image(meta("lib/a.png", 10.0, 10.0), None);
        store.add_text(0.0, 0.0, Some(24.0));

        assert_eq!(store.remove_image_by_path("lib/a.png"), 2);
        assert_eq!(store.remove_image_by_path("lib/a.png"), 0);
        assert_eq!(store.clear(), 1);
        assert_eq!(store.clear(), 0);
        assert!(store.items().is_empty());
    }

    #[tokio::test]
    async fn add_many_centered_centers_the_group() {
        let mut store = store();
        let ids = store.add_many_centered(
            vec![meta("lib/a.png", 100.0, 100.0), meta("lib/b.png", 100.0, 100.0)],
            (500.0, 500.0),
        );
        assert_eq!(ids.len(), 2);
        assert_eq!(store.items().len(), 2);

        let bounds = union_bounds(store.items()).unwrap();
        let (cx, cy) = bounds.center();
        assert!((cx - 500.0).abs() <= 10.0, "center x {cx}");
        assert!((cy - 500.0).abs() <= 10.0, "center y {cy}");
        let a = item_bounds(store.item(ids[0]).unwrap());
        let b = item_bounds(store.item(ids[1]).unwrap());
        assert!(!a.intersects(&b));

        store.undo();
        assert!(store.items().is_empty(), "the batch is a single step");
    }

    #[tokio::test]
    async fn auto_layout_moves_only_images() {
        let mut store = store();
        let a = store.add_image(meta("lib/a.png", 100.0, 50.0), Some((900.0, 900.0)));
        let t = store.add_text(-40.0, -40.0, None);

        assert_eq!(store.auto_layout(None, Some((0.0, 0.0))), 1);
        let p = store.item(a).unwrap().placement();
        assert_eq!((p.x, p.y), (0.0, 0.0));
        let p = store.item(t).unwrap().placement();
        assert_eq!((p.x, p.y), (-40.0, -40.0));
        assert_eq!(store.auto_layout(Some(&[t]), None), 0);
    }

    #[tokio::test]
    async fn auto_layout_with_no_targets_places_every_image() {
        let mut store = store();
        let a = store.add_image(meta("lib/a.png", 100.0, 50.0), Some((900.0, 900.0)));
        let b = store.add_image(meta("lib/b.png", 100.0, 50.0), Some((-900.0, 900.0)));

        assert_eq!(store.auto_layout(Some(&[]), Some((0.0, 0.0))), 2);
        let pa = store.item(a).unwrap().placement();
        let pb = store.item(b).unwrap().placement();
        assert_ne!((pa.x, pa.y), (900.0, 900.0));
        assert_ne!((pb.x, pb.y), (-900.0, 900.0));
        assert_ne!((pa.x, pa.y), (pb.x, pb.y));
    }

    #[tokio::test]
    async fn contain_and_pan_follow_the_item() {
        let mut store = store();
        store.set_dimensions(1000.0, 800.0);
        let id = store.add_image(meta("lib/a.png", 200.0, 100.0), Some((100.0, 100.0)));

        assert!(store.pan_to_item(id));
        let vp = *store.viewport();
        assert_eq!(vp.scale, 1.0);
        assert_eq!(vp.world_to_screen(200.0, 150.0), (500.0, 400.0));

        assert!(store.contain_item(id));
        let vp = *store.viewport();
        assert_eq!(vp.scale, 4.5);
        assert_eq!(vp.world_to_screen(200.0, 150.0), (500.0, 400.0));
        assert!(store.has_pending_viewport());
        assert!(store.cancel_pending_viewport());

        assert!(!store.contain_item(ItemId::intern("ghost")));
    }

    #[tokio::test]
    async fn invalid_viewport_is_rejected() {
        let mut store = store();
        let bad = CanvasViewport {
            scale: 0.0,
            ..CanvasViewport::default()
        };
        assert!(!store.set_viewport(bad));
        assert_eq!(store.viewport().scale, 1.0);
        assert!(!store.has_pending_viewport());
    }

    #[tokio::test]
    async fn events_report_history_state() {
        let mut store = store();
        let mut rx = store.subscribe();
        store.add_text(0.0, 0.0, None);

        assert_eq!(rx.recv().await.unwrap(), StoreEvent::ItemsChanged);
        assert_eq!(
            rx.recv().await.unwrap(),
            StoreEvent::HistoryChanged {
                can_undo: true,
                can_redo: false
            }
        );
    }
}
