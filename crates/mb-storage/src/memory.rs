//! In-memory storage backend.
//!
//! Behaves like [`FsStorage`](crate::fs::FsStorage) without touching disk and
//! keeps a log of every write, which makes it the backend of choice for
//! tests. Writes can be slowed down or made to fail on demand.

use crate::error::{StorageError, StorageResult};
use crate::service::{CanvasMeta, DEFAULT_CANVAS, StorageLayout, StorageService, safe_canvas_name};
use async_trait::async_trait;
use mb_core::PersistedItem;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io;
use std::time::Duration;

/// One completed write, in completion order.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRecord {
    Items { canvas: String, document: Value },
    Viewport { canvas: String, viewport: Value },
    Anchors(BTreeMap<String, Value>),
    Setting { key: String, value: Value },
}

#[derive(Debug, Default)]
struct MemCanvas {
    items: Option<Value>,
    viewport: Option<Value>,
    modified: i64,
}

#[derive(Default)]
struct State {
    canvases: BTreeMap<String, MemCanvas>,
    anchors: BTreeMap<String, Value>,
    settings: BTreeMap<String, Value>,
    writes: Vec<WriteRecord>,
    clock: i64,
    write_delay: Option<Duration>,
    fail_writes: bool,
}

impl State {
    /// Strictly increasing modification stamp.
    fn touch(&mut self) -> i64 {
        self.clock = chrono::Utc::now().timestamp_millis().max(self.clock + 1);
        self.clock
    }

    fn canvas_mut(&mut self, name: &str) -> &mut MemCanvas {
        let stamp = self.touch();
        let canvas = self.canvases.entry(safe_canvas_name(name)).or_default();
        canvas.modified = stamp;
        canvas
    }
}

pub struct MemoryStorage {
    layout: StorageLayout,
    state: Mutex<State>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            layout: StorageLayout::new("/memory"),
            state: Mutex::new(State::default()),
        }
    }

    /// Every write performed so far.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().writes.clear();
    }

    /// Make every subsequent write take `delay` before it lands.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        self.state.lock().write_delay = delay;
    }

    /// Make every subsequent write fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// The stored item document of `canvas`, if any.
    pub fn items_document(&self, canvas: &str) -> Option<Value> {
        let state = self.state.lock();
        state
            .canvases
            .get(&safe_canvas_name(canvas))
            .and_then(|c| c.items.clone())
    }

    /// The stored viewport document of `canvas`, if any.
    pub fn viewport_document(&self, canvas: &str) -> Option<Value> {
        let state = self.state.lock();
        state
            .canvases
            .get(&safe_canvas_name(canvas))
            .and_then(|c| c.viewport.clone())
    }

    async fn before_write(&self) -> StorageResult<()> {
        let (delay, fail) = {
            let state = self.state.lock();
            (state.write_delay, state.fail_writes)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(StorageError::Io(io::Error::other("simulated write failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageService for MemoryStorage {
    fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    async fn read_items(&self, canvas: &str) -> StorageResult<Value> {
        Ok(self.items_document(canvas).unwrap_or(Value::Null))
    }

    async fn write_items(&self, canvas: &str, items: &[PersistedItem]) -> StorageResult<()> {
        self.before_write().await?;
        let document = serde_json::to_value(items)?;
        let mut state = self.state.lock();
        state.canvas_mut(canvas).items = Some(document.clone());
        state.writes.push(WriteRecord::Items {
            canvas: canvas.to_string(),
            document,
        });
        Ok(())
    }

    async fn read_viewport(&self, canvas: &str) -> StorageResult<Option<Value>> {
        Ok(self.viewport_document(canvas).filter(|v| !v.is_null()))
    }

    async fn write_viewport(&self, canvas: &str, viewport: &Value) -> StorageResult<()> {
        self.before_write().await?;
        let mut state = self.state.lock();
        state.canvas_mut(canvas).viewport = Some(viewport.clone());
        state.writes.push(WriteRecord::Viewport {
            canvas: canvas.to_string(),
            viewport: viewport.clone(),
        });
        Ok(())
    }

    async fn list_canvases(&self) -> StorageResult<Vec<CanvasMeta>> {
        let mut state = self.state.lock();
        if state.canvases.is_empty() {
            state.canvas_mut(DEFAULT_CANVAS);
        }
        let mut canvases: Vec<CanvasMeta> = state
            .canvases
            .iter()
            .map(|(name, c)| CanvasMeta {
                name: name.clone(),
                last_modified: c.modified,
            })
            .collect();
        canvases.sort_by(|a, b| {
            b.last_modified
                .cmp(&a.last_modified)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(canvases)
    }

    async fn canvas_exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self
            .state
            .lock()
            .canvases
            .contains_key(&safe_canvas_name(name)))
    }

    async fn create_canvas(&self, name: &str) -> StorageResult<()> {
        let mut state = self.state.lock();
        if state.canvases.contains_key(&safe_canvas_name(name)) {
            return Err(StorageError::CanvasExists(name.to_string()));
        }
        state.canvas_mut(name);
        Ok(())
    }

    async fn rename_canvas(&self, old_name: &str, new_name: &str) -> StorageResult<()> {
        let mut state = self.state.lock();
        let new_key = safe_canvas_name(new_name);
        if state.canvases.contains_key(&new_key) {
            return Err(StorageError::CanvasExists(new_name.to_string()));
        }
        let Some(canvas) = state.canvases.remove(&safe_canvas_name(old_name)) else {
            return Err(StorageError::CanvasNotFound(old_name.to_string()));
        };
        state.canvases.insert(new_key, canvas);
        Ok(())
    }

    async fn delete_canvas(&self, name: &str) -> StorageResult<()> {
        let mut state = self.state.lock();
        match state.canvases.remove(&safe_canvas_name(name)) {
            Some(_) => Ok(()),
            None => Err(StorageError::CanvasNotFound(name.to_string())),
        }
    }

    async fn read_anchors(&self) -> StorageResult<BTreeMap<String, Value>> {
        Ok(self.state.lock().anchors.clone())
    }

    async fn write_anchors(&self, anchors: &BTreeMap<String, Value>) -> StorageResult<()> {
        self.before_write().await?;
        let mut state = self.state.lock();
        state.anchors = anchors.clone();
        state.writes.push(WriteRecord::Anchors(anchors.clone()));
        Ok(())
    }

    async fn read_setting(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.state.lock().settings.get(key).cloned())
    }

    async fn write_setting(&self, key: &str, value: &Value) -> StorageResult<()> {
        self.before_write().await?;
        let mut state = self.state.lock();
        state.settings.insert(key.to_string(), value.clone());
        state.writes.push(WriteRecord::Setting {
            key: key.to_string(),
            value: value.clone(),
        });
        Ok(())
    }
}
