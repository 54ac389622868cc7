//! Persistence gateway: typed canvas I/O funneled through the keyed
//! serializer.
//!
//! Every method claims its serializer keys synchronously and returns a
//! `'static` future, so a caller may spawn the future and still rely on
//! per-resource submission order. Key sets:
//!
//! | operation            | keys                                        |
//! |----------------------|---------------------------------------------|
//! | save items           | canvas dir, item file                       |
//! | load items           | item file                                   |
//! | save viewport        | canvas dir, viewport file                   |
//! | load viewport        | viewport file                               |
//! | create canvas        | canvas dir                                  |
//! | rename canvas        | old dir, new dir                            |
//! | delete canvas        | canvas dir, item file, viewport file        |
//! | list canvases        | canvases dir                                |
//! | anchors              | anchors file                                |
//! | settings             | settings file                               |

use crate::error::{StorageError, StorageResult};
use crate::serializer::KeyedSerializer;
use crate::service::{
    CanvasMeta, DEFAULT_CANVAS, StorageLayout, StorageService, validate_canvas_name,
};
use mb_core::{AnchorData, CanvasItem, CanvasViewport, decode_items, encode_items};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

/// Settings key holding the name of the canvas to open on start.
pub const LAST_ACTIVE_CANVAS: &str = "lastActiveCanvas";

#[derive(Clone)]
pub struct PersistenceGateway {
    storage: Arc<dyn StorageService>,
    serializer: KeyedSerializer,
}

impl PersistenceGateway {
    pub fn new(storage: Arc<dyn StorageService>) -> Self {
        Self {
            storage,
            serializer: KeyedSerializer::new(),
        }
    }

    pub fn storage(&self) -> &Arc<dyn StorageService> {
        &self.storage
    }

    pub fn layout(&self) -> &StorageLayout {
        self.storage.layout()
    }

    pub fn serializer(&self) -> &KeyedSerializer {
        &self.serializer
    }

    fn serialized<F, Fut, T>(
        &self,
        keys: Vec<PathBuf>,
        op: F,
    ) -> impl Future<Output = StorageResult<T>> + Send + 'static + use<F, Fut, T>
    where
        F: FnOnce(Arc<dyn StorageService>) -> Fut + Send + 'static,
        Fut: Future<Output = StorageResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let storage = self.storage.clone();
        self.serializer.run_all(keys, move || op(storage))
    }

    // ─── Items ───────────────────────────────────────────────────────────

    /// Write the full item list of `canvas`. Transient fields are dropped
    /// and list order is kept.
    pub fn save_items(
        &self,
        canvas: &str,
        items: &[CanvasItem],
    ) -> impl Future<Output = StorageResult<()>> + Send + 'static + use<> {
        let encoded = encode_items(items);
        let paths = self.layout().canvas_paths(canvas);
        let canvas = canvas.to_string();
        self.serialized(vec![paths.dir, paths.data_file], move |storage| async move {
            log::debug!("saving {} items to canvas {canvas}", encoded.len());
            storage.write_items(&canvas, &encoded).await
        })
    }

    /// Read the item list of `canvas`. A missing document is an empty
    /// canvas; malformed entries are skipped.
    pub fn load_items(
        &self,
        canvas: &str,
    ) -> impl Future<Output = StorageResult<Vec<CanvasItem>>> + Send + 'static + use<> {
        let paths = self.layout().canvas_paths(canvas);
        let canvas = canvas.to_string();
        self.serialized(vec![paths.data_file], move |storage| async move {
            let items = decode_items(storage.read_items(&canvas).await?);
            log::debug!("loaded {} items from canvas {canvas}", items.len());
            Ok::<_, StorageError>(items)
        })
    }

    // ─── Viewport ────────────────────────────────────────────────────────

    pub fn save_viewport(
        &self,
        canvas: &str,
        viewport: &CanvasViewport,
    ) -> impl Future<Output = StorageResult<()>> + Send + 'static + use<> {
        let paths = self.layout().canvas_paths(canvas);
        let canvas = canvas.to_string();
        let viewport = *viewport;
        self.serialized(vec![paths.dir, paths.viewport_file], move |storage| async move {
            let value = serde_json::to_value(viewport)?;
            storage.write_viewport(&canvas, &value).await
        })
    }

    /// The stored viewport of `canvas`. An absent or malformed document
    /// reads as `None`.
    pub fn load_viewport(
        &self,
        canvas: &str,
    ) -> impl Future<Output = StorageResult<Option<CanvasViewport>>> + Send + 'static + use<> {
        let paths = self.layout().canvas_paths(canvas);
        let canvas = canvas.to_string();
        self.serialized(vec![paths.viewport_file], move |storage| async move {
            let Some(raw) = storage.read_viewport(&canvas).await? else {
                return Ok::<_, StorageError>(None);
            };
            match serde_json::from_value::<CanvasViewport>(raw) {
                Ok(viewport) if viewport.is_valid() => Ok(Some(viewport)),
                Ok(_) => {
                    log::warn!("ignoring out-of-range viewport for canvas {canvas}");
                    Ok(None)
                }
                Err(e) => {
                    log::warn!("ignoring malformed viewport for canvas {canvas}: {e}");
                    Ok(None)
                }
            }
        })
    }

    // ─── Canvases ────────────────────────────────────────────────────────

    pub fn list_canvases(
        &self,
    ) -> impl Future<Output = StorageResult<Vec<CanvasMeta>>> + Send + 'static + use<> {
        let dir = self.layout().canvases_dir();
        self.serialized(vec![dir], |storage| async move { storage.list_canvases().await })
    }

    pub fn canvas_exists(
        &self,
        name: &str,
    ) -> impl Future<Output = StorageResult<bool>> + Send + 'static + use<> {
        let dir = self.layout().canvas_paths(name).dir;
        let name = name.to_string();
        self.serialized(vec![dir], move |storage| async move {
            storage.canvas_exists(&name).await
        })
    }

    pub fn create_canvas(
        &self,
        name: &str,
    ) -> impl Future<Output = StorageResult<()>> + Send + 'static + use<> {
        let dir = self.layout().canvas_paths(name).dir;
        let name = name.to_string();
        self.serialized(vec![dir], move |storage| async move {
            validate_canvas_name(&name)?;
            storage.create_canvas(&name).await?;
            log::info!("created canvas {name}");
            Ok::<_, StorageError>(())
        })
    }

    /// Rename a canvas folder. Fails with `CanvasNotFound` or
    /// `CanvasExists` before anything is moved.
    pub fn rename_canvas(
        &self,
        old_name: &str,
        new_name: &str,
    ) -> impl Future<Output = StorageResult<()>> + Send + 'static + use<> {
        let keys = vec![
            self.layout().canvas_paths(old_name).dir,
            self.layout().canvas_paths(new_name).dir,
        ];
        let old_name = old_name.to_string();
        let new_name = new_name.to_string();
        self.serialized(keys, move |storage| async move {
            validate_canvas_name(&new_name)?;
            storage.rename_canvas(&old_name, &new_name).await?;
            log::info!("renamed canvas {old_name} to {new_name}");
            Ok::<_, StorageError>(())
        })
    }

    pub fn delete_canvas(
        &self,
        name: &str,
    ) -> impl Future<Output = StorageResult<()>> + Send + 'static + use<> {
        let paths = self.layout().canvas_paths(name);
        let name = name.to_string();
        self.serialized(
            vec![paths.dir, paths.data_file, paths.viewport_file],
            move |storage| async move {
                storage.delete_canvas(&name).await?;
                log::info!("deleted canvas {name}");
                Ok::<_, StorageError>(())
            },
        )
    }

    // ─── Anchors ─────────────────────────────────────────────────────────

    /// All stored anchors. Malformed entries are skipped.
    pub fn load_anchors(
        &self,
    ) -> impl Future<Output = StorageResult<BTreeMap<String, AnchorData>>> + Send + 'static + use<> {
        let file = self.layout().anchors_file();
        self.serialized(vec![file], |storage| async move {
            let raw = storage.read_anchors().await?;
            let mut anchors = BTreeMap::new();
            for (slot, value) in raw {
                match serde_json::from_value::<AnchorData>(value) {
                    Ok(anchor) => {
                        anchors.insert(slot, anchor);
                    }
                    Err(e) => log::warn!("skipping malformed anchor {slot}: {e}"),
                }
            }
            Ok::<_, StorageError>(anchors)
        })
    }

    /// Replace the stored anchor mapping.
    pub fn save_anchors(
        &self,
        anchors: &BTreeMap<String, AnchorData>,
    ) -> impl Future<Output = StorageResult<()>> + Send + 'static + use<> {
        let file = self.layout().anchors_file();
        let anchors = anchors.clone();
        self.serialized(vec![file], move |storage| async move {
            let raw = anchors
                .into_iter()
                .map(|(slot, anchor)| -> StorageResult<(String, Value)> {
                    Ok((slot, serde_json::to_value(anchor)?))
                })
                .collect::<StorageResult<BTreeMap<String, Value>>>()?;
            storage.write_anchors(&raw).await
        })
    }

    // ─── Settings ────────────────────────────────────────────────────────

    pub fn get_setting(
        &self,
        key: &str,
    ) -> impl Future<Output = StorageResult<Option<Value>>> + Send + 'static + use<> {
        let file = self.layout().settings_file();
        let key = key.to_string();
        self.serialized(vec![file], move |storage| async move {
            storage.read_setting(&key).await
        })
    }

    pub fn set_setting(
        &self,
        key: &str,
        value: Value,
    ) -> impl Future<Output = StorageResult<()>> + Send + 'static + use<> {
        let file = self.layout().settings_file();
        let key = key.to_string();
        self.serialized(vec![file], move |storage| async move {
            storage.write_setting(&key, &value).await
        })
    }

    /// Canvas opened last, `Default` when none was recorded.
    pub fn last_active_canvas(
        &self,
    ) -> impl Future<Output = StorageResult<String>> + Send + 'static + use<> {
        let setting = self.get_setting(LAST_ACTIVE_CANVAS);
        async move {
            let name = setting
                .await?
                .and_then(|v| v.as_str().map(str::to_string))
                .filter(|name| !name.is_empty());
            Ok::<_, StorageError>(name.unwrap_or_else(|| DEFAULT_CANVAS.to_string()))
        }
    }

    pub fn set_last_active_canvas(
        &self,
        name: &str,
    ) -> impl Future<Output = StorageResult<()>> + Send + 'static + use<> {
        self.set_setting(LAST_ACTIVE_CANVAS, Value::String(name.to_string()))
    }
}
