//! File-system storage backend.
//!
//! ```text
//! <root>/
//!   anchors.json
//!   settings.json
//!   canvases/<safe name>/
//!     canvas.json
//!     canvas_viewport.json
//!     temp-images/
//! ```
//!
//! Documents are pretty-printed JSON, written to a sibling temp file and
//! renamed into place so readers never see a half-written document.

use crate::error::{StorageError, StorageResult};
use crate::service::{CanvasMeta, DEFAULT_CANVAS, StorageLayout, StorageService};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mb_core::PersistedItem;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct FsStorage {
    layout: StorageLayout,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: StorageLayout::new(root),
        }
    }
}

async fn read_json(path: &Path) -> StorageResult<Option<Value>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    log::trace!("wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

async fn is_dir(path: &Path) -> StorageResult<bool> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_dir()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

impl FsStorage {
    async fn read_settings(&self) -> StorageResult<BTreeMap<String, Value>> {
        match read_json(&self.layout.settings_file()).await? {
            Some(Value::Object(map)) => Ok(map.into_iter().collect()),
            Some(_) => {
                log::warn!("settings document is not an object, ignoring it");
                Ok(BTreeMap::new())
            }
            None => Ok(BTreeMap::new()),
        }
    }

    async fn ensure_default_canvas(&self) -> StorageResult<()> {
        let dir = self.layout.canvases_dir();
        tokio::fs::create_dir_all(&dir).await?;
        let mut entries = tokio::fs::read_dir(&dir).await?;
        if entries.next_entry().await?.is_none() {
            log::info!("no canvases found, creating {DEFAULT_CANVAS}");
            tokio::fs::create_dir_all(self.layout.canvas_paths(DEFAULT_CANVAS).dir).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageService for FsStorage {
    fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    async fn read_items(&self, canvas: &str) -> StorageResult<Value> {
        let path = self.layout.canvas_paths(canvas).data_file;
        Ok(read_json(&path).await?.unwrap_or(Value::Null))
    }

    async fn write_items(&self, canvas: &str, items: &[PersistedItem]) -> StorageResult<()> {
        write_json(&self.layout.canvas_paths(canvas).data_file, items).await
    }

    async fn read_viewport(&self, canvas: &str) -> StorageResult<Option<Value>> {
        let viewport = read_json(&self.layout.canvas_paths(canvas).viewport_file).await?;
        Ok(viewport.filter(|v| !v.is_null()))
    }

    async fn write_viewport(&self, canvas: &str, viewport: &Value) -> StorageResult<()> {
        write_json(&self.layout.canvas_paths(canvas).viewport_file, viewport).await
    }

    async fn list_canvases(&self) -> StorageResult<Vec<CanvasMeta>> {
        self.ensure_default_canvas().await?;

        let mut canvases = Vec::new();
        let mut entries = tokio::fs::read_dir(self.layout.canvases_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let meta = match entry.metadata().await {
                Ok(meta) if meta.is_dir() => meta,
                Ok(_) => continue,
                Err(e) => {
                    log::debug!("skipping {}: {e}", entry.path().display());
                    continue;
                }
            };
            let modified: DateTime<Utc> = meta.modified()?.into();
            canvases.push(CanvasMeta {
                name: entry.file_name().to_string_lossy().into_owned(),
                last_modified: modified.timestamp_millis(),
            });
        }
        canvases.sort_by(|a, b| {
            b.last_modified
                .cmp(&a.last_modified)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(canvases)
    }

    async fn canvas_exists(&self, name: &str) -> StorageResult<bool> {
        is_dir(&self.layout.canvas_paths(name).dir).await
    }

    async fn create_canvas(&self, name: &str) -> StorageResult<()> {
        let dir = self.layout.canvas_paths(name).dir;
        if is_dir(&dir).await? {
            return Err(StorageError::CanvasExists(name.to_string()));
        }
        tokio::fs::create_dir_all(&dir).await?;
        Ok(())
    }

    async fn rename_canvas(&self, old_name: &str, new_name: &str) -> StorageResult<()> {
        let old_dir = self.layout.canvas_paths(old_name).dir;
        let new_dir = self.layout.canvas_paths(new_name).dir;
        if !is_dir(&old_dir).await? {
            return Err(StorageError::CanvasNotFound(old_name.to_string()));
        }
        if is_dir(&new_dir).await? {
            return Err(StorageError::CanvasExists(new_name.to_string()));
        }
        tokio::fs::rename(&old_dir, &new_dir).await?;
        Ok(())
    }

    async fn delete_canvas(&self, name: &str) -> StorageResult<()> {
        let dir = self.layout.canvas_paths(name).dir;
        if !is_dir(&dir).await? {
            return Err(StorageError::CanvasNotFound(name.to_string()));
        }
        tokio::fs::remove_dir_all(&dir).await?;
        Ok(())
    }

    async fn read_anchors(&self) -> StorageResult<BTreeMap<String, Value>> {
        match read_json(&self.layout.anchors_file()).await? {
            Some(Value::Object(map)) => Ok(map.into_iter().collect()),
            Some(_) => {
                log::warn!("anchors document is not an object, ignoring it");
                Ok(BTreeMap::new())
            }
            None => Ok(BTreeMap::new()),
        }
    }

    async fn write_anchors(&self, anchors: &BTreeMap<String, Value>) -> StorageResult<()> {
        write_json(&self.layout.anchors_file(), anchors).await
    }

    async fn read_setting(&self, key: &str) -> StorageResult<Option<Value>> {
        let mut settings = self.read_settings().await?;
        Ok(settings.remove(key).filter(|v| !v.is_null()))
    }

    async fn write_setting(&self, key: &str, value: &Value) -> StorageResult<()> {
        let mut settings = self.read_settings().await?;
        settings.insert(key.to_string(), value.clone());
        write_json(&self.layout.settings_file(), &settings).await
    }
}
