//! The storage collaborator: where canvases live and how they are read and
//! written.
//!
//! A [`StorageService`] moves raw documents. Encoding items to their
//! persisted form, tolerant decoding, and write serialization all happen a
//! level up, in the persistence gateway.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use mb_core::PersistedItem;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the canvas that always exists.
pub const DEFAULT_CANVAS: &str = "Default";

pub const CANVASES_DIR: &str = "canvases";
pub const ITEMS_FILE: &str = "canvas.json";
pub const VIEWPORT_FILE: &str = "canvas_viewport.json";
pub const ANCHORS_FILE: &str = "anchors.json";
pub const SETTINGS_FILE: &str = "settings.json";

/// Folder name for a canvas: path separators and characters that are not
/// allowed in file names become `_`; an empty name maps to `Default`. The
/// result always names a folder directly under the canvases folder.
pub fn safe_canvas_name(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();
    if safe.is_empty() {
        DEFAULT_CANVAS.to_string()
    } else if safe.chars().all(|c| c == '.') {
        safe.replace('.', "_")
    } else {
        safe
    }
}

/// Names accepted for new canvases: anything with a visible character.
pub fn validate_canvas_name(name: &str) -> StorageResult<()> {
    if name.trim().is_empty() {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Resource paths of one canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasPaths {
    pub dir: PathBuf,
    pub data_file: PathBuf,
    pub viewport_file: PathBuf,
    pub temp_dir: PathBuf,
}

/// Resource layout of a storage root. Also the source of serializer keys,
/// so backends without a real file system still use these paths as
/// resource identities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn canvases_dir(&self) -> PathBuf {
        self.root.join(CANVASES_DIR)
    }

    pub fn canvas_paths(&self, name: &str) -> CanvasPaths {
        let dir = self.canvases_dir().join(safe_canvas_name(name));
        CanvasPaths {
            data_file: dir.join(ITEMS_FILE),
            viewport_file: dir.join(VIEWPORT_FILE),
            temp_dir: dir.join(mb_core::TEMP_ASSET_DIR),
            dir,
        }
    }

    pub fn anchors_file(&self) -> PathBuf {
        self.root.join(ANCHORS_FILE)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }
}

/// Summary of a stored canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasMeta {
    pub name: String,
    /// Milliseconds since the Unix epoch.
    #[serde(deserialize_with = "millis")]
    pub last_modified: i64,
}

/// File-system mtimes arrive as fractional milliseconds from some services.
fn millis<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    Ok(value.floor() as i64)
}

/// Raw document storage for canvases, anchors and settings.
///
/// Reads of missing documents are not errors: items read as `Value::Null`,
/// a viewport as `None`, anchors as an empty map.
#[async_trait]
pub trait StorageService: Send + Sync + 'static {
    /// Layout used for serializer keys.
    fn layout(&self) -> &StorageLayout;

    async fn read_items(&self, canvas: &str) -> StorageResult<Value>;
    async fn write_items(&self, canvas: &str, items: &[PersistedItem]) -> StorageResult<()>;

    async fn read_viewport(&self, canvas: &str) -> StorageResult<Option<Value>>;
    async fn write_viewport(&self, canvas: &str, viewport: &Value) -> StorageResult<()>;

    /// All canvases, most recently modified first. Creates `Default` when
    /// there are none.
    async fn list_canvases(&self) -> StorageResult<Vec<CanvasMeta>>;
    async fn canvas_exists(&self, name: &str) -> StorageResult<bool>;
    /// Fails with `CanvasExists` when the canvas is already there.
    async fn create_canvas(&self, name: &str) -> StorageResult<()>;
    async fn rename_canvas(&self, old_name: &str, new_name: &str) -> StorageResult<()>;
    /// Fails with `CanvasNotFound` when there is nothing to delete.
    async fn delete_canvas(&self, name: &str) -> StorageResult<()>;

    async fn read_anchors(&self) -> StorageResult<BTreeMap<String, Value>>;
    async fn write_anchors(&self, anchors: &BTreeMap<String, Value>) -> StorageResult<()>;

    async fn read_setting(&self, key: &str) -> StorageResult<Option<Value>>;
    async fn write_setting(&self, key: &str, value: &Value) -> StorageResult<()>;
}
