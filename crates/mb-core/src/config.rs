//! Engine configuration.
//!
//! Stored as camelCase JSON. Every field has a default, so a partial (or
//! empty) document is valid and missing keys fall back to the defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fixed-column grid used when an image is added without a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridConfig {
    pub columns: usize,
    pub spacing_x: f64,
    pub spacing_y: f64,
    pub base_x: f64,
    pub base_y: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            columns: 4,
            spacing_x: 260.0,
            spacing_y: 260.0,
            base_x: 120.0,
            base_y: 80.0,
        }
    }
}

/// Initial content of a freshly added text block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextDefaults {
    pub font_size: f64,
    pub fill: String,
    pub text: String,
}

impl Default for TextDefaults {
    fn default() -> Self {
        Self {
            font_size: 96.0,
            fill: "#ffffff".into(),
            text: "Double click to edit".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Maximum number of history snapshots kept.
    pub history_depth: usize,
    /// Trailing delay before a viewport change is written.
    pub viewport_debounce_ms: u64,
    /// Gap between packed items.
    pub layout_gap: f64,
    /// Top-left corner of the group placed by auto layout.
    pub auto_layout_start: (f64, f64),
    pub grid: GridConfig,
    /// Screen pixels kept free on each side when zooming to fit.
    pub contain_padding: f64,
    pub text_defaults: TextDefaults,
    /// Layout size of an image whose intrinsic size is not known yet.
    pub fallback_image_size: (f64, f64),
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_depth: 50,
            viewport_debounce_ms: 500,
            layout_gap: 20.0,
            auto_layout_start: (100.0, 100.0),
            grid: GridConfig::default(),
            contain_padding: 50.0,
            text_defaults: TextDefaults::default(),
            fallback_image_size: (250.0, 200.0),
        }
    }
}

impl EngineConfig {
    pub fn viewport_debounce(&self) -> Duration {
        Duration::from_millis(self.viewport_debounce_ms)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = serde_json::from_str(&content)?;
        log::debug!("loaded engine config from {}", path.display());
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}
