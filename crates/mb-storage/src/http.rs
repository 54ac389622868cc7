//! Storage backend talking to the application's local HTTP API.

use crate::error::{StorageError, StorageResult};
use crate::service::{CanvasMeta, StorageLayout, StorageService, safe_canvas_name};
use async_trait::async_trait;
use mb_core::PersistedItem;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Root of the serializer keys used by HTTP-backed gateways. The service
/// keeps its own locks; these keys only order this process's requests.
const VIRTUAL_ROOT: &str = "/http-storage";

/// Canvas names a failed request refers to, for 404/409 mapping.
#[derive(Clone, Copy)]
enum Subject<'a> {
    None,
    Canvas(&'a str),
    Rename { old: &'a str, new: &'a str },
}

#[derive(Deserialize)]
struct SettingEnvelope {
    #[serde(default)]
    value: Value,
}

pub struct HttpStorage {
    client: Client,
    base_url: String,
    layout: StorageLayout,
}

impl HttpStorage {
    /// `base_url` is the service origin, e.g. `http://127.0.0.1:3000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            layout: StorageLayout::new(VIRTUAL_ROOT),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: Response, subject: Subject<'_>) -> StorageResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        log::debug!("storage service returned {status}: {message}");
        Err(match (status, subject) {
            (StatusCode::NOT_FOUND, Subject::Canvas(name)) => {
                StorageError::CanvasNotFound(name.to_string())
            }
            (StatusCode::NOT_FOUND, Subject::Rename { old, .. }) => {
                StorageError::CanvasNotFound(old.to_string())
            }
            (StatusCode::CONFLICT, Subject::Canvas(name)) => {
                StorageError::CanvasExists(name.to_string())
            }
            (StatusCode::CONFLICT, Subject::Rename { new, .. }) => {
                StorageError::CanvasExists(new.to_string())
            }
            _ => StorageError::Status {
                code: status.as_u16(),
                message,
            },
        })
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
        subject: Subject<'_>,
    ) -> StorageResult<Value> {
        let response = self.client.get(self.url(path)).query(query).send().await?;
        Ok(Self::check(response, subject).await?.json().await?)
    }

    async fn post_json(&self, path: &str, body: &Value, subject: Subject<'_>) -> StorageResult<()> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::check(response, subject).await?;
        Ok(())
    }
}

#[async_trait]
impl StorageService for HttpStorage {
    fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    async fn read_items(&self, canvas: &str) -> StorageResult<Value> {
        self.get_json("/api/load-canvas", &[("canvasName", canvas)], Subject::None)
            .await
    }

    async fn write_items(&self, canvas: &str, items: &[PersistedItem]) -> StorageResult<()> {
        let body = json!({ "images": items, "canvasName": canvas });
        self.post_json("/api/save-canvas", &body, Subject::None).await
    }

    async fn read_viewport(&self, canvas: &str) -> StorageResult<Option<Value>> {
        let viewport = self
            .get_json("/api/canvas-viewport", &[("canvasName", canvas)], Subject::None)
            .await?;
        Ok(Some(viewport).filter(|v| !v.is_null()))
    }

    async fn write_viewport(&self, canvas: &str, viewport: &Value) -> StorageResult<()> {
        let body = json!({ "viewport": viewport, "canvasName": canvas });
        self.post_json("/api/canvas-viewport", &body, Subject::None)
            .await
    }

    async fn list_canvases(&self) -> StorageResult<Vec<CanvasMeta>> {
        let list = self.get_json("/api/canvases", &[], Subject::None).await?;
        Ok(serde_json::from_value(list)?)
    }

    async fn canvas_exists(&self, name: &str) -> StorageResult<bool> {
        let folder = safe_canvas_name(name);
        Ok(self
            .list_canvases()
            .await?
            .iter()
            .any(|c| c.name == folder))
    }

    async fn create_canvas(&self, name: &str) -> StorageResult<()> {
        self.post_json("/api/canvases", &json!({ "name": name }), Subject::Canvas(name))
            .await
    }

    async fn rename_canvas(&self, old_name: &str, new_name: &str) -> StorageResult<()> {
        let body = json!({ "oldName": old_name, "newName": new_name });
        let subject = Subject::Rename {
            old: old_name,
            new: new_name,
        };
        self.post_json("/api/canvases/rename", &body, subject).await
    }

    async fn delete_canvas(&self, name: &str) -> StorageResult<()> {
        // The service answers 200 for a missing folder.
        if !self.canvas_exists(name).await? {
            return Err(StorageError::CanvasNotFound(name.to_string()));
        }
        self.post_json(
            "/api/canvases/delete",
            &json!({ "name": name }),
            Subject::Canvas(name),
        )
        .await
    }

    async fn read_anchors(&self) -> StorageResult<BTreeMap<String, Value>> {
        let anchors = self.get_json("/api/anchors", &[], Subject::None).await?;
        if anchors.is_null() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_value(anchors)?)
    }

    async fn write_anchors(&self, anchors: &BTreeMap<String, Value>) -> StorageResult<()> {
        self.post_json("/api/anchors", &serde_json::to_value(anchors)?, Subject::None)
            .await
    }

    /// Setting keys are plain identifiers and are used in the URL as-is.
    async fn read_setting(&self, key: &str) -> StorageResult<Option<Value>> {
        let envelope = self
            .get_json(&format!("/api/settings/{key}"), &[], Subject::None)
            .await?;
        let envelope: SettingEnvelope = serde_json::from_value(envelope)?;
        Ok(Some(envelope.value).filter(|v| !v.is_null()))
    }

    async fn write_setting(&self, key: &str, value: &Value) -> StorageResult<()> {
        self.post_json(
            &format!("/api/settings/{key}"),
            &json!({ "value": value }),
            Subject::None,
        )
        .await
    }
}
