//! Management-API backed implementations of the engine's abstract
//! accessors: project listing and per-category settings read/write.

use async_trait::async_trait;
use confmig_core::{ReadError, SettingsSnapshot, SettingsStore, WriteError};
use confmig_protocol::{Category, Project};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

/// Lists the projects visible to the configured credentials.
#[async_trait]
pub trait ProjectDirectory: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>, ReadError>;
}

pub struct HttpBackend {
    client: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(base: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.into(),
            token,
        }
    }

    fn token(&self) -> Result<&str, ReadError> {
        self.token
            .as_deref()
            .ok_or_else(|| ReadError::Unauthorized("no management API token configured".into()))
    }

    fn config_url(&self, project_id: &str, category: Category) -> String {
        let path = match category {
            Category::Auth => format!("/v1/projects/{project_id}/config/auth"),
            Category::Postgrest => format!("/v1/projects/{project_id}/postgrest"),
            Category::EdgeFunctions => format!("/v1/projects/{project_id}/functions"),
            Category::Secrets => format!("/v1/projects/{project_id}/secrets"),
            Category::Storage => format!("/v1/projects/{project_id}/config/storage"),
            Category::Postgres => format!("/v1/projects/{project_id}/config/database/postgres"),
            Category::Branches => format!("/v1/projects/{project_id}/branches"),
        };
        format!("{}{}", self.base, path)
    }

    async fn get_json(&self, url: &str) -> Result<Value, ReadError> {
        let token = self.token()?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ReadError::UnreachableBackend(e.to_string()))?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ReadError::Unauthorized(format!("HTTP {status} from {url}")));
        }
        if !status.is_success() {
            return Err(ReadError::UnreachableBackend(format!(
                "HTTP {status} from {url}"
            )));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| ReadError::UnreachableBackend(format!("invalid JSON body: {e}")))
    }
}

/// Flatten a category payload into opaque string key/values.
///
/// Objects map each field to its key: scalars as their plain string form,
/// nested values as compact JSON. Arrays key each element by its `name`
/// (or `id`) field when present, falling back to the element index, so
/// list-shaped categories (secrets, functions, branches) diff per item.
pub fn flatten_settings(payload: &Value) -> SettingsSnapshot {
    let mut snapshot = SettingsSnapshot::new();
    match payload {
        Value::Object(map) => {
            for (key, value) in map {
                snapshot.insert(key, scalar_string(value));
            }
        }
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                let key = item
                    .get("name")
                    .and_then(Value::as_str)
                    .or_else(|| item.get("id").and_then(Value::as_str))
                    .map(str::to_string)
                    .unwrap_or_else(|| idx.to_string());
                snapshot.insert(key, scalar_string(item));
            }
        }
        _ => {}
    }
    snapshot
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[async_trait]
impl SettingsStore for HttpBackend {
    async fn read(
        &self,
        project_id: &str,
        category: Category,
    ) -> Result<SettingsSnapshot, ReadError> {
        let url = self.config_url(project_id, category);
        let payload = self.get_json(&url).await?;
        let snapshot = flatten_settings(&payload);
        debug!(project = project_id, %category, keys = snapshot.len(), "settings snapshot fetched");
        Ok(snapshot)
    }

    async fn write(
        &self,
        project_id: &str,
        category: Category,
        key: &str,
        value: Option<&str>,
    ) -> Result<(), WriteError> {
        let token = self
            .token()
            .map_err(|e| WriteError::Unauthorized(e.to_string()))?;
        let url = self.config_url(project_id, category);
        let mut body = serde_json::Map::new();
        body.insert(
            key.to_string(),
            value.map(Value::from).unwrap_or(Value::Null),
        );
        let body = Value::Object(body);
        let response = self
            .client
            .patch(&url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| WriteError::UnreachableBackend(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let detail = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(WriteError::Unauthorized(format!("HTTP {status}: {detail}")))
            }
            s if s.is_client_error() => Err(WriteError::Rejected(format!("HTTP {s}: {detail}"))),
            s => Err(WriteError::UnreachableBackend(format!(
                "HTTP {s}: {detail}"
            ))),
        }
    }
}

#[async_trait]
impl ProjectDirectory for HttpBackend {
    async fn list_projects(&self) -> Result<Vec<Project>, ReadError> {
        let url = format!("{}/v1/projects", self.base);
        let payload = self.get_json(&url).await?;
        serde_json::from_value(payload)
            .map_err(|e| ReadError::UnreachableBackend(format!("unexpected projects payload: {e}")))
    }
}
