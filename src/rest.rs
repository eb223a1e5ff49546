//! `TaskStore` over the hosted REST table API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};

use crate::store::{StoreError, StoreResult, TaskStore};
use crate::task::{NewTaskRow, TaskId, TaskPatch, TaskRow};

/// Per-request limit. A request that runs past it fails like an unreachable
/// host, so callers see a connection error instead of hanging.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote task table reached through `{url}/rest/v1/tasks`.
#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    endpoint: String,
    anon_key: String,
    bearer: String,
}

impl RestStore {
    /// Build a store for `base_url`. Requests are authorised with the session's
    /// access token when one is given, otherwise with the anon key.
    pub fn new(base_url: &str, anon_key: &str, access_token: Option<&str>) -> StoreResult<Self> {
        Self::with_timeout(base_url, anon_key, access_token, REQUEST_TIMEOUT)
    }

    fn with_timeout(
        base_url: &str,
        anon_key: &str,
        access_token: Option<&str>,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::connection(format!("failed to create HTTP client: {e}")))?;
        Ok(RestStore {
            client,
            endpoint: format!("{}/rest/v1/tasks", base_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
            bearer: access_token.unwrap_or(anon_key).to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn authorised(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.bearer)
    }

    async fn send(&self, builder: RequestBuilder) -> StoreResult<Response> {
        let response = self.authorised(builder).send().await.map_err(|e| {
            tracing::debug!(endpoint = %self.endpoint, error = %e, "request did not complete");
            StoreError::connection(e.to_string())
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_from_body(status, &body))
    }
}

/// Decode an error response. Bodies that are not a store error keep the raw text
/// as details.
pub fn error_from_body(status: StatusCode, body: &str) -> StoreError {
    match serde_json::from_str::<StoreError>(body) {
        Ok(err) if !err.message.is_empty() || err.code.is_some() => err,
        _ => StoreError {
            code: None,
            message: format!("HTTP {status}"),
            details: Some(body.to_string()).filter(|b| !b.trim().is_empty()),
            hint: None,
        },
    }
}

#[async_trait]
impl TaskStore for RestStore {
    async fn probe(&self) -> StoreResult<()> {
        let req = self
            .client
            .get(&self.endpoint)
            .query(&[("select", "id"), ("limit", "1")]);
        self.send(req).await.map(|_| ())
    }

    async fn select_all(&self) -> StoreResult<Vec<TaskRow>> {
        let req = self
            .client
            .get(&self.endpoint)
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        let response = self.send(req).await?;
        response
            .json()
            .await
            .map_err(|e| StoreError::new("PGRST102", format!("unreadable task rows: {e}")))
    }

    async fn insert(&self, row: &NewTaskRow) -> StoreResult<Vec<TaskRow>> {
        let req = self
            .client
            .post(&self.endpoint)
            .header("Prefer", "return=representation")
            .json(row);
        let response = self.send(req).await?;
        let text = response.text().await.map_err(|e| StoreError::connection(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text)
            .map_err(|e| StoreError::new("PGRST102", format!("unreadable inserted row: {e}")))
    }

    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> StoreResult<()> {
        let req = self
            .client
            .patch(&self.endpoint)
            .query(&[("id", format!("eq.{id}"))])
            .json(patch);
        self.send(req).await.map(|_| ())
    }

    async fn delete(&self, id: &TaskId) -> StoreResult<()> {
        let req = self
            .client
            .delete(&self.endpoint)
            .query(&[("id", format!("eq.{id}"))]);
        self.send(req).await.map(|_| ())
    }
}
