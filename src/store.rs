//! Store port for task rows, and the local implementation of it.
//!
//! The gateway talks to any `TaskStore`. The hosted table is reached through
//! `rest::RestStore`; `LocalStore` keeps the same rows in memory and, when opened
//! with a path, mirrors them into a JSON file so the board also works without a
//! backend.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use crate::local::{load_json, save_json};
use crate::task::{NewTaskRow, TaskId, TaskPatch, TaskRow};

/// Error codes the store reports, as Postgres SQLSTATE or PostgREST codes.
pub mod codes {
    pub const UNDEFINED_TABLE: &str = "42P01";
    pub const NOT_NULL_VIOLATION: &str = "23502";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const CHECK_VIOLATION: &str = "23514";
    /// PostgREST "no rows / connection" response.
    pub const NO_CONNECTION: &str = "PGRST116";
    /// SQLSTATE connection_failure; also used for transport errors.
    pub const CONNECTION_FAILURE: &str = "08006";
}

/// Error body returned by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Error)]
#[error("{message}")]
pub struct StoreError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl StoreError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        StoreError {
            code: Some(code.to_string()),
            message: message.into(),
            ..StoreError::default()
        }
    }

    /// A failure to reach the store at all.
    pub fn connection(message: impl Into<String>) -> Self {
        StoreError::new(codes::CONNECTION_FAILURE, message)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence contract for the `tasks` table.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Cheap round trip proving the table is reachable.
    async fn probe(&self) -> StoreResult<()>;

    /// All rows, newest `created_at` first.
    async fn select_all(&self) -> StoreResult<Vec<TaskRow>>;

    /// Insert one row and return what the store created.
    ///
    /// An empty vec means the store accepted the write but returned nothing.
    async fn insert(&self, row: &NewTaskRow) -> StoreResult<Vec<TaskRow>>;

    /// Apply a partial update to the row with this id.
    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> StoreResult<()>;

    /// Delete the row with this id.
    async fn delete(&self, id: &TaskId) -> StoreResult<()>;
}

#[async_trait]
impl<S: TaskStore + ?Sized> TaskStore for Arc<S> {
    async fn probe(&self) -> StoreResult<()> {
        (**self).probe().await
    }

    async fn select_all(&self) -> StoreResult<Vec<TaskRow>> {
        (**self).select_all().await
    }

    async fn insert(&self, row: &NewTaskRow) -> StoreResult<Vec<TaskRow>> {
        (**self).insert(row).await
    }

    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> StoreResult<()> {
        (**self).update(id, patch).await
    }

    async fn delete(&self, id: &TaskId) -> StoreResult<()> {
        (**self).delete(id).await
    }
}

/// The store calls, for targeting injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Probe,
    Select,
    Insert,
    Update,
    Delete,
}

/// Rows kept in memory, optionally mirrored to a JSON file.
///
/// Failures can be queued with [`LocalStore::fail_next`] (any call) or
/// [`LocalStore::fail_next_on`] (one kind of call); a queued error is returned
/// instead of touching the rows.
#[derive(Debug, Default)]
pub struct LocalStore {
    rows: RwLock<Vec<TaskRow>>,
    path: Option<PathBuf>,
    failures: Mutex<VecDeque<StoreError>>,
    targeted: Mutex<Vec<(StoreOp, StoreError)>>,
    calls: AtomicUsize,
    discard_inserts: AtomicBool,
}

impl LocalStore {
    /// Empty store that never touches disk.
    pub fn in_memory() -> Self {
        LocalStore::default()
    }

    /// Store backed by a JSON file; a missing file starts empty.
    pub fn open(path: &Path) -> Self {
        let rows: Vec<TaskRow> = load_json(path);
        tracing::debug!(path = %path.display(), rows = rows.len(), "opened local task store");
        LocalStore {
            rows: RwLock::new(rows),
            path: Some(path.to_path_buf()),
            ..LocalStore::default()
        }
    }

    /// Queue an error for the next store call.
    pub async fn fail_next(&self, error: StoreError) {
        self.failures.lock().await.push_back(error);
    }

    /// Queue an error for the next call of one kind; other calls are unaffected.
    pub async fn fail_next_on(&self, op: StoreOp, error: StoreError) {
        self.targeted.lock().await.push((op, error));
    }

    /// Accept inserts without storing or returning anything.
    pub fn discard_inserts(&self, discard: bool) {
        self.discard_inserts.store(discard, Ordering::SeqCst);
    }

    /// Number of calls made against this store, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn row(&self, id: &TaskId) -> Option<TaskRow> {
        self.rows.read().await.iter().find(|r| r.id == id.as_str()).cloned()
    }

    async fn enter(&self, op: StoreOp) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().await.pop_front() {
            return Err(err);
        }
        let mut targeted = self.targeted.lock().await;
        match targeted.iter().position(|(o, _)| *o == op) {
            Some(i) => Err(targeted.remove(i).1),
            None => Ok(()),
        }
    }

    /// Write the rows to the backing file on the blocking pool.
    ///
    /// Callers hold the rows write lock across this, so writes land in order.
    async fn persist(&self, rows: &[TaskRow]) -> StoreResult<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        let snapshot = rows.to_vec();
        let target = path.clone();
        let written = tokio::task::spawn_blocking(move || save_json(&snapshot, &target))
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))
            .and_then(|result| result);
        written.map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "failed to write local task store");
            StoreError::new("58030", format!("failed to write {}: {e}", path.display()))
        })
    }
}

#[async_trait]
impl TaskStore for LocalStore {
    async fn probe(&self) -> StoreResult<()> {
        self.enter(StoreOp::Probe).await
    }

    async fn select_all(&self) -> StoreResult<Vec<TaskRow>> {
        self.enter(StoreOp::Select).await?;
        let mut rows = self.rows.read().await.clone();
        // Stable: rows are kept newest-first, so equal timestamps keep that order.
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert(&self, row: &NewTaskRow) -> StoreResult<Vec<TaskRow>> {
        self.enter(StoreOp::Insert).await?;
        if self.discard_inserts.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        let stored = TaskRow::from_new(uuid::Uuid::new_v4().to_string(), row);
        let mut rows = self.rows.write().await;
        rows.insert(0, stored.clone());
        if let Err(e) = self.persist(&rows).await {
            rows.remove(0);
            return Err(e);
        }
        Ok(vec![stored])
    }

    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> StoreResult<()> {
        self.enter(StoreOp::Update).await?;
        let mut rows = self.rows.write().await;
        // Updating a missing id matches zero rows, which is not an error.
        if let Some(row) = rows.iter_mut().find(|r| r.id == id.as_str()) {
            row.apply(patch);
        }
        self.persist(&rows).await
    }

    async fn delete(&self, id: &TaskId) -> StoreResult<()> {
        self.enter(StoreOp::Delete).await?;
        let mut rows = self.rows.write().await;
        rows.retain(|r| r.id != id.as_str());
        self.persist(&rows).await
    }
}
