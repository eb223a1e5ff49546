//! Task data gateway: the only code that talks to a `TaskStore`.
//!
//! Reads map `TaskRow`s into `Task`s. Writes validate their input locally first,
//! then send typed payloads. Insert failures are classified by store error code
//! into messages a user can act on; every other store error is logged and handed
//! back unchanged.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::fields::{Priority, Status};
use crate::store::{codes, StoreError, TaskStore};
use crate::task::{
    avatar_url_for, NewTaskRow, Subtask, Task, TaskChanges, TaskDraft, TaskId, TaskPatch,
};

/// `user_id` stamped on rows created without a signed-in user.
pub const ANONYMOUS_USER: &str = "anonymous";

/// `ai_insights` used when the draft carries none.
pub const DEFAULT_INSIGHTS: &str = "Task created";

#[derive(Debug, Error, PartialEq)]
pub enum GatewayError {
    #[error("required field missing: {0}")]
    MissingField(&'static str),
    #[error("invalid priority '{0}', expected low, medium or high")]
    InvalidPriority(String),
    #[error("database connection error: {0}")]
    Unreachable(String),
    #[error("tasks table not found, run the database setup SQL")]
    TableNotFound,
    #[error("missing required fields: {0}")]
    MissingColumn(String),
    #[error("invalid reference: {0}")]
    InvalidReference(String),
    #[error("invalid data: {0}")]
    ConstraintViolation(String),
    #[error("database connection failed, check your network and the store URL")]
    ConnectionFailed,
    #[error("failed to create task, no data returned from the database")]
    NoDataReturned,
    #[error("database error: {0}")]
    Database(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Map an insert failure to the error the user sees.
pub fn classify_insert_error(err: StoreError) -> GatewayError {
    let details = || err.details.clone().unwrap_or_else(|| err.message.clone());
    match err.code() {
        Some(codes::UNDEFINED_TABLE) => GatewayError::TableNotFound,
        Some(codes::NOT_NULL_VIOLATION) => GatewayError::MissingColumn(details()),
        Some(codes::FOREIGN_KEY_VIOLATION) => GatewayError::InvalidReference(details()),
        Some(codes::CHECK_VIOLATION) => GatewayError::ConstraintViolation(details()),
        Some(codes::NO_CONNECTION) => GatewayError::ConnectionFailed,
        // SQLSTATE class 08: connection exceptions.
        Some(code) if code.starts_with("08") => GatewayError::ConnectionFailed,
        _ if err.message.is_empty() => GatewayError::Database("unknown error creating task".into()),
        _ => GatewayError::Database(err.message.clone()),
    }
}

/// Validated task operations over a store.
#[derive(Debug, Clone)]
pub struct TaskGateway<S> {
    store: S,
    user_id: String,
}

impl<S: TaskStore> TaskGateway<S> {
    pub fn new(store: S) -> Self {
        TaskGateway {
            store,
            user_id: ANONYMOUS_USER.to_string(),
        }
    }

    /// Stamp created rows with this user's id.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// All tasks, newest first.
    pub async fn list(&self) -> Result<Vec<Task>, GatewayError> {
        let rows = self.store.select_all().await.map_err(|e| {
            tracing::error!(code = ?e.code, error = %e, "failed to list tasks");
            e
        })?;
        tracing::debug!(count = rows.len(), "listed tasks");
        Ok(rows.into_iter().map(Task::from_row).collect())
    }

    /// Validate a draft and persist it.
    ///
    /// Local checks run before any store call. The store is then probed, so an
    /// unreachable backend is reported as such instead of as an insert failure.
    pub async fn create(&self, draft: TaskDraft) -> Result<Task, GatewayError> {
        let row = self.new_row(draft).map_err(|e| {
            tracing::warn!(error = %e, "rejected task before sending");
            e
        })?;

        if let Err(e) = self.store.probe().await {
            tracing::error!(code = ?e.code, error = %e, "task store health check failed");
            return Err(GatewayError::Unreachable(e.message));
        }

        let mut created = match self.store.insert(&row).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(
                    code = ?e.code,
                    details = ?e.details,
                    hint = ?e.hint,
                    error = %e,
                    "failed to insert task"
                );
                return Err(classify_insert_error(e));
            }
        };
        if created.is_empty() {
            tracing::error!(title = %row.title, "no data returned after task creation");
            return Err(GatewayError::NoDataReturned);
        }
        let task = Task::from_row(created.swap_remove(0));
        tracing::info!(task_id = %task.id, title = %task.title, "created task");
        Ok(task)
    }

    fn new_row(&self, draft: TaskDraft) -> Result<NewTaskRow, GatewayError> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(GatewayError::MissingField("title"));
        }
        let description = draft.description.trim();
        if description.is_empty() {
            return Err(GatewayError::MissingField("description"));
        }
        let priority: Priority = draft
            .priority
            .parse()
            .map_err(|_| GatewayError::InvalidPriority(draft.priority.clone()))?;
        let status = Status::parse_or_default(draft.status.as_deref());
        let due_date = draft.due_date.ok_or(GatewayError::MissingField("due_date"))?;
        let assignee_name = draft.assignee_name.trim();
        if assignee_name.is_empty() {
            return Err(GatewayError::MissingField("assignee_name"));
        }

        let now = Utc::now();
        Ok(NewTaskRow {
            title: title.to_string(),
            description: description.to_string(),
            priority,
            status,
            due_date,
            estimated_time: draft.estimated_time.filter(|t| !t.trim().is_empty()),
            assignee_name: assignee_name.to_string(),
            assignee_avatar: avatar_url_for(assignee_name),
            ai_insights: draft
                .ai_insights
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_INSIGHTS.to_string()),
            tags: draft.tags,
            subtasks: draft.subtasks,
            user_id: self.user_id.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Set the status. Returns the `updated_at` stamped on the row.
    pub async fn update_status(&self, id: &TaskId, status: Status) -> Result<DateTime<Utc>, GatewayError> {
        let now = Utc::now();
        let patch = TaskPatch {
            status: Some(status),
            updated_at: Some(now),
            ..TaskPatch::default()
        };
        self.patch(id, &patch, "status").await?;
        Ok(now)
    }

    /// Replace the whole subtask list. Returns the `updated_at` stamped on the row.
    pub async fn update_subtasks(&self, id: &TaskId, subtasks: &[Subtask]) -> Result<DateTime<Utc>, GatewayError> {
        let now = Utc::now();
        let patch = TaskPatch {
            subtasks: Some(subtasks.to_vec()),
            updated_at: Some(now),
            ..TaskPatch::default()
        };
        self.patch(id, &patch, "subtasks").await?;
        Ok(now)
    }

    /// Push the fields set in `changes`; everything else is left alone.
    pub async fn update(&self, id: &TaskId, changes: &TaskChanges) -> Result<DateTime<Utc>, GatewayError> {
        let now = Utc::now();
        self.patch(id, &changes.to_patch(now), "task").await?;
        Ok(now)
    }

    async fn patch(&self, id: &TaskId, patch: &TaskPatch, what: &str) -> Result<(), GatewayError> {
        self.store.update(id, patch).await.map_err(|e| {
            tracing::error!(task_id = %id, code = ?e.code, error = %e, "failed to update {what}");
            GatewayError::from(e)
        })?;
        tracing::debug!(task_id = %id, "updated {what}");
        Ok(())
    }

    pub async fn delete(&self, id: &TaskId) -> Result<(), GatewayError> {
        self.store.delete(id).await.map_err(|e| {
            tracing::error!(task_id = %id, code = ?e.code, error = %e, "failed to delete task");
            GatewayError::from(e)
        })?;
        tracing::info!(task_id = %id, "deleted task");
        Ok(())
    }
}
