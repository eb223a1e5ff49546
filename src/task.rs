//! Task data structures and the mapping to and from stored rows.
//!
//! `Task` is the in-memory shape the board and the forms work with. The store speaks
//! in flat snake_case rows instead, so each direction gets its own boundary type:
//! `TaskRow` for reads, `NewTaskRow` for inserts and `TaskPatch` for partial updates.
//! The assignee avatar is never carried across a boundary as input; it is derived
//! from the assignee name every time one of these types is built.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::fields::{Priority, Status};

/// Avatar service; the URL-encoded assignee name is appended as the seed.
pub const AVATAR_BASE_URL: &str = "https://api.dicebear.com/7.x/avataaars/svg?seed=";

/// Assignee used when a task is created without one.
pub const UNASSIGNED: &str = "Unassigned";

/// Opaque identifier assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        TaskId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

/// A checklist item inside a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub title: String,
    pub completed: bool,
}

impl Subtask {
    pub fn new(title: impl Into<String>) -> Self {
        Subtask {
            title: title.into(),
            completed: false,
        }
    }
}

/// The person a task is assigned to.
///
/// Only the name can be set; the avatar URL is computed from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignee {
    name: String,
    avatar_url: String,
}

impl Assignee {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let avatar_url = avatar_url_for(&name);
        Assignee { name, avatar_url }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn avatar_url(&self) -> &str {
        &self.avatar_url
    }
}

/// Avatar URL for a name.
pub fn avatar_url_for(name: &str) -> String {
    format!("{AVATAR_BASE_URL}{}", encode_uri_component(name))
}

/// Percent-encode everything except the characters `encodeURIComponent` leaves alone.
pub fn encode_uri_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// A due-date range as picked in a form. `to` collapses to `from` when omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DueRange {
    pub fn new(from: DateTime<Utc>, to: Option<DateTime<Utc>>) -> Self {
        DueRange {
            from,
            to: to.unwrap_or(from),
        }
    }

    pub fn single(at: DateTime<Utc>) -> Self {
        DueRange::new(at, None)
    }
}

/// A work item on the status board.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: Status,
    pub due_date: DateTime<Utc>,
    pub estimated_time: Option<String>,
    pub assignee: Assignee,
    pub ai_insights: String,
    pub tags: Vec<String>,
    pub subtasks: Vec<Subtask>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Map a stored row into the in-memory shape.
    ///
    /// Missing status becomes todo, missing lists become empty, and the avatar is
    /// recomputed from the stored name rather than trusted.
    pub fn from_row(row: TaskRow) -> Self {
        let priority = match row.priority.as_deref().map(str::parse::<Priority>) {
            Some(Ok(p)) => p,
            Some(Err(e)) => {
                tracing::warn!(task_id = %row.id, error = %e, "stored priority unreadable, using default");
                Priority::default()
            }
            None => Priority::default(),
        };
        let assignee_name = row
            .assignee_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| UNASSIGNED.to_string());

        Task {
            id: TaskId(row.id),
            title: row.title.unwrap_or_default(),
            description: row.description.unwrap_or_default(),
            priority,
            status: Status::parse_or_default(row.status.as_deref()),
            due_date: row.due_date.or(row.created_at).unwrap_or_default(),
            estimated_time: row.estimated_time,
            assignee: Assignee::new(assignee_name),
            ai_insights: row.ai_insights.unwrap_or_default(),
            tags: row.tags.unwrap_or_default(),
            subtasks: row.subtasks.unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    /// Number of completed subtasks and the total.
    pub fn subtask_progress(&self) -> (usize, usize) {
        let done = self.subtasks.iter().filter(|s| s.completed).count();
        (done, self.subtasks.len())
    }
}

/// A task row as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimated_time: Option<String>,
    #[serde(default)]
    pub assignee_name: Option<String>,
    #[serde(default)]
    pub assignee_avatar: Option<String>,
    #[serde(default)]
    pub ai_insights: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub subtasks: Option<Vec<Subtask>>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl TaskRow {
    /// Build the stored row for a freshly inserted task.
    pub fn from_new(id: impl Into<String>, new: &NewTaskRow) -> Self {
        TaskRow {
            id: id.into(),
            title: Some(new.title.clone()),
            description: Some(new.description.clone()),
            priority: Some(new.priority.as_str().to_string()),
            status: Some(new.status.as_str().to_string()),
            due_date: Some(new.due_date),
            estimated_time: new.estimated_time.clone(),
            assignee_name: Some(new.assignee_name.clone()),
            assignee_avatar: Some(new.assignee_avatar.clone()),
            ai_insights: Some(new.ai_insights.clone()),
            tags: Some(new.tags.clone()),
            subtasks: Some(new.subtasks.clone()),
            user_id: Some(new.user_id.clone()),
            created_at: Some(new.created_at),
            updated_at: Some(new.updated_at),
        }
    }

    /// Apply a partial update in place; fields absent from the patch are kept.
    pub fn apply(&mut self, patch: &TaskPatch) {
        if let Some(ref v) = patch.title {
            self.title = Some(v.clone());
        }
        if let Some(ref v) = patch.description {
            self.description = Some(v.clone());
        }
        if let Some(v) = patch.priority {
            self.priority = Some(v.as_str().to_string());
        }
        if let Some(v) = patch.status {
            self.status = Some(v.as_str().to_string());
        }
        if let Some(v) = patch.due_date {
            self.due_date = Some(v);
        }
        if let Some(ref v) = patch.estimated_time {
            self.estimated_time = v.clone();
        }
        if let Some(ref v) = patch.assignee_name {
            self.assignee_name = Some(v.clone());
        }
        if let Some(ref v) = patch.assignee_avatar {
            self.assignee_avatar = Some(v.clone());
        }
        if let Some(ref v) = patch.tags {
            self.tags = Some(v.clone());
        }
        if let Some(ref v) = patch.subtasks {
            self.subtasks = Some(v.clone());
        }
        if let Some(v) = patch.updated_at {
            self.updated_at = Some(v);
        }
    }
}

/// Insert payload: every required column present and already validated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTaskRow {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: Status,
    pub due_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<String>,
    pub assignee_name: String,
    pub assignee_avatar: String,
    pub ai_insights: String,
    pub tags: Vec<String>,
    pub subtasks: Vec<Subtask>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update payload. Fields left as `None` are not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    /// `Some(None)` clears the column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<Vec<Subtask>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Unvalidated input for creating a task.
///
/// Priority and status arrive as text so the gateway can reject or coerce them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub priority: String,
    pub status: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_time: Option<String>,
    pub assignee_name: String,
    pub ai_insights: Option<String>,
    pub tags: Vec<String>,
    pub subtasks: Vec<Subtask>,
}

/// Fields changed by an edit. `None` leaves the field as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub due: Option<DueRange>,
    /// `Some(None)` removes the estimate.
    pub estimated_time: Option<Option<String>>,
    pub assignee: Option<String>,
    pub tags: Option<Vec<String>>,
    pub subtasks: Option<Vec<Subtask>>,
}

impl TaskChanges {
    pub fn is_empty(&self) -> bool {
        *self == TaskChanges::default()
    }

    /// Build the store patch, stamping `updated_at` and deriving the avatar.
    pub fn to_patch(&self, now: DateTime<Utc>) -> TaskPatch {
        TaskPatch {
            title: self.title.clone(),
            description: self.description.clone(),
            priority: self.priority,
            status: self.status,
            due_date: self.due.map(|d| d.from),
            estimated_time: self.estimated_time.clone(),
            assignee_name: self.assignee.clone(),
            assignee_avatar: self.assignee.as_deref().map(avatar_url_for),
            tags: self.tags.clone(),
            subtasks: self.subtasks.clone(),
            updated_at: Some(now),
        }
    }

    /// Merge the changes into a local task after the store has accepted them.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(ref v) = self.title {
            task.title = v.clone();
        }
        if let Some(ref v) = self.description {
            task.description = v.clone();
        }
        if let Some(v) = self.priority {
            task.priority = v;
        }
        if let Some(v) = self.status {
            task.status = v;
        }
        if let Some(d) = self.due {
            task.due_date = d.from;
        }
        if let Some(ref v) = self.estimated_time {
            task.estimated_time = v.clone();
        }
        if let Some(ref name) = self.assignee {
            task.assignee = Assignee::new(name.clone());
        }
        if let Some(ref v) = self.tags {
            task.tags = v.clone();
        }
        if let Some(ref v) = self.subtasks {
            task.subtasks = v.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(id: &str) -> TaskRow {
        TaskRow {
            id: id.to_string(),
            title: Some("Write spec".to_string()),
            description: Some("Draft the design doc".to_string()),
            priority: Some("high".to_string()),
            status: None,
            due_date: Some(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()),
            estimated_time: None,
            assignee_name: Some("Ada".to_string()),
            assignee_avatar: Some("https://example.invalid/stale.svg".to_string()),
            ai_insights: None,
            tags: None,
            subtasks: None,
            user_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn encodes_like_encode_uri_component() {
        assert_eq!(encode_uri_component("Ada"), "Ada");
        assert_eq!(encode_uri_component("John Doe"), "John%20Doe");
        assert_eq!(encode_uri_component("a&b=c/d"), "a%26b%3Dc%2Fd");
        assert_eq!(encode_uri_component("it's (ok)!"), "it's%20(ok)!");
        assert_eq!(encode_uri_component("Zoë"), "Zo%C3%AB");
    }

    #[test]
    fn avatar_follows_name() {
        let a = Assignee::new("Jane Smith");
        assert_eq!(a.avatar_url(), format!("{AVATAR_BASE_URL}Jane%20Smith"));
        assert_eq!(a.avatar_url(), avatar_url_for(a.name()));
    }

    #[test]
    fn from_row_fills_defaults_and_recomputes_avatar() {
        let task = Task::from_row(row("t1"));
        assert_eq!(task.status, Status::Todo);
        assert_eq!(task.priority, Priority::High);
        assert!(task.tags.is_empty());
        assert!(task.subtasks.is_empty());
        assert_eq!(task.assignee.avatar_url(), avatar_url_for("Ada"));
    }

    #[test]
    fn from_row_defaults_blank_assignee() {
        let mut r = row("t2");
        r.assignee_name = Some("  ".to_string());
        r.priority = Some("whenever".to_string());
        let task = Task::from_row(r);
        assert_eq!(task.assignee.name(), UNASSIGNED);
        assert_eq!(task.priority, Priority::Medium);
    }

    #[test]
    fn row_deserialises_with_nulls() {
        let json = r#"{"id":"abc","title":"T","description":null,"status":null,"tags":null,
                       "subtasks":[{"title":"s","completed":true}],"due_date":"2024-04-01T00:00:00+00:00"}"#;
        let r: TaskRow = serde_json::from_str(json).unwrap();
        assert_eq!(r.description, None);
        assert_eq!(r.subtasks.as_ref().map(Vec::len), Some(1));
        let task = Task::from_row(r);
        assert_eq!(task.subtask_progress(), (1, 1));
    }

    #[test]
    fn null_title_does_not_sink_the_row() {
        let json = r#"[{"id":"a","title":null,"description":"d"},{"id":"b","description":"no title key"},
                       {"id":"c","title":"Write spec"}]"#;
        let rows: Vec<TaskRow> = serde_json::from_str(json).unwrap();
        let tasks: Vec<Task> = rows.into_iter().map(Task::from_row).collect();
        assert_eq!(tasks[0].title, "");
        assert_eq!(tasks[1].title, "");
        assert_eq!(tasks[2].title, "Write spec");
    }

    #[test]
    fn patch_skips_untouched_fields() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let changes = TaskChanges {
            status: Some(Status::Done),
            ..TaskChanges::default()
        };
        let value = serde_json::to_value(changes.to_patch(now)).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 2);
        assert_eq!(value["status"], "done");
        assert!(value.get("updated_at").is_some());
    }

    #[test]
    fn cleared_estimate_is_sent_as_null() {
        let mut r = row("t4");
        r.estimated_time = Some("4 hours".to_string());
        let changes = TaskChanges {
            estimated_time: Some(None),
            ..TaskChanges::default()
        };
        let patch = changes.to_patch(Utc::now());
        let value = serde_json::to_value(&patch).unwrap();
        assert!(value.get("estimated_time").is_some_and(serde_json::Value::is_null));

        r.apply(&patch);
        assert_eq!(r.estimated_time, None);
        let mut task = Task::from_row(row("t4"));
        task.estimated_time = Some("4 hours".to_string());
        changes.apply_to(&mut task);
        assert_eq!(task.estimated_time, None);
    }

    #[test]
    fn changes_rederive_avatar_on_rename() {
        let mut task = Task::from_row(row("t3"));
        let changes = TaskChanges {
            assignee: Some("Grace Hopper".to_string()),
            due: Some(DueRange::new(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(), None)),
            ..TaskChanges::default()
        };
        let patch = changes.to_patch(Utc::now());
        assert_eq!(patch.assignee_avatar.as_deref(), Some(avatar_url_for("Grace Hopper").as_str()));

        changes.apply_to(&mut task);
        assert_eq!(task.assignee.name(), "Grace Hopper");
        assert_eq!(task.assignee.avatar_url(), avatar_url_for("Grace Hopper"));
        assert_eq!(task.due_date, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn due_range_collapses_missing_end() {
        let from = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        assert_eq!(DueRange::new(from, None).to, from);
    }
}
