//! Task form model shared by the add and edit popups.
//!
//! Static fields are checked against a small declarative schema (`RULES`); tags and
//! subtasks are dynamic lists edited in place. Submitting turns the form into a
//! `TaskDraft` for creation or `TaskChanges` for an edit.

use std::fmt;
use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::fields::{Priority, Status};
use crate::task::{DueRange, Subtask, Task, TaskChanges, TaskDraft, UNASSIGNED};

pub const TITLE_LEN: RangeInclusive<usize> = 2..=50;
pub const DESCRIPTION_LEN: RangeInclusive<usize> = 2..=500;

/// `ai_insights` attached to tasks created from the form.
pub const NEW_TASK_INSIGHTS: &str = "New task added to the system";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Description,
}

impl Field {
    fn label(self) -> &'static str {
        match self {
            Field::Title => "Title",
            Field::Description => "Description",
        }
    }
}

/// Length rule for one text field, counted in characters.
struct Rule {
    field: Field,
    len: RangeInclusive<usize>,
}

const RULES: [Rule; 2] = [
    Rule { field: Field::Title, len: TITLE_LEN },
    Rule { field: Field::Description, len: DESCRIPTION_LEN },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("a submission is already in progress")]
    InFlight,
    #[error("title and description cannot be blank")]
    Blank,
    #[error("{}", join_errors(.0))]
    Invalid(Vec<FieldError>),
}

fn join_errors(errors: &[FieldError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Values the form can offer to fill in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestions {
    pub description: String,
    pub estimated_time: String,
    pub assignee: String,
    pub tags: Vec<String>,
}

impl Suggestions {
    /// Fixed suggestions shown until a real source exists.
    pub fn placeholder() -> Self {
        Suggestions {
            description: "This task involves implementing the new feature as discussed in the planning meeting."
                .to_string(),
            estimated_time: "4 hours".to_string(),
            assignee: "John Doe, Jane Smith".to_string(),
            tags: vec!["feature".to_string(), "frontend".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: Status,
    due: DueRange,
    pub estimated_time: String,
    pub assignee: String,
    tags: Vec<String>,
    subtasks: Vec<Subtask>,
    suggestions: Option<Suggestions>,
    submitting: bool,
}

impl TaskForm {
    /// Empty form with default priority and status, due `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        TaskForm {
            title: String::new(),
            description: String::new(),
            priority: Priority::default(),
            status: Status::default(),
            due: DueRange::single(now),
            estimated_time: String::new(),
            assignee: String::new(),
            tags: Vec::new(),
            subtasks: Vec::new(),
            suggestions: None,
            submitting: false,
        }
    }

    /// Form pre-filled from an existing task, for editing.
    pub fn from_task(task: &Task) -> Self {
        TaskForm {
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority,
            status: task.status,
            due: DueRange::single(task.due_date),
            estimated_time: task.estimated_time.clone().unwrap_or_default(),
            assignee: task.assignee.name().to_string(),
            tags: task.tags.clone(),
            subtasks: task.subtasks.clone(),
            suggestions: None,
            submitting: false,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Suggestions) -> Self {
        self.suggestions = Some(suggestions);
        self
    }

    pub fn suggestions(&self) -> Option<&Suggestions> {
        self.suggestions.as_ref()
    }

    pub fn due(&self) -> DueRange {
        self.due
    }

    /// Set the due range; a missing end collapses to the start.
    pub fn set_due(&mut self, from: DateTime<Utc>, to: Option<DateTime<Utc>>) {
        self.due = DueRange::new(from, to);
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Append a tag. Blank and duplicate values are ignored.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.tags.iter().any(|t| t == tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        self.tags.len() != before
    }

    pub fn subtasks(&self) -> &[Subtask] {
        &self.subtasks
    }

    pub fn add_subtask(&mut self, title: &str) -> bool {
        let title = title.trim();
        if title.is_empty() {
            return false;
        }
        self.subtasks.push(Subtask::new(title));
        true
    }

    pub fn toggle_subtask(&mut self, index: usize) -> bool {
        match self.subtasks.get_mut(index) {
            Some(s) => {
                s.completed = !s.completed;
                true
            }
            None => false,
        }
    }

    pub fn remove_subtask(&mut self, index: usize) -> bool {
        if index < self.subtasks.len() {
            self.subtasks.remove(index);
            true
        } else {
            false
        }
    }

    pub fn accept_description(&mut self) {
        if let Some(ref s) = self.suggestions {
            self.description = s.description.clone();
        }
    }

    pub fn accept_estimated_time(&mut self) {
        if let Some(ref s) = self.suggestions {
            self.estimated_time = s.estimated_time.clone();
        }
    }

    pub fn accept_assignee(&mut self) {
        if let Some(ref s) = self.suggestions {
            self.assignee = s.assignee.clone();
        }
    }

    /// Add every suggested tag not already present.
    pub fn accept_tags(&mut self) {
        let tags = match self.suggestions {
            Some(ref s) => s.tags.clone(),
            None => return,
        };
        for tag in tags {
            self.add_tag(&tag);
        }
    }

    fn text(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Description => &self.description,
        }
    }

    /// Every rule the current values break.
    pub fn validate(&self) -> Vec<FieldError> {
        RULES
            .iter()
            .filter_map(|rule| {
                let len = self.text(rule.field).trim().chars().count();
                let label = rule.field.label();
                let message = if len < *rule.len.start() {
                    format!("{label} must be at least {} characters", rule.len.start())
                } else if len > *rule.len.end() {
                    format!("{label} must be at most {} characters", rule.len.end())
                } else {
                    return None;
                };
                Some(FieldError {
                    field: rule.field,
                    message,
                })
            })
            .collect()
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn can_submit(&self) -> bool {
        !self.submitting && self.is_valid()
    }

    fn check(&self) -> Result<(), SubmitError> {
        if self.submitting {
            return Err(SubmitError::InFlight);
        }
        if self.title.trim().is_empty() || self.description.trim().is_empty() {
            return Err(SubmitError::Blank);
        }
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(SubmitError::Invalid(errors));
        }
        Ok(())
    }

    /// Start a create submission and return the draft to send.
    ///
    /// The form stays locked until [`TaskForm::finish_submit`] is called.
    pub fn begin_submit(&mut self) -> Result<TaskDraft, SubmitError> {
        self.check()?;
        self.submitting = true;
        let assignee = self.assignee.trim();
        Ok(TaskDraft {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            priority: self.priority.as_str().to_string(),
            status: Some(self.status.as_str().to_string()),
            due_date: Some(self.due.from),
            estimated_time: Some(self.estimated_time.trim().to_string()).filter(|t| !t.is_empty()),
            assignee_name: if assignee.is_empty() { UNASSIGNED } else { assignee }.to_string(),
            ai_insights: Some(NEW_TASK_INSIGHTS.to_string()),
            tags: self.tags.clone(),
            subtasks: self.subtasks.clone(),
        })
    }

    pub fn finish_submit(&mut self) {
        self.submitting = false;
    }

    /// Changes relative to `original`; fields left as they were are not included.
    pub fn to_changes(&self, original: &Task) -> Result<TaskChanges, SubmitError> {
        self.check()?;
        let title = self.title.trim();
        let description = self.description.trim();
        let estimated = Some(self.estimated_time.trim()).filter(|t| !t.is_empty());
        let assignee = match self.assignee.trim() {
            "" => UNASSIGNED,
            name => name,
        };

        Ok(TaskChanges {
            title: (title != original.title).then(|| title.to_string()),
            description: (description != original.description).then(|| description.to_string()),
            priority: (self.priority != original.priority).then_some(self.priority),
            status: (self.status != original.status).then_some(self.status),
            due: (self.due.from != original.due_date).then_some(self.due),
            estimated_time: (estimated != original.estimated_time.as_deref())
                .then(|| estimated.map(str::to_string)),
            assignee: (assignee != original.assignee.name()).then(|| assignee.to_string()),
            tags: (self.tags != original.tags).then(|| self.tags.clone()),
            subtasks: (self.subtasks != original.subtasks).then(|| self.subtasks.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Assignee, TaskId};
    use chrono::TimeZone;
    use rstest::rstest;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap()
    }

    fn filled() -> TaskForm {
        let mut form = TaskForm::new(now());
        form.title = "Write spec".to_string();
        form.description = "Draft the design doc".to_string();
        form
    }

    fn task() -> Task {
        Task {
            id: TaskId::from("t1"),
            title: "Write spec".to_string(),
            description: "Draft the design doc".to_string(),
            priority: Priority::Medium,
            status: Status::Todo,
            due_date: now(),
            estimated_time: None,
            assignee: Assignee::new("Ada"),
            ai_insights: String::new(),
            tags: vec!["docs".to_string()],
            subtasks: vec![],
            created_at: Some(now()),
            updated_at: Some(now()),
        }
    }

    #[rstest]
    #[case("x", 1, false)]
    #[case("x", 2, true)]
    #[case("x", 50, true)]
    #[case("x", 51, false)]
    #[case("é", 50, true)]
    #[case("é", 51, false)]
    fn title_length_is_counted_in_chars(#[case] ch: &str, #[case] count: usize, #[case] valid: bool) {
        let mut form = filled();
        form.title = ch.repeat(count);
        assert_eq!(form.is_valid(), valid);
    }

    #[test]
    fn validation_names_the_broken_fields() {
        let mut form = TaskForm::new(now());
        form.title = "x".to_string();
        form.description = "y".repeat(501);
        let errors = form.validate();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, Field::Title);
        assert_eq!(errors[0].message, "Title must be at least 2 characters");
        assert_eq!(errors[1].message, "Description must be at most 500 characters");
    }

    #[test]
    fn adding_a_tag_twice_is_idempotent() {
        let mut form = filled();
        assert!(form.add_tag(" backend "));
        let once = form.tags().to_vec();
        assert!(!form.add_tag("backend"));
        assert!(!form.add_tag("   "));
        assert_eq!(form.tags(), once.as_slice());
        assert!(form.add_tag("Backend"));
        assert!(form.remove_tag("backend"));
        assert_eq!(form.tags(), ["Backend"]);
    }

    #[test]
    fn subtask_toggle_is_self_inverse() {
        let mut form = filled();
        assert!(!form.add_subtask("  "));
        form.add_subtask("outline");
        form.add_subtask("review");
        let before = form.subtasks().to_vec();
        form.toggle_subtask(1);
        assert!(form.subtasks()[1].completed);
        form.toggle_subtask(1);
        assert_eq!(form.subtasks(), before.as_slice());
        assert!(!form.toggle_subtask(7));
        assert!(!form.remove_subtask(7));
        assert!(form.remove_subtask(0));
        assert_eq!(form.subtasks()[0].title, "review");
    }

    #[test]
    fn accepting_suggestions_fills_fields() {
        let mut form = TaskForm::new(now()).with_suggestions(Suggestions::placeholder());
        form.add_tag("feature");
        form.accept_description();
        form.accept_estimated_time();
        form.accept_assignee();
        form.accept_tags();
        assert_eq!(form.estimated_time, "4 hours");
        assert_eq!(form.assignee, "John Doe, Jane Smith");
        assert_eq!(form.tags(), ["feature", "frontend"]);
        assert!(form.description.starts_with("This task involves"));
    }

    #[rstest]
    #[case("   ", "Draft the design doc")]
    #[case("Write spec", " \n ")]
    fn whitespace_only_text_blocks_submission(#[case] title: &str, #[case] description: &str) {
        let mut form = filled();
        form.title = title.to_string();
        form.description = description.to_string();
        assert_eq!(form.begin_submit(), Err(SubmitError::Blank));
        assert!(!form.is_submitting());
    }

    #[test]
    fn submission_is_exclusive_until_finished() {
        let mut form = filled();
        let draft = form.begin_submit().unwrap();
        assert!(!form.can_submit());
        assert_eq!(form.begin_submit(), Err(SubmitError::InFlight));
        form.finish_submit();
        assert!(form.can_submit());

        assert_eq!(draft.priority, "medium");
        assert_eq!(draft.status.as_deref(), Some("todo"));
        assert_eq!(draft.assignee_name, UNASSIGNED);
        assert_eq!(draft.due_date, Some(now()));
        assert_eq!(draft.ai_insights.as_deref(), Some(NEW_TASK_INSIGHTS));
        assert_eq!(draft.estimated_time, None);
    }

    #[test]
    fn due_range_end_defaults_to_start() {
        let mut form = filled();
        let later = now() + chrono::Duration::days(3);
        form.set_due(later, None);
        assert_eq!(form.due(), DueRange { from: later, to: later });
    }

    #[test]
    fn edit_only_reports_changed_fields() {
        let original = task();
        let mut form = TaskForm::from_task(&original);
        assert!(form.to_changes(&original).unwrap().is_empty());

        form.status = Status::Done;
        form.assignee = "Grace".to_string();
        let changes = form.to_changes(&original).unwrap();
        assert_eq!(changes.status, Some(Status::Done));
        assert_eq!(changes.assignee.as_deref(), Some("Grace"));
        assert_eq!(changes.title, None);
        assert_eq!(changes.tags, None);
    }

    #[test]
    fn clearing_the_estimate_is_a_change() {
        let original = Task {
            estimated_time: Some("4 hours".to_string()),
            ..task()
        };
        let mut form = TaskForm::from_task(&original);
        form.estimated_time = "  ".to_string();
        let changes = form.to_changes(&original).unwrap();
        assert!(!changes.is_empty());
        assert_eq!(changes.estimated_time, Some(None));

        form.estimated_time = "2 days".to_string();
        let changes = form.to_changes(&original).unwrap();
        assert_eq!(changes.estimated_time, Some(Some("2 days".to_string())));
    }
}
