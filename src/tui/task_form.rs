//! Add/edit popup over the [`TaskForm`] model.
//!
//! Text fields are edited through [`InputField`]s and copied into the model when
//! the user submits; priority and status are selectors cycled with Left/Right.

use chrono::{Local, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::calendar::{local_start_of_day, parse_due_input};
use crate::fields::{Priority, Status};
use crate::form::{Suggestions, TaskForm};
use crate::task::{Task, TaskChanges, TaskDraft, TaskId};
use crate::tui::{
    colors::{priority_color, status_color, Theme},
    input::InputField,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Description,
    Priority,
    Status,
    Due,
    Estimate,
    Assignee,
    Tags,
    Subtasks,
}

impl FormField {
    const ORDER: [FormField; 9] = [
        FormField::Title,
        FormField::Description,
        FormField::Priority,
        FormField::Status,
        FormField::Due,
        FormField::Estimate,
        FormField::Assignee,
        FormField::Tags,
        FormField::Subtasks,
    ];

    fn label(self) -> &'static str {
        match self {
            FormField::Title => "Title",
            FormField::Description => "Description",
            FormField::Priority => "Priority",
            FormField::Status => "Status",
            FormField::Due => "Due",
            FormField::Estimate => "Estimate",
            FormField::Assignee => "Assignee",
            FormField::Tags => "Add tag",
            FormField::Subtasks => "Add subtask",
        }
    }

    fn position(self) -> usize {
        FormField::ORDER.iter().position(|f| *f == self).unwrap_or(0)
    }
}

/// What the popup is for.
#[derive(Debug, Clone)]
pub enum FormMode {
    Create,
    Edit(Task),
}

/// A submission ready to hand to the board.
#[derive(Debug, Clone)]
pub enum FormOutcome {
    Create(TaskDraft),
    Edit(TaskId, TaskChanges),
}

#[derive(Debug)]
pub enum FormAction {
    None,
    Cancel,
    Submit(FormOutcome),
}

pub struct FormView {
    form: TaskForm,
    mode: FormMode,
    title: InputField,
    description: InputField,
    due: InputField,
    due_initial: String,
    estimate: InputField,
    assignee: InputField,
    tag: InputField,
    subtask: InputField,
    current: FormField,
    error: Option<String>,
}

impl FormView {
    pub fn create() -> Self {
        let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
        FormView::build(TaskForm::new(Utc::now()), FormMode::Create, today)
    }

    pub fn edit(task: &Task) -> Self {
        let due = task.due_date.with_timezone(&Local).format("%Y-%m-%d").to_string();
        FormView::build(TaskForm::from_task(task), FormMode::Edit(task.clone()), due)
    }

    fn build(form: TaskForm, mode: FormMode, due: String) -> Self {
        let mut view = FormView {
            title: InputField::with_value(&form.title),
            description: InputField::with_value(&form.description),
            due: InputField::with_value(&due),
            due_initial: due,
            estimate: InputField::with_value(&form.estimated_time),
            assignee: InputField::with_value(&form.assignee),
            tag: InputField::new(),
            subtask: InputField::new(),
            form,
            mode,
            current: FormField::Title,
            error: None,
        };
        view.update_active_field();
        view
    }

    pub fn form(&self) -> &TaskForm {
        &self.form
    }

    pub fn is_edit(&self) -> bool {
        matches!(self.mode, FormMode::Edit(_))
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// Called once the board has answered a submission.
    pub fn finish_submit(&mut self) {
        self.form.finish_submit();
    }

    fn input_mut(&mut self, field: FormField) -> Option<&mut InputField> {
        match field {
            FormField::Title => Some(&mut self.title),
            FormField::Description => Some(&mut self.description),
            FormField::Due => Some(&mut self.due),
            FormField::Estimate => Some(&mut self.estimate),
            FormField::Assignee => Some(&mut self.assignee),
            FormField::Tags => Some(&mut self.tag),
            FormField::Subtasks => Some(&mut self.subtask),
            FormField::Priority | FormField::Status => None,
        }
    }

    fn update_active_field(&mut self) {
        for field in FormField::ORDER {
            let active = field == self.current;
            if let Some(input) = self.input_mut(field) {
                input.active = active;
            }
        }
    }

    fn step_field(&mut self, forward: bool) {
        let len = FormField::ORDER.len();
        let at = self.current.position();
        let next = if forward { (at + 1) % len } else { (at + len - 1) % len };
        self.current = FormField::ORDER[next];
        self.update_active_field();
    }

    fn cycle_selector(&mut self, forward: bool) {
        match self.current {
            FormField::Priority => {
                self.form.priority = step(&Priority::ALL, self.form.priority, forward);
            }
            FormField::Status => {
                self.form.status = step(&Status::ALL, self.form.status, forward);
            }
            _ => {}
        }
    }

    /// Enter on a list field adds the typed item.
    fn commit_list_item(&mut self) {
        match self.current {
            FormField::Tags => {
                let tag = self.tag.take();
                self.form.add_tag(&tag);
            }
            FormField::Subtasks => {
                let title = self.subtask.take();
                self.form.add_subtask(&title);
            }
            _ => self.step_field(true),
        }
    }

    fn remove_last_list_item(&mut self) {
        match self.current {
            FormField::Tags => {
                if let Some(last) = self.form.tags().last().cloned() {
                    self.form.remove_tag(&last);
                }
            }
            FormField::Subtasks => {
                let len = self.form.subtasks().len();
                if len > 0 {
                    self.form.remove_subtask(len - 1);
                }
            }
            _ => {}
        }
    }

    /// Accept the suggestion for the focused field, loading suggestions first if
    /// none have been requested yet.
    fn accept_suggestion(&mut self) {
        if self.form.suggestions().is_none() {
            self.form = self.form.clone().with_suggestions(Suggestions::placeholder());
        }
        match self.current {
            FormField::Description => {
                self.form.accept_description();
                self.description.set(&self.form.description);
            }
            FormField::Estimate => {
                self.form.accept_estimated_time();
                self.estimate.set(&self.form.estimated_time);
            }
            FormField::Assignee => {
                self.form.accept_assignee();
                self.assignee.set(&self.form.assignee);
            }
            FormField::Tags => self.form.accept_tags(),
            _ => {}
        }
    }

    /// Copy the text inputs into the model.
    fn sync(&mut self) -> Result<(), String> {
        self.form.title = self.title.value.clone();
        self.form.description = self.description.value.clone();
        self.form.estimated_time = self.estimate.value.clone();
        self.form.assignee = self.assignee.value.clone();

        let due = self.due.value.trim();
        if due != self.due_initial {
            let date = parse_due_input(due, Local::now().date_naive())
                .ok_or_else(|| format!("Unrecognised due date '{due}'"))?;
            self.form.set_due(local_start_of_day(date), None);
        }
        Ok(())
    }

    fn submit(&mut self) -> FormAction {
        if let Err(e) = self.sync() {
            self.error = Some(e);
            return FormAction::None;
        }
        let outcome = match &self.mode {
            FormMode::Create => self.form.begin_submit().map(FormOutcome::Create),
            FormMode::Edit(original) => {
                let id = original.id.clone();
                self.form.to_changes(original).map(|changes| FormOutcome::Edit(id, changes))
            }
        };
        match outcome {
            Ok(outcome) => {
                self.error = None;
                FormAction::Submit(outcome)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                FormAction::None
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> FormAction {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => return FormAction::Cancel,
            KeyCode::Char('s') if ctrl => return self.submit(),
            KeyCode::Char('a') if ctrl => self.accept_suggestion(),
            KeyCode::Tab | KeyCode::Down => self.step_field(true),
            KeyCode::BackTab | KeyCode::Up => self.step_field(false),
            KeyCode::Enter => self.commit_list_item(),
            KeyCode::Left | KeyCode::Right => {
                let right = key.code == KeyCode::Right;
                if matches!(self.current, FormField::Priority | FormField::Status) {
                    self.cycle_selector(right);
                } else if let Some(input) = self.input_mut(self.current) {
                    if right {
                        input.move_cursor_right();
                    } else {
                        input.move_cursor_left();
                    }
                }
            }
            KeyCode::Backspace => {
                let emptied = match self.input_mut(self.current) {
                    Some(input) if input.value.is_empty() => true,
                    Some(input) => {
                        input.handle_backspace();
                        false
                    }
                    None => false,
                };
                if emptied {
                    self.remove_last_list_item();
                }
            }
            KeyCode::Delete => {
                if let Some(input) = self.input_mut(self.current) {
                    input.handle_delete();
                }
            }
            KeyCode::Char(c) if !ctrl => {
                if let Some(input) = self.input_mut(self.current) {
                    input.handle_char(c);
                }
            }
            _ => {}
        }
        FormAction::None
    }

    fn row<'a>(&self, field: FormField, value: Vec<Span<'a>>) -> Line<'a> {
        let focused = field == self.current;
        let label_style = if focused {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let mut spans = vec![Span::styled(format!("{:<12}", field.label()), label_style)];
        spans.extend(value);
        Line::from(spans)
    }

    pub fn render(&self, f: &mut Frame, theme: Theme) {
        let area = centered(f.area(), 70, 80);
        f.render_widget(Clear, area);

        let heading = if self.is_edit() { "Edit Task" } else { "New Task" };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("{heading} (Ctrl+S save, Ctrl+A suggest, Esc cancel)"))
            .style(Style::default().bg(theme.popup));
        let inner = block.inner(area);
        f.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(3)])
            .split(inner);

        let text = |input: &InputField| vec![Span::raw(input.display())];
        let selector = |label: &'static str, color: Color| {
            vec![
                Span::raw("< "),
                Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
                Span::raw(" >"),
            ]
        };

        let mut lines = vec![
            self.row(FormField::Title, text(&self.title)),
            self.row(FormField::Description, text(&self.description)),
            self.row(
                FormField::Priority,
                selector(self.form.priority.as_str(), priority_color(self.form.priority)),
            ),
            self.row(
                FormField::Status,
                selector(self.form.status.label(), status_color(self.form.status)),
            ),
            self.row(FormField::Due, text(&self.due)),
            self.row(FormField::Estimate, text(&self.estimate)),
            self.row(FormField::Assignee, text(&self.assignee)),
            self.row(FormField::Tags, text(&self.tag)),
            Line::from(format!(
                "{:<12}{}",
                "",
                if self.form.tags().is_empty() { "-".to_string() } else { self.form.tags().join(", ") }
            )),
            self.row(FormField::Subtasks, text(&self.subtask)),
        ];
        for s in self.form.subtasks() {
            lines.push(Line::from(format!(
                "{:<12}[{}] {}",
                "",
                if s.completed { "x" } else { " " },
                s.title
            )));
        }
        if let Some(s) = self.form.suggestions() {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled("Suggestions", Style::default().add_modifier(Modifier::ITALIC))));
            lines.push(Line::from(format!("  description: {}", s.description)));
            lines.push(Line::from(format!("  estimate:    {}", s.estimated_time)));
            lines.push(Line::from(format!("  assignee:    {}", s.assignee)));
            lines.push(Line::from(format!("  tags:        {}", s.tags.join(", "))));
        }
        f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), chunks[0]);

        let footer = match (&self.error, self.form.is_submitting()) {
            (Some(e), _) => Paragraph::new(e.as_str()).style(Style::default().fg(theme.error)),
            (None, true) => Paragraph::new("Saving..."),
            (None, false) => Paragraph::new("Tab/Shift+Tab: move | Enter: add tag/subtask | Backspace on empty: remove last"),
        };
        f.render_widget(footer.block(Block::default().borders(Borders::TOP)).wrap(Wrap { trim: true }), chunks[1]);
    }
}

fn step<T: Copy + PartialEq>(all: &[T], current: T, forward: bool) -> T {
    let len = all.len();
    let at = all.iter().position(|v| *v == current).unwrap_or(0);
    let next = if forward { (at + 1) % len } else { (at + len - 1) % len };
    all[next]
}

/// A rectangle of `percent_x` by `percent_y` centred in `area`.
pub fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let width = area.width * percent_x / 100;
    let height = area.height * percent_y / 100;
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Assignee, Subtask};
    use chrono::TimeZone;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_text(view: &mut FormView, text: &str) {
        for c in text.chars() {
            view.handle_key(key(KeyCode::Char(c)));
        }
    }

    fn task() -> Task {
        let at = Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap();
        Task {
            id: TaskId::from("t1"),
            title: "Write spec".to_string(),
            description: "Draft the design doc".to_string(),
            priority: Priority::High,
            status: Status::InProgress,
            due_date: at,
            estimated_time: None,
            assignee: Assignee::new("Ada"),
            ai_insights: String::new(),
            tags: vec!["docs".to_string()],
            subtasks: vec![Subtask::new("outline")],
            created_at: Some(at),
            updated_at: Some(at),
        }
    }

    #[test]
    fn typed_form_submits_a_draft() {
        let mut view = FormView::create();
        type_text(&mut view, "Write spec");
        view.handle_key(key(KeyCode::Tab));
        type_text(&mut view, "Draft the design doc");
        view.handle_key(key(KeyCode::Tab));
        view.handle_key(key(KeyCode::Right));
        for _ in 0..5 {
            view.handle_key(key(KeyCode::Tab));
        }
        type_text(&mut view, "docs");
        view.handle_key(key(KeyCode::Enter));

        let FormAction::Submit(FormOutcome::Create(draft)) = view.handle_key(ctrl('s')) else {
            panic!("expected a create submission");
        };
        assert_eq!(draft.title, "Write spec");
        assert_eq!(draft.priority, "high");
        assert_eq!(draft.tags, ["docs"]);
        assert!(view.form().is_submitting());
    }

    #[test]
    fn invalid_input_keeps_the_popup_open() {
        let mut view = FormView::create();
        type_text(&mut view, "x");
        assert!(matches!(view.handle_key(ctrl('s')), FormAction::None));
        assert!(view.error.is_some());
        assert!(!view.form().is_submitting());
    }

    #[test]
    fn bad_due_date_is_reported() {
        let mut view = FormView::create();
        view.due.set("someday");
        type_text(&mut view, "Write spec");
        assert!(matches!(view.handle_key(ctrl('s')), FormAction::None));
        assert_eq!(view.error.as_deref(), Some("Unrecognised due date 'someday'"));
    }

    #[test]
    fn edit_submits_only_changes() {
        let original = task();
        let mut view = FormView::edit(&original);
        assert!(view.is_edit());
        // Status selector: in progress -> in review.
        for _ in 0..3 {
            view.handle_key(key(KeyCode::Tab));
        }
        view.handle_key(key(KeyCode::Right));

        let FormAction::Submit(FormOutcome::Edit(id, changes)) = view.handle_key(ctrl('s')) else {
            panic!("expected an edit submission");
        };
        assert_eq!(id, original.id);
        assert_eq!(changes.status, Some(Status::InReview));
        assert_eq!(changes.due, None);
        assert_eq!(changes.title, None);
    }

    #[test]
    fn backspace_on_empty_list_input_removes_last_item() {
        let mut view = FormView::edit(&task());
        view.handle_key(key(KeyCode::BackTab));
        assert_eq!(view.current, FormField::Subtasks);
        view.handle_key(key(KeyCode::Backspace));
        assert!(view.form().subtasks().is_empty());
        view.handle_key(key(KeyCode::Up));
        view.handle_key(key(KeyCode::Backspace));
        assert!(view.form().tags().is_empty());
    }

    #[test]
    fn suggestion_fills_the_focused_field() {
        let mut view = FormView::create();
        for _ in 0..5 {
            view.handle_key(key(KeyCode::Tab));
        }
        assert_eq!(view.current, FormField::Estimate);
        view.handle_key(ctrl('a'));
        assert_eq!(view.estimate.value, "4 hours");
        assert!(view.form().suggestions().is_some());
    }
}
