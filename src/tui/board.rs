//! Kanban board view.
//!
//! Four columns, one per status. The view keeps a snapshot of the board worker's
//! state and re-reads it after every command, so what is drawn is always what the
//! worker confirmed. Commands run on the tokio runtime and the view blocks on the
//! reply; the worker processes them one at a time.

use std::io;
use std::time::Duration;

use chrono::Local;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::runtime::Handle;

use crate::board::{Board, BoardError, BoardHandle};
use crate::display::{format_due_relative, format_progress, short_id, truncate};
use crate::fields::Status;
use crate::task::{Task, TaskId};
use crate::tui::{
    colors::{priority_color, status_color, text_on, Theme},
    task_form::{centered, FormAction, FormOutcome, FormView},
};

const HELP: &str =
    "←/→ column | ↑/↓ card | Enter: details | s: next status | a: add | e: edit | d: delete | r: reload | q: quit";

enum Mode {
    Board,
    Detail { subtask: usize },
    ConfirmDelete(TaskId),
    Form(Box<FormView>),
}

pub struct BoardApp {
    handle: BoardHandle,
    runtime: Handle,
    board: Board,
    theme: Theme,
    mode: Mode,
    selected_column: usize,
    selected_card: usize,
    column_scroll_offsets: [usize; 4],
    status_message: String,
    status_is_error: bool,
}

impl BoardApp {
    pub fn new(handle: BoardHandle, runtime: Handle, dark_mode: bool) -> Self {
        BoardApp {
            handle,
            runtime,
            board: Board::default(),
            theme: Theme::new(dark_mode),
            mode: Mode::Board,
            selected_column: 0,
            selected_card: 0,
            column_scroll_offsets: [0; 4],
            status_message: String::new(),
            status_is_error: false,
        }
    }

    fn set_status_message(&mut self, msg: impl Into<String>) {
        self.status_message = msg.into();
        self.status_is_error = false;
    }

    fn set_error(&mut self, error: &BoardError) {
        tracing::warn!(%error, "board command failed");
        self.status_message = format!("Error: {error}");
        self.status_is_error = true;
    }

    fn clear_status_message(&mut self) {
        self.status_message.clear();
        self.status_is_error = false;
    }

    /// Pull the worker's current state.
    fn refresh(&mut self) {
        match self.runtime.block_on(self.handle.snapshot()) {
            Ok(board) => {
                self.board = board;
                self.clamp_selection();
            }
            Err(e) => self.set_error(&e),
        }
    }

    /// Reload from the store, then refresh.
    pub fn reload(&mut self) {
        match self.runtime.block_on(self.handle.reload()) {
            Ok(count) => self.set_status_message(format!("Loaded {count} tasks")),
            Err(e) => self.set_error(&e),
        }
        self.refresh();
    }

    fn column_tasks(&self, column: usize) -> Vec<&Task> {
        self.board.column(Status::ALL[column])
    }

    fn selected_task(&self) -> Option<&Task> {
        self.column_tasks(self.selected_column)
            .get(self.selected_card)
            .copied()
    }

    fn selected_id(&self) -> Option<TaskId> {
        self.selected_task().map(|t| t.id.clone())
    }

    fn clamp_selection(&mut self) {
        let len = self.column_tasks(self.selected_column).len();
        if len == 0 {
            self.selected_card = 0;
            self.column_scroll_offsets[self.selected_column] = 0;
        } else if self.selected_card >= len {
            self.selected_card = len - 1;
        }
    }

    /// Move the selection onto a task wherever it now sits.
    fn follow(&mut self, id: &TaskId) {
        let Some(task) = self.board.get(id) else {
            self.clamp_selection();
            return;
        };
        let column = task.status.column_index();
        let position = self
            .column_tasks(column)
            .iter()
            .position(|t| &t.id == id)
            .unwrap_or(0);
        self.selected_column = column;
        self.selected_card = position;
    }

    fn cycle_selected(&mut self) {
        let Some(id) = self.selected_id() else {
            return;
        };
        match self.runtime.block_on(self.handle.cycle_status(id.clone())) {
            Ok(Some(status)) => self.set_status_message(format!("Moved to {}", status.label())),
            Ok(None) => self.set_status_message("Task is no longer on the board"),
            Err(e) => self.set_error(&e),
        }
        self.refresh();
        self.follow(&id);
    }

    fn toggle_subtask(&mut self, index: usize) {
        let Some(id) = self.selected_id() else {
            return;
        };
        match self.runtime.block_on(self.handle.toggle_subtask(id, index)) {
            Ok(Some(true)) => self.set_status_message("Subtask completed"),
            Ok(Some(false)) => self.set_status_message("Subtask reopened"),
            Ok(None) => {}
            Err(e) => self.set_error(&e),
        }
        self.refresh();
    }

    fn delete(&mut self, id: TaskId) {
        match self.runtime.block_on(self.handle.delete_task(id)) {
            Ok(true) => self.set_status_message("Task deleted"),
            Ok(false) => self.set_status_message("Nothing to delete"),
            Err(e) => self.set_error(&e),
        }
        self.refresh();
    }

    /// Send a form submission. The popup closes only on success.
    fn submit(&mut self, mut view: Box<FormView>, outcome: FormOutcome) {
        let result = match outcome {
            FormOutcome::Create(draft) => self
                .runtime
                .block_on(self.handle.create(draft))
                .map(|task| (task.id, "Task created")),
            FormOutcome::Edit(id, changes) => self
                .runtime
                .block_on(self.handle.edit_task(id.clone(), changes))
                .map(|changed| (id, if changed { "Task updated" } else { "No changes" })),
        };
        view.finish_submit();
        match result {
            Ok((id, msg)) => {
                self.set_status_message(msg);
                self.refresh();
                self.follow(&id);
            }
            Err(e) => {
                view.set_error(e.to_string());
                self.mode = Mode::Form(view);
            }
        }
    }

    /// Apply one key press. Returns `true` when the user asked to quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match std::mem::replace(&mut self.mode, Mode::Board) {
            Mode::Form(mut view) => match view.handle_key(key) {
                FormAction::None => self.mode = Mode::Form(view),
                FormAction::Cancel => self.clear_status_message(),
                FormAction::Submit(outcome) => self.submit(view, outcome),
            },
            Mode::ConfirmDelete(id) => {
                if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                    self.delete(id);
                } else {
                    self.set_status_message("Delete cancelled");
                }
            }
            Mode::Detail { subtask } => self.handle_detail_key(key, subtask),
            Mode::Board => return self.handle_board_key(key),
        }
        false
    }

    fn handle_detail_key(&mut self, key: KeyEvent, subtask: usize) {
        let count = self.selected_task().map_or(0, |t| t.subtasks.len());
        let subtask = match key.code {
            KeyCode::Esc | KeyCode::Enter => return,
            KeyCode::Up | KeyCode::Char('k') => subtask.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => (subtask + 1).min(count.saturating_sub(1)),
            KeyCode::Char(' ') | KeyCode::Char('x') => {
                self.toggle_subtask(subtask);
                subtask
            }
            KeyCode::Char('s') => {
                self.cycle_selected();
                subtask
            }
            KeyCode::Char('e') => {
                if let Some(task) = self.selected_task() {
                    self.mode = Mode::Form(Box::new(FormView::edit(task)));
                }
                return;
            }
            _ => subtask,
        };
        self.mode = Mode::Detail { subtask };
    }

    fn handle_board_key(&mut self, key: KeyEvent) -> bool {
        self.clear_status_message();
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Left | KeyCode::Char('h') => {
                if self.selected_column > 0 {
                    self.selected_column -= 1;
                    self.clamp_selection();
                }
            }
            KeyCode::Right | KeyCode::Char('l') => {
                if self.selected_column < Status::ALL.len() - 1 {
                    self.selected_column += 1;
                    self.clamp_selection();
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_card = self.selected_card.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let len = self.column_tasks(self.selected_column).len();
                if self.selected_card + 1 < len {
                    self.selected_card += 1;
                }
            }
            KeyCode::Enter => {
                if self.selected_task().is_some() {
                    self.mode = Mode::Detail { subtask: 0 };
                }
            }
            KeyCode::Char('s') => self.cycle_selected(),
            KeyCode::Char('a') => self.mode = Mode::Form(Box::new(FormView::create())),
            KeyCode::Char('e') => {
                if let Some(task) = self.selected_task() {
                    self.mode = Mode::Form(Box::new(FormView::edit(task)));
                }
            }
            KeyCode::Char('d') => {
                if let Some(task) = self.selected_task() {
                    let (id, title) = (task.id.clone(), task.title.clone());
                    self.set_status_message(format!("Delete '{title}'? y to confirm"));
                    self.mode = Mode::ConfirmDelete(id);
                }
            }
            KeyCode::Char('r') => self.reload(),
            KeyCode::Char('?') => self.set_status_message(HELP),
            _ => {}
        }
        false
    }

    fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(1)])
            .split(f.area());

        self.render_header(f, chunks[0]);
        self.render_board(f, chunks[1]);
        self.render_status_bar(f, chunks[2]);

        match &self.mode {
            Mode::Detail { subtask } => self.render_task_detail_popup(f, *subtask),
            Mode::Form(view) => view.render(f, self.theme),
            Mode::Board | Mode::ConfirmDelete(_) => {}
        }
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let done = self.board.column(Status::Done).len();
        let header = Paragraph::new(Line::from(vec![
            Span::styled("TASK BOARD", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::styled(
                format!("{} tasks, {} done", self.board.len(), done),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
            ),
        ]))
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
        f.render_widget(header, area);
    }

    fn render_board(&mut self, f: &mut Frame, area: Rect) {
        let columns_layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(25); 4])
            .split(area);

        for (i, &column_area) in columns_layout.iter().enumerate() {
            self.render_column(f, column_area, i);
        }
    }

    fn render_column(&mut self, f: &mut Frame, area: Rect, column_index: usize) {
        let status = Status::ALL[column_index];
        let accent = status_color(status);
        let is_selected = column_index == self.selected_column;
        let count = self.column_tasks(column_index).len();

        let border_style = if is_selected {
            Style::default().fg(accent).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("{} ({count})", status.label()))
            .border_style(border_style);
        let inner = block.inner(area);
        f.render_widget(block, area);

        if count == 0 {
            return;
        }

        let card_height = 5;
        let available_height = inner.height as usize;
        let visible_cards = (available_height / card_height).max(1);

        let mut offset = self.column_scroll_offsets[column_index];
        if is_selected {
            if self.selected_card < offset {
                offset = self.selected_card;
            } else if self.selected_card >= offset + visible_cards {
                offset = self.selected_card + 1 - visible_cards;
            }
            self.column_scroll_offsets[column_index] = offset;
        }

        let tasks = self.column_tasks(column_index);
        let mut y = 0;
        let mut rendered = 0;
        for (card_index, task) in tasks.iter().enumerate().skip(offset) {
            if y + card_height > available_height {
                break;
            }
            let card_area = Rect {
                x: inner.x,
                y: inner.y + y as u16,
                width: inner.width,
                height: card_height as u16,
            };
            let selected = is_selected && card_index == self.selected_card;
            self.render_card(f, card_area, task, accent, selected);
            y += card_height;
            rendered += 1;
        }

        if offset > 0 {
            let indicator = Paragraph::new(format!("▲ +{offset} above")).style(Style::default().fg(Color::Cyan));
            f.render_widget(indicator, Rect { height: 1, ..inner });
        }
        let remaining = count - offset - rendered;
        if remaining > 0 {
            let indicator = Paragraph::new(format!("▼ +{remaining} below")).style(Style::default().fg(Color::Cyan));
            f.render_widget(
                indicator,
                Rect {
                    y: inner.y + inner.height - 1,
                    height: 1,
                    ..inner
                },
            );
        }
    }

    fn render_card(&self, f: &mut Frame, area: Rect, task: &Task, accent: Color, selected: bool) {
        let style = if selected {
            Style::default().bg(accent).fg(text_on(accent)).add_modifier(Modifier::BOLD)
        } else {
            Style::default().bg(self.theme.card)
        };
        let width = area.width.saturating_sub(2) as usize;
        let today = Local::now().date_naive();
        let due = format_due_relative(task.due_date.with_timezone(&Local).date_naive(), today);

        let lines = vec![
            Line::from(truncate(&task.title, width)),
            Line::from(vec![
                Span::styled(
                    task.priority.as_str(),
                    if selected { Style::default() } else { Style::default().fg(priority_color(task.priority)) },
                ),
                Span::raw(format!(" | {due} | {}", format_progress(task))),
            ]),
            Line::from(truncate(task.assignee.name(), width)),
        ];
        let card = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL))
            .style(style);
        f.render_widget(card, area);
    }

    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let accent = status_color(Status::ALL[self.selected_column]);
        let (text, style) = if self.status_is_error {
            (self.status_message.clone(), Style::default().bg(self.theme.error).fg(Color::White))
        } else if !self.status_message.is_empty() {
            (self.status_message.clone(), Style::default().bg(accent).fg(text_on(accent)))
        } else {
            (
                format!("Tasks: {} | ?: help", self.board.len()),
                Style::default().bg(accent).fg(text_on(accent)),
            )
        };
        f.render_widget(Paragraph::new(text).style(style), area);
    }

    fn render_task_detail_popup(&self, f: &mut Frame, subtask_cursor: usize) {
        let Some(task) = self.selected_task() else {
            return;
        };
        let area = centered(f.area(), 80, 80);
        f.render_widget(Clear, area);

        let today = Local::now().date_naive();
        let due_local = task.due_date.with_timezone(&Local);
        let mut lines = vec![
            Line::from(Span::styled(
                format!("{} ({})", task.title, short_id(task.id.as_str())),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(format!("Status:    {}", task.status.label())),
            Line::from(format!("Priority:  {}", task.priority)),
            Line::from(format!(
                "Due:       {} ({})",
                due_local.format("%Y-%m-%d"),
                format_due_relative(due_local.date_naive(), today)
            )),
            Line::from(format!("Estimate:  {}", task.estimated_time.as_deref().unwrap_or("-"))),
            Line::from(format!("Assignee:  {}", task.assignee.name())),
            Line::from(format!(
                "Tags:      {}",
                if task.tags.is_empty() { "-".to_string() } else { task.tags.join(", ") }
            )),
            Line::from(""),
            Line::from(if task.description.is_empty() { "-".to_string() } else { task.description.clone() }),
        ];
        if !task.ai_insights.is_empty() {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                task.ai_insights.clone(),
                Style::default().add_modifier(Modifier::ITALIC),
            )));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(format!("Subtasks ({})", format_progress(task))));
        for (i, s) in task.subtasks.iter().enumerate() {
            let marker = if i == subtask_cursor { ">" } else { " " };
            let style = if i == subtask_cursor {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            lines.push(Line::from(Span::styled(
                format!("{marker} [{}] {}", if s.completed { "x" } else { " " }, s.title),
                style,
            )));
        }

        let accent = status_color(task.status);
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Task (Space: toggle subtask, s: next status, e: edit, Esc: close)")
            .title_alignment(Alignment::Center)
            .border_style(Style::default().fg(accent).add_modifier(Modifier::BOLD));
        let popup = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false })
            .style(Style::default().bg(self.theme.popup));
        f.render_widget(popup, area);
    }

    /// Main event loop.
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        self.refresh();
        loop {
            terminal.draw(|f| self.render(f))?;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press && self.handle_key(key) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}
