//! Command implementations for the CLI interface.
//!
//! Task commands talk to the board worker, the same one the TUI uses, so a CLI
//! edit goes through the form checks and the gateway exactly as an edit on the
//! board does. Failures are printed and the process exits with status 1.

use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate, Utc};
use clap::Subcommand;
use clap_complete::{generate, Shell};
use tokio::runtime::Handle;

use crate::auth::{check_sign_up, AuthClient, Session};
use crate::board::{Board, BoardHandle};
use crate::calendar::{local_start_of_day, month_agenda, parse_due_input, tasks_on};
use crate::config::{Backend, Config};
use crate::display::{print_table, print_task, short_id};
use crate::fields::{Priority, Status};
use crate::form::{Suggestions, TaskForm};
use crate::gateway::TaskGateway;
use crate::rest::RestStore;
use crate::settings::{Settings, TextSetting, Toggle};
use crate::store::LocalStore;
use crate::task::Task;
use crate::team::Roster;
use crate::tui::run::run_board_tui;

#[derive(Subcommand)]
pub enum Commands {
    /// Open the interactive board.
    Ui,

    /// List tasks with optional filters.
    List {
        /// Only tasks in this column.
        #[arg(long, value_enum)]
        status: Option<Status>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// Only tasks carrying this tag.
        #[arg(long)]
        tag: Option<String>,
        /// Assignee name, case-insensitive.
        #[arg(long)]
        assignee: Option<String>,
        /// Limit number of rows printed.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show one task by id, id prefix or title.
    View { id: String },

    /// Add a new task.
    Add {
        title: String,
        /// Description (2 to 500 characters).
        #[arg(long)]
        desc: Option<String>,
        #[arg(long, value_enum, default_value_t = Priority::default())]
        priority: Priority,
        #[arg(long, value_enum, default_value_t = Status::default())]
        status: Status,
        /// Due date: YYYY-MM-DD, "today", "tomorrow", "fri", "in 3d". Defaults to today.
        #[arg(long)]
        due: Option<String>,
        /// Free-text estimate, e.g. "4 hours".
        #[arg(long)]
        estimate: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
        /// Comma-separated tags. May be repeated.
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Subtask title. May be repeated.
        #[arg(long = "subtask")]
        subtasks: Vec<String>,
        /// Fill empty description, estimate, assignee and tags from suggestions.
        #[arg(long)]
        suggest: bool,
    },

    /// Change fields on a task.
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        #[arg(long, value_enum)]
        status: Option<Status>,
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        estimate: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long = "add-tag")]
        add_tags: Vec<String>,
        #[arg(long = "rm-tag")]
        rm_tags: Vec<String>,
        #[arg(long = "add-subtask")]
        add_subtasks: Vec<String>,
    },

    /// Move a task to the next status column.
    Cycle { id: String },

    /// Flip a subtask between done and open.
    Toggle {
        id: String,
        /// Subtask number as shown by `view`, starting at 1.
        number: usize,
    },

    /// Delete a task.
    Delete { id: String },

    /// Tasks due on a day, or the agenda for its month.
    Calendar {
        /// Day to show; defaults to today.
        #[arg(long)]
        date: Option<String>,
        /// Show the whole month grouped by day.
        #[arg(long)]
        month: bool,
    },

    /// Team roster.
    Team {
        #[command(subcommand)]
        action: TeamAction,
    },

    /// Show or change settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Sign in to the hosted backend.
    Login {
        email: String,
        /// Read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,
    },

    /// Create an account on the hosted backend.
    Signup {
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm: String,
    },

    /// Sign out and forget the saved session.
    Logout,

    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum TeamAction {
    /// List members with their assigned task counts.
    List {
        /// Filter by name or role.
        #[arg(long)]
        search: Option<String>,
    },
    /// Add a member.
    Add {
        name: String,
        #[arg(long)]
        role: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        phone: String,
    },
}

#[derive(Subcommand)]
pub enum SettingsAction {
    Show,
    /// Flip an on/off setting.
    Toggle {
        #[arg(value_enum)]
        key: Toggle,
    },
    /// Set a text setting.
    Set {
        #[arg(value_enum)]
        key: TextSetting,
        value: String,
    },
}

/// Print `context: err` and exit with status 1.
fn fail(context: &str, err: impl Display) -> ! {
    eprintln!("{context}: {err}");
    std::process::exit(1);
}

/// Start the board worker over the configured store and load it.
pub async fn open_board(config: &Config) -> BoardHandle {
    let handle = match &config.backend {
        Backend::Remote { url, anon_key } => {
            let Some(session) = Session::load(&config.session_path()) else {
                eprintln!("Not signed in. Run `tb login <email>` first.");
                std::process::exit(1);
            };
            let store = RestStore::new(url, anon_key, Some(&session.access_token))
                .unwrap_or_else(|e| fail("Failed to set up the task store", e));
            BoardHandle::spawn(TaskGateway::new(store).with_user(session.user_id))
        }
        Backend::Local { path } => {
            tracing::debug!(path = %path.display(), "using local task file");
            BoardHandle::spawn(TaskGateway::new(Arc::new(LocalStore::open(path))))
        }
    };
    if let Err(e) = handle.reload().await {
        fail("Failed to load tasks", e);
    }
    handle
}

async fn snapshot(board: &BoardHandle) -> Board {
    board
        .snapshot()
        .await
        .unwrap_or_else(|e| fail("Failed to read the board", e))
}

/// Find a task on the board or exit.
async fn resolve(board: &BoardHandle, ident: &str) -> Task {
    let snapshot = snapshot(board).await;
    match snapshot.resolve(ident) {
        Ok(task) => task.clone(),
        Err(e) => fail("Error resolving task", e),
    }
}

/// Split comma-separated tag arguments, dropping blanks.
pub fn split_tags(inputs: &[String]) -> Vec<String> {
    inputs
        .iter()
        .flat_map(|raw| raw.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_due(input: &str) -> NaiveDate {
    parse_due_input(input, Local::now().date_naive())
        .unwrap_or_else(|| fail("Invalid due date", format!("'{input}'")))
}

/// Filters for `list`.
#[derive(Debug, Default)]
pub struct ListFilter {
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub tag: Option<String>,
    pub assignee: Option<String>,
    pub limit: Option<usize>,
}

impl ListFilter {
    pub fn apply<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        let assignee = self.assignee.as_deref().map(str::to_lowercase);
        let mut matched: Vec<&Task> = tasks
            .iter()
            .filter(|t| self.status.map_or(true, |s| t.status == s))
            .filter(|t| self.priority.map_or(true, |p| t.priority == p))
            .filter(|t| self.tag.as_ref().map_or(true, |tag| t.tags.contains(tag)))
            .filter(|t| {
                assignee
                    .as_ref()
                    .map_or(true, |name| t.assignee.name().to_lowercase() == *name)
            })
            .collect();
        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}

/// Launch the terminal user interface.
pub fn cmd_ui(board: BoardHandle, runtime: Handle, config: &Config) {
    let settings = Settings::load(&config.settings_path());
    if let Err(e) = run_board_tui(board, runtime, settings.dark_mode) {
        fail("UI error", e);
    }
}

pub async fn cmd_list(board: &BoardHandle, filter: ListFilter) {
    let snapshot = snapshot(board).await;
    let tasks = filter.apply(snapshot.tasks());
    if tasks.is_empty() {
        println!("No tasks.");
        return;
    }
    print_table(&tasks);
}

pub async fn cmd_view(board: &BoardHandle, id: String) {
    print_task(&resolve(board, &id).await);
}

#[allow(clippy::too_many_arguments)]
pub async fn cmd_add(
    board: &BoardHandle,
    title: String,
    desc: Option<String>,
    priority: Priority,
    status: Status,
    due: Option<String>,
    estimate: Option<String>,
    assignee: Option<String>,
    tags: Vec<String>,
    subtasks: Vec<String>,
    suggest: bool,
) {
    let mut form = TaskForm::new(Utc::now());
    form.title = title;
    form.description = desc.unwrap_or_default();
    form.priority = priority;
    form.status = status;
    form.estimated_time = estimate.unwrap_or_default();
    form.assignee = assignee.unwrap_or_default();
    if let Some(due) = due {
        form.set_due(local_start_of_day(parse_due(&due)), None);
    }
    for tag in split_tags(&tags) {
        form.add_tag(&tag);
    }
    for subtask in &subtasks {
        form.add_subtask(subtask);
    }
    if suggest {
        form = form.with_suggestions(Suggestions::placeholder());
        if form.description.trim().is_empty() {
            form.accept_description();
        }
        if form.estimated_time.trim().is_empty() {
            form.accept_estimated_time();
        }
        if form.assignee.trim().is_empty() {
            form.accept_assignee();
        }
        form.accept_tags();
    }

    let draft = form.begin_submit().unwrap_or_else(|e| fail("Invalid task", e));
    match board.create(draft).await {
        Ok(task) => println!("Added task {} ({})", short_id(task.id.as_str()), task.title),
        Err(e) => fail("Failed to add task", e),
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn cmd_edit(
    board: &BoardHandle,
    id: String,
    title: Option<String>,
    desc: Option<String>,
    priority: Option<Priority>,
    status: Option<Status>,
    due: Option<String>,
    estimate: Option<String>,
    assignee: Option<String>,
    add_tags: Vec<String>,
    rm_tags: Vec<String>,
    add_subtasks: Vec<String>,
) {
    let task = resolve(board, &id).await;
    let mut form = TaskForm::from_task(&task);
    if let Some(v) = title {
        form.title = v;
    }
    if let Some(v) = desc {
        form.description = v;
    }
    if let Some(v) = priority {
        form.priority = v;
    }
    if let Some(v) = status {
        form.status = v;
    }
    if let Some(v) = due {
        form.set_due(local_start_of_day(parse_due(&v)), None);
    }
    if let Some(v) = estimate {
        form.estimated_time = v;
    }
    if let Some(v) = assignee {
        form.assignee = v;
    }
    for tag in split_tags(&add_tags) {
        form.add_tag(&tag);
    }
    for tag in split_tags(&rm_tags) {
        form.remove_tag(&tag);
    }
    for subtask in &add_subtasks {
        form.add_subtask(subtask);
    }

    let changes = form.to_changes(&task).unwrap_or_else(|e| fail("Invalid task", e));
    if changes.is_empty() {
        println!("Nothing to change.");
        return;
    }
    match board.edit_task(task.id.clone(), changes).await {
        Ok(_) => println!("Updated task {}", short_id(task.id.as_str())),
        Err(e) => fail("Failed to update task", e),
    }
}

pub async fn cmd_cycle(board: &BoardHandle, id: String) {
    let task = resolve(board, &id).await;
    match board.cycle_status(task.id.clone()).await {
        Ok(Some(status)) => println!("{} -> {}", task.title, status.label()),
        Ok(None) => println!("Task {} is no longer on the board.", short_id(task.id.as_str())),
        Err(e) => fail("Failed to update status", e),
    }
}

pub async fn cmd_toggle(board: &BoardHandle, id: String, number: usize) {
    let task = resolve(board, &id).await;
    let Some(index) = number.checked_sub(1).filter(|i| *i < task.subtasks.len()) else {
        fail(
            "Invalid subtask",
            format!("'{}' has {} subtask(s), numbered from 1", task.title, task.subtasks.len()),
        );
    };
    match board.toggle_subtask(task.id.clone(), index).await {
        Ok(Some(done)) => println!(
            "[{}] {}",
            if done { "x" } else { " " },
            task.subtasks[index].title
        ),
        Ok(None) => println!("Nothing toggled."),
        Err(e) => fail("Failed to update subtasks", e),
    }
}

pub async fn cmd_delete(board: &BoardHandle, id: String) {
    let task = resolve(board, &id).await;
    match board.delete_task(task.id.clone()).await {
        Ok(_) => println!("Deleted {} ({})", short_id(task.id.as_str()), task.title),
        Err(e) => fail("Failed to delete task", e),
    }
}

pub async fn cmd_calendar(board: &BoardHandle, date: Option<String>, month: bool) {
    let day = date.as_deref().map_or_else(|| Local::now().date_naive(), parse_due);
    let snapshot = snapshot(board).await;

    if month {
        let agenda = month_agenda(snapshot.tasks(), day);
        println!("{}", day.format("%B %Y"));
        if agenda.is_empty() {
            println!("  Nothing due.");
        }
        for (date, tasks) in agenda {
            println!("{} {:>2}", date.weekday(), date.day());
            for t in tasks {
                println!("    {:<9} {:<12} {}", short_id(t.id.as_str()), t.status.label(), t.title);
            }
        }
        return;
    }

    let tasks = tasks_on(snapshot.tasks(), day);
    println!("Due {}:", day.format("%a %Y-%m-%d"));
    if tasks.is_empty() {
        println!("  Nothing due.");
    } else {
        print_table(&tasks);
    }
}

pub async fn cmd_team(config: &Config, action: TeamAction) {
    let path = config.team_path();
    let mut roster = Roster::load(&path);
    match action {
        TeamAction::List { search } => {
            let board = open_board(config).await;
            roster.count_assignments(snapshot(&board).await.tasks());
            let members = roster.search(search.as_deref().unwrap_or(""));
            println!("{:<4} {:<20} {:<18} {:<24} {:<16} {}", "ID", "Name", "Role", "Email", "Phone", "Tasks");
            for m in members {
                println!(
                    "{:<4} {:<20} {:<18} {:<24} {:<16} {}",
                    m.id, m.name, m.role, m.email, m.phone, m.tasks_assigned
                );
            }
        }
        TeamAction::Add { name, role, email, phone } => {
            if name.trim().is_empty() || role.trim().is_empty() {
                fail("Invalid member", "name and role are required");
            }
            let id = roster.add(&name, &role, &email, &phone).id.clone();
            if let Err(e) = roster.save(&path) {
                fail("Failed to save team", e);
            }
            println!("Added member {id} ({})", name.trim());
        }
    }
}

fn print_settings(s: &Settings) {
    let on = |b: bool| if b { "on" } else { "off" };
    println!("dark-mode:    {}", on(s.dark_mode));
    println!("email:        {}", on(s.notifications.email));
    println!("push:         {}", on(s.notifications.push));
    println!("desktop:      {}", on(s.notifications.desktop));
    println!("language:     {}", s.language);
    println!("timezone:     {}", s.timezone);
    println!("show-online:  {}", on(s.privacy.show_online));
    println!("show-tasks:   {}", on(s.privacy.show_tasks));
}

pub fn cmd_settings(config: &Config, action: SettingsAction) {
    let path = config.settings_path();
    let mut settings = Settings::load(&path);
    match action {
        SettingsAction::Show => {
            print_settings(&settings);
            return;
        }
        SettingsAction::Toggle { key } => {
            let value = settings.toggle(key);
            println!("{key:?} is now {}", if value { "on" } else { "off" });
        }
        SettingsAction::Set { key, value } => {
            if let Err(e) = settings.set(key, &value) {
                fail("Invalid setting", e);
            }
            println!("{key:?} set to {}", value.trim());
        }
    }
    if let Err(e) = settings.save(&path) {
        fail("Failed to save settings", e);
    }
}

fn auth_client(config: &Config) -> AuthClient {
    let Backend::Remote { url, anon_key } = &config.backend else {
        fail(
            "Sign-in unavailable",
            "set TASKBOARD_URL and TASKBOARD_ANON_KEY to use a hosted backend",
        );
    };
    AuthClient::new(url, anon_key).unwrap_or_else(|e| fail("Failed to set up sign-in", e))
}

fn save_session(session: &Session, path: &Path) {
    if let Err(e) = session.save(path) {
        fail("Failed to save session", e);
    }
}

fn read_password() -> String {
    print!("Password: ");
    let _ = io::stdout().flush();
    let mut line = String::new();
    if let Err(e) = io::stdin().lock().read_line(&mut line) {
        fail("Failed to read password", e);
    }
    line.trim_end_matches(&['\r', '\n'][..]).to_string()
}

pub async fn cmd_login(config: &Config, email: String, password: Option<String>) {
    let client = auth_client(config);
    let password = password.unwrap_or_else(read_password);
    match client.sign_in(&email, &password).await {
        Ok(session) => {
            save_session(&session, &config.session_path());
            println!("Signed in as {}", session.email);
        }
        Err(e) => fail("Sign-in failed", e),
    }
}

pub async fn cmd_signup(config: &Config, email: String, password: String, confirm: String) {
    if let Err(e) = check_sign_up(&email, &password, &confirm) {
        fail("Sign-up failed", e);
    }
    let client = auth_client(config);
    match client.sign_up(&email, &password).await {
        Ok(Some(session)) => {
            save_session(&session, &config.session_path());
            println!("Account created. Signed in as {}", session.email);
        }
        Ok(None) => println!("Account created. Check {} to confirm it, then run `tb login`.", email.trim()),
        Err(e) => fail("Sign-up failed", e),
    }
}

pub async fn cmd_logout(config: &Config) {
    let path = config.session_path();
    let Some(session) = Session::load(&path) else {
        println!("Not signed in.");
        return;
    };
    if config.is_remote() {
        // The local session is dropped even if the server call fails.
        if let Err(e) = auth_client(config).sign_out(&session).await {
            tracing::warn!(error = %e, "server sign-out failed");
        }
    }
    if let Err(e) = Session::clear(&path) {
        fail("Failed to remove session", e);
    }
    println!("Signed out.");
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    use crate::cli::Cli;
    use clap::CommandFactory;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Assignee, TaskId};
    use chrono::TimeZone;
    use rstest::rstest;

    fn task(id: &str, status: Status, priority: Priority, assignee: &str, tags: &[&str]) -> Task {
        Task {
            id: TaskId::from(id),
            title: id.to_string(),
            description: String::new(),
            priority,
            status,
            due_date: Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
            estimated_time: None,
            assignee: Assignee::new(assignee),
            ai_insights: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            subtasks: vec![],
            created_at: None,
            updated_at: None,
        }
    }

    fn tasks() -> Vec<Task> {
        vec![
            task("a", Status::Todo, Priority::High, "Ada", &["docs"]),
            task("b", Status::Done, Priority::Low, "Grace", &["backend", "docs"]),
            task("c", Status::Todo, Priority::Medium, "ada", &[]),
        ]
    }

    #[rstest]
    #[case(ListFilter::default(), &["a", "b", "c"])]
    #[case(ListFilter { status: Some(Status::Todo), ..ListFilter::default() }, &["a", "c"])]
    #[case(ListFilter { priority: Some(Priority::Low), ..ListFilter::default() }, &["b"])]
    #[case(ListFilter { tag: Some("docs".into()), ..ListFilter::default() }, &["a", "b"])]
    #[case(ListFilter { assignee: Some("ADA".into()), ..ListFilter::default() }, &["a", "c"])]
    #[case(ListFilter { limit: Some(1), ..ListFilter::default() }, &["a"])]
    fn list_filters_combine(#[case] filter: ListFilter, #[case] expected: &[&str]) {
        let tasks = tasks();
        let ids: Vec<&str> = filter.apply(&tasks).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn tags_are_split_on_commas() {
        let inputs = vec!["docs, backend".to_string(), " ,ui".to_string()];
        assert_eq!(split_tags(&inputs), ["docs", "backend", "ui"]);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        crate::cli::Cli::command().debug_assert();
    }
}
