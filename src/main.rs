//! # tb - Task Board
//!
//! A terminal task board: tasks move through four status columns (To Do, In
//! Progress, In Review, Done), carry subtasks, tags, an assignee and a due date,
//! and are stored either in a hosted table or in a local JSON file.
//!
//! ## Quick Start
//!
//! ```bash
//! # Open the board
//! tb ui
//!
//! # Add a task from the shell
//! tb add "Write spec" --desc "Draft the design doc" --assignee Ada --due fri
//!
//! # Move it along
//! tb cycle "Write spec"
//! ```
//!
//! ## Storage
//!
//! With `TASKBOARD_URL` and `TASKBOARD_ANON_KEY` set (a `.env` file works too),
//! tasks live in the hosted `tasks` table and `tb login` is needed first.
//! Otherwise they live in `~/.taskboard/tasks.json`. Settings, the team roster
//! and the session sit in the same directory.
//!
//! ## Key Commands
//!
//! - `tb ui` - Interactive kanban board
//! - `tb add <title>` - Create a task
//! - `tb list` - Table of tasks with filters
//! - `tb edit <id>` / `tb cycle <id>` / `tb toggle <id> <n>` / `tb delete <id>`
//! - `tb calendar [--month]` - What is due
//! - `tb team list` / `tb settings show`

use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod auth;
pub mod board;
pub mod calendar;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod display;
pub mod fields;
pub mod form;
pub mod gateway;
pub mod local;
pub mod rest;
pub mod settings;
pub mod store;
pub mod task;
pub mod team;
pub mod tui {
    pub mod board;
    pub mod colors;
    pub mod input;
    pub mod run;
    pub mod task_form;
}

use cli::Cli;
use cmd::*;
use config::Config;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| "tb=warn".into())
}

/// Log to stderr, or to the log file while the board owns the terminal.
fn init_logging(config: &Config, to_file: bool) {
    if to_file {
        let path = config.log_path();
        let file = fs::create_dir_all(config.data_dir())
            .and_then(|_| OpenOptions::new().create(true).append(true).open(&path));
        match file {
            Ok(file) => {
                tracing_subscriber::registry()
                    .with(env_filter())
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_ansi(false)
                            .with_writer(Mutex::new(file)),
                    )
                    .init();
                return;
            }
            Err(e) => eprintln!("Cannot open log file {}: {e}", path.display()),
        }
    }
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Commands that need neither configuration nor a runtime.
    if let Commands::Completions { shell } = cli.command {
        cmd_completions(shell);
        return;
    }

    let config = Config::from_env(cli.data_dir.clone()).unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        std::process::exit(1);
    });
    init_logging(&config, matches!(cli.command, Commands::Ui));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Failed to start runtime: {e}");
            std::process::exit(1);
        });

    match cli.command {
        Commands::Completions { .. } => unreachable!("completions handled above"),

        Commands::Ui => {
            let board = runtime.block_on(open_board(&config));
            cmd_ui(board, runtime.handle().clone(), &config);
        }

        Commands::Settings { action } => cmd_settings(&config, action),

        Commands::Team { action } => runtime.block_on(cmd_team(&config, action)),

        Commands::Login { email, password } => runtime.block_on(cmd_login(&config, email, password)),

        Commands::Signup { email, password, confirm } => {
            runtime.block_on(cmd_signup(&config, email, password, confirm))
        }

        Commands::Logout => runtime.block_on(cmd_logout(&config)),

        command => runtime.block_on(async {
            let board = open_board(&config).await;
            match command {
                Commands::List { status, priority, tag, assignee, limit } => {
                    cmd_list(&board, ListFilter { status, priority, tag, assignee, limit }).await
                }

                Commands::View { id } => cmd_view(&board, id).await,

                Commands::Add {
                    title, desc, priority, status, due, estimate, assignee, tags, subtasks, suggest,
                } => {
                    cmd_add(&board, title, desc, priority, status, due, estimate, assignee, tags, subtasks, suggest)
                        .await
                }

                Commands::Edit {
                    id, title, desc, priority, status, due, estimate, assignee, add_tags, rm_tags, add_subtasks,
                } => {
                    cmd_edit(
                        &board, id, title, desc, priority, status, due, estimate, assignee, add_tags, rm_tags,
                        add_subtasks,
                    )
                    .await
                }

                Commands::Cycle { id } => cmd_cycle(&board, id).await,

                Commands::Toggle { id, number } => cmd_toggle(&board, id, number).await,

                Commands::Delete { id } => cmd_delete(&board, id).await,

                Commands::Calendar { date, month } => cmd_calendar(&board, date, month).await,

                _ => unreachable!("handled above"),
            }
        }),
    }
}
