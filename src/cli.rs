use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Task board client.
/// Tasks live in a hosted table when TASKBOARD_URL and TASKBOARD_ANON_KEY are set,
/// otherwise in a JSON file in the data directory.
#[derive(Parser)]
#[command(name = "tb", version, about = "Task board for the terminal")]
pub struct Cli {
    /// Directory for local tasks, settings, team and session files.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}
