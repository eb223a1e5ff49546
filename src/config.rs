//! Runtime configuration.
//!
//! Resolved once at startup, in order: command-line flag, environment (a `.env`
//! file in the working directory is loaded first), built-in default.
//!
//! # Environment Variables
//!
//! - `TASKBOARD_URL`: base URL of the hosted backend
//! - `TASKBOARD_ANON_KEY`: public API key for that backend (required with the URL)
//! - `TASKBOARD_DATA_DIR`: where local files live (default `$HOME/.taskboard`)
//! - `RUST_LOG`: log filter (default `tb=warn`)

use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const URL_VAR: &str = "TASKBOARD_URL";
pub const ANON_KEY_VAR: &str = "TASKBOARD_ANON_KEY";
pub const DATA_DIR_VAR: &str = "TASKBOARD_DATA_DIR";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("TASKBOARD_URL is set but TASKBOARD_ANON_KEY is missing")]
    MissingAnonKey,
    #[error("TASKBOARD_ANON_KEY is set but TASKBOARD_URL is missing")]
    MissingUrl,
    #[error("TASKBOARD_URL must start with http:// or https://, got '{0}'")]
    InvalidUrl(String),
}

/// Where task rows are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Remote { url: String, anon_key: String },
    Local { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub backend: Backend,
}

impl Config {
    /// Resolve from the process environment.
    pub fn from_env(data_dir: Option<PathBuf>) -> Result<Self, ConfigError> {
        Config::resolve_with(|key| env::var(key).ok(), data_dir)
    }

    /// Resolve using `lookup` for environment values.
    pub fn resolve_with(
        lookup: impl Fn(&str) -> Option<String>,
        data_dir: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        // Empty or whitespace-only values count as unset.
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let data_dir = data_dir
            .or_else(|| var(DATA_DIR_VAR).map(PathBuf::from))
            .unwrap_or_else(|| {
                let home = var("HOME").unwrap_or_else(|| ".".to_string());
                PathBuf::from(home).join(".taskboard")
            });

        let backend = match (var(URL_VAR), var(ANON_KEY_VAR)) {
            (Some(url), Some(anon_key)) => {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::InvalidUrl(url));
                }
                Backend::Remote { url, anon_key }
            }
            (Some(_), None) => return Err(ConfigError::MissingAnonKey),
            (None, Some(_)) => return Err(ConfigError::MissingUrl),
            (None, None) => Backend::Local {
                path: data_dir.join("tasks.json"),
            },
        };

        Ok(Config { data_dir, backend })
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.backend, Backend::Remote { .. })
    }

    fn file(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    pub fn team_path(&self) -> PathBuf {
        self.file("team.json")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.file("settings.json")
    }

    pub fn session_path(&self) -> PathBuf {
        self.file("session.json")
    }

    pub fn log_path(&self) -> PathBuf {
        self.file("taskboard.log")
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
