//! Enumerations and field types for tasks.
//!
//! This module defines the closed value sets a task can take: its priority and its
//! position on the status board. Both serialise to the lowercase snake_case text the
//! task table stores, and both own their defaults so every layer agrees on them.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Priority classification for task importance.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    /// Stored representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

/// Board column a task sits in.
///
/// The declaration order is the cycling order used by the board:
/// todo, in progress, in review, done, then back to todo.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Todo,
    #[value(alias = "in_progress")]
    InProgress,
    #[value(alias = "in_review")]
    InReview,
    Done,
}

impl Status {
    pub const ALL: [Status; 4] = [Status::Todo, Status::InProgress, Status::InReview, Status::Done];

    /// The status a task moves to when cycled, wrapping from done back to todo.
    pub fn next(self) -> Status {
        match self {
            Status::Todo => Status::InProgress,
            Status::InProgress => Status::InReview,
            Status::InReview => Status::Done,
            Status::Done => Status::Todo,
        }
    }

    /// Stored representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Todo => "todo",
            Status::InProgress => "in_progress",
            Status::InReview => "in_review",
            Status::Done => "done",
        }
    }

    /// Column heading.
    pub fn label(self) -> &'static str {
        match self {
            Status::Todo => "To Do",
            Status::InProgress => "In Progress",
            Status::InReview => "In Review",
            Status::Done => "Done",
        }
    }

    /// Parse stored text, falling back to the default for missing or unknown values.
    pub fn parse_or_default(raw: Option<&str>) -> Status {
        raw.and_then(|s| s.parse().ok()).unwrap_or_default()
    }

    /// Position of this status among the board columns.
    pub fn column_index(self) -> usize {
        match self {
            Status::Todo => 0,
            Status::InProgress => 1,
            Status::InReview => 2,
            Status::Done => 3,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "todo" => Ok(Status::Todo),
            "in_progress" => Ok(Status::InProgress),
            "in_review" => Ok(Status::InReview),
            "done" => Ok(Status::Done),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Status::Todo)]
    #[case(Status::InProgress)]
    #[case(Status::InReview)]
    #[case(Status::Done)]
    fn cycling_four_times_returns_to_start(#[case] start: Status) {
        let end = (0..4).fold(start, |s, _| s.next());
        assert_eq!(end, start);
    }

    #[test]
    fn cycle_follows_board_order() {
        assert_eq!(Status::Todo.next(), Status::InProgress);
        assert_eq!(Status::InProgress.next(), Status::InReview);
        assert_eq!(Status::InReview.next(), Status::Done);
        assert_eq!(Status::Done.next(), Status::Todo);
    }

    #[rstest]
    #[case(None, Status::Todo)]
    #[case(Some("archived"), Status::Todo)]
    #[case(Some(""), Status::Todo)]
    #[case(Some("in_review"), Status::InReview)]
    fn unknown_status_normalises_to_todo(#[case] raw: Option<&str>, #[case] expected: Status) {
        assert_eq!(Status::parse_or_default(raw), expected);
    }

    #[test]
    fn serde_uses_snake_case() {
        assert_eq!(serde_json::to_string(&Status::InProgress).unwrap(), "\"in_progress\"");
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"high\"");
        let parsed: Status = serde_json::from_str("\"in_review\"").unwrap();
        assert_eq!(parsed, Status::InReview);
    }

    #[test]
    fn priority_rejects_unknown_text() {
        assert!("urgent".parse::<Priority>().is_err());
        assert!("Medium".parse::<Priority>().is_err());
        assert_eq!(" low ".parse::<Priority>(), Ok(Priority::Low));
        assert_eq!(Priority::default(), Priority::Medium);
    }
}
