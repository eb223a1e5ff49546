//! Colours for the terminal board.

use ratatui::style::Color;

use crate::fields::{Priority, Status};

pub const DARK_GREEN: Color = Color::Rgb(0, 80, 0);
pub const GOLD: Color = Color::Rgb(255, 215, 0);
pub const DARK_RED: Color = Color::Rgb(114, 0, 0);
pub const DARK_PURPLE: Color = Color::Rgb(86, 60, 92);

/// Column accent.
pub fn status_color(status: Status) -> Color {
    match status {
        Status::Todo => Color::Blue,
        Status::InProgress => GOLD,
        Status::InReview => DARK_PURPLE,
        Status::Done => DARK_GREEN,
    }
}

pub fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::Low => Color::Gray,
        Priority::Medium => Color::Yellow,
        Priority::High => Color::LightRed,
    }
}

/// Readable text colour on top of an accent.
pub fn text_on(accent: Color) -> Color {
    match accent {
        GOLD => Color::Rgb(20, 20, 20),
        _ => Color::White,
    }
}

/// Background palette chosen by the dark mode setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub card: Color,
    pub popup: Color,
    pub error: Color,
}

impl Theme {
    pub fn new(dark_mode: bool) -> Self {
        if dark_mode {
            Theme {
                card: Color::Rgb(30, 30, 30),
                popup: Color::Black,
                error: DARK_RED,
            }
        } else {
            Theme {
                card: Color::DarkGray,
                popup: Color::Black,
                error: Color::Red,
            }
        }
    }
}
