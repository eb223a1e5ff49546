//! User settings persisted in the data directory.

use std::io;
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::local::{load_json, save_json};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Notifications {
    pub email: bool,
    pub push: bool,
    pub desktop: bool,
}

impl Default for Notifications {
    fn default() -> Self {
        Notifications {
            email: true,
            push: true,
            desktop: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Privacy {
    pub show_online: bool,
    pub show_tasks: bool,
}

impl Default for Privacy {
    fn default() -> Self {
        Privacy {
            show_online: true,
            show_tasks: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub dark_mode: bool,
    pub notifications: Notifications,
    pub language: String,
    pub timezone: String,
    pub privacy: Privacy,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            dark_mode: false,
            notifications: Notifications::default(),
            language: "en".to_string(),
            timezone: "UTC".to_string(),
            privacy: Privacy::default(),
        }
    }
}

/// On/off settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    DarkMode,
    Email,
    Push,
    Desktop,
    ShowOnline,
    ShowTasks,
}

/// Free-text settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TextSetting {
    Language,
    Timezone,
}

impl Settings {
    pub fn load(path: &Path) -> Self {
        load_json(path)
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        save_json(self, path)
    }

    fn flag_mut(&mut self, toggle: Toggle) -> &mut bool {
        match toggle {
            Toggle::DarkMode => &mut self.dark_mode,
            Toggle::Email => &mut self.notifications.email,
            Toggle::Push => &mut self.notifications.push,
            Toggle::Desktop => &mut self.notifications.desktop,
            Toggle::ShowOnline => &mut self.privacy.show_online,
            Toggle::ShowTasks => &mut self.privacy.show_tasks,
        }
    }

    /// Flip a setting and return its new value.
    pub fn toggle(&mut self, toggle: Toggle) -> bool {
        let flag = self.flag_mut(toggle);
        *flag = !*flag;
        *flag
    }

    pub fn set(&mut self, key: TextSetting, value: &str) -> Result<(), String> {
        let value = value.trim();
        if value.is_empty() {
            return Err(format!("{key:?} cannot be empty"));
        }
        match key {
            TextSetting::Language => self.language = value.to_string(),
            TextSetting::Timezone => self.timezone = value.to_string(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_fresh_install() {
        let s = Settings::default();
        assert!(s.notifications.email && s.notifications.push && !s.notifications.desktop);
        assert!(s.privacy.show_online && s.privacy.show_tasks);
        assert_eq!((s.language.as_str(), s.timezone.as_str()), ("en", "UTC"));
        assert!(!s.dark_mode);
    }

    #[test]
    fn toggle_flips_only_the_named_flag() {
        let mut s = Settings::default();
        assert!(s.toggle(Toggle::Desktop));
        assert!(!s.toggle(Toggle::ShowTasks));
        assert_eq!(s.notifications, Notifications { email: true, push: true, desktop: true });
        assert!(!s.privacy.show_tasks);
        assert!(s.privacy.show_online);
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"dark_mode":true,"notifications":{"desktop":true}}"#).unwrap();
        let s = Settings::load(&path);
        assert!(s.dark_mode);
        assert!(s.notifications.email && s.notifications.desktop);
        assert_eq!(s.timezone, "UTC");
    }

    #[test]
    fn set_rejects_blank_values_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut s = Settings::default();
        assert!(s.set(TextSetting::Timezone, "  ").is_err());
        s.set(TextSetting::Timezone, "Europe/Paris").unwrap();
        s.save(&path).unwrap();
        assert_eq!(Settings::load(&path).timezone, "Europe/Paris");
    }
}
