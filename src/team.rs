//! Team roster.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::local::{load_json, save_json};
use crate::task::{avatar_url_for, Task};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    pub role: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub tasks_assigned: usize,
}

impl TeamMember {
    pub fn avatar_url(&self) -> String {
        avatar_url_for(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub members: Vec<TeamMember>,
}

impl Default for Roster {
    fn default() -> Self {
        Roster::sample()
    }
}

impl Roster {
    /// The roster a fresh data directory starts with.
    pub fn sample() -> Self {
        Roster {
            members: vec![
                TeamMember {
                    id: "1".into(),
                    name: "John Doe".into(),
                    role: "Project Manager".into(),
                    email: "john@example.com".into(),
                    phone: "+1 234 567 890".into(),
                    tasks_assigned: 5,
                },
                TeamMember {
                    id: "2".into(),
                    name: "Jane Smith".into(),
                    role: "Developer".into(),
                    email: "jane@example.com".into(),
                    phone: "+1 234 567 891".into(),
                    tasks_assigned: 3,
                },
            ],
        }
    }

    pub fn load(path: &Path) -> Self {
        load_json(path)
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        save_json(self, path)
    }

    /// Members whose name or role contains `query`, ignoring case. An empty
    /// query matches everyone.
    pub fn search(&self, query: &str) -> Vec<&TeamMember> {
        let query = query.trim().to_lowercase();
        self.members
            .iter()
            .filter(|m| m.name.to_lowercase().contains(&query) || m.role.to_lowercase().contains(&query))
            .collect()
    }

    /// Append a member; ids continue from the current roster size.
    pub fn add(&mut self, name: &str, role: &str, email: &str, phone: &str) -> &TeamMember {
        let member = TeamMember {
            id: (self.members.len() + 1).to_string(),
            name: name.trim().to_string(),
            role: role.trim().to_string(),
            email: email.trim().to_string(),
            phone: phone.trim().to_string(),
            tasks_assigned: 0,
        };
        self.members.push(member);
        &self.members[self.members.len() - 1]
    }

    /// Recount assignments from the board's tasks, matching assignee names exactly.
    pub fn count_assignments(&mut self, tasks: &[Task]) {
        for member in &mut self.members {
            member.tasks_assigned = tasks.iter().filter(|t| t.assignee.name() == member.name).count();
        }
    }
}
