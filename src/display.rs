//! Plain-text rendering for the CLI.

use chrono::{Local, NaiveDate};

use crate::task::Task;

/// Format a due date relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_due_relative(due: NaiveDate, today: NaiveDate) -> String {
    match (due - today).num_days() {
        0 => "today".into(),
        1 => "tomorrow".into(),
        n if n > 1 => format!("in {n}d"),
        n => format!("{}d late", -n),
    }
}

/// Truncate a string to a maximum width, adding an ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Short form of a store id for tables.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((i, _)) => &id[..i],
        None => id,
    }
}

pub fn format_progress(task: &Task) -> String {
    match task.subtask_progress() {
        (_, 0) => "-".into(),
        (done, total) => format!("{done}/{total}"),
    }
}

/// Print tasks as a table, one row each.
pub fn print_table(tasks: &[&Task]) {
    println!(
        "{:<9} {:<12} {:<7} {:<10} {:<5} {:<14} {}",
        "ID", "Status", "Pri", "Due", "Done", "Assignee", "Title [tags]"
    );
    let today = Local::now().date_naive();
    for t in tasks {
        let tags = if t.tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", t.tags.join(","))
        };
        let due = format_due_relative(t.due_date.with_timezone(&Local).date_naive(), today);
        println!(
            "{:<9} {:<12} {:<7} {:<10} {:<5} {:<14} {}{}",
            short_id(t.id.as_str()),
            t.status.label(),
            t.priority.as_str(),
            due,
            format_progress(t),
            truncate(t.assignee.name(), 14),
            t.title,
            tags
        );
    }
}

/// Print every field of one task.
pub fn print_task(task: &Task) {
    let today = Local::now().date_naive();
    let due_local = task.due_date.with_timezone(&Local);
    println!("ID:           {}", task.id);
    println!("Title:        {}", task.title);
    println!("Status:       {}", task.status.label());
    println!("Priority:     {}", task.priority);
    println!(
        "Due:          {} ({})",
        due_local.format("%Y-%m-%d %H:%M"),
        format_due_relative(due_local.date_naive(), today)
    );
    println!("Estimate:     {}", task.estimated_time.as_deref().unwrap_or("-"));
    println!("Assignee:     {}", task.assignee.name());
    println!("Avatar:       {}", task.assignee.avatar_url());
    println!("Tags:         {}", if task.tags.is_empty() { "-".into() } else { task.tags.join(",") });
    if let Some(created) = task.created_at {
        println!("Created UTC:  {}", created.to_rfc3339());
    }
    if let Some(updated) = task.updated_at {
        println!("Updated UTC:  {}", updated.to_rfc3339());
    }
    if !task.ai_insights.is_empty() {
        println!("Insights:     {}", task.ai_insights);
    }
    println!("Description:\n{}\n", if task.description.is_empty() { "-" } else { task.description.as_str() });
    if task.subtasks.is_empty() {
        println!("Subtasks: -");
    } else {
        println!("Subtasks ({}):", format_progress(task));
        for (i, s) in task.subtasks.iter().enumerate() {
            println!("  {}. [{}] {}", i + 1, if s.completed { "x" } else { " " }, s.title);
        }
    }
}
