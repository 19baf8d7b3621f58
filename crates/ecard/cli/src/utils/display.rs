//! Colored output helpers for the eCard CLI

use std::fmt::Display;

use colored::Colorize;

/// Bold underlined heading preceded by a blank line
pub fn heading(title: &str) -> String {
    format!("\n{}", title.bold().underline())
}

/// Indented `label: value` line
pub fn field(label: &str, value: impl Display) -> String {
    format!("  {}: {}", label.bold(), value)
}

/// Message for a successful outcome
pub fn success(message: &str) -> String {
    format!("{} {}", "OK".green().bold(), message.green())
}

/// Message for a failed outcome
pub fn failure(message: &str) -> String {
    format!("{} {}", "FAILED".red().bold(), message.red())
}

/// Message for something the user should notice
pub fn notice(message: &str) -> String {
    format!("{} {}", "!".yellow().bold(), message.yellow())
}

/// Marker for a granted or refused right
pub fn granted(granted: bool) -> String {
    if granted {
        "[x]".green().to_string()
    } else {
        "[ ]".dimmed().to_string()
    }
}
