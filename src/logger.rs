use crate::arguments;
use chrono::Utc;
use colored::*;
use std::io::{self, Write};

/// Log tags for per-subsystem prefixes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTag {
    System,
    Session,
    Fetch,
    Browser,
    Sheet,
}

impl LogTag {
    fn label(&self) -> ColoredString {
        match self {
            LogTag::System => "SYSTEM".green().bold(),
            LogTag::Session => "SESSION".magenta().bold(),
            LogTag::Fetch => "FETCH".cyan().bold(),
            LogTag::Browser => "BROWSER".yellow().bold(),
            LogTag::Sheet => "SHEET".blue().bold(),
        }
    }
}

fn timestamp() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}

fn emit(symbol: ColoredString, tag: LogTag, message: &str) {
    println!(
        "{} {} {} {}",
        symbol,
        tag.label(),
        format!("[{}]", timestamp()).dimmed(),
        message
    );
    let _ = io::stdout().flush();
}

pub fn info(tag: LogTag, message: &str) {
    emit("ℹ".blue().bold(), tag, message);
}

pub fn warning(tag: LogTag, message: &str) {
    emit("⚠".yellow().bold(), tag, &message.yellow().to_string());
}

pub fn error(tag: LogTag, message: &str) {
    emit("❌".red().bold(), tag, &message.red().to_string());
}

/// Debug lines are only shown when --debug is passed
pub fn debug(tag: LogTag, message: &str) {
    if arguments::is_debug_enabled() {
        emit("🐛".purple().bold(), tag, &message.dimmed().to_string());
    }
}

pub fn header(title: &str) {
    println!();
    println!(
        "{} {} {}",
        "📒".green().bold(),
        "soltrack".green().bold(),
        format!("- {}", title).bright_white().bold()
    );
    println!("{}", "─".repeat(50).dimmed());
    let _ = io::stdout().flush();
}
