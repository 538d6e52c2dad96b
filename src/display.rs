//! Colored CLI display utilities for tail output.
//!
//! This module renders reporter notifications and console feedback to the
//! terminal.

use std::io::{self, Write};
use std::path::Path;

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::reporter::TailReport;
use crate::supervisor::TailOutcome;

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Longest failure message printed before truncation.
const MAX_MESSAGE_LEN: usize = 200;

/// Truncate a string to a maximum number of characters, adding ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}

/// Short label for a path: its file name, or the whole path if it has none.
#[must_use]
pub fn source_label(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Plain-text rendering of a report, without color or timestamp.
#[must_use]
pub fn format_report(report: &TailReport) -> String {
    match report {
        TailReport::LineReceived { source, line } => {
            format!("({}) {line}", source_label(source))
        }
        TailReport::FailureReceived { file_name, message } => {
            format!("{file_name}: {}", truncate(message, MAX_MESSAGE_LEN))
        }
    }
}

/// Print a report from a tail worker.
pub fn print_report(report: &TailReport) {
    match report {
        TailReport::LineReceived { .. } => println!("{}", format_report(report)),
        TailReport::FailureReceived { .. } => println!(
            "{} {} {}",
            timestamp().dimmed(),
            "[FAILURE]".red().bold(),
            format_report(report).red()
        ),
    }
    let _ = io::stdout().flush();
}

/// Print that a tail started.
pub fn print_tail_started(path: &Path) {
    println!(
        "{} {} {}",
        timestamp().dimmed(),
        "[TAIL]".blue().bold(),
        path.display().cyan()
    );
    let _ = io::stdout().flush();
}

/// Print how a tail ended.
pub fn print_tail_ended(path: &Path, outcome: &TailOutcome) {
    let ts = timestamp();
    match outcome {
        TailOutcome::Stopped => println!(
            "{} {} {} stopped",
            ts.dimmed(),
            "[TAIL]".blue().bold(),
            path.display()
        ),
        TailOutcome::Failed { message } => println!(
            "{} {} {} ended: {}",
            ts.dimmed(),
            "[TAIL]".red().bold(),
            path.display(),
            truncate(message, MAX_MESSAGE_LEN).red()
        ),
        TailOutcome::Shutdown => {}
    }
    let _ = io::stdout().flush();
}

/// Print the list of active tails.
pub fn print_active(paths: &[std::path::PathBuf]) {
    if paths.is_empty() {
        println!("{} no active tails", "[TAIL]".blue().bold());
    }
    for path in paths {
        println!("{} {}", "[TAIL]".blue().bold(), path.display());
    }
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    println!("{} {}", "[ERROR]".red().bold(), message);
    let _ = io::stdout().flush();
}

/// Print the interactive prompt help.
pub fn print_instructions() {
    println!(
        "{} enter a file path to tail, {} to stop one, {} to list, {} to quit",
        "[HELP]".green().bold(),
        "stop <path>".bold(),
        "list".bold(),
        "exit".bold()
    );
    let _ = io::stdout().flush();
}
