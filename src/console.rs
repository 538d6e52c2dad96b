//! Console input handling.
//!
//! Parses the interactive commands read from stdin and validates file paths
//! before they are handed to the coordinator.

use std::path::{Path, PathBuf};

/// A command typed at the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Start tailing a path.
    Tail(PathBuf),
    /// Stop tailing a path.
    Stop(PathBuf),
    /// List active tails.
    List,
    /// Print usage.
    Help,
    /// Shut down.
    Exit,
    /// Blank input.
    Empty,
}

impl ConsoleCommand {
    /// Parse one line of console input.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        match input {
            "" => return Self::Empty,
            "exit" | "quit" => return Self::Exit,
            "list" => return Self::List,
            "help" | "?" => return Self::Help,
            _ => {}
        }

        if let Some(rest) = input.strip_prefix("stop ") {
            let rest = rest.trim();
            if !rest.is_empty() {
                return Self::Stop(PathBuf::from(unquote(rest)));
            }
        }
        Self::Tail(PathBuf::from(unquote(input)))
    }
}

/// Strip one pair of matching surrounding quotes, as pasted paths often have.
fn unquote(s: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|r| r.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}

/// Why a path cannot be tailed.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No path given")]
    Empty,

    #[error("File does not exist: {0}")]
    NotFound(PathBuf),

    #[error("Not a regular file: {0}")]
    NotAFile(PathBuf),
}

/// Confirm `path` names an existing regular file.
///
/// # Errors
///
/// Returns a [`ValidationError`] describing the first problem found.
pub fn validate_path(path: &Path) -> Result<(), ValidationError> {
    if path.as_os_str().is_empty() {
        return Err(ValidationError::Empty);
    }
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => Ok(()),
        Ok(_) => Err(ValidationError::NotAFile(path.to_path_buf())),
        Err(_) => Err(ValidationError::NotFound(path.to_path_buf())),
    }
}
