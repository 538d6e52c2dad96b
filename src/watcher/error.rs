//! Tail error types.

use std::io;
use std::path::PathBuf;

use crate::supervisor::FailureKind;

/// Errors that can occur while watching or reading a tailed file.
#[derive(thiserror::Error, Debug)]
pub enum TailError {
    /// Tailed file was deleted.
    #[error("Tailed file deleted: {0}")]
    FileDeleted(PathBuf),

    /// Permission denied accessing file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// File shrank below the read offset.
    #[error("File truncated: {path} (offset {offset}, length {len})")]
    Truncated { path: PathBuf, offset: u64, len: u64 },

    /// Path exists but is not a regular file.
    #[error("Not a regular file: {0}")]
    NotAFile(PathBuf),

    /// Path has no file name or parent directory.
    #[error("Invalid tail path: {0}")]
    InvalidPath(PathBuf),

    /// A complete line was not valid UTF-8. The line is skipped.
    #[error("Invalid UTF-8 in {path} at offset {offset}")]
    InvalidUtf8 { path: PathBuf, offset: u64 },

    /// Notify watcher error.
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// Error reported by a running watcher.
    #[error("Watcher error on {file_name}: {message}")]
    Watch { file_name: String, message: String },

    /// The observer's event channel closed while the worker was still running.
    #[error("Watcher event stream closed")]
    EventStreamClosed,

    /// The worker task panicked.
    #[error("Tail worker crashed: {0}")]
    Crashed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TailError {
    /// Map an I/O error for `path` onto the most specific variant.
    #[must_use]
    pub fn from_io(path: &std::path::Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::FileDeleted(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io(err),
        }
    }

    /// Classify this error for the supervision decision.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidUtf8 { .. } => FailureKind::Benign,
            Self::NotAFile(_) | Self::InvalidPath(_) => FailureKind::Unsupported,
            Self::Notify(err) => match &err.kind {
                notify::ErrorKind::MaxFilesWatch | notify::ErrorKind::InvalidConfig(_) => {
                    FailureKind::Unsupported
                }
                notify::ErrorKind::Io(io_err) => io_kind(io_err),
                _ => FailureKind::Transient,
            },
            Self::Io(err) => io_kind(err),
            Self::FileDeleted(_)
            | Self::PermissionDenied(_)
            | Self::Truncated { .. }
            | Self::Watch { .. }
            | Self::EventStreamClosed
            | Self::Crashed(_) => FailureKind::Transient,
        }
    }
}

fn io_kind(err: &io::Error) -> FailureKind {
    match err.kind() {
        io::ErrorKind::Unsupported => FailureKind::Unsupported,
        io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            FailureKind::Recoverable
        }
        _ => FailureKind::Transient,
    }
}
