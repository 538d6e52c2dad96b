//! Events delivered from a change observer to its tail worker.

/// A change notification for one tailed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// The file may have new content. Re-check from the cursor.
    Write { file_name: String },
    /// The underlying watcher reported an error.
    Error { file_name: String, message: String },
}

impl FileEvent {
    /// Name of the file this event is about.
    #[must_use]
    pub fn file_name(&self) -> &str {
        match self {
            Self::Write { file_name } | Self::Error { file_name, .. } => file_name,
        }
    }
}
