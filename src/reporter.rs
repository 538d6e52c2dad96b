//! Reporter sink handle.
//!
//! Tail workers push [`TailReport`]s through a [`Reporter`]. Whoever holds
//! the receiving end decides how to render them.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

/// Notification delivered to a reporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailReport {
    /// One complete new line from a tailed file.
    LineReceived { source: PathBuf, line: String },
    /// A read or watch failure occurred.
    FailureReceived { file_name: String, message: String },
}

/// Cloneable handle to a reporter sink.
///
/// Delivery is unbounded; a reporter that falls behind buffers reports in
/// memory.
#[derive(Debug, Clone)]
pub struct Reporter {
    tx: mpsc::UnboundedSender<TailReport>,
}

impl Reporter {
    /// Create a reporter and the receiver its reports arrive on.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TailReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Report a received line.
    pub fn line(&self, source: &Path, line: String) {
        self.send(TailReport::LineReceived {
            source: source.to_path_buf(),
            line,
        });
    }

    /// Report a failure.
    pub fn failure(&self, file_name: impl Into<String>, message: impl Into<String>) {
        self.send(TailReport::FailureReceived {
            file_name: file_name.into(),
            message: message.into(),
        });
    }

    /// Whether the receiving side has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, report: TailReport) {
        if self.tx.send(report).is_err() {
            tracing::trace!("Reporter closed, dropping report");
        }
    }
}
