//! Tail worker state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a tail worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    #[default]
    Created,
    Active,
    Terminated,
}

/// State machine for tracking a worker's lifecycle and output.
#[derive(Debug, Clone, Default)]
pub struct WorkerStateMachine {
    state: WorkerState,
    lines: usize,
    failures: usize,
}

impl WorkerStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Move to `new_state`. Nothing leaves `Terminated`.
    pub fn transition(&mut self, new_state: WorkerState) {
        if self.state == WorkerState::Terminated {
            tracing::debug!(to = ?new_state, "Ignoring transition out of Terminated");
            return;
        }
        tracing::debug!(from = ?self.state, to = ?new_state, "Worker state transition");
        self.state = new_state;
    }

    pub fn record_line(&mut self) {
        self.lines = self.lines.saturating_add(1);
    }

    pub fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
    }

    #[must_use]
    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            lines: self.lines,
            failures: self.failures,
        }
    }
}

/// Worker statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub lines: usize,
    pub failures: usize,
}
