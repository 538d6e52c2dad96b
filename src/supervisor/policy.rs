//! Supervision policy for failing tail workers.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::RestartConfig;

/// Classification of a worker failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Harmless; the worker keeps its state and carries on.
    Benign,
    /// The environment cannot support this tail. Retrying will not help.
    Unsupported,
    /// Anything else. Restart from the current end of file.
    Transient,
    /// Restart, keeping the read offset.
    Recoverable,
}

impl FailureKind {
    /// Whether a restart after this failure resumes from the old offset.
    #[must_use]
    pub fn preserves_offset(self) -> bool {
        matches!(self, Self::Recoverable)
    }
}

/// What the coordinator does with a failed worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisionDecision {
    Resume,
    Restart,
    Stop,
}

/// Decision function applied to every worker failure.
pub type Decider = fn(FailureKind) -> SupervisionDecision;

/// Default decision function.
#[must_use]
pub fn decide(kind: FailureKind) -> SupervisionDecision {
    match kind {
        FailureKind::Benign => SupervisionDecision::Resume,
        FailureKind::Unsupported => SupervisionDecision::Stop,
        FailureKind::Transient | FailureKind::Recoverable => SupervisionDecision::Restart,
    }
}

/// Rolling record of restarts for one tailed file.
#[derive(Debug, Clone)]
pub struct RestartBudget {
    max_restarts: usize,
    window: Duration,
    history: VecDeque<Instant>,
}

impl RestartBudget {
    #[must_use]
    pub fn new(max_restarts: usize, window: Duration) -> Self {
        Self {
            max_restarts,
            window,
            history: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn from_config(config: &RestartConfig) -> Self {
        Self::new(config.max_restarts, config.window())
    }

    /// Record a restart at `now` if the budget allows it.
    ///
    /// Entries older than the window are pruned first. Returns `false`
    /// without recording when one more restart would exceed the limit.
    pub fn try_record(&mut self, now: Instant) -> bool {
        self.prune(now);
        if self.history.len() >= self.max_restarts {
            return false;
        }
        self.history.push_back(now);
        true
    }

    /// Apply the budget to `decision`. A restart that would exceed the
    /// budget becomes a stop; other decisions pass through.
    pub fn check(&mut self, decision: SupervisionDecision, now: Instant) -> SupervisionDecision {
        match decision {
            SupervisionDecision::Restart if !self.try_record(now) => SupervisionDecision::Stop,
            other => other,
        }
    }

    /// Restarts inside the window ending at `now`.
    pub fn recent(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.history.len()
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.history.front() {
            if now.saturating_duration_since(oldest) > self.window {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }
}
