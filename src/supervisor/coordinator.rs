//! Tail coordinator.
//!
//! Owns one [`TailWorker`] per tailed path and decides what happens when a
//! worker fails. All bookkeeping happens on the coordinator's own task;
//! callers talk to it through a [`CoordinatorHandle`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::worker::{self, StartPosition, TailWorker, WorkerFailure, WorkerLink};
use super::{decide, Decider, FailureKind, RestartBudget, SupervisionDecision};
use crate::config::TailConfig;
use crate::reporter::Reporter;
use crate::watcher::TailError;

/// Error type for coordinator operations.
#[derive(thiserror::Error, Debug)]
pub enum CoordinatorError {
    /// The path already has an active tail.
    #[error("Already tailing: {0}")]
    AlreadyTailing(PathBuf),

    /// The first worker for a path could not be started.
    #[error("Failed to start tail for {path}: {source}")]
    Start { path: PathBuf, source: TailError },

    /// The coordinator task is gone.
    #[error("Coordinator is not running")]
    NotRunning,
}

/// How a tail ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailOutcome {
    /// Stopped on request.
    Stopped,
    /// Stopped permanently by the supervision policy.
    Failed { message: String },
    /// The coordinator shut down.
    Shutdown,
}

/// Returned by a successful start. Resolves once the tail ends for any reason.
#[derive(Debug)]
pub struct TailTicket {
    path: PathBuf,
    ended: oneshot::Receiver<TailOutcome>,
}

impl TailTicket {
    /// Normalized path of the tail.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the tail to end.
    pub async fn ended(self) -> TailOutcome {
        self.ended.await.unwrap_or(TailOutcome::Shutdown)
    }

    /// The outcome, if the tail has already ended.
    pub fn try_outcome(&mut self) -> Option<TailOutcome> {
        self.ended.try_recv().ok()
    }
}

#[derive(Debug)]
enum Command {
    StartTail {
        path: PathBuf,
        reporter: Reporter,
        reply: oneshot::Sender<Result<TailTicket, CoordinatorError>>,
    },
    StopTail {
        path: PathBuf,
        reply: oneshot::Sender<bool>,
    },
    ListTails {
        reply: oneshot::Sender<Vec<PathBuf>>,
    },
}

/// Cloneable handle for sending requests to a running coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
}

impl CoordinatorHandle {
    /// Begin tailing `path`, delivering lines and failures to `reporter`.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::AlreadyTailing`] if the path is already
    /// tailed, [`CoordinatorError::Start`] if the worker cannot start, or
    /// [`CoordinatorError::NotRunning`] if the coordinator has shut down.
    pub async fn start_tail(
        &self,
        path: impl AsRef<Path>,
        reporter: Reporter,
    ) -> Result<TailTicket, CoordinatorError> {
        let requested = path.as_ref();
        let path = tail_key(requested)
            .await
            .map_err(|source| CoordinatorError::Start {
                path: requested.to_path_buf(),
                source,
            })?;

        let (reply, rx) = oneshot::channel();
        self.send(Command::StartTail {
            path,
            reporter,
            reply,
        })
        .await?;
        rx.await.map_err(|_| CoordinatorError::NotRunning)?
    }

    /// Stop tailing `path`. Returns whether a tail was active.
    ///
    /// When this returns, the worker has finished and its observer is
    /// released; no further reports arrive for the path.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::NotRunning`] if the coordinator has shut down.
    pub async fn stop_tail(&self, path: impl AsRef<Path>) -> Result<bool, CoordinatorError> {
        let Ok(path) = tail_key(path.as_ref()).await else {
            return Ok(false);
        };

        let (reply, rx) = oneshot::channel();
        self.send(Command::StopTail { path, reply }).await?;
        rx.await.map_err(|_| CoordinatorError::NotRunning)
    }

    /// Paths currently tailed, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::NotRunning`] if the coordinator has shut down.
    pub async fn active_tails(&self) -> Result<Vec<PathBuf>, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ListTails { reply }).await?;
        rx.await.map_err(|_| CoordinatorError::NotRunning)
    }

    /// Signal the coordinator to stop every tail and exit.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn send(&self, command: Command) -> Result<(), CoordinatorError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CoordinatorError::NotRunning)
    }
}

/// Bookkeeping for one tailed path.
struct ActiveTail {
    reporter: Reporter,
    generation: u64,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    restarts: RestartBudget,
    ended: Option<oneshot::Sender<TailOutcome>>,
}

impl ActiveTail {
    /// Cancel the current worker and wait until it has finished.
    async fn retire_worker(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Tail worker task failed");
            }
        }
    }

    async fn finish(mut self, outcome: TailOutcome) {
        self.retire_worker().await;
        if let Some(ended) = self.ended.take() {
            let _ = ended.send(outcome);
        }
    }
}

/// A restart waiting for its retry delay to pass.
#[derive(Debug)]
struct PendingRestart {
    path: PathBuf,
    generation: u64,
    position: StartPosition,
}

/// Supervises tail workers keyed by path.
pub struct TailCoordinator {
    config: TailConfig,
    decider: Decider,
    tails: HashMap<PathBuf, ActiveTail>,
    commands: mpsc::Receiver<Command>,
    failures_tx: mpsc::UnboundedSender<WorkerFailure>,
    failures_rx: mpsc::UnboundedReceiver<WorkerFailure>,
    retries_tx: mpsc::UnboundedSender<PendingRestart>,
    retries_rx: mpsc::UnboundedReceiver<PendingRestart>,
    next_generation: u64,
    cancel: CancellationToken,
}

impl TailCoordinator {
    /// Create a coordinator and the handle used to drive it.
    ///
    /// Nothing runs until [`run`](Self::run) is awaited or spawned.
    #[must_use]
    pub fn new(config: TailConfig) -> (Self, CoordinatorHandle) {
        let (commands_tx, commands) = mpsc::channel(config.command_buffer.max(1));
        let (failures_tx, failures_rx) = mpsc::unbounded_channel();
        let (retries_tx, retries_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let coordinator = Self {
            config,
            decider: decide,
            tails: HashMap::new(),
            commands,
            failures_tx,
            failures_rx,
            retries_tx,
            retries_rx,
            next_generation: 0,
            cancel: cancel.clone(),
        };
        let handle = CoordinatorHandle {
            commands: commands_tx,
            cancel,
        };
        (coordinator, handle)
    }

    /// Replace the decision function.
    #[must_use]
    pub fn with_decider(mut self, decider: Decider) -> Self {
        self.decider = decider;
        self
    }

    /// Create a coordinator and run it on a new task.
    #[must_use]
    pub fn spawn(config: TailConfig) -> (CoordinatorHandle, JoinHandle<()>) {
        let (coordinator, handle) = Self::new(config);
        (handle, tokio::spawn(coordinator.run()))
    }

    /// Process commands and worker failures until shut down or every
    /// handle is dropped. All tails are stopped before this returns.
    pub async fn run(mut self) {
        tracing::debug!("Tail coordinator running");

        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => break,

                failure = self.failures_rx.recv() => {
                    if let Some(failure) = failure {
                        self.handle_failure(failure).await;
                    }
                }

                pending = self.retries_rx.recv() => {
                    if let Some(pending) = pending {
                        self.retry_restart(pending).await;
                    }
                }

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }
        }

        self.stop_all().await;
        tracing::debug!("Tail coordinator stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartTail {
                path,
                reporter,
                reply,
            } => {
                let result = self.start_tail(path, reporter).await;
                let _ = reply.send(result);
            }
            Command::StopTail { path, reply } => {
                let stopped = self.stop_tail(&path).await;
                let _ = reply.send(stopped);
            }
            Command::ListTails { reply } => {
                let mut paths: Vec<PathBuf> = self.tails.keys().cloned().collect();
                paths.sort();
                let _ = reply.send(paths);
            }
        }
    }

    async fn start_tail(
        &mut self,
        path: PathBuf,
        reporter: Reporter,
    ) -> Result<TailTicket, CoordinatorError> {
        if self.tails.contains_key(&path) {
            tracing::warn!(path = %path.display(), "Rejecting duplicate tail");
            return Err(CoordinatorError::AlreadyTailing(path));
        }

        let worker = TailWorker::start(
            path.clone(),
            reporter.clone(),
            StartPosition::End,
            &self.config.watcher,
        )
        .await
        .map_err(|source| CoordinatorError::Start {
            path: path.clone(),
            source,
        })?;

        let (ended_tx, ended_rx) = oneshot::channel();
        let offset = worker.offset();
        let (generation, cancel, handle) = self.launch(worker);
        self.tails.insert(
            path.clone(),
            ActiveTail {
                reporter,
                generation,
                cancel,
                handle: Some(handle),
                restarts: RestartBudget::from_config(&self.config.restart),
                ended: Some(ended_tx),
            },
        );

        tracing::info!(path = %path.display(), generation, offset, "Tail started");
        Ok(TailTicket {
            path,
            ended: ended_rx,
        })
    }

    async fn stop_tail(&mut self, path: &Path) -> bool {
        let Some(tail) = self.tails.remove(path) else {
            tracing::debug!(path = %path.display(), "No tail to stop");
            return false;
        };

        tail.finish(TailOutcome::Stopped).await;
        tracing::info!(path = %path.display(), "Tail stopped");
        true
    }

    async fn stop_all(&mut self) {
        for (path, tail) in self.tails.drain() {
            tail.finish(TailOutcome::Shutdown).await;
            tracing::debug!(path = %path.display(), "Tail shut down");
        }
    }

    fn launch(&mut self, worker: TailWorker) -> (u64, CancellationToken, JoinHandle<()>) {
        self.next_generation += 1;
        let generation = self.next_generation;
        let cancel = self.cancel.child_token();
        let link = WorkerLink {
            generation,
            failures: self.failures_tx.clone(),
            cancel: cancel.clone(),
        };
        (generation, cancel, worker::spawn(worker, link))
    }

    /// Apply the decision function and the restart budget to one failure.
    fn decide_for(
        &self,
        tail: &mut ActiveTail,
        path: &Path,
        kind: FailureKind,
    ) -> SupervisionDecision {
        let decision = (self.decider)(kind);
        let checked = tail.restarts.check(decision, Instant::now());
        if checked != decision {
            tracing::warn!(
                path = %path.display(),
                max_restarts = self.config.restart.max_restarts,
                window_secs = self.config.restart.window_secs,
                "Restart budget exhausted, stopping tail"
            );
        }
        checked
    }

    async fn handle_failure(&mut self, failure: WorkerFailure) {
        let WorkerFailure {
            path,
            generation,
            kind,
            message,
            offset,
            reply,
        } = failure;

        let Some(mut tail) = self.tails.remove(&path) else {
            tracing::debug!(path = %path.display(), generation, "Ignoring failure for untracked path");
            return;
        };
        if tail.generation != generation {
            tracing::debug!(
                path = %path.display(),
                generation,
                current = tail.generation,
                "Ignoring failure from retired worker"
            );
            self.tails.insert(path, tail);
            return;
        }

        let mut decision = self.decide_for(&mut tail, &path, kind);
        // A worker that has already exited has nothing left to resume.
        if decision == SupervisionDecision::Resume && reply.is_none() {
            decision = SupervisionDecision::Stop;
        }

        tracing::info!(path = %path.display(), generation, ?kind, ?decision, "Supervision decision");
        if let Some(reply) = reply {
            let _ = reply.send(decision);
        }

        match decision {
            SupervisionDecision::Resume => {
                self.tails.insert(path, tail);
            }
            SupervisionDecision::Restart => {
                let position = match offset {
                    Some(offset) if kind.preserves_offset() => StartPosition::Offset(offset),
                    _ => StartPosition::End,
                };
                self.restart(path, tail, position).await;
            }
            SupervisionDecision::Stop => {
                tracing::warn!(path = %path.display(), error = %message, "Tail stopped permanently");
                tail.finish(TailOutcome::Failed { message }).await;
            }
        }
    }

    /// Replace the worker for `path`.
    async fn restart(&mut self, path: PathBuf, mut tail: ActiveTail, position: StartPosition) {
        tail.retire_worker().await;
        self.start_replacement(path, tail, position).await;
    }

    /// Run a delayed restart unless the tail was stopped or restarted since.
    async fn retry_restart(&mut self, pending: PendingRestart) {
        let PendingRestart {
            path,
            generation,
            position,
        } = pending;

        let Some(tail) = self.tails.remove(&path) else {
            tracing::debug!(path = %path.display(), generation, "Dropping retry for untracked path");
            return;
        };
        if tail.generation != generation || tail.handle.is_some() {
            tracing::debug!(path = %path.display(), generation, "Dropping stale retry");
            self.tails.insert(path, tail);
            return;
        }

        self.start_replacement(path, tail, position).await;
    }

    /// Start a worker for a tail that has none. A failed start is reported
    /// and, if the budget allows another restart, retried after the
    /// configured delay.
    async fn start_replacement(
        &mut self,
        path: PathBuf,
        mut tail: ActiveTail,
        position: StartPosition,
    ) {
        let started = TailWorker::start(
            path.clone(),
            tail.reporter.clone(),
            position,
            &self.config.watcher,
        )
        .await;

        let error = match started {
            Ok(worker) => {
                let offset = worker.offset();
                let (generation, cancel, handle) = self.launch(worker);
                tail.generation = generation;
                tail.cancel = cancel;
                tail.handle = Some(handle);
                tracing::info!(path = %path.display(), generation, offset, "Tail restarted");
                self.tails.insert(path, tail);
                return;
            }
            Err(error) => error,
        };

        let kind = error.kind();
        let message = error.to_string();
        tracing::warn!(path = %path.display(), ?kind, error = %message, "Tail restart failed");
        tail.reporter.failure(file_label(&path), message.clone());

        match self.decide_for(&mut tail, &path, kind) {
            SupervisionDecision::Restart => {
                let position = if kind.preserves_offset() {
                    position
                } else {
                    StartPosition::End
                };
                self.schedule_retry(path, tail, position);
            }
            // Without a running worker there is nothing to resume.
            SupervisionDecision::Resume | SupervisionDecision::Stop => {
                tracing::warn!(path = %path.display(), error = %message, "Tail stopped permanently");
                tail.finish(TailOutcome::Failed { message }).await;
            }
        }
    }

    /// Park `tail` without a worker and queue another start attempt.
    fn schedule_retry(&mut self, path: PathBuf, mut tail: ActiveTail, position: StartPosition) {
        self.next_generation += 1;
        let generation = self.next_generation;
        tail.generation = generation;

        let delay = self.config.restart.retry_delay();
        tracing::debug!(
            path = %path.display(),
            generation,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Restart retry scheduled"
        );

        let pending = PendingRestart {
            path: path.clone(),
            generation,
            position,
        };
        self.tails.insert(path, tail);

        let retries = self.retries_tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let _ = retries.send(pending);
                }
            }
        });
    }
}

/// Normalize a path into the key tails are registered under: the
/// canonical parent directory joined with the file name. The file itself
/// need not exist.
///
/// # Errors
///
/// Returns [`TailError::InvalidPath`] if the path has no file name.
pub async fn tail_key(path: &Path) -> Result<PathBuf, TailError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| TailError::InvalidPath(path.to_path_buf()))?;
    let parent = match path.parent() {
        Some(parent) if parent != Path::new("") => parent.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    let parent = tokio::fs::canonicalize(&parent).await.unwrap_or(parent);
    Ok(parent.join(file_name))
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
