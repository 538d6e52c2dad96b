//! Per-file tail worker.
//!
//! A worker owns one [`ChangeObserver`] and one [`ReadCursor`]. It turns
//! change events into lines for its reporter and hands every failure to the
//! coordinator for a decision.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;

use futures_util::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::WatcherConfig;
use crate::reporter::Reporter;
use crate::supervisor::{FailureKind, SupervisionDecision, WorkerState, WorkerStateMachine};
use crate::watcher::{end_of_file, ChangeObserver, FileEvent, ReadCursor, TailError};

/// Where a starting worker places its cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StartPosition {
    /// Current end of file. Existing content is not replayed.
    End,
    /// A previously reached offset.
    Offset(u64),
}

/// Failure escalated from a worker to the coordinator.
#[derive(Debug)]
pub(crate) struct WorkerFailure {
    pub path: PathBuf,
    pub generation: u64,
    pub kind: FailureKind,
    pub message: String,
    /// Cursor offset when the failure happened. `None` after a crash.
    pub offset: Option<u64>,
    /// Where to send the decision. `None` when the worker has already
    /// exited and cannot resume.
    pub reply: Option<oneshot::Sender<SupervisionDecision>>,
}

/// Connection between a running worker and its supervisor.
#[derive(Debug, Clone)]
pub(crate) struct WorkerLink {
    pub generation: u64,
    pub failures: mpsc::UnboundedSender<WorkerFailure>,
    pub cancel: CancellationToken,
}

/// Tails a single file.
#[derive(Debug)]
pub(crate) struct TailWorker {
    path: PathBuf,
    file_name: String,
    cursor: ReadCursor,
    observer: ChangeObserver,
    events: mpsc::Receiver<FileEvent>,
    reporter: Reporter,
    machine: WorkerStateMachine,
}

impl TailWorker {
    /// Start observing `path` and position the cursor.
    ///
    /// The observer is started before the end of file is measured, so no
    /// append made after this returns can be missed.
    ///
    /// # Errors
    ///
    /// Returns an error if the observer cannot be started or the file cannot
    /// be inspected. The observer is released in that case.
    pub(crate) async fn start(
        path: PathBuf,
        reporter: Reporter,
        position: StartPosition,
        config: &WatcherConfig,
    ) -> Result<Self, TailError> {
        let mut machine = WorkerStateMachine::new();
        let (tx, events) = mpsc::channel(config.event_buffer.max(1));

        let mut observer = ChangeObserver::new(&path)?;
        observer.start(tx, config)?;

        let cursor = match position {
            StartPosition::End => ReadCursor::at_end(path.clone()).await?,
            StartPosition::Offset(offset) => {
                end_of_file(&path).await?;
                ReadCursor::with_offset(path.clone(), offset)
            }
        };

        machine.transition(WorkerState::Active);
        tracing::debug!(
            path = %path.display(),
            offset = cursor.offset(),
            "Tail worker active"
        );

        Ok(Self {
            file_name: observer.file_name(),
            path,
            cursor,
            observer,
            events,
            reporter,
            machine,
        })
    }

    /// Current read offset.
    #[must_use]
    pub(crate) fn offset(&self) -> u64 {
        self.cursor.offset()
    }

    /// Process events until cancelled or told to restart or stop.
    pub(crate) async fn run(mut self, link: WorkerLink) {
        loop {
            let event = tokio::select! {
                biased;
                () = link.cancel.cancelled() => break,
                event = self.events.recv() => event,
            };

            let decision = match event {
                Some(FileEvent::Write { .. }) => self.read_new_content(&link).await,
                Some(FileEvent::Error { file_name, message }) => {
                    self.escalate(TailError::Watch { file_name, message }, &link)
                        .await
                }
                None => {
                    // Nothing more can arrive, so the worker exits without
                    // waiting for a decision.
                    self.report_exit(TailError::EventStreamClosed, &link);
                    break;
                }
            };

            if decision != SupervisionDecision::Resume {
                break;
            }
        }

        self.terminate(link.generation);
    }

    async fn read_new_content(&mut self, link: &WorkerLink) -> SupervisionDecision {
        let lines = match self.cursor.read_new_lines().await {
            Ok(lines) => lines,
            Err(e) => return self.escalate(e, link).await,
        };

        for line in lines {
            if link.cancel.is_cancelled() {
                return SupervisionDecision::Stop;
            }
            match line {
                Ok(line) => {
                    self.machine.record_line();
                    self.reporter.line(&self.path, line);
                }
                Err(e) => {
                    let decision = self.escalate(e, link).await;
                    if decision != SupervisionDecision::Resume {
                        return decision;
                    }
                }
            }
        }

        SupervisionDecision::Resume
    }

    /// Report a failure and wait for the coordinator's decision.
    async fn escalate(&mut self, error: TailError, link: &WorkerLink) -> SupervisionDecision {
        let (reply_tx, reply_rx) = oneshot::channel();
        if !self.send_failure(error, link, Some(reply_tx)) {
            return SupervisionDecision::Stop;
        }

        tokio::select! {
            biased;
            () = link.cancel.cancelled() => SupervisionDecision::Stop,
            decision = reply_rx => decision.unwrap_or(SupervisionDecision::Stop),
        }
    }

    /// Report a failure the worker cannot continue past. No decision is
    /// awaited.
    fn report_exit(&mut self, error: TailError, link: &WorkerLink) {
        self.send_failure(error, link, None);
    }

    /// Report to the reporter and forward to the coordinator. Returns
    /// whether the coordinator is still listening.
    fn send_failure(
        &mut self,
        error: TailError,
        link: &WorkerLink,
        reply: Option<oneshot::Sender<SupervisionDecision>>,
    ) -> bool {
        let kind = error.kind();
        let message = error.to_string();

        tracing::warn!(
            path = %self.path.display(),
            generation = link.generation,
            ?kind,
            error = %message,
            "Tail failure"
        );

        self.machine.record_failure();
        self.reporter.failure(self.file_name.clone(), message.clone());

        link.failures
            .send(WorkerFailure {
                path: self.path.clone(),
                generation: link.generation,
                kind,
                message,
                offset: Some(self.cursor.offset()),
                reply,
            })
            .is_ok()
    }

    fn terminate(&mut self, generation: u64) {
        self.observer.stop();
        self.machine.transition(WorkerState::Terminated);
        let stats = self.machine.stats();
        tracing::debug!(
            path = %self.path.display(),
            generation,
            lines = stats.lines,
            failures = stats.failures,
            "Tail worker terminated"
        );
    }
}

/// Run `worker` on its own task.
///
/// A panic inside the worker is reported and escalated as a crash. The
/// observer is dropped during unwinding, before the task completes.
pub(crate) fn spawn(worker: TailWorker, link: WorkerLink) -> JoinHandle<()> {
    let path = worker.path.clone();
    let file_name = worker.file_name.clone();
    let reporter = worker.reporter.clone();
    let failures = link.failures.clone();
    let generation = link.generation;

    tokio::spawn(async move {
        if let Err(panic) = AssertUnwindSafe(worker.run(link)).catch_unwind().await {
            let error = TailError::Crashed(panic_message(panic.as_ref()));
            tracing::error!(path = %path.display(), generation, error = %error, "Tail worker panicked");
            reporter.failure(file_name, error.to_string());
            let _ = failures.send(WorkerFailure {
                path,
                generation,
                kind: error.kind(),
                message: error.to_string(),
                offset: None,
                reply: None,
            });
        }
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
