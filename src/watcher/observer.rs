//! Change observer with notify integration.
//!
//! Watches the parent directory of one file and forwards change
//! notifications for that file to its tail worker as [`FileEvent`]s.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::{EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::error::TailError;
use super::event::FileEvent;
use crate::config::{WatchBackend, WatcherConfig};

/// Bridges OS file system notifications for a single file into a channel.
///
/// The watch handle is released by [`ChangeObserver::stop`], which also runs
/// on drop.
pub struct ChangeObserver {
    dir: PathBuf,
    file_name: OsString,
    watcher: Option<Box<dyn Watcher + Send>>,
    active: Arc<AtomicBool>,
}

impl std::fmt::Debug for ChangeObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeObserver")
            .field("dir", &self.dir)
            .field("file_name", &self.file_name)
            .field("started", &self.watcher.is_some())
            .finish()
    }
}

impl ChangeObserver {
    /// Create an observer for `path`. Nothing is watched until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns [`TailError::InvalidPath`] if `path` has no file name.
    pub fn new(path: &Path) -> Result<Self, TailError> {
        let file_name = path
            .file_name()
            .ok_or_else(|| TailError::InvalidPath(path.to_path_buf()))?
            .to_os_string();
        let dir = match path.parent() {
            Some(parent) if parent != Path::new("") => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Ok(Self {
            dir,
            file_name,
            watcher: None,
            active: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Name of the observed file as carried in events.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.file_name.to_string_lossy().into_owned()
    }

    /// Directory being watched.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether the OS watch is currently held.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.watcher.is_some()
    }

    /// Begin watching and deliver events into `events`.
    ///
    /// Delivery never blocks the notification thread. If the channel is
    /// full the event is dropped, since a queued `Write` already forces a
    /// re-check of the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher cannot be created or the directory
    /// cannot be watched.
    pub fn start(
        &mut self,
        events: mpsc::Sender<FileEvent>,
        config: &WatcherConfig,
    ) -> Result<(), TailError> {
        self.stop();

        let active = Arc::new(AtomicBool::new(true));
        let handler = EventBridge {
            file_name: self.file_name.clone(),
            display_name: self.file_name(),
            active: Arc::clone(&active),
            events,
        };

        let mut watcher: Box<dyn Watcher + Send> = match config.backend {
            WatchBackend::Native => Box::new(notify::recommended_watcher(
                move |res: notify::Result<notify::Event>| handler.handle(res),
            )?),
            WatchBackend::Poll => Box::new(notify::PollWatcher::new(
                move |res: notify::Result<notify::Event>| handler.handle(res),
                notify::Config::default()
                    .with_poll_interval(Duration::from_millis(config.poll_interval_ms)),
            )?),
        };

        watcher.watch(&self.dir, RecursiveMode::NonRecursive)?;

        tracing::debug!(
            dir = %self.dir.display(),
            file = %self.file_name(),
            backend = ?config.backend,
            "Observer started"
        );

        self.watcher = Some(watcher);
        self.active = active;
        Ok(())
    }

    /// Stop watching. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(e) = watcher.unwatch(&self.dir) {
                tracing::debug!(dir = %self.dir.display(), error = %e, "Unwatch failed");
            }
            drop(watcher);
            tracing::debug!(file = %self.file_name(), "Observer stopped");
        }
    }
}

impl Drop for ChangeObserver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State captured by the notify callback.
struct EventBridge {
    file_name: OsString,
    display_name: String,
    active: Arc<AtomicBool>,
    events: mpsc::Sender<FileEvent>,
}

impl EventBridge {
    fn handle(&self, res: notify::Result<notify::Event>) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }

        let event = match res {
            Ok(event) => {
                if !is_change(event.kind) || !self.targets_file(&event.paths) {
                    return;
                }
                FileEvent::Write {
                    file_name: self.display_name.clone(),
                }
            }
            Err(e) => FileEvent::Error {
                file_name: self.display_name.clone(),
                message: e.to_string(),
            },
        };

        match self.events.try_send(event) {
            Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::trace!(?event, "Event channel full, dropping event");
            }
        }
    }

    fn targets_file(&self, paths: &[PathBuf]) -> bool {
        paths
            .iter()
            .any(|p| p.file_name() == Some(self.file_name.as_os_str()))
    }
}

/// Events that can change what a read from the cursor would return.
fn is_change(kind: EventKind) -> bool {
    matches!(
        kind,
        EventKind::Any | EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}
