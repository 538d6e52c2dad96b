//! Integration tests for the change observer.

use std::fs;
use std::time::Duration;

use tail_supervisor::config::{WatchBackend, WatcherConfig};
use tail_supervisor::watcher::{ChangeObserver, FileEvent};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(5);

/// Start `observer`, or return `None` when the platform watcher is unavailable.
fn start_or_skip(
    observer: &mut ChangeObserver,
    config: &WatcherConfig,
) -> Option<mpsc::Receiver<FileEvent>> {
    let (tx, rx) = mpsc::channel(config.event_buffer);
    match observer.start(tx, config) {
        Ok(()) => Some(rx),
        Err(e) => {
            eprintln!("Skipping test due to system limit: {e}");
            None
        }
    }
}

async fn expect_write(rx: &mut mpsc::Receiver<FileEvent>, name: &str) {
    let event = timeout(WAIT, rx.recv())
        .await
        .expect("Timed out waiting for an event")
        .expect("Event channel closed");
    assert_eq!(
        event,
        FileEvent::Write {
            file_name: name.to_string()
        }
    );
}

#[tokio::test]
async fn native_observer_reports_only_its_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    fs::write(&path, "").unwrap();

    let mut observer = ChangeObserver::new(&path).unwrap();
    let Some(mut rx) = start_or_skip(&mut observer, &WatcherConfig::default()) else {
        return;
    };
    assert!(observer.is_started());

    fs::write(dir.path().join("other.log"), "noise\n").unwrap();
    fs::write(&path, "hello\n").unwrap();

    // Every event that arrives is for the observed file
    expect_write(&mut rx, "app.log").await;
    sleep(Duration::from_millis(200)).await;
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.file_name(), "app.log");
    }

    observer.stop();
    assert!(!observer.is_started());
}

#[tokio::test]
async fn poll_observer_sees_changes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    fs::write(&path, "").unwrap();

    let config = WatcherConfig {
        backend: WatchBackend::Poll,
        poll_interval_ms: 50,
        ..WatcherConfig::default()
    };
    let mut observer = ChangeObserver::new(&path).unwrap();
    let Some(mut rx) = start_or_skip(&mut observer, &config) else {
        return;
    };

    fs::write(&path, "a longer line than before\n").unwrap();
    expect_write(&mut rx, "app.log").await;
}

#[tokio::test]
async fn stopped_observer_is_silent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    fs::write(&path, "").unwrap();

    let mut observer = ChangeObserver::new(&path).unwrap();
    let Some(mut rx) = start_or_skip(&mut observer, &WatcherConfig::default()) else {
        return;
    };
    observer.stop();

    fs::write(&path, "after stop\n").unwrap();
    sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err());
}
