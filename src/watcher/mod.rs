//! Watcher module for tailed files.
//!
//! Provides the OS change observer, the typed events it emits, and the
//! offset-tracking line reader used by tail workers.

mod cursor;
mod error;
mod event;
mod observer;

pub use cursor::{end_of_file, ReadCursor};
pub use error::TailError;
pub use event::FileEvent;
pub use observer::ChangeObserver;
