//! Watcher module tests.

mod cursor_test;
mod observer_test;
