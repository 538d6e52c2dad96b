//! Tail Supervisor - supervised, fault-tolerant tailing of many files at once.

pub mod config;
pub mod console;
pub mod display;
pub mod reporter;
pub mod supervisor;
pub mod watcher;
