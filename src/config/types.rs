//! Configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which notify backend a change observer uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchBackend {
    /// Platform-recommended watcher (inotify, FSEvents, ...).
    #[default]
    Native,
    /// Polling watcher, for file systems without native notification.
    Poll,
}

/// Configuration for change observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    #[serde(default)]
    pub backend: WatchBackend,
    /// Poll interval for the polling backend.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Capacity of each observer-to-worker event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_event_buffer() -> usize {
    64
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            backend: WatchBackend::default(),
            poll_interval_ms: default_poll_interval_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Restart-rate limits applied per tailed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartConfig {
    /// Restarts allowed within one window before the tail is stopped.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: usize,
    /// Length of the rolling restart window.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Delay before retrying a restart whose worker failed to start.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_max_restarts() -> usize {
    10
}

fn default_window_secs() -> u64 {
    30
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl RestartConfig {
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            max_restarts: default_max_restarts(),
            window_secs: default_window_secs(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Top-level configuration for the tail coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailConfig {
    #[serde(default)]
    pub watcher: WatcherConfig,
    #[serde(default)]
    pub restart: RestartConfig,
    /// Capacity of the coordinator's command channel.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

fn default_command_buffer() -> usize {
    32
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            watcher: WatcherConfig::default(),
            restart: RestartConfig::default(),
            command_buffer: default_command_buffer(),
        }
    }
}
