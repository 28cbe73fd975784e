//! Logger configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration for a [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggerConfig {
    /// Name used to tag diagnostics (default: "data-logger")
    pub name: String,
    /// Root directory for disk-writing handlers (default: ".")
    pub root: PathBuf,
    /// Number of concurrent handler workers (default: 1)
    pub workers: usize,
    /// Log wait durations at info level (default: true)
    pub log_waits: bool,
    /// Longest time dropping the logger waits for queued handlers (default: 5000)
    pub drop_timeout_ms: u64,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            name: "data-logger".to_string(),
            root: PathBuf::from("."),
            workers: 1,
            log_waits: true,
            drop_timeout_ms: 5000,
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Zero is clamped to a single worker.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_log_waits(mut self, log_waits: bool) -> Self {
        self.log_waits = log_waits;
        self
    }

    pub fn with_drop_timeout(mut self, timeout: Duration) -> Self {
        self.drop_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn drop_timeout(&self) -> Duration {
        Duration::from_millis(self.drop_timeout_ms)
    }

    /// Load a config from a YAML file. Missing keys take their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config: LoggerConfig = serde_yaml::from_str(&content)?;
        config.workers = config.workers.max(1);
        Ok(config)
    }
}
