//! Worker pool configuration, per `SPEC_FULL.md`'s Configuration section.
//!
//! Loaded once at startup from a TOML file, the way the teacher's agent
//! loads `agent.toml`. There is no hot-reload: spec.md's worker count and
//! cache capacity are fixed for the pool's lifetime (§4.3, §4.2).

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

fn default_queue_wait_timeout_ms() -> u64 {
    250
}

fn default_cache_capacity() -> usize {
    4096
}

/// Startup configuration for a [`crate::worker::WorkerPool`].
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerPoolConfig {
    /// Fixed number of worker threads (spec.md §4.3).
    pub worker_count: usize,

    /// Maximum number of entries the value cache retains before evicting
    /// the least recently used one (spec.md §4.2 DEPENDENT fanout).
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// How long an idle worker blocks on the queue's condition variable
    /// before re-checking its stop flag (spec.md §4.1 `wait`).
    #[serde(default = "default_queue_wait_timeout_ms")]
    pub queue_wait_timeout_ms: u64,
}

impl WorkerPoolConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn queue_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_wait_timeout_ms)
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            cache_capacity: default_cache_capacity(),
            queue_wait_timeout_ms: default_queue_wait_timeout_ms(),
        }
    }
}
