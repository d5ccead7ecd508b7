//! The manager-facing integration surface, per spec.md §4.4.
//!
//! `Manager` is what an embedding supervisor holds: one call to start the
//! pool, `enqueue`/`fetch_finished` to drive work through it, and
//! `shutdown` to stop it in an orderly way. Everything below this is an
//! implementation detail the supervisor never touches directly.

use std::sync::Arc;

use anyhow::Result;
use shared::cache::CacheSink;
use shared::steps::StepRegistry;
use shared::task::Task;
use tracing::warn;

use crate::cache::ValueCache;
use crate::config::WorkerPoolConfig;
use crate::queue::TaskQueue;
use crate::worker::WorkerPool;

/// Owns the queue and worker pool for one scheduler instance.
///
/// `pool` is `Some` for the manager's whole life except during/after
/// [`Manager::shutdown`], which consumes it.
pub struct Manager {
    queue: Arc<TaskQueue>,
    pool: Option<WorkerPool>,
}

impl Manager {
    /// Start a queue and worker pool per `config`, dispatching steps
    /// through `registry` (spec.md §4.3/§4.4).
    pub fn start(config: &WorkerPoolConfig, registry: Arc<dyn StepRegistry>) -> Result<Self> {
        let queue = Arc::new(TaskQueue::new());
        let pool = WorkerPool::start(config, Arc::clone(&queue), registry)?;
        Ok(Self {
            queue,
            pool: Some(pool),
        })
    }

    /// The shared value cache, so a caller can hand `Arc::clone`s of it into
    /// the `VALUE`/`VALUE_SEQ`/`DEPENDENT` tasks it builds (spec.md §4.2).
    pub fn cache(&self) -> Arc<dyn CacheSink> {
        Arc::clone(self.value_cache()) as Arc<dyn CacheSink>
    }

    /// The concrete cache, for callers that also want to read it back
    /// (e.g. to inspect a `DEPENDENT` task's upstream value).
    pub fn value_cache(&self) -> &Arc<ValueCache> {
        self.pool
            .as_ref()
            .expect("manager used after shutdown")
            .cache()
    }

    /// Submit a task, per spec.md §4.1's `enqueue`.
    pub fn enqueue(&self, task: Task) {
        self.queue.enqueue(task);
    }

    /// Drain every task that has finished since the last call, per
    /// spec.md §4.1's `fetch_finished`.
    pub fn fetch_finished(&self) -> Vec<Task> {
        self.queue.fetch_finished()
    }

    /// Tasks submitted but not yet handed to a worker (spec.md §8).
    pub fn pending_depth(&self) -> usize {
        self.queue.pending_depth()
    }

    /// Tasks currently held by a worker (spec.md §8).
    pub fn in_progress_count(&self) -> usize {
        self.queue.in_progress_count()
    }

    /// Tasks finished but not yet drained by `fetch_finished` (supplemented
    /// accounting accessor, see `SPEC_FULL.md`).
    pub fn finished_depth(&self) -> usize {
        self.queue.finished_depth()
    }

    /// `(pending_depth, in_progress_count, finished_depth)` read under a
    /// single lock acquisition, for asserting spec.md §8's conservation
    /// property against a consistent instant rather than three separate
    /// snapshots.
    pub fn depth_snapshot(&self) -> (usize, usize, usize) {
        self.queue.depth_snapshot()
    }

    /// Stop every worker and join their threads, per spec.md §4.4's
    /// `shutdown`. Any tasks still in `finished` after this call can still
    /// be drained with `fetch_finished`.
    pub fn shutdown(mut self) {
        if let Some(pool) = self.pool.take() {
            pool.shutdown();
        }
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            warn!("manager dropped without an explicit shutdown call");
            pool.shutdown();
        }
    }
}
