//! The worker pool, per spec.md §4.3.
//!
//! Each worker runs the loop spec.md describes almost verbatim: pop a task
//! (waiting on the queue's condition variable when there is none), mark
//! itself busy in the timekeeper, dispatch by task tag, mark itself idle,
//! and return the finished task to the queue. Workers never block the
//! queue's lock while executing — `pop_new`/`push_finished`/`wait` each
//! take and release `M` themselves; the step execution in between holds no
//! lock at all.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use shared::error::StepError;
use shared::steps::StepRegistry;
use shared::value::TaskResult;
use tracing::{debug, error, info, warn};

use crate::cache::ValueCache;
use crate::config::WorkerPoolConfig;
use crate::executor::{self, ExecutionContext};
use crate::queue::TaskQueue;
use crate::timekeeper::Timekeeper;

/// A fixed-size pool of worker threads sharing one [`TaskQueue`].
///
/// Number of workers is configured at startup and fixed (spec.md §4.3);
/// there is no work-stealing beyond all workers contending for the same
/// queue.
pub struct WorkerPool {
    queue: Arc<TaskQueue>,
    cache: Arc<ValueCache>,
    timekeeper: Arc<Timekeeper>,
    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `config.worker_count` worker threads against `queue`, dispatching
    /// steps through `registry`.
    ///
    /// # Errors
    ///
    /// If any worker thread fails to spawn (spec.md §7.4), already-spawned
    /// workers are stopped and joined before returning the error — no
    /// partial pool is left running.
    pub fn start(
        config: &WorkerPoolConfig,
        queue: Arc<TaskQueue>,
        registry: Arc<dyn StepRegistry>,
    ) -> Result<Self> {
        let cache = Arc::new(ValueCache::with_capacity(config.cache_capacity));
        let timekeeper = Arc::new(Timekeeper::new(config.worker_count));
        let stop = Arc::new(AtomicBool::new(false));
        let wait_timeout = config.queue_wait_timeout();

        let mut handles = Vec::with_capacity(config.worker_count);
        for worker_id in 1..=config.worker_count {
            let spawn_result = spawn_worker(
                worker_id,
                Arc::clone(&queue),
                Arc::clone(&registry),
                Arc::clone(&timekeeper),
                Arc::clone(&stop),
                wait_timeout,
            );

            match spawn_result {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    warn!("failed to spawn worker {worker_id}, tearing down partial pool");
                    stop.store(true, Ordering::SeqCst);
                    queue.shutdown();
                    for handle in handles.drain(..) {
                        let _ = handle.join();
                    }
                    return Err(err).context("worker pool startup failed");
                }
            }
        }

        info!(worker_count = config.worker_count, "worker pool started");
        Ok(Self {
            queue,
            cache,
            timekeeper,
            stop,
            handles,
        })
    }

    pub fn cache(&self) -> &Arc<ValueCache> {
        &self.cache
    }

    pub fn timekeeper(&self) -> &Arc<Timekeeper> {
        &self.timekeeper
    }

    /// Stop every worker, per spec.md §4.4's `shutdown()`: sets the stop
    /// flag, broadcasts `C`, then joins each worker thread.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.queue.shutdown();
        for handle in self.handles.drain(..) {
            if let Err(panic) = handle.join() {
                error!(?panic, "worker thread panicked during shutdown join");
            }
        }
        debug!("worker pool shut down");
    }
}

fn spawn_worker(
    worker_id: usize,
    queue: Arc<TaskQueue>,
    registry: Arc<dyn StepRegistry>,
    timekeeper: Arc<Timekeeper>,
    stop: Arc<AtomicBool>,
    wait_timeout: Duration,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("preproc-worker-{worker_id}"))
        .spawn(move || worker_loop(worker_id, queue, registry, timekeeper, stop, wait_timeout))
        .with_context(|| format!("failed to spawn worker thread {worker_id}"))
}

fn worker_loop(
    worker_id: usize,
    queue: Arc<TaskQueue>,
    registry: Arc<dyn StepRegistry>,
    timekeeper: Arc<Timekeeper>,
    stop: Arc<AtomicBool>,
    wait_timeout: Duration,
) {
    queue.register_worker();
    debug!(worker_id, "worker started");

    loop {
        if stop.load(Ordering::SeqCst) {
            break;
        }

        let mut popped = match queue.pop_new() {
            Ok(Some(popped)) => popped,
            Ok(None) => {
                if let Err(err) = queue.wait(wait_timeout) {
                    warn!(worker_id, %err, "queue wait failed, worker self-stopping");
                    break;
                }
                continue;
            }
            Err(err) => {
                warn!(worker_id, %err, "pop_new failed, worker self-stopping");
                break;
            }
        };

        timekeeper.mark_busy(worker_id);

        let ctx = ExecutionContext::new(registry.as_ref());
        let item_id = popped.task.item_id;
        let tag = popped.task.tag();
        debug!(worker_id, item_id, tag, "executing task");

        // A panicking step evaluator must not poison the queue or leave the
        // task stranded (spec.md §4.1: "A worker that panics mid-task must
        // still call push_finished"). catch_unwind is the idiomatic stand-in
        // for spec.md's "scoped cleanup" — the task always reaches
        // push_finished below, with an error result if it panicked.
        let run = panic::catch_unwind(AssertUnwindSafe(|| {
            executor::execute(&mut popped.task, &ctx)
        }));

        if run.is_err() {
            error!(worker_id, item_id, "step evaluator panicked during execution");
            popped.task.result = Some(TaskResult::not_supported(StepError::new(
                0,
                "panic",
                "step evaluator panicked",
            )));
        }

        timekeeper.mark_idle(worker_id);
        queue.push_finished(popped);
    }

    queue.deregister_worker();
    debug!(worker_id, "worker stopped");
}
