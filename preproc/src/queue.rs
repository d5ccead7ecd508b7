//! The task queue — the concurrency core of the scheduler, per spec.md §4.1.
//!
//! A single `Mutex` (`M`) plus `Condvar` (`C`) serialize every mutation
//! across the queue's internal lanes: `pending`, `in_progress` (accounting
//! only), `finished`, and `sequences`.
//!
//! The `sequences` lane is implemented as `HashMap<item_id, VecDeque<Task>>`
//! rather than as literal `TaskKind::Sequence` objects flowing through
//! `pending`/`in_progress`/`finished`. Spec.md §9 explicitly licenses this:
//! "A rewrite using per-item task channels plus a worker that borrows one
//! channel at a time is equivalent and may be cleaner in a language with
//! typed channels" — this is exactly that rewrite. `pending` instead carries
//! a `Sequence(item_id)` token standing in for "this item's ordered stream
//! has a runnable head"; the real sub-tasks live in `sequences`. This keeps
//! the per-item exclusivity invariant (spec.md §3 invariant 1) structural:
//! at most one `Sequence(item_id)` token can ever be in `pending` at a time,
//! because a fresh one is only pushed by `enqueue` (when no entry exists
//! yet) or by `push_finished` (after the entry's current head has been
//! popped and executed) — never both.
//!
//! Per-sub-task completions are surfaced to `finished` as soon as each
//! individual sub-task finishes executing, per spec.md §6 ("implementations
//! must surface per-sub-task completions to the supervisor in submission
//! order"), rather than only once the whole sequence drains. This is the
//! explicit clarification spec.md §6 gives in tension with §4.1's more
//! literal-sounding description of `push_finished`; see `DESIGN.md`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use shared::task::{Task, TaskKind};
use tracing::{debug, warn};

use crate::error::QueueError;

/// What was waiting in `pending` when `pop_new` selected it.
enum PendingItem {
    /// A TEST, VALUE, or DEPENDENT task — independent, no ordering
    /// constraint (spec.md §4.1 dispatch policy rule 4).
    Direct(Task),
    /// A runnable token for an ordered item's stream. The actual sub-task
    /// lives in `sequences[item_id]`.
    Sequence(u64),
}

/// Where a popped task came from, so `push_finished` knows how to re-thread
/// it (spec.md §4.1).
#[derive(Debug, Clone, Copy)]
enum PopOrigin {
    Direct,
    Sequence(u64),
}

/// A task handed to a worker by [`TaskQueue::pop_new`]. Opaque to callers
/// beyond the embedded [`Task`] — workers execute `task` and hand the whole
/// `PoppedTask` back to [`TaskQueue::push_finished`].
pub struct PoppedTask {
    pub task: Task,
    origin: PopOrigin,
}

struct QueueState {
    pending: VecDeque<PendingItem>,
    sequences: HashMap<u64, VecDeque<Task>>,
    finished: VecDeque<Task>,
    in_progress_count: usize,
    in_progress_sequence_items: HashSet<u64>,
    worker_count: usize,
    stopping: bool,
}

impl QueueState {
    fn pending_depth(&self) -> usize {
        let direct = self
            .pending
            .iter()
            .filter(|item| matches!(item, PendingItem::Direct(_)))
            .count();
        let queued_sub_tasks: usize = self.sequences.values().map(|q| q.len()).sum();
        direct + queued_sub_tasks
    }
}

/// The shared queue, per spec.md §4.1.
pub struct TaskQueue {
    state: Mutex<QueueState>,
    condvar: Condvar,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                sequences: HashMap::new(),
                finished: VecDeque::new(),
                in_progress_count: 0,
                in_progress_sequence_items: HashSet::new(),
                worker_count: 0,
                stopping: false,
            }),
            condvar: Condvar::new(),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, QueueState>, QueueError> {
        self.state
            .lock()
            .map_err(|_| QueueError::WaitFailed("task queue mutex poisoned".to_string()))
    }

    pub fn register_worker(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.worker_count += 1;
    }

    pub fn deregister_worker(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.worker_count = state.worker_count.saturating_sub(1);
        drop(state);
        self.condvar.notify_all();
    }

    pub fn worker_count(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).worker_count
    }

    /// Enqueue a task, per spec.md §4.1's `enqueue` dispatch rules.
    ///
    /// # Panics
    ///
    /// Panics if handed a `TaskKind::Sequence` directly — per spec.md §4.1,
    /// "SEQUENCE is never enqueued by external callers directly; it is only
    /// produced internally by the VALUE_SEQ path," and per §7.2 this class
    /// of misuse is a fatal assertion, not a recoverable error.
    pub fn enqueue(&self, task: Task) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        match &task.kind {
            TaskKind::Sequence(_) => {
                panic!("SEQUENCE tasks are internal-only and must never be enqueued directly");
            }
            TaskKind::ValueSeq(_) => {
                let item_id = task.item_id;
                if let Some(queue) = state.sequences.get_mut(&item_id) {
                    queue.push_back(task);
                    // No new runnable work surfaced: either a token for this
                    // item already sits in `pending`, or a worker already
                    // holds its head and will re-surface the token on
                    // completion.
                } else {
                    let mut queue = VecDeque::new();
                    queue.push_back(task);
                    state.sequences.insert(item_id, queue);
                    state.pending.push_back(PendingItem::Sequence(item_id));
                    drop(state);
                    self.condvar.notify_all();
                    return;
                }
            }
            TaskKind::Test(_) | TaskKind::Value(_) | TaskKind::Dependent(_) => {
                state.pending.push_back(PendingItem::Direct(task));
                drop(state);
                self.condvar.notify_all();
                return;
            }
        }
    }

    /// Pop the next runnable task, per spec.md §4.1's `pop_new`.
    pub fn pop_new(&self) -> Result<Option<PoppedTask>, QueueError> {
        let mut state = self.lock()?;
        self.pop_new_locked(&mut state)
    }

    fn pop_new_locked(
        &self,
        state: &mut std::sync::MutexGuard<'_, QueueState>,
    ) -> Result<Option<PoppedTask>, QueueError> {
        let Some(item) = state.pending.pop_front() else {
            return Ok(None);
        };

        match item {
            PendingItem::Direct(task) => {
                state.in_progress_count += 1;
                Ok(Some(PoppedTask {
                    task,
                    origin: PopOrigin::Direct,
                }))
            }
            PendingItem::Sequence(item_id) => {
                let Some(queue) = state.sequences.get_mut(&item_id) else {
                    return Err(QueueError::EmptySequence { item_id });
                };
                let Some(head) = queue.pop_front() else {
                    return Err(QueueError::EmptySequence { item_id });
                };
                state.in_progress_count += 1;
                state.in_progress_sequence_items.insert(item_id);
                Ok(Some(PoppedTask {
                    task: head,
                    origin: PopOrigin::Sequence(item_id),
                }))
            }
        }
    }

    /// Return a finished task to the queue, per spec.md §4.1's
    /// `push_finished`.
    pub fn push_finished(&self, popped: PoppedTask) {
        let PoppedTask { task, origin } = popped;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.in_progress_count = state.in_progress_count.saturating_sub(1);

        if let PopOrigin::Sequence(item_id) = origin {
            state.in_progress_sequence_items.remove(&item_id);
            let more_remaining = state
                .sequences
                .get(&item_id)
                .map(|q| !q.is_empty())
                .unwrap_or(false);
            if more_remaining {
                state.pending.push_back(PendingItem::Sequence(item_id));
            } else {
                state.sequences.remove(&item_id);
            }
        }

        state.finished.push_back(task);
        drop(state);
        self.condvar.notify_all();
    }

    /// Wait for runnable work or shutdown, per spec.md §4.1's `wait`.
    ///
    /// Bounded so a stopping supervisor is observed promptly (spec.md §5).
    pub fn wait(&self, timeout: Duration) -> Result<(), QueueError> {
        let state = self.lock()?;
        let (_state, _timed_out) = self
            .condvar
            .wait_timeout_while(state, timeout, |s| s.pending.is_empty() && !s.stopping)
            .map_err(|_| QueueError::WaitFailed("condvar wait failed".to_string()))?;
        Ok(())
    }

    /// Drain and return all finished tasks, per spec.md §4.1's
    /// `fetch_finished`.
    pub fn fetch_finished(&self) -> Vec<Task> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.finished.drain(..).collect()
    }

    /// Signal shutdown: every blocked `wait()` wakes up and sees `stopping`.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.stopping = true;
        debug!("task queue shutdown requested");
        drop(state);
        self.condvar.notify_all();
    }

    pub fn is_stopping(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).stopping
    }

    /// Best-effort snapshot: tasks enqueued but not yet handed to a worker,
    /// per spec.md §6/§8 (counts sub-tasks still queued behind an
    /// in-progress sequence head, not just `pending`'s own length).
    pub fn pending_depth(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).pending_depth()
    }

    /// Best-effort snapshot: tasks currently held by a worker.
    pub fn in_progress_count(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .in_progress_count
    }

    /// Tasks finished but not yet drained by `fetch_finished`.
    pub fn finished_depth(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).finished.len()
    }

    /// `(pending_depth, in_progress_count, finished_depth)` read under one
    /// acquisition of `M`, so the three counts describe the same instant.
    /// Reading them through the individual accessors instead would let a
    /// task transit between lanes between calls, making the conservation
    /// property in spec.md §8 ("pending + in_progress + finished-not-yet-
    /// drained equals total enqueued minus total drained") flaky to assert
    /// against while workers are concurrently running.
    pub fn depth_snapshot(&self) -> (usize, usize, usize) {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        (
            state.pending_depth(),
            state.in_progress_count,
            state.finished.len(),
        )
    }

    /// For tests/assertions: are two sub-tasks of the same item ever
    /// in-progress simultaneously? (spec.md §3 invariant 1, §8 property 1.)
    #[cfg(test)]
    fn sequence_in_progress_items(&self) -> HashSet<u64> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .in_progress_sequence_items
            .clone()
    }
}

impl From<QueueError> for shared::error::SchedulerError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::WaitFailed(msg) => shared::error::SchedulerError::WaitFailed(msg),
            QueueError::EmptySequence { item_id } => {
                warn!(item_id, "sequence task popped with empty internal queue");
                shared::error::SchedulerError::EmptySequence { item_id }
            }
        }
    }
}
