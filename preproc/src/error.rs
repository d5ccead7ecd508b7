//! Error types specific to the queue and worker pool.
//!
//! These cover the infrastructure-failure class from spec.md §7.3/§7.4 —
//! queue synchronization failures and pool construction failures — as
//! distinct from step failures, which are never an `Err` (spec.md §7.1).

use thiserror::Error;

/// Failure internal to [`crate::queue::TaskQueue`], per spec.md §7.2/§7.3.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue's mutex was poisoned by a prior panicking lock holder.
    /// Spec.md models this as the "unrecoverable condition-variable
    /// failure" that isolates to the affected worker (§7.3).
    #[error("task queue wait failed: {0}")]
    WaitFailed(String),

    /// A `SEQUENCE` token was popped but its internal queue was empty.
    /// Reaching this means the token/queue bookkeeping invariant was
    /// violated elsewhere; spec.md §7.2 treats it as a fatal assertion.
    #[error("sequence for item {item_id} has no queued sub-tasks")]
    EmptySequence { item_id: u64 },
}
