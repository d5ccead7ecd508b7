//! Error types shared between the scheduler core and any pluggable step
//! implementation.
//!
//! Two error families live here, matching the two places spec.md draws a
//! hard line between "data" and "fault":
//!
//! - [`StepError`] is what a preprocessing step returns when it rejects its
//!   input. It is never a panic and never unwinds; the executor folds it
//!   into a task's [`crate::value::TaskResult`] as a normal outcome.
//! - [`SchedulerError`] covers the small set of conditions spec.md calls
//!   "programming errors" (fatal assertions) or infrastructure failures
//!   (condition-variable wait failure). These propagate to the owning
//!   worker's exit path, never into a task's result.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias used throughout the shared crate, matching the
/// convention used across the rest of this workspace.
pub type Result<T> = anyhow::Result<T>;

/// Error produced by a single pluggable preprocessing step.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[error("step {step_index} ({step_kind}) failed: {message}")]
pub struct StepError {
    /// Index of the failing step within its task's step list.
    pub step_index: usize,
    /// Opaque name of the step kind that failed, for diagnostics.
    pub step_kind: String,
    /// Human-readable failure reason.
    pub message: String,
}

impl StepError {
    pub fn new(step_index: usize, step_kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            step_index,
            step_kind: step_kind.into(),
            message: message.into(),
        }
    }
}

/// Fatal or infrastructure-level scheduler errors.
///
/// None of these are raised by a misbehaving preprocessing step — that
/// class of failure is [`StepError`] and is carried as data, not propagated
/// as a `Result::Err`.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A `SEQUENCE` task was handed to a worker with an empty internal
    /// queue. Constructing the queue correctly makes this unreachable in
    /// practice; it is kept as a fatal assertion per spec.md §7.2.
    #[error("sequence task for item {item_id} has no sub-tasks")]
    EmptySequence { item_id: u64 },

    /// A `DEPENDENT` task was handed to a worker whose primary reference
    /// could not be resolved. Per spec.md §7.2, this is a programming error.
    #[error("dependent task for item {item_id} has no primary task")]
    MissingPrimary { item_id: u64 },

    /// The queue's mutex was found poisoned by a prior panicking lock
    /// holder. Spec.md §4.1/§7.3 models this as the condition-variable
    /// "unrecoverable" wait failure: it isolates to the affected worker,
    /// which logs and self-deregisters rather than propagating further.
    #[error("task queue lock poisoned: {0}")]
    WaitFailed(String),
}
