//! The task model, per spec.md §3.
//!
//! `Task` is a tagged variant: the tag is [`TaskKind`]'s discriminant, one of
//! `{TEST, VALUE, VALUE_SEQ, DEPENDENT, SEQUENCE}`. Rather than a bare tag
//! field plus a loosely-typed payload (the C-derived shape spec.md
//! describes), the Rust rendering folds tag and payload into one enum so
//! that e.g. a `Test` task can never be constructed without its step list —
//! the illegal states spec.md's §7.2 calls "programming errors" (an empty
//! sequence, a dependent with no primary) are the only ones left that the
//! type system can't rule out by construction, and those are exactly the
//! ones §7.2 says should be fatal assertions.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use crate::cache::CacheSink;
use crate::steps::Step;
use crate::value::{TaskResult, TimedValue};

/// The step list plus the input a VALUE/VALUE_SEQ/DEPENDENT pipeline runs
/// against. Pulled out of `ValuePayload` so that a `DEPENDENT` task can hold
/// an `Arc` to the exact same job its primary owns, per spec.md §3: "The
/// primary owns the step list and input; the dependent runs the primary's
/// pipeline exactly once on behalf of a family of derived items."
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineJob {
    pub steps: Vec<Step>,
    pub input: TimedValue,
}

impl PipelineJob {
    pub fn new(steps: Vec<Step>, input: TimedValue) -> Self {
        Self { steps, input }
    }
}

/// Payload shared by VALUE and VALUE_SEQ tasks (spec.md §3: "identical
/// payload to VALUE, distinguished only by tag").
pub struct ValuePayload {
    pub job: Arc<PipelineJob>,
    /// Optional cache reference. spec.md §9's open question leaves the rule
    /// for "when callers pass a cache" unspecified; the cache is opt-in per
    /// task instance, as that section recommends.
    pub cache: Option<Arc<dyn CacheSink>>,
}

impl ValuePayload {
    pub fn new(job: PipelineJob, cache: Option<Arc<dyn CacheSink>>) -> Self {
        Self {
            job: Arc::new(job),
            cache,
        }
    }
}

impl fmt::Debug for ValuePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValuePayload")
            .field("job", &self.job)
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

/// Payload for a TEST task: a pipeline plus a caller-visible record of each
/// step's post-state, used by "test this pipeline" UI flows (spec.md §3).
#[derive(Debug, Clone, PartialEq)]
pub struct TestPayload {
    pub job: PipelineJob,
    /// Intermediate per-step outputs, populated by the executor as the
    /// pipeline runs. Empty until the task has been executed.
    pub per_step_results: Vec<TimedValue>,
}

impl TestPayload {
    pub fn new(job: PipelineJob) -> Self {
        Self {
            job,
            per_step_results: Vec::new(),
        }
    }
}

/// Payload for a DEPENDENT task: a strong reference to the primary's
/// pipeline job plus the dependent's own cache reference (spec.md §3/§4.2 —
/// "the dependent's own item_id is used only for cache placement, not for
/// step input").
pub struct DependentPayload {
    pub primary: Arc<PipelineJob>,
    pub cache: Option<Arc<dyn CacheSink>>,
}

impl DependentPayload {
    pub fn new(primary: Arc<PipelineJob>, cache: Option<Arc<dyn CacheSink>>) -> Self {
        Self { primary, cache }
    }
}

impl fmt::Debug for DependentPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependentPayload")
            .field("primary", &self.primary)
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

/// Payload for a SEQUENCE task: the internal, ordered queue of sub-tasks for
/// one `item_id` (spec.md §3/§4.1). Never constructed by external callers —
/// only produced internally by the queue's VALUE_SEQ collapsing logic.
#[derive(Debug, Default)]
pub struct SequencePayload {
    pub sub_tasks: VecDeque<Task>,
}

impl SequencePayload {
    pub fn new() -> Self {
        Self {
            sub_tasks: VecDeque::new(),
        }
    }
}

/// The tagged variant itself.
#[derive(Debug)]
pub enum TaskKind {
    Test(TestPayload),
    Value(ValuePayload),
    ValueSeq(ValuePayload),
    Dependent(DependentPayload),
    Sequence(SequencePayload),
}

impl TaskKind {
    /// Short, stable name for logging — matches the tag names spec.md uses.
    pub fn tag(&self) -> &'static str {
        match self {
            TaskKind::Test(_) => "TEST",
            TaskKind::Value(_) => "VALUE",
            TaskKind::ValueSeq(_) => "VALUE_SEQ",
            TaskKind::Dependent(_) => "DEPENDENT",
            TaskKind::Sequence(_) => "SEQUENCE",
        }
    }

    /// Whether this task kind participates in the per-item ordered stream
    /// (spec.md §3 invariant 1, §5).
    pub fn is_ordered(&self) -> bool {
        matches!(self, TaskKind::ValueSeq(_) | TaskKind::Sequence(_))
    }
}

/// A scheduled unit of work, per spec.md §3.
#[derive(Debug)]
pub struct Task {
    pub item_id: u64,
    pub kind: TaskKind,
    /// Populated once the step executor has run this task's pipeline.
    /// `None` until then; always `Some` by the time a task reaches
    /// `fetch_finished` (spec.md §6).
    pub result: Option<TaskResult>,
}

impl Task {
    pub fn new(item_id: u64, kind: TaskKind) -> Self {
        Self {
            item_id,
            kind,
            result: None,
        }
    }

    pub fn test(item_id: u64, job: PipelineJob) -> Self {
        Self::new(item_id, TaskKind::Test(TestPayload::new(job)))
    }

    pub fn value(item_id: u64, job: PipelineJob, cache: Option<Arc<dyn CacheSink>>) -> Self {
        Self::new(item_id, TaskKind::Value(ValuePayload::new(job, cache)))
    }

    pub fn value_seq(item_id: u64, job: PipelineJob, cache: Option<Arc<dyn CacheSink>>) -> Self {
        Self::new(item_id, TaskKind::ValueSeq(ValuePayload::new(job, cache)))
    }

    pub fn dependent(
        item_id: u64,
        primary: Arc<PipelineJob>,
        cache: Option<Arc<dyn CacheSink>>,
    ) -> Self {
        Self::new(
            item_id,
            TaskKind::Dependent(DependentPayload::new(primary, cache)),
        )
    }

    pub fn tag(&self) -> &'static str {
        self.kind.tag()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Timestamp, Value};

    fn job() -> PipelineJob {
        PipelineJob::new(vec![], TimedValue::new(Value::Numeric(1.0), Timestamp(0)))
    }

    #[test]
    fn value_task_has_value_tag() {
        let task = Task::value(7, job(), None);
        assert_eq!(task.tag(), "VALUE");
        assert!(!task.kind.is_ordered());
    }

    #[test]
    fn value_seq_task_is_ordered() {
        let task = Task::value_seq(7, job(), None);
        assert_eq!(task.tag(), "VALUE_SEQ");
        assert!(task.kind.is_ordered());
    }

    #[test]
    fn dependent_task_shares_primary_job_without_cloning_input() {
        let primary = Arc::new(job());
        let task = Task::dependent(8, Arc::clone(&primary), None);
        if let TaskKind::Dependent(payload) = &task.kind {
            assert!(Arc::ptr_eq(&payload.primary, &primary));
        } else {
            panic!("expected Dependent");
        }
    }

    #[test]
    fn sequence_payload_starts_empty() {
        let payload = SequencePayload::new();
        assert!(payload.sub_tasks.is_empty());
    }
}
