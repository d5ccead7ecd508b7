//! The step executor, per spec.md §4.2.
//!
//! Drives a task's step list against the pluggable step registry, in order,
//! short-circuiting on the first discard or error. `ExecutionContext` is the
//! per-worker scratch area spec.md asks for ("buffer reuse, step-registry
//! handles. It is never shared between workers.") — here that's just a
//! borrowed registry reference, since this implementation has no reusable
//! buffers yet worth pooling; the type exists so a worker can thread
//! whatever per-thread state it needs through `execute` without the
//! executor itself holding any.

use shared::cache::CacheSink;
use shared::error::StepError;
use shared::steps::{StepOutcome, StepRegistry};
use shared::task::{PipelineJob, Task, TaskKind};
use shared::value::{Disposition, TaskResult, TimedValue};
use std::sync::Arc;
use tracing::error;

/// Per-worker scratch area threaded through every `execute` call on that
/// worker's thread. Never shared across workers (spec.md §4.2).
pub struct ExecutionContext<'a> {
    pub registry: &'a dyn StepRegistry,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(registry: &'a dyn StepRegistry) -> Self {
        Self { registry }
    }
}

enum PipelineOutcome {
    Normal(TimedValue),
    Discard,
    Error(StepError),
}

fn run_pipeline(
    job: &PipelineJob,
    ctx: &ExecutionContext<'_>,
    mut record_step: Option<&mut Vec<TimedValue>>,
) -> PipelineOutcome {
    let mut current = job.input.clone();

    for (index, step) in job.steps.iter().enumerate() {
        let Some(evaluator) = ctx.registry.lookup(&step.kind) else {
            return PipelineOutcome::Error(StepError::new(
                index,
                step.kind.clone(),
                format!("no step evaluator registered for kind '{}'", step.kind),
            ));
        };

        match evaluator.evaluate(&current, &step.params) {
            StepOutcome::Next(next) => {
                current = next.clone();
                if let Some(record) = record_step.as_deref_mut() {
                    record.push(next);
                }
            }
            StepOutcome::Discard => return PipelineOutcome::Discard,
            StepOutcome::Error(message) => {
                return PipelineOutcome::Error(StepError::new(index, step.kind.clone(), message))
            }
        }
    }

    PipelineOutcome::Normal(current)
}

fn outcome_to_result(outcome: PipelineOutcome) -> TaskResult {
    match outcome {
        PipelineOutcome::Normal(value) => TaskResult::normal(value),
        PipelineOutcome::Discard => TaskResult::discarded(),
        PipelineOutcome::Error(err) => {
            error!(step_index = err.step_index, step_kind = %err.step_kind, "step failed: {}", err.message);
            TaskResult::not_supported(err)
        }
    }
}

fn write_cache_if_cacheable(cache: &Option<Arc<dyn CacheSink>>, item_id: u64, result: &TaskResult) {
    if result.is_cacheable() {
        if let (Some(sink), Some(value)) = (cache, &result.value) {
            sink.store(item_id, value.clone());
        }
    }
}

/// Execute a single task's pipeline, filling in its `result` (and, for TEST
/// tasks, its `per_step_results`), per spec.md §4.2.
///
/// # Panics
///
/// Panics if handed a `TaskKind::Sequence` — the queue never dispatches one
/// for execution (see `queue.rs`); a `SEQUENCE` reaching here is a
/// programming error.
pub fn execute(task: &mut Task, ctx: &ExecutionContext<'_>) {
    let item_id = task.item_id;

    match &mut task.kind {
        TaskKind::Test(payload) => {
            let mut recorded = Vec::with_capacity(payload.job.steps.len());
            let outcome = run_pipeline(&payload.job, ctx, Some(&mut recorded));
            payload.per_step_results = recorded;
            task.result = Some(outcome_to_result(outcome));
        }
        TaskKind::Value(payload) | TaskKind::ValueSeq(payload) => {
            let outcome = run_pipeline(&payload.job, ctx, None);
            let result = outcome_to_result(outcome);
            write_cache_if_cacheable(&payload.cache, item_id, &result);
            task.result = Some(result);
        }
        TaskKind::Dependent(payload) => {
            // The dependent's own item_id is used only for cache placement,
            // never as the pipeline's input (spec.md §4.2).
            let job = PipelineJob::new(payload.primary.steps.clone(), payload.primary.input.clone());
            let outcome = run_pipeline(&job, ctx, None);
            let result = outcome_to_result(outcome);
            write_cache_if_cacheable(&payload.cache, item_id, &result);
            task.result = Some(result);
        }
        TaskKind::Sequence(_) => {
            panic!("SEQUENCE tasks are never dispatched to the executor directly");
        }
    }
}
