//! Shared data model for the preprocessing task scheduler.
//!
//! This crate holds everything that crosses the boundary between the
//! scheduler core (`preproc`) and whatever supervises it: task records,
//! the value/result model, and the two pluggable contracts (step registry,
//! cache sink) that keep the scheduler decoupled from concrete step
//! implementations and from its own cache's storage policy.
//!
//! There is no threading and no locking in this crate — just types.

pub mod cache;
pub mod error;
pub mod steps;
pub mod task;
pub mod utils;
pub mod value;

// Re-export commonly used types for convenience
pub use cache::CacheSink;
pub use error::{SchedulerError, StepError};
pub use steps::{Step, StepEvaluator, StepOutcome, StepParams, StepRegistry};
pub use task::{
    DependentPayload, PipelineJob, SequencePayload, Task, TaskKind, TestPayload, ValuePayload,
};
pub use value::{Disposition, LogValue, TaskResult, TimedValue, Timestamp, Value};

/// Result type alias used throughout the shared crate.
pub type Result<T> = anyhow::Result<T>;
