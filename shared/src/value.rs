//! The sample/result value model shared by every task kind.
//!
//! Mirrors spec.md §3 ("Value" / "Result") directly: a discriminated sample
//! type, a post-pipeline result carrying an optional error and a disposition
//! flag, and the `(value, timestamp)` pair the value cache stores.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::StepError;
use crate::utils::current_timestamp;

/// Seconds since the Unix epoch. A newtype rather than a bare `u64` so that
/// "timestamp" and "item_id" (also a `u64` in spec.md) can never be
/// transposed by accident at a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn now() -> Self {
        Timestamp(current_timestamp())
    }
}

/// A single text log entry plus whatever structured metadata the source
/// attached to it (facility, severity, source file — left opaque since the
/// concrete log-parsing step implementations are out of scope per spec.md
/// §1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LogValue {
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

/// A discriminated sample, per spec.md §3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Value {
    Numeric(f64),
    Unsigned(u64),
    Text(String),
    Log(LogValue),
    /// "none/error" — an item produced no usable sample this cycle.
    None,
}

impl Value {
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }
}

/// A `(value, timestamp)` pair — what flows between pipeline steps and what
/// the value cache stores per item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedValue {
    pub value: Value,
    pub timestamp: Timestamp,
}

impl TimedValue {
    pub fn new(value: Value, timestamp: Timestamp) -> Self {
        Self { value, timestamp }
    }
}

/// Disposition of a finished task's result, per spec.md §3.
///
/// Kept as its own enum rather than a `success: bool` because "discarded by
/// throttling" and "step error" must be distinguishable: the former leaves
/// the value cache untouched per spec.md §3 invariant 4 and §9, the latter
/// is a reportable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    Normal,
    NotSupported,
    Discarded,
}

/// Post-pipeline result, per spec.md §3 ("Result").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub value: Option<TimedValue>,
    pub disposition: Disposition,
    pub error: Option<StepError>,
}

impl TaskResult {
    pub fn normal(value: TimedValue) -> Self {
        Self {
            value: Some(value),
            disposition: Disposition::Normal,
            error: None,
        }
    }

    pub fn discarded() -> Self {
        Self {
            value: None,
            disposition: Disposition::Discarded,
            error: None,
        }
    }

    pub fn not_supported(error: StepError) -> Self {
        Self {
            value: None,
            disposition: Disposition::NotSupported,
            error: Some(error),
        }
    }

    /// Whether the cache (and any dependent fanout) should observe this
    /// result, per spec.md §3 invariant 4: writes happen only after a
    /// successful pipeline, never for a discard or an error.
    pub fn is_cacheable(&self) -> bool {
        self.disposition == Disposition::Normal && self.value.is_some()
    }
}
