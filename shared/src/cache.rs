//! The write side of the value cache, as seen from task payloads.
//!
//! The value cache itself (bounded, LRU-evicted, mutex-guarded) is an
//! implementation living in the `preproc` crate — it needs a worker pool and
//! a capacity policy around it that this crate has no business knowing
//! about. What `shared` needs is only the narrow capability spec.md's VALUE
//! and DEPENDENT payloads actually use: "write `(item_id, final value,
//! timestamp)` into the cache" (§4.2). Expressing that as a trait here keeps
//! `Task` decoupled from the concrete cache type, the same way the step
//! registry (`steps.rs`) keeps `Task` decoupled from concrete step kinds.

use crate::value::TimedValue;

/// A sink a finished VALUE/VALUE_SEQ/DEPENDENT pipeline writes its result
/// into. Implemented by `preproc::cache::ValueCache`.
pub trait CacheSink: Send + Sync {
    /// Overwrite the entry for `item_id` with `value`, per spec.md §3's
    /// "exactly one" cache-write invariant. Must never be called for a
    /// discarded or errored result (spec.md §3 invariant 4) — callers, not
    /// implementations, are responsible for that check.
    fn store(&self, item_id: u64, value: TimedValue);
}
