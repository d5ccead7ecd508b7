//! Bounded, LRU-evicted value cache, per spec.md §3 ("Value cache") and §5.
//!
//! Mutated under its own lock, separate from the task queue's `M` (spec.md
//! §5: "The value cache: mutated under its own finer-grained lock by the
//! step executor at the end of a pipeline; reads by dependents acquire the
//! same lock briefly."). Per-item write ordering is guaranteed upstream by
//! the queue's SEQUENCE mechanism (spec.md §3 invariant 1), not by this
//! type — the lock here only protects the map's own internal consistency,
//! per spec.md's "readers see either an entry or absence, never a partially
//! written one."

use std::collections::HashMap;
use std::sync::Mutex;

use shared::cache::CacheSink;
use shared::value::TimedValue;
use tracing::debug;

struct Inner {
    capacity: usize,
    entries: HashMap<u64, TimedValue>,
    /// Most-recently-used item_id at the back. A `Vec` is adequate for the
    /// capacities this cache is configured with (spec.md gives no target
    /// size; thousands of items is the expected order of magnitude) —
    /// correctness over a fancier intrusive-list LRU.
    recency: Vec<u64>,
}

impl Inner {
    fn touch(&mut self, item_id: u64) {
        if let Some(pos) = self.recency.iter().position(|&id| id == item_id) {
            self.recency.remove(pos);
        }
        self.recency.push(item_id);
    }

    fn evict_if_over_capacity(&mut self) {
        while self.entries.len() > self.capacity {
            if self.recency.is_empty() {
                break;
            }
            let lru_id = self.recency.remove(0);
            self.entries.remove(&lru_id);
            debug!(item_id = lru_id, "value cache evicted entry (LRU)");
        }
    }
}

/// Bounded mapping `item_id -> (value, timestamp)`, per spec.md §3.
pub struct ValueCache {
    inner: Mutex<Inner>,
}

impl ValueCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                capacity: capacity.max(1),
                entries: HashMap::new(),
                recency: Vec::new(),
            }),
        }
    }

    /// Read the current entry for `item_id`, if any.
    pub fn get(&self, item_id: u64) -> Option<TimedValue> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let value = inner.entries.get(&item_id).cloned();
        if value.is_some() {
            inner.touch(item_id);
        }
        value
    }

    /// Current number of entries, for observability.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheSink for ValueCache {
    fn store(&self, item_id: u64, value: TimedValue) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.insert(item_id, value);
        inner.touch(item_id);
        inner.evict_if_over_capacity();
    }
}
