//! Concurrency core of the preprocessing task scheduler: a bounded value
//! cache, a lock-and-condvar task queue, a step executor, a fixed worker
//! pool, and the `Manager` surface an embedding supervisor drives.
//!
//! See `shared` for the data model (`Task`, `TaskKind`, `Value`, steps).

pub mod cache;
pub mod config;
pub mod error;
pub mod executor;
pub mod manager;
pub mod queue;
pub mod timekeeper;
pub mod worker;

pub use cache::ValueCache;
pub use config::WorkerPoolConfig;
pub use error::QueueError;
pub use executor::ExecutionContext;
pub use manager::Manager;
pub use queue::{PoppedTask, TaskQueue};
pub use timekeeper::{Timekeeper, WorkerState, WorkerStatus};
pub use worker::WorkerPool;
