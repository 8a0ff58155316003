//! Durable work queue for inbound-message jobs.
//!
//! Jobs move `pending → processing → {completed, failed}`; a transient
//! failure below the attempt ceiling puts the job back to `pending` behind a
//! backoff gate. Job ids derive deterministically from the platform message
//! id, so enqueueing the same message twice is a no-op.

pub mod error;
pub mod store;
pub mod store_memory;
pub mod store_sqlite;
pub mod types;

pub use {
    error::{Error, Result},
    store::QueueStore,
    store_memory::InMemoryStore,
    store_sqlite::SqliteStore,
    types::{EnqueueOutcome, JobStatus, QueueDepth, QueueJob, RetryPolicy},
};
