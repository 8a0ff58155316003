//! Per-dialogue conversation state with TTL expiry and bounded history,
//! plus the keyed per-chat lock that serializes workers touching the same
//! dialogue.

pub mod error;
pub mod lock;
pub mod lock_memory;
pub mod lock_sqlite;
pub mod store;
pub mod store_memory;
pub mod store_sqlite;
pub mod types;

pub use {
    error::{Error, Result},
    lock::ChatLockManager,
    lock_memory::InMemoryLocks,
    lock_sqlite::SqliteLocks,
    store::DialogueStore,
    store_memory::InMemoryStore,
    store_sqlite::SqliteStore,
    types::{DialogueConfig, DialogueState, DialogueSummary},
};
