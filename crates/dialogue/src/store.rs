//! Persistence trait for dialogue state.

use {async_trait::async_trait, ferry_common::Turn};

use crate::{
    Result,
    types::{DialogueState, DialogueSummary},
};

/// Keyed dialogue state with TTL expiry.
///
/// Mutation is not internally serialized per chat: the worker pool holds the
/// per-chat lock (see [`crate::lock`]) around every `append_turn`, which is
/// what keeps read-modify-write backends correct across processes.
#[async_trait]
pub trait DialogueStore: Send + Sync {
    /// Fetch a dialogue. Expired entries are reported as absent.
    async fn get(&self, chat_id: &str, now_ms: u64) -> Result<Option<DialogueState>>;

    /// Append a turn, creating the dialogue if absent. Refreshes the expiry
    /// and trims history to the configured bound. Idempotent per
    /// `(chat_id, turn.source_id)`. Returns the updated state.
    async fn append_turn(&self, chat_id: &str, turn: Turn, now_ms: u64)
    -> Result<DialogueState>;

    /// Remove expired dialogues, returning how many were dropped.
    async fn sweep_expired(&self, now_ms: u64) -> Result<u64>;

    /// Count of live, non-expired dialogues.
    async fn active_count(&self, now_ms: u64) -> Result<u64>;

    /// Digests of live dialogues, for the external monitor.
    async fn summaries(&self, now_ms: u64) -> Result<Vec<DialogueSummary>>;
}
