//! Keyed per-chat lock with TTL leases.
//!
//! The lock is the ordering mechanism for dialogue mutation: a worker must
//! hold the chat's lease for the whole job (including the responder call)
//! before touching its state. Leases live in the shared backing store, so
//! mutual exclusion holds across worker processes, and the TTL frees a chat
//! whose holder crashed mid-job. Configure the TTL longer than worst-case
//! processing and shorter than the orphan-reap timeout.

use std::time::Duration;

use {async_trait::async_trait, ferry_common::now_ms, tokio_util::sync::CancellationToken};

use crate::Result;

/// How often a blocked acquire re-checks the lease.
const ACQUIRE_POLL_MS: u64 = 100;

#[async_trait]
pub trait ChatLockManager: Send + Sync {
    /// Try to take the lease for `chat_id`. Succeeds when the lease is free,
    /// expired, or already held by `owner` (refreshing its TTL).
    async fn try_acquire(
        &self,
        chat_id: &str,
        owner: &str,
        ttl_ms: u64,
        now_ms: u64,
    ) -> Result<bool>;

    /// Drop the lease if `owner` still holds it. Releasing a lease that
    /// expired and was taken over is a no-op.
    async fn release(&self, chat_id: &str, owner: &str) -> Result<()>;
}

/// Blocking acquire: polls until the lease is taken or `cancel` fires.
/// Returns `false` when cancelled while waiting.
pub async fn acquire(
    locks: &dyn ChatLockManager,
    chat_id: &str,
    owner: &str,
    ttl_ms: u64,
    cancel: &CancellationToken,
) -> Result<bool> {
    loop {
        if locks.try_acquire(chat_id, owner, ttl_ms, now_ms()).await? {
            return Ok(true);
        }
        tokio::select! {
            () = cancel.cancelled() => return Ok(false),
            () = tokio::time::sleep(Duration::from_millis(ACQUIRE_POLL_MS)) => {},
        }
    }
}
