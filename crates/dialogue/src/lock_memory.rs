//! In-memory lease table for tests and single-process runs.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;

use crate::{Result, lock::ChatLockManager};

struct Lease {
    owner: String,
    expires_at_ms: u64,
}

pub struct InMemoryLocks {
    leases: Mutex<HashMap<String, Lease>>,
}

impl InMemoryLocks {
    #[must_use]
    pub fn new() -> Self {
        Self {
            leases: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatLockManager for InMemoryLocks {
    async fn try_acquire(
        &self,
        chat_id: &str,
        owner: &str,
        ttl_ms: u64,
        now_ms: u64,
    ) -> Result<bool> {
        let mut leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(lease) = leases.get(chat_id)
            && lease.owner != owner
            && lease.expires_at_ms > now_ms
        {
            return Ok(false);
        }
        leases.insert(chat_id.to_string(), Lease {
            owner: owner.to_string(),
            expires_at_ms: now_ms + ttl_ms,
        });
        Ok(true)
    }

    async fn release(&self, chat_id: &str, owner: &str) -> Result<()> {
        let mut leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
        if leases.get(chat_id).is_some_and(|lease| lease.owner == owner) {
            leases.remove(chat_id);
        }
        Ok(())
    }
}
