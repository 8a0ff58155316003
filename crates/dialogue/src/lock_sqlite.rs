//! SQLite-backed lease table. The conditional upsert is a single statement,
//! so takeover of an expired lease is atomic across processes sharing the
//! database.

use {async_trait::async_trait, sqlx::SqlitePool};

use crate::{Result, lock::ChatLockManager};

pub struct SqliteLocks {
    pool: SqlitePool,
}

impl SqliteLocks {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the lock schema.
    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chat_locks (
                chat_id       TEXT    PRIMARY KEY,
                owner         TEXT    NOT NULL,
                expires_at_ms INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ChatLockManager for SqliteLocks {
    async fn try_acquire(
        &self,
        chat_id: &str,
        owner: &str,
        ttl_ms: u64,
        now_ms: u64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO chat_locks (chat_id, owner, expires_at_ms)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(chat_id) DO UPDATE SET
                 owner = excluded.owner,
                 expires_at_ms = excluded.expires_at_ms
             WHERE chat_locks.owner = excluded.owner
                OR chat_locks.expires_at_ms <= ?4",
        )
        .bind(chat_id)
        .bind(owner)
        .bind((now_ms + ttl_ms) as i64)
        .bind(now_ms as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn release(&self, chat_id: &str, owner: &str) -> Result<()> {
        sqlx::query("DELETE FROM chat_locks WHERE chat_id = ? AND owner = ?")
            .bind(chat_id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
