//! SQLite-backed dialogue store using sqlx. State is stored as one JSON row
//! per chat, mirroring how the queue stores its message payloads.

use {
    async_trait::async_trait,
    ferry_common::Turn,
    sqlx::{Row, SqlitePool},
};

use crate::{
    Result,
    store::DialogueStore,
    types::{DialogueConfig, DialogueState, DialogueSummary},
};

pub struct SqliteStore {
    pool: SqlitePool,
    config: DialogueConfig,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, config: DialogueConfig) -> Self {
        Self { pool, config }
    }

    /// Initialize the dialogue schema.
    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS dialogues (
                chat_id             TEXT    PRIMARY KEY,
                data                TEXT    NOT NULL,
                last_activity_at_ms INTEGER NOT NULL,
                expires_at_ms       INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_dialogues_expiry
             ON dialogues (expires_at_ms)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    async fn load_live(&self, chat_id: &str, now_ms: u64) -> Result<Option<DialogueState>> {
        let row = sqlx::query("SELECT data, expires_at_ms FROM dialogues WHERE chat_id = ?")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        if row.get::<i64, _>("expires_at_ms") as u64 <= now_ms {
            return Ok(None);
        }
        let data: String = row.get("data");
        Ok(Some(serde_json::from_str(&data)?))
    }

    async fn save(&self, state: &DialogueState) -> Result<()> {
        let data = serde_json::to_string(state)?;
        sqlx::query(
            "INSERT INTO dialogues (chat_id, data, last_activity_at_ms, expires_at_ms)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(chat_id) DO UPDATE SET
                 data = excluded.data,
                 last_activity_at_ms = excluded.last_activity_at_ms,
                 expires_at_ms = excluded.expires_at_ms",
        )
        .bind(&state.chat_id)
        .bind(&data)
        .bind(state.last_activity_at_ms as i64)
        .bind(state.expires_at_ms as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl DialogueStore for SqliteStore {
    async fn get(&self, chat_id: &str, now_ms: u64) -> Result<Option<DialogueState>> {
        let state = self.load_live(chat_id, now_ms).await?;
        if state.is_none() {
            // Drop an expired row on access; the sweep catches the rest.
            sqlx::query("DELETE FROM dialogues WHERE chat_id = ? AND expires_at_ms <= ?")
                .bind(chat_id)
                .bind(now_ms as i64)
                .execute(&self.pool)
                .await?;
        }
        Ok(state)
    }

    async fn append_turn(
        &self,
        chat_id: &str,
        turn: Turn,
        now_ms: u64,
    ) -> Result<DialogueState> {
        // Read-modify-write; the caller's per-chat lock makes this safe.
        let mut state = self
            .load_live(chat_id, now_ms)
            .await?
            .unwrap_or_else(|| DialogueState::new(chat_id, now_ms, &self.config));
        state.apply_turn(turn, now_ms, &self.config);
        self.save(&state).await?;
        Ok(state)
    }

    async fn sweep_expired(&self, now_ms: u64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM dialogues WHERE expires_at_ms <= ?")
            .bind(now_ms as i64)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn active_count(&self, now_ms: u64) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM dialogues WHERE expires_at_ms > ?")
            .bind(now_ms as i64)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n") as u64)
    }

    async fn summaries(&self, now_ms: u64) -> Result<Vec<DialogueSummary>> {
        let rows = sqlx::query("SELECT data FROM dialogues WHERE expires_at_ms > ?")
            .bind(now_ms as i64)
            .fetch_all(&self.pool)
            .await?;
        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let data: String = row.get("data");
            let state: DialogueState = serde_json::from_str(&data)?;
            summaries.push(DialogueSummary::from(&state));
        }
        Ok(summaries)
    }
}
