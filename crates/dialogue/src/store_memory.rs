//! In-memory dialogue store for tests and single-process runs.

use std::{collections::HashMap, sync::Mutex};

use {async_trait::async_trait, ferry_common::Turn};

use crate::{
    Result,
    store::DialogueStore,
    types::{DialogueConfig, DialogueState, DialogueSummary},
};

pub struct InMemoryStore {
    config: DialogueConfig,
    dialogues: Mutex<HashMap<String, DialogueState>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new(config: DialogueConfig) -> Self {
        Self {
            config,
            dialogues: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl DialogueStore for InMemoryStore {
    async fn get(&self, chat_id: &str, now_ms: u64) -> Result<Option<DialogueState>> {
        let mut dialogues = self.dialogues.lock().unwrap_or_else(|e| e.into_inner());
        if dialogues
            .get(chat_id)
            .is_some_and(|state| state.is_expired(now_ms))
        {
            dialogues.remove(chat_id);
        }
        Ok(dialogues.get(chat_id).cloned())
    }

    async fn append_turn(
        &self,
        chat_id: &str,
        turn: Turn,
        now_ms: u64,
    ) -> Result<DialogueState> {
        let mut dialogues = self.dialogues.lock().unwrap_or_else(|e| e.into_inner());
        let state = dialogues
            .entry(chat_id.to_string())
            .and_modify(|state| {
                // An expired dialogue restarts from scratch.
                if state.is_expired(now_ms) {
                    *state = DialogueState::new(chat_id, now_ms, &self.config);
                }
            })
            .or_insert_with(|| DialogueState::new(chat_id, now_ms, &self.config));
        state.apply_turn(turn, now_ms, &self.config);
        Ok(state.clone())
    }

    async fn sweep_expired(&self, now_ms: u64) -> Result<u64> {
        let mut dialogues = self.dialogues.lock().unwrap_or_else(|e| e.into_inner());
        let before = dialogues.len();
        dialogues.retain(|_, state| !state.is_expired(now_ms));
        Ok((before - dialogues.len()) as u64)
    }

    async fn active_count(&self, now_ms: u64) -> Result<u64> {
        let dialogues = self.dialogues.lock().unwrap_or_else(|e| e.into_inner());
        Ok(dialogues
            .values()
            .filter(|state| !state.is_expired(now_ms))
            .count() as u64)
    }

    async fn summaries(&self, now_ms: u64) -> Result<Vec<DialogueSummary>> {
        let dialogues = self.dialogues.lock().unwrap_or_else(|e| e.into_inner());
        Ok(dialogues
            .values()
            .filter(|state| !state.is_expired(now_ms))
            .map(DialogueSummary::from)
            .collect())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn store(limit: usize, ttl_ms: u64) -> InMemoryStore {
        InMemoryStore::new(DialogueConfig {
            history_limit: limit,
            ttl_ms,
        })
    }

    #[tokio::test]
    async fn test_append_creates_and_updates() {
        let store = store(10, 1_000);
        assert!(store.get("c1", 0).await.unwrap().is_none());

        let state = store
            .append_turn("c1", Turn::user("hi", "m1", 100), 100)
            .await
            .unwrap();
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.expires_at_ms, 1_100);

        let fetched = store.get("c1", 200).await.unwrap().unwrap();
        assert_eq!(fetched.history[0].text, "hi");
    }

    #[tokio::test]
    async fn test_ttl_eviction_on_get_and_sweep() {
        let store = store(10, 1_000);
        store
            .append_turn("c1", Turn::user("hi", "m1", 0), 0)
            .await
            .unwrap();
        store
            .append_turn("c2", Turn::user("yo", "m2", 900), 900)
            .await
            .unwrap();

        // c1 expired at 1_000; c2 lives until 1_900.
        assert!(store.get("c1", 1_500).await.unwrap().is_none());
        assert_eq!(store.active_count(1_500).await.unwrap(), 1);
        assert_eq!(store.sweep_expired(2_000).await.unwrap(), 1);
        assert_eq!(store.active_count(2_000).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_history_bound_keeps_most_recent() {
        let store = store(3, 10_000);
        for i in 0..6u64 {
            store
                .append_turn("c1", Turn::user(format!("t{i}"), format!("m{i}"), i), i)
                .await
                .unwrap();
        }
        let state = store.get("c1", 100).await.unwrap().unwrap();
        let texts: Vec<_> = state.history.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["t3", "t4", "t5"]);
    }

    #[tokio::test]
    async fn test_redelivered_turn_is_deduped() {
        let store = store(10, 10_000);
        store
            .append_turn("c1", Turn::user("hi", "m1", 100), 100)
            .await
            .unwrap();
        let state = store
            .append_turn("c1", Turn::user("hi", "m1", 200), 200)
            .await
            .unwrap();
        assert_eq!(state.history.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_dialogue_restarts_on_append() {
        let store = store(10, 1_000);
        store
            .append_turn("c1", Turn::user("old", "m1", 0), 0)
            .await
            .unwrap();
        let state = store
            .append_turn("c1", Turn::user("new", "m2", 5_000), 5_000)
            .await
            .unwrap();
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history[0].text, "new");
    }

    #[tokio::test]
    async fn test_summaries_skip_expired() {
        let store = store(10, 1_000);
        store
            .append_turn("c1", Turn::user("a", "m1", 0), 0)
            .await
            .unwrap();
        store
            .append_turn("c2", Turn::user("b", "m2", 500), 500)
            .await
            .unwrap();
        let summaries = store.summaries(1_200).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].chat_id, "c2");
        assert_eq!(summaries[0].turns, 1);
    }
}
