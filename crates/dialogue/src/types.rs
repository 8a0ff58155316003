use {ferry_common::Turn, serde::{Deserialize, Serialize}};

/// History bound and inactivity TTL for dialogue state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DialogueConfig {
    /// Most recent turns kept per dialogue; older ones are trimmed FIFO.
    pub history_limit: usize,
    pub ttl_ms: u64,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            history_limit: 20,
            ttl_ms: 24 * 60 * 60 * 1000,
        }
    }
}

/// State of one ongoing conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueState {
    pub chat_id: String,
    pub history: Vec<Turn>,
    pub last_activity_at_ms: u64,
    pub expires_at_ms: u64,
}

impl DialogueState {
    #[must_use]
    pub fn new(chat_id: impl Into<String>, now_ms: u64, config: &DialogueConfig) -> Self {
        Self {
            chat_id: chat_id.into(),
            history: Vec::new(),
            last_activity_at_ms: now_ms,
            expires_at_ms: now_ms + config.ttl_ms,
        }
    }

    #[must_use]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms <= now_ms
    }

    /// Append a turn, trim the history to the configured bound (oldest out
    /// first), and refresh the expiry. A turn whose `source_id` is already in
    /// the history is dropped, so redelivered jobs re-append without creating
    /// duplicate entries. Returns whether the turn was actually added.
    pub fn apply_turn(&mut self, turn: Turn, now_ms: u64, config: &DialogueConfig) -> bool {
        if let Some(source_id) = turn.source_id.as_deref()
            && self
                .history
                .iter()
                .any(|t| t.source_id.as_deref() == Some(source_id))
        {
            return false;
        }

        self.history.push(turn);
        if self.history.len() > config.history_limit {
            let overflow = self.history.len() - config.history_limit;
            self.history.drain(..overflow);
        }
        self.last_activity_at_ms = now_ms;
        self.expires_at_ms = now_ms + config.ttl_ms;
        true
    }
}

/// Read-only dialogue digest for the external monitor.
#[derive(Debug, Clone, Serialize)]
pub struct DialogueSummary {
    pub chat_id: String,
    pub turns: usize,
    pub last_activity_at_ms: u64,
    pub expires_at_ms: u64,
}

impl From<&DialogueState> for DialogueSummary {
    fn from(state: &DialogueState) -> Self {
        Self {
            chat_id: state.chat_id.clone(),
            turns: state.history.len(),
            last_activity_at_ms: state.last_activity_at_ms,
            expires_at_ms: state.expires_at_ms,
        }
    }
}
