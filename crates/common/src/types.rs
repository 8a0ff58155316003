use serde::{Deserialize, Serialize};

/// One message received from the messenger platform.
///
/// Identity is the platform-assigned `id`; the struct is immutable once
/// observed, and everything downstream (job ids, history dedup) keys off it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    pub chat_id: String,
    pub author_id: String,
    pub text: String,
    pub received_at_ms: u64,
}

/// Who produced a dialogue turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single entry in a dialogue's history.
///
/// `source_id` ties the turn back to the platform message that produced it,
/// so re-appending the same turn on job redelivery is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub at_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

impl Turn {
    #[must_use]
    pub fn user(text: impl Into<String>, source_id: impl Into<String>, at_ms: u64) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            at_ms,
            source_id: Some(source_id.into()),
        }
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>, source_id: impl Into<String>, at_ms: u64) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            at_ms,
            source_id: Some(source_id.into()),
        }
    }
}
