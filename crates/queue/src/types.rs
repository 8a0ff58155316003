use {ferry_common::InboundMessage, serde::{Deserialize, Serialize}};

use crate::error::{Error, Result};

/// Processing status of a queued job.
///
/// Transitions are forward-only: `Pending → Processing → {Completed,
/// Failed}`. The only backward edge is `Processing → Pending` via a
/// below-ceiling transient failure or the orphan reaper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::InvalidStatus {
                value: other.to_string(),
            }),
        }
    }
}

/// One unit of queued work, corresponding to one inbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueJob {
    pub job_id: String,
    pub message: InboundMessage,
    pub status: JobStatus,
    pub attempt_count: u32,
    pub enqueued_at_ms: u64,
    pub last_attempt_at_ms: Option<u64>,
    /// Backoff gate: a pending job is claimable only once this has passed.
    pub not_before_ms: u64,
    pub error: Option<String>,
}

impl QueueJob {
    /// Deterministic job id for a platform message id. Re-polling the same
    /// message always derives the same id, which is what makes `enqueue`
    /// idempotent.
    #[must_use]
    pub fn id_for_message(message_id: &str) -> String {
        format!("job:{message_id}")
    }

    #[must_use]
    pub fn from_message(message: InboundMessage, now_ms: u64) -> Self {
        Self {
            job_id: Self::id_for_message(&message.id),
            message,
            status: JobStatus::Pending,
            attempt_count: 0,
            enqueued_at_ms: now_ms,
            last_attempt_at_ms: None,
            not_before_ms: now_ms,
            error: None,
        }
    }
}

/// Outcome of an idempotent enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Inserted,
    AlreadyExists,
}

/// Retry ceiling and exponential backoff parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 60_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given (1-based) attempt becomes claimable again:
    /// `base * 2^(attempt-1)`, capped.
    #[must_use]
    pub fn delay_ms(&self, attempt_count: u32) -> u64 {
        let shift = attempt_count.saturating_sub(1).min(20);
        self.backoff_base_ms
            .saturating_mul(1u64 << shift)
            .min(self.backoff_cap_ms)
    }
}

/// Per-status job counts, the queue side of the monitor read contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueDepth {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}
