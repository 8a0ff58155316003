use {
    anyhow::{Result, bail},
    ferry_dialogue::DialogueConfig,
    ferry_queue::RetryPolicy,
    serde::Deserialize,
};

/// Tuning knobs for the whole pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Seconds between platform polls.
    pub poll_interval_secs: u64,
    /// Worker pool size.
    pub workers: usize,

    /// Retry ceiling for transient job failures.
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,

    /// Most recent turns kept per dialogue.
    pub history_limit: usize,
    /// Dialogue inactivity TTL.
    pub dialogue_ttl_secs: u64,

    /// Per-chat lock lease TTL. Must exceed worst-case job processing and
    /// stay below the orphan-reap timeout, or a crashed holder could
    /// deadlock its chat until the reaper fires.
    pub lock_ttl_secs: u64,
    /// Jobs stuck in `processing` longer than this are reclaimed.
    pub orphan_timeout_secs: u64,
    /// Seconds between janitor passes.
    pub reap_interval_secs: u64,

    /// Worker sleep when the queue is empty.
    pub idle_poll_ms: u64,
    pub responder_timeout_secs: u64,
    pub send_timeout_secs: u64,

    /// How long terminal jobs are retained (this also bounds the
    /// idempotent-enqueue dedup memory).
    pub completed_retention_secs: u64,
    /// How long shutdown waits for in-flight jobs before aborting workers.
    pub shutdown_grace_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            workers: 4,
            max_attempts: 3,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 60_000,
            history_limit: 20,
            dialogue_ttl_secs: 24 * 60 * 60,
            lock_ttl_secs: 120,
            orphan_timeout_secs: 300,
            reap_interval_secs: 60,
            idle_poll_ms: 1_000,
            responder_timeout_secs: 60,
            send_timeout_secs: 30,
            completed_retention_secs: 3_600,
            shutdown_grace_secs: 30,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        if self.max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be at least 1");
        }
        if self.lock_ttl_secs >= self.orphan_timeout_secs {
            bail!(
                "lock_ttl_secs ({}) must be below orphan_timeout_secs ({})",
                self.lock_ttl_secs,
                self.orphan_timeout_secs
            );
        }
        Ok(())
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_base_ms: self.backoff_base_ms,
            backoff_cap_ms: self.backoff_cap_ms,
        }
    }

    #[must_use]
    pub fn dialogue_config(&self) -> DialogueConfig {
        DialogueConfig {
            history_limit: self.history_limit,
            ttl_ms: self.dialogue_ttl_secs * 1000,
        }
    }
}
