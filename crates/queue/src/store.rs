//! Persistence trait for the work queue.

use async_trait::async_trait;

use crate::{
    Result,
    types::{EnqueueOutcome, JobStatus, QueueDepth, QueueJob, RetryPolicy},
};

/// Shared coordination point between the collector and the worker pool.
///
/// Implementations must be safe under concurrent callers from multiple
/// processes: `claim` hands a given job to exactly one caller, and `enqueue`
/// is idempotent by `job_id`. Callers pass `now_ms` explicitly so backoff and
/// reaping stay deterministic under test.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Insert a job unless one with the same id already exists.
    async fn enqueue(&self, job: &QueueJob) -> Result<EnqueueOutcome>;

    /// Atomically claim the oldest claimable pending job: flips it to
    /// `processing`, stamps `last_attempt_at_ms`, increments `attempt_count`.
    async fn claim(&self, now_ms: u64) -> Result<Option<QueueJob>>;

    /// Mark a processing job as completed.
    async fn complete(&self, job_id: &str) -> Result<()>;

    /// Record a transient failure. Below the ceiling the job goes back to
    /// `pending` behind the policy's backoff delay; at the ceiling it becomes
    /// terminal `failed`. Returns the resulting status.
    async fn fail(
        &self,
        job_id: &str,
        error: &str,
        now_ms: u64,
        policy: &RetryPolicy,
    ) -> Result<JobStatus>;

    /// Record a permanent failure: terminal `failed` immediately, without
    /// consuming retry budget.
    async fn fail_permanent(&self, job_id: &str, error: &str) -> Result<()>;

    /// Return jobs stuck in `processing` longer than `stuck_for_ms` to
    /// `pending`. This is the crash-recovery path: it trades possible
    /// duplicate processing for no lost jobs.
    async fn reap_orphans(&self, stuck_for_ms: u64, now_ms: u64) -> Result<u64>;

    /// Drop terminal jobs older than the retention window. Retention also
    /// bounds how long the idempotent-enqueue dedup memory lasts.
    async fn purge_terminal(&self, retention_ms: u64, now_ms: u64) -> Result<u64>;

    /// Per-status job counts.
    async fn depth(&self) -> Result<QueueDepth>;

    /// Fetch a job by id.
    async fn get(&self, job_id: &str) -> Result<Option<QueueJob>>;
}
