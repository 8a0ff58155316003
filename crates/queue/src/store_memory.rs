//! In-memory queue backed by `HashMap`. No durability; for tests and
//! single-process runs.

use std::{
    collections::HashMap,
    sync::Mutex,
};

use async_trait::async_trait;

use crate::{
    error::Error,
    Result,
    store::QueueStore,
    types::{EnqueueOutcome, JobStatus, QueueDepth, QueueJob, RetryPolicy},
};

struct Inner {
    jobs: HashMap<String, QueueJob>,
    /// Enqueue order; `claim` scans this front-to-back so FIFO holds even
    /// when several jobs share an enqueue timestamp.
    order: Vec<String>,
}

pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                jobs: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueStore for InMemoryStore {
    async fn enqueue(&self, job: &QueueJob) -> Result<EnqueueOutcome> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.jobs.contains_key(&job.job_id) {
            return Ok(EnqueueOutcome::AlreadyExists);
        }
        inner.order.push(job.job_id.clone());
        inner.jobs.insert(job.job_id.clone(), job.clone());
        Ok(EnqueueOutcome::Inserted)
    }

    async fn claim(&self, now_ms: u64) -> Result<Option<QueueJob>> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let Inner { jobs, order } = &mut *inner;
        for id in order.iter() {
            if let Some(job) = jobs.get_mut(id)
                && job.status == JobStatus::Pending
                && job.not_before_ms <= now_ms
            {
                job.status = JobStatus::Processing;
                job.attempt_count += 1;
                job.last_attempt_at_ms = Some(now_ms);
                return Ok(Some(job.clone()));
            }
        }
        Ok(None)
    }

    async fn complete(&self, job_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let job = inner
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| Error::job_not_found(job_id))?;
        if job.status != JobStatus::Processing {
            return Err(Error::message(format!(
                "cannot complete job {job_id} in status {}",
                job.status.as_str()
            )));
        }
        job.status = JobStatus::Completed;
        Ok(())
    }

    async fn fail(
        &self,
        job_id: &str,
        error: &str,
        now_ms: u64,
        policy: &RetryPolicy,
    ) -> Result<JobStatus> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let job = inner
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| Error::job_not_found(job_id))?;
        job.error = Some(error.to_string());
        if job.attempt_count >= policy.max_attempts {
            job.status = JobStatus::Failed;
        } else {
            job.status = JobStatus::Pending;
            job.not_before_ms = now_ms + policy.delay_ms(job.attempt_count);
        }
        Ok(job.status)
    }

    async fn fail_permanent(&self, job_id: &str, error: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let job = inner
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| Error::job_not_found(job_id))?;
        job.status = JobStatus::Failed;
        job.error = Some(error.to_string());
        Ok(())
    }

    async fn reap_orphans(&self, stuck_for_ms: u64, now_ms: u64) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let cutoff = now_ms.saturating_sub(stuck_for_ms);
        let mut reaped = 0;
        for job in inner.jobs.values_mut() {
            if job.status == JobStatus::Processing
                && job.last_attempt_at_ms.is_some_and(|at| at <= cutoff)
            {
                job.status = JobStatus::Pending;
                job.not_before_ms = now_ms;
                reaped += 1;
            }
        }
        Ok(reaped)
    }

    async fn purge_terminal(&self, retention_ms: u64, now_ms: u64) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let cutoff = now_ms.saturating_sub(retention_ms);
        let before = inner.jobs.len();
        inner.jobs.retain(|_, job| {
            let terminal = matches!(job.status, JobStatus::Completed | JobStatus::Failed);
            let settled_at = job.last_attempt_at_ms.unwrap_or(job.enqueued_at_ms);
            !(terminal && settled_at <= cutoff)
        });
        let Inner { jobs, order } = &mut *inner;
        order.retain(|id| jobs.contains_key(id));
        Ok((before - jobs.len()) as u64)
    }

    async fn depth(&self) -> Result<QueueDepth> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut depth = QueueDepth::default();
        for job in inner.jobs.values() {
            match job.status {
                JobStatus::Pending => depth.pending += 1,
                JobStatus::Processing => depth.processing += 1,
                JobStatus::Completed => depth.completed += 1,
                JobStatus::Failed => depth.failed += 1,
            }
        }
        Ok(depth)
    }

    async fn get(&self, job_id: &str) -> Result<Option<QueueJob>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.jobs.get(job_id).cloned())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, ferry_common::InboundMessage};

    fn make_job(message_id: &str, chat_id: &str, now: u64) -> QueueJob {
        QueueJob::from_message(
            InboundMessage {
                id: message_id.into(),
                chat_id: chat_id.into(),
                author_id: "u1".into(),
                text: format!("text-{message_id}"),
                received_at_ms: now,
            },
            now,
        )
    }

    #[tokio::test]
    async fn test_enqueue_same_message_twice_is_noop() {
        let store = InMemoryStore::new();
        let job = make_job("m1", "c1", 1_000);
        assert_eq!(store.enqueue(&job).await.unwrap(), EnqueueOutcome::Inserted);
        assert_eq!(
            store.enqueue(&job).await.unwrap(),
            EnqueueOutcome::AlreadyExists
        );
        assert_eq!(store.depth().await.unwrap().pending, 1);
    }

    #[tokio::test]
    async fn test_claim_flips_to_processing_and_counts_attempt() {
        let store = InMemoryStore::new();
        store.enqueue(&make_job("m1", "c1", 1_000)).await.unwrap();

        let claimed = store.claim(2_000).await.unwrap().unwrap();
        assert_eq!(claimed.status, JobStatus::Processing);
        assert_eq!(claimed.attempt_count, 1);
        assert_eq!(claimed.last_attempt_at_ms, Some(2_000));

        // Nothing else pending.
        assert!(store.claim(2_000).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_is_fifo_by_enqueue_order() {
        let store = InMemoryStore::new();
        store.enqueue(&make_job("m1", "c1", 1_000)).await.unwrap();
        store.enqueue(&make_job("m2", "c1", 1_000)).await.unwrap();

        let first = store.claim(2_000).await.unwrap().unwrap();
        let second = store.claim(2_000).await.unwrap().unwrap();
        assert_eq!(first.message.id, "m1");
        assert_eq!(second.message.id, "m2");
    }

    #[tokio::test]
    async fn test_fail_requeues_behind_backoff() {
        let store = InMemoryStore::new();
        let policy = RetryPolicy::default();
        store.enqueue(&make_job("m1", "c1", 1_000)).await.unwrap();

        let job = store.claim(2_000).await.unwrap().unwrap();
        let status = store
            .fail(&job.job_id, "upstream timeout", 2_500, &policy)
            .await
            .unwrap();
        assert_eq!(status, JobStatus::Pending);

        // Invisible until the backoff delay has passed.
        assert!(store.claim(2_600).await.unwrap().is_none());
        let retried = store.claim(2_500 + 1_000).await.unwrap().unwrap();
        assert_eq!(retried.attempt_count, 2);
    }

    #[tokio::test]
    async fn test_retry_ceiling_is_exact() {
        let store = InMemoryStore::new();
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff_base_ms: 0,
            backoff_cap_ms: 0,
        };
        store.enqueue(&make_job("m2", "c2", 0)).await.unwrap();
        let job_id = QueueJob::id_for_message("m2");

        let mut attempts = 0;
        let mut now = 1_000;
        loop {
            let Some(job) = store.claim(now).await.unwrap() else {
                break;
            };
            attempts += 1;
            let status = store.fail(&job.job_id, "timeout", now, &policy).await.unwrap();
            if status == JobStatus::Failed {
                break;
            }
            now += 1_000;
        }

        assert_eq!(attempts, 3);
        let job = store.get(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("timeout"));
        assert!(store.claim(now + 60_000).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fail_permanent_skips_retry_budget() {
        let store = InMemoryStore::new();
        store.enqueue(&make_job("m1", "c1", 0)).await.unwrap();
        let job = store.claim(1_000).await.unwrap().unwrap();
        store
            .fail_permanent(&job.job_id, "send rejected")
            .await
            .unwrap();

        let job = store.get(&job.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempt_count, 1);
    }

    #[tokio::test]
    async fn test_reap_orphans_returns_stuck_jobs_to_pending() {
        let store = InMemoryStore::new();
        store.enqueue(&make_job("m1", "c1", 0)).await.unwrap();
        let job = store.claim(1_000).await.unwrap().unwrap();

        // Not stuck yet.
        assert_eq!(store.reap_orphans(300_000, 100_000).await.unwrap(), 0);
        // Past the timeout: reclaimed exactly once.
        assert_eq!(store.reap_orphans(300_000, 301_001).await.unwrap(), 1);
        assert_eq!(store.reap_orphans(300_000, 301_001).await.unwrap(), 0);

        let reclaimed = store.claim(301_001).await.unwrap().unwrap();
        assert_eq!(reclaimed.job_id, job.job_id);
        assert_eq!(reclaimed.attempt_count, 2);
    }

    #[tokio::test]
    async fn test_purge_terminal_respects_retention() {
        let store = InMemoryStore::new();
        store.enqueue(&make_job("m1", "c1", 0)).await.unwrap();
        store.enqueue(&make_job("m2", "c2", 0)).await.unwrap();
        let j1 = store.claim(1_000).await.unwrap().unwrap();
        store.complete(&j1.job_id).await.unwrap();

        // m2 is still pending; only the completed job is purged.
        assert_eq!(store.purge_terminal(3_600_000, 5_000_000).await.unwrap(), 1);
        assert!(store.get(&j1.job_id).await.unwrap().is_none());
        assert_eq!(store.depth().await.unwrap().pending, 1);

        // Purged dedup memory: the same message may be enqueued again.
        assert_eq!(
            store.enqueue(&make_job("m1", "c1", 5_000_000)).await.unwrap(),
            EnqueueOutcome::Inserted
        );
    }

    #[tokio::test]
    async fn test_complete_requires_processing() {
        let store = InMemoryStore::new();
        store.enqueue(&make_job("m1", "c1", 0)).await.unwrap();
        let job_id = QueueJob::id_for_message("m1");
        assert!(store.complete(&job_id).await.is_err());
        assert!(store.complete("job:nope").await.is_err());
    }
}
