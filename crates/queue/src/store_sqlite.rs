//! SQLite-backed queue using sqlx.
//!
//! The claim path is a single `UPDATE … RETURNING` over an ordered
//! subselect, so concurrent workers (threads or processes sharing the
//! database file) cannot double-claim a job.

use {
    async_trait::async_trait,
    sqlx::{Row, SqlitePool, sqlite::SqliteRow},
};

use crate::{
    Result,
    error::Error,
    store::QueueStore,
    types::{EnqueueOutcome, JobStatus, QueueDepth, QueueJob, RetryPolicy},
};

pub struct SqliteStore {
    pool: SqlitePool,
}

const JOB_COLUMNS: &str = "job_id, message, status, attempt_count, enqueued_at_ms, \
                           last_attempt_at_ms, not_before_ms, error";

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the queue schema.
    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS queue_jobs (
                job_id             TEXT    PRIMARY KEY,
                message            TEXT    NOT NULL,
                status             TEXT    NOT NULL,
                attempt_count      INTEGER NOT NULL DEFAULT 0,
                enqueued_at_ms     INTEGER NOT NULL,
                last_attempt_at_ms INTEGER,
                not_before_ms      INTEGER NOT NULL,
                error              TEXT
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_queue_jobs_claim
             ON queue_jobs (status, not_before_ms, enqueued_at_ms)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

fn row_to_job(row: &SqliteRow) -> Result<QueueJob> {
    let message: String = row.get("message");
    let status: String = row.get("status");
    Ok(QueueJob {
        job_id: row.get("job_id"),
        message: serde_json::from_str(&message)?,
        status: JobStatus::parse(&status)?,
        attempt_count: row.get::<i64, _>("attempt_count") as u32,
        enqueued_at_ms: row.get::<i64, _>("enqueued_at_ms") as u64,
        last_attempt_at_ms: row
            .get::<Option<i64>, _>("last_attempt_at_ms")
            .map(|v| v as u64),
        not_before_ms: row.get::<i64, _>("not_before_ms") as u64,
        error: row.get("error"),
    })
}

#[async_trait]
impl QueueStore for SqliteStore {
    async fn enqueue(&self, job: &QueueJob) -> Result<EnqueueOutcome> {
        let message = serde_json::to_string(&job.message)?;
        let result = sqlx::query(
            "INSERT INTO queue_jobs
             (job_id, message, status, attempt_count, enqueued_at_ms,
              last_attempt_at_ms, not_before_ms, error)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(job_id) DO NOTHING",
        )
        .bind(&job.job_id)
        .bind(&message)
        .bind(job.status.as_str())
        .bind(job.attempt_count as i64)
        .bind(job.enqueued_at_ms as i64)
        .bind(job.last_attempt_at_ms.map(|v| v as i64))
        .bind(job.not_before_ms as i64)
        .bind(&job.error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(EnqueueOutcome::AlreadyExists)
        } else {
            Ok(EnqueueOutcome::Inserted)
        }
    }

    async fn claim(&self, now_ms: u64) -> Result<Option<QueueJob>> {
        let row = sqlx::query(&format!(
            "UPDATE queue_jobs
             SET status = 'processing',
                 attempt_count = attempt_count + 1,
                 last_attempt_at_ms = ?1
             WHERE job_id = (
                 SELECT job_id FROM queue_jobs
                 WHERE status = 'pending' AND not_before_ms <= ?1
                 ORDER BY enqueued_at_ms, job_id
                 LIMIT 1
             )
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(now_ms as i64)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_job).transpose()
    }

    async fn complete(&self, job_id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE queue_jobs SET status = 'completed'
             WHERE job_id = ? AND status = 'processing'",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::job_not_found(job_id));
        }
        Ok(())
    }

    async fn fail(
        &self,
        job_id: &str,
        error: &str,
        now_ms: u64,
        policy: &RetryPolicy,
    ) -> Result<JobStatus> {
        // Only the worker holding the claim calls fail on its job, so a
        // read-then-write here does not race another writer.
        let row = sqlx::query("SELECT attempt_count FROM queue_jobs WHERE job_id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::job_not_found(job_id))?;
        let attempt_count = row.get::<i64, _>("attempt_count") as u32;

        let (status, not_before_ms) = if attempt_count >= policy.max_attempts {
            (JobStatus::Failed, None)
        } else {
            (
                JobStatus::Pending,
                Some(now_ms + policy.delay_ms(attempt_count)),
            )
        };

        let result = sqlx::query(
            "UPDATE queue_jobs
             SET status = ?, not_before_ms = COALESCE(?, not_before_ms), error = ?
             WHERE job_id = ? AND status = 'processing'",
        )
        .bind(status.as_str())
        .bind(not_before_ms.map(|v| v as i64))
        .bind(error)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::job_not_found(job_id));
        }
        Ok(status)
    }

    async fn fail_permanent(&self, job_id: &str, error: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE queue_jobs SET status = 'failed', error = ?
             WHERE job_id = ? AND status = 'processing'",
        )
        .bind(error)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::job_not_found(job_id));
        }
        Ok(())
    }

    async fn reap_orphans(&self, stuck_for_ms: u64, now_ms: u64) -> Result<u64> {
        let cutoff = now_ms.saturating_sub(stuck_for_ms);
        let result = sqlx::query(
            "UPDATE queue_jobs
             SET status = 'pending', not_before_ms = ?
             WHERE status = 'processing' AND last_attempt_at_ms <= ?",
        )
        .bind(now_ms as i64)
        .bind(cutoff as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn purge_terminal(&self, retention_ms: u64, now_ms: u64) -> Result<u64> {
        let cutoff = now_ms.saturating_sub(retention_ms);
        let result = sqlx::query(
            "DELETE FROM queue_jobs
             WHERE status IN ('completed', 'failed')
               AND COALESCE(last_attempt_at_ms, enqueued_at_ms) <= ?",
        )
        .bind(cutoff as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn depth(&self) -> Result<QueueDepth> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM queue_jobs GROUP BY status")
            .fetch_all(&self.pool)
            .await?;
        let mut depth = QueueDepth::default();
        for row in rows {
            let status: String = row.get("status");
            let n = row.get::<i64, _>("n") as u64;
            match JobStatus::parse(&status)? {
                JobStatus::Pending => depth.pending = n,
                JobStatus::Processing => depth.processing = n,
                JobStatus::Completed => depth.completed = n,
                JobStatus::Failed => depth.failed = n,
            }
        }
        Ok(depth)
    }

    async fn get(&self, job_id: &str) -> Result<Option<QueueJob>> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM queue_jobs WHERE job_id = ?"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_job).transpose()
    }
}
