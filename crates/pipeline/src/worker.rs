//! Worker loop: claim a job, serialize on the job's chat, run the responder,
//! deliver the reply, finalize job status.

use std::{sync::Arc, time::Duration};

use {
    ferry_common::{ErrorClass, Turn, now_ms},
    ferry_dialogue::{ChatLockManager, DialogueStore, lock},
    ferry_platform::Platform,
    ferry_queue::{JobStatus, QueueJob, QueueStore},
    ferry_responder::Responder,
    tokio::time::timeout,
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{config::PipelineConfig, stats::Stats};

/// Dependencies shared by every worker in the pool.
pub struct WorkerContext {
    pub queue: Arc<dyn QueueStore>,
    pub dialogues: Arc<dyn DialogueStore>,
    pub locks: Arc<dyn ChatLockManager>,
    pub platform: Arc<dyn Platform>,
    pub responder: Arc<dyn Responder>,
    pub stats: Arc<Stats>,
    pub config: PipelineConfig,
    pub cancel: CancellationToken,
}

/// A classified processing failure, routed to `fail` or `fail_permanent`.
struct JobError {
    class: ErrorClass,
    message: String,
}

impl JobError {
    fn transient(message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::Transient,
            message: message.into(),
        }
    }

    fn classified(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }
}

pub struct Worker {
    id: usize,
    ctx: Arc<WorkerContext>,
}

impl Worker {
    pub fn new(id: usize, ctx: Arc<WorkerContext>) -> Self {
        Self { id, ctx }
    }

    pub async fn run(self) {
        debug!(worker = self.id, "worker started");
        let idle = Duration::from_millis(self.ctx.config.idle_poll_ms);

        // Cancellation is only honored between jobs: an in-flight job always
        // runs to its finalization.
        loop {
            if self.ctx.cancel.is_cancelled() {
                break;
            }
            match self.ctx.queue.claim(now_ms()).await {
                Ok(Some(job)) => self.process(job).await,
                Ok(None) => {
                    tokio::select! {
                        () = self.ctx.cancel.cancelled() => break,
                        () = tokio::time::sleep(idle) => {},
                    }
                },
                Err(e) => {
                    warn!(worker = self.id, error = %e, "queue claim failed, backing off");
                    tokio::select! {
                        () = self.ctx.cancel.cancelled() => break,
                        () = tokio::time::sleep(idle) => {},
                    }
                },
            }
        }
        debug!(worker = self.id, "worker stopped");
    }

    async fn process(&self, job: QueueJob) {
        let chat_id = job.message.chat_id.clone();
        let owner = format!("worker-{}", self.id);
        let lock_ttl_ms = self.ctx.config.lock_ttl_secs * 1000;

        debug!(
            worker = self.id,
            job_id = %job.job_id,
            chat_id = %chat_id,
            attempt = job.attempt_count,
            "processing job"
        );

        // The chat lease is held for the whole job, responder call included;
        // that is what orders turns within one dialogue across workers.
        match lock::acquire(
            self.ctx.locks.as_ref(),
            &chat_id,
            &owner,
            lock_ttl_ms,
            &self.ctx.cancel,
        )
        .await
        {
            Ok(true) => {},
            Ok(false) => {
                // Shutdown interrupted the wait; the job stays `processing`
                // for the orphan reaper to reclaim on restart.
                debug!(job_id = %job.job_id, "lock wait cancelled by shutdown");
                return;
            },
            Err(e) => {
                self.finalize(&job, Err(JobError::transient(format!("chat lock: {e}"))))
                    .await;
                return;
            },
        }

        let outcome = self.handle(&job).await;

        if let Err(e) = self.ctx.locks.release(&chat_id, &owner).await {
            warn!(chat_id = %chat_id, error = %e, "failed to release chat lock");
        }

        self.finalize(&job, outcome).await;
    }

    /// The happy path: user turn into history, responder, assistant turn,
    /// platform delivery. Any error is classified for the retry machinery.
    async fn handle(&self, job: &QueueJob) -> Result<(), JobError> {
        let message = &job.message;
        let chat_id = &message.chat_id;

        // Not rolled back on later failure: the user's message stays in the
        // history, and redelivery dedupes on the message id.
        let state = self
            .ctx
            .dialogues
            .append_turn(
                chat_id,
                Turn::user(message.text.clone(), message.id.clone(), now_ms()),
                now_ms(),
            )
            .await
            .map_err(|e| JobError::transient(format!("dialogue store: {e}")))?;

        let responder_timeout = Duration::from_secs(self.ctx.config.responder_timeout_secs);
        let reply = match timeout(
            responder_timeout,
            self.ctx.responder.respond(chat_id, &state.history),
        )
        .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                return Err(JobError::classified(e.class(), format!("responder: {e}")));
            },
            Err(_) => return Err(JobError::transient("responder call timed out")),
        };

        self.ctx
            .dialogues
            .append_turn(
                chat_id,
                Turn::assistant(reply.clone(), format!("{}#reply", message.id), now_ms()),
                now_ms(),
            )
            .await
            .map_err(|e| JobError::transient(format!("dialogue store: {e}")))?;

        let send_timeout = Duration::from_secs(self.ctx.config.send_timeout_secs);
        match timeout(send_timeout, self.ctx.platform.send(chat_id, &reply)).await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => {
                return Err(JobError::classified(e.class(), format!("send: {e}")));
            },
            Err(_) => return Err(JobError::transient("platform send timed out")),
        }

        // Best effort: an unread chat just means the next poll re-fetches
        // messages the queue already deduplicates.
        if let Err(e) = self.ctx.platform.mark_read(chat_id).await {
            warn!(chat_id = %chat_id, error = %e, "failed to mark chat read");
        }

        Ok(())
    }

    async fn finalize(&self, job: &QueueJob, outcome: Result<(), JobError>) {
        match outcome {
            Ok(()) => {
                match self.ctx.queue.complete(&job.job_id).await {
                    Ok(()) => {
                        self.ctx.stats.record_completed();
                        info!(job_id = %job.job_id, chat_id = %job.message.chat_id, "job completed");
                    },
                    Err(e) => {
                        // The reply went out but the status write failed; the
                        // reaper will redeliver and history dedup keeps the
                        // dialogue consistent.
                        error!(job_id = %job.job_id, error = %e, "failed to mark job completed");
                    },
                }
            },
            Err(err) if err.class == ErrorClass::Permanent => {
                warn!(job_id = %job.job_id, error = %err.message, "permanent failure");
                if let Err(e) = self.ctx.queue.fail_permanent(&job.job_id, &err.message).await {
                    error!(job_id = %job.job_id, error = %e, "failed to mark job failed");
                    return;
                }
                self.ctx.stats.record_failed();
                self.ctx.stats.record_error(&err.message);
            },
            Err(err) => {
                let policy = self.ctx.config.retry_policy();
                match self
                    .ctx
                    .queue
                    .fail(&job.job_id, &err.message, now_ms(), &policy)
                    .await
                {
                    Ok(JobStatus::Pending) => {
                        debug!(
                            job_id = %job.job_id,
                            attempt = job.attempt_count,
                            error = %err.message,
                            "transient failure, job requeued"
                        );
                    },
                    Ok(_) => {
                        warn!(
                            job_id = %job.job_id,
                            attempts = job.attempt_count,
                            error = %err.message,
                            "retry ceiling reached, job failed"
                        );
                        self.ctx.stats.record_failed();
                        self.ctx.stats.record_error(&err.message);
                    },
                    Err(e) => {
                        error!(job_id = %job.job_id, error = %e, "failed to record job failure");
                    },
                }
            },
        }
    }
}
