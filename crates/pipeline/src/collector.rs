//! Polling collector: fetches the platform's unread set on a fixed interval
//! and enqueues a job per genuinely new message. The queue's idempotent
//! enqueue is the authoritative dedup gate: overlapping fetch results and
//! re-polls collapse to no-ops there.

use std::{sync::Arc, time::Duration};

use {
    ferry_common::now_ms,
    ferry_platform::Platform,
    ferry_queue::{EnqueueOutcome, QueueJob, QueueStore},
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::stats::Stats;

pub struct Collector {
    platform: Arc<dyn Platform>,
    queue: Arc<dyn QueueStore>,
    stats: Arc<Stats>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl Collector {
    pub fn new(
        platform: Arc<dyn Platform>,
        queue: Arc<dyn QueueStore>,
        stats: Arc<Stats>,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            platform,
            queue,
            stats,
            poll_interval,
            cancel,
        }
    }

    pub async fn run(self) {
        info!(interval_secs = self.poll_interval.as_secs(), "collector started");
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            self.cycle().await;
            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(self.poll_interval) => {},
            }
        }
        info!("collector stopped");
    }

    /// One poll cycle. A failed fetch is logged and recorded, never fatal;
    /// the loop retries at the next interval.
    async fn cycle(&self) {
        let messages = match self.platform.fetch_unread().await {
            Ok(messages) => messages,
            Err(e) => {
                error!(error = %e, "platform poll failed");
                self.stats.record_error(&format!("poll: {e}"));
                return;
            },
        };

        let fetched = messages.len();
        let mut enqueued = 0usize;
        for message in messages {
            let job = QueueJob::from_message(message, now_ms());
            match self.queue.enqueue(&job).await {
                Ok(EnqueueOutcome::Inserted) => {
                    self.stats.record_enqueued();
                    enqueued += 1;
                },
                Ok(EnqueueOutcome::AlreadyExists) => {},
                Err(e) => {
                    // Queue unreachable: back off to the next cycle, the
                    // message stays unread on the platform.
                    warn!(job_id = %job.job_id, error = %e, "enqueue failed");
                    self.stats.record_error(&format!("enqueue: {e}"));
                },
            }
        }

        self.stats.record_poll(now_ms());
        if enqueued > 0 {
            info!(enqueued, fetched, "enqueued new inbound messages");
        } else {
            debug!(fetched, "poll cycle found nothing new");
        }
    }
}
