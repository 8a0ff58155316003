//! Pipeline lifecycle: wires the collector, worker pool, and janitor to one
//! cancellation token and supervises their shutdown.

use std::{sync::Arc, time::Duration};

use {
    anyhow::Result,
    ferry_common::now_ms,
    ferry_dialogue::{ChatLockManager, DialogueStore, DialogueSummary},
    ferry_platform::Platform,
    ferry_queue::QueueStore,
    ferry_responder::Responder,
    serde::Serialize,
    tokio::{task::JoinHandle, time::timeout},
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use crate::{
    collector::Collector,
    config::PipelineConfig,
    janitor::Janitor,
    stats::{Stats, StatsSnapshot},
    worker::{Worker, WorkerContext},
};

/// Point-in-time view of the pipeline for the monitor surface.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub running: bool,
    pub workers: usize,
    pub stats: StatsSnapshot,
}

pub struct Pipeline {
    queue: Arc<dyn QueueStore>,
    dialogues: Arc<dyn DialogueStore>,
    locks: Arc<dyn ChatLockManager>,
    platform: Arc<dyn Platform>,
    responder: Arc<dyn Responder>,
    stats: Arc<Stats>,
    config: PipelineConfig,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Pipeline {
    pub fn new(
        queue: Arc<dyn QueueStore>,
        dialogues: Arc<dyn DialogueStore>,
        locks: Arc<dyn ChatLockManager>,
        platform: Arc<dyn Platform>,
        responder: Arc<dyn Responder>,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            queue,
            dialogues,
            locks,
            platform,
            responder,
            stats: Arc::new(Stats::new()),
            config,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        })
    }

    /// Spawn the collector, the worker pool, and the janitor. Idempotent
    /// start is not supported; call once.
    pub fn start(&mut self) {
        let collector = Collector::new(
            Arc::clone(&self.platform),
            Arc::clone(&self.queue),
            Arc::clone(&self.stats),
            Duration::from_secs(self.config.poll_interval_secs),
            self.cancel.clone(),
        );
        self.tasks.push(tokio::spawn(collector.run()));

        let ctx = Arc::new(WorkerContext {
            queue: Arc::clone(&self.queue),
            dialogues: Arc::clone(&self.dialogues),
            locks: Arc::clone(&self.locks),
            platform: Arc::clone(&self.platform),
            responder: Arc::clone(&self.responder),
            stats: Arc::clone(&self.stats),
            config: self.config.clone(),
            cancel: self.cancel.clone(),
        });
        for id in 0..self.config.workers {
            self.tasks.push(tokio::spawn(Worker::new(id, Arc::clone(&ctx)).run()));
        }

        let janitor = Janitor::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.dialogues),
            self.config.clone(),
            self.cancel.clone(),
        );
        self.tasks.push(tokio::spawn(janitor.run()));

        info!(workers = self.config.workers, "pipeline started");
    }

    /// Cancel every loop and wait up to the grace period for in-flight jobs
    /// to finalize. Tasks still running at the deadline are aborted; their
    /// jobs stay `processing` and the reaper reclaims them on restart.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        let deadline = tokio::time::Instant::now()
            + Duration::from_secs(self.config.shutdown_grace_secs);
        for mut task in self.tasks.drain(..) {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if timeout(remaining, &mut task).await.is_err() {
                warn!("task did not stop within the grace period, aborting");
                task.abort();
            }
        }
        info!("pipeline stopped");
    }

    /// Counters merged with live queue depth and dialogue count.
    pub async fn status(&self) -> Result<PipelineStatus> {
        let depth = self.queue.depth().await?;
        let active_dialogues = self.dialogues.active_count(now_ms()).await?;
        Ok(PipelineStatus {
            running: !self.cancel.is_cancelled(),
            workers: self.config.workers,
            stats: self.stats.snapshot(depth, active_dialogues),
        })
    }

    /// Digests of live dialogues, the other half of the monitor read
    /// contract.
    pub async fn dialogue_summaries(&self) -> Result<Vec<DialogueSummary>> {
        Ok(self.dialogues.summaries(now_ms()).await?)
    }

    #[must_use]
    pub fn stats(&self) -> Arc<Stats> {
        Arc::clone(&self.stats)
    }
}
