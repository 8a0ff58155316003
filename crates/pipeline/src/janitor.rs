//! Periodic maintenance: reclaim orphaned jobs, sweep expired dialogues,
//! purge terminal jobs past retention.

use std::{sync::Arc, time::Duration};

use {
    ferry_common::now_ms,
    ferry_dialogue::DialogueStore,
    ferry_queue::QueueStore,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::config::PipelineConfig;

pub struct Janitor {
    queue: Arc<dyn QueueStore>,
    dialogues: Arc<dyn DialogueStore>,
    config: PipelineConfig,
    cancel: CancellationToken,
}

impl Janitor {
    pub fn new(
        queue: Arc<dyn QueueStore>,
        dialogues: Arc<dyn DialogueStore>,
        config: PipelineConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            queue,
            dialogues,
            config,
            cancel,
        }
    }

    pub async fn run(self) {
        let interval = Duration::from_secs(self.config.reap_interval_secs);
        debug!(interval_secs = self.config.reap_interval_secs, "janitor started");
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(interval) => {},
            }
            self.pass().await;
        }
        debug!("janitor stopped");
    }

    async fn pass(&self) {
        let now = now_ms();

        match self
            .queue
            .reap_orphans(self.config.orphan_timeout_secs * 1000, now)
            .await
        {
            Ok(0) => {},
            Ok(reclaimed) => info!(reclaimed, "reclaimed orphaned jobs"),
            Err(e) => warn!(error = %e, "orphan reap failed"),
        }

        match self.dialogues.sweep_expired(now).await {
            Ok(0) => {},
            Ok(removed) => debug!(removed, "swept expired dialogues"),
            Err(e) => warn!(error = %e, "dialogue sweep failed"),
        }

        match self
            .queue
            .purge_terminal(self.config.completed_retention_secs * 1000, now)
            .await
        {
            Ok(0) => {},
            Ok(purged) => debug!(purged, "purged terminal jobs"),
            Err(e) => warn!(error = %e, "terminal purge failed"),
        }
    }
}
