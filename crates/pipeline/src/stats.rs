//! Process-wide counters updated by the collector and workers, exposed
//! read-only to the external monitor.

use std::sync::{
    Mutex,
    atomic::{AtomicU64, Ordering},
};

use {ferry_queue::QueueDepth, serde::Serialize};

#[derive(Default)]
pub struct Stats {
    total_messages: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    /// 0 means "never polled".
    last_poll_time_ms: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl Stats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_enqueued(&self) {
        self.total_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_poll(&self, now_ms: u64) {
        self.last_poll_time_ms.store(now_ms, Ordering::Relaxed);
    }

    pub fn record_error(&self, error: &str) {
        let mut last_error = self.last_error.lock().unwrap_or_else(|e| e.into_inner());
        *last_error = Some(error.to_string());
    }

    #[must_use]
    pub fn completed_count(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Merge the counters with live queue depth and dialogue count into a
    /// serializable snapshot.
    #[must_use]
    pub fn snapshot(&self, depth: QueueDepth, active_dialogues: u64) -> StatsSnapshot {
        let last_poll = self.last_poll_time_ms.load(Ordering::Relaxed);
        let last_error = self
            .last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        StatsSnapshot {
            total_messages: self.total_messages.load(Ordering::Relaxed),
            pending: depth.pending,
            processing: depth.processing,
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            active_dialogues,
            last_poll_time_ms: (last_poll > 0).then_some(last_poll),
            last_error,
        }
    }
}

/// Read-only stats view, the monitor side of the contract.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total_messages: u64,
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub active_dialogues: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_poll_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}
