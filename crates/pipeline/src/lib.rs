//! Message ingestion-and-delivery pipeline: a polling collector feeds the
//! durable work queue, a worker pool turns each inbound message into a
//! delivered reply exactly once, and a janitor loop reclaims orphans and
//! sweeps expired state. Process-wide stats are exposed read-only for the
//! external monitor.

pub mod collector;
pub mod config;
pub mod janitor;
pub mod service;
pub mod stats;
pub mod worker;

pub use {
    config::PipelineConfig,
    service::{Pipeline, PipelineStatus},
    stats::{Stats, StatsSnapshot},
};
