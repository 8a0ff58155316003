//! Messenger-platform collaborator interface and its HTTP implementation.
//!
//! The pipeline only sees the [`Platform`] trait: fetch the unread inbound
//! set, send a reply, mark a chat read. Deduplication of overlapping fetch
//! results is the collector's job, not the platform's.

pub mod config;
pub mod error;
pub mod http;

pub use {
    config::PlatformConfig,
    error::{Error, Result},
    http::HttpPlatform,
};

use {async_trait::async_trait, ferry_common::InboundMessage};

#[async_trait]
pub trait Platform: Send + Sync {
    /// Current unread inbound messages for the configured account. Safe to
    /// call repeatedly; results may overlap across calls.
    async fn fetch_unread(&self) -> Result<Vec<InboundMessage>>;

    /// Deliver a reply to a chat.
    async fn send(&self, chat_id: &str, text: &str) -> Result<()>;

    /// Mark a chat's messages as read.
    async fn mark_read(&self, chat_id: &str) -> Result<()>;
}
