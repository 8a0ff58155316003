//! Responder Gateway: the external capability that turns conversation
//! history plus a new message into a reply. The pipeline treats it as an
//! opaque call that may fail transiently or permanently.

pub mod error;
pub mod http;

pub use {
    error::{Error, Result},
    http::{HttpResponder, ResponderConfig},
};

use {async_trait::async_trait, ferry_common::Turn};

#[async_trait]
pub trait Responder: Send + Sync {
    /// Produce a reply for a dialogue given its history (which already
    /// includes the newest user turn).
    async fn respond(&self, chat_id: &str, history: &[Turn]) -> Result<String>;
}
