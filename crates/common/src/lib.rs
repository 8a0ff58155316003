//! Shared types, error classification, and time helpers used across all
//! ferry crates.

pub mod error;
pub mod types;

pub use error::ErrorClass;
pub use types::{InboundMessage, Role, Turn};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
