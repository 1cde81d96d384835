//! Message sources
//!
//! A source delivers a channel's history oldest first, optionally restricted to
//! messages strictly newer than a timestamp. Delivery is not exactly-once
//! across restarts; the store suppresses re-delivered messages by permalink.
//!
//! Items are `Result`s: a [`SourceError::Malformed`] item is one unusable
//! message and is skipped, any other error ends the pass.

pub mod export;
pub mod memory;

pub use export::ExportSource;
pub use memory::MemorySource;

use crate::error::HarvestError;
use crate::models::SourceMessage;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use std::future::Future;
use thiserror::Error;

/// Source-side failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Configured channel does not exist or cannot be opened
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    /// Channel exists but cannot be read right now
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// One message could not be decoded
    #[error("Malformed message: {0}")]
    Malformed(String),
}

impl From<SourceError> for HarvestError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::ChannelNotFound(msg) => {
                HarvestError::ConfigInvalid(format!("channel not found: {}", msg))
            }
            SourceError::Unavailable(msg) => HarvestError::SourceUnavailable(msg),
            SourceError::Malformed(msg) => HarvestError::MalformedMessage(msg),
        }
    }
}

/// Stream of messages in ascending `occurred_at` order
pub type MessageStream<'a> = BoxStream<'a, Result<SourceMessage, SourceError>>;

/// Channel history provider
pub trait MessageSource: Send + Sync {
    /// Short description of the channel for logs
    fn describe(&self) -> String;

    /// Check that the configured channel exists (called once at startup)
    fn resolve(&self) -> impl Future<Output = Result<(), SourceError>> + Send;

    /// Messages strictly newer than `after` (all history when `None`), oldest first
    fn fetch_history(&self, after: Option<DateTime<Utc>>) -> MessageStream<'_>;
}
