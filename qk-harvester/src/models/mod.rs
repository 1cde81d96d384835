//! Data models for qk-harvester

pub mod message;
pub mod pass_report;
pub mod quote;

pub use message::SourceMessage;
pub use pass_report::{IgnoreReason, LoopState, MessageOutcome, PassReport, SkippedMessage};
pub use quote::{AuthorAggregate, QuoteRecord};
