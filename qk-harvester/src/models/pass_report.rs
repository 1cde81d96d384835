//! Reconciliation loop state and per-pass results
//!
//! Loop states: UNINITIALIZED → CATCHING_UP → IDLE ⇄ RUNNING_PASS → STOPPED

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reconciliation loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopState {
    /// Artifacts loaded, source not yet resolved
    Uninitialized,
    /// First pass after startup (full history or since the persisted watermark)
    CatchingUp,
    /// Sleeping until the next scheduled pass
    Idle,
    /// Scheduled pass in progress
    RunningPass,
    /// Loop exited (cancelled or fatal startup error)
    Stopped,
}

/// Why a message was passed over without being an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IgnoreReason {
    /// Posted by the harvester's own account
    OwnMessage,
    /// No attribution separator
    NotAQuote,
}

/// Result of folding one message into the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Appended to the named author's aggregate
    Recorded { author: String },
    /// Same source link already archived
    Duplicate { author: String },
    Ignored(IgnoreReason),
    /// Processing failed; the message was skipped
    Skipped { reason: String },
}

/// A message that failed processing, kept for the end-of-pass log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedMessage {
    pub permalink: String,
    pub content: String,
    pub reason: String,
}

/// Summary of one reconciliation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassReport {
    pub pass_id: Uuid,
    /// Exclusive lower bound used for the fetch
    pub after: Option<DateTime<Utc>>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Watermark persisted at the end of the pass
    pub watermark: Option<DateTime<Utc>>,
    pub examined: usize,
    pub recorded: usize,
    pub duplicates: usize,
    pub ignored: usize,
    pub skipped: Vec<SkippedMessage>,
}

impl PassReport {
    pub fn new(after: Option<DateTime<Utc>>, started_at: DateTime<Utc>) -> Self {
        Self {
            pass_id: Uuid::new_v4(),
            after,
            started_at,
            finished_at: None,
            watermark: None,
            examined: 0,
            recorded: 0,
            duplicates: 0,
            ignored: 0,
            skipped: Vec::new(),
        }
    }

    /// Count one message outcome
    pub fn tally(&mut self, outcome: &MessageOutcome, permalink: &str, content: &str) {
        self.examined += 1;
        match outcome {
            MessageOutcome::Recorded { .. } => self.recorded += 1,
            MessageOutcome::Duplicate { .. } => self.duplicates += 1,
            MessageOutcome::Ignored(_) => self.ignored += 1,
            MessageOutcome::Skipped { reason } => self.skipped.push(SkippedMessage {
                permalink: permalink.to_string(),
                content: content.to_string(),
                reason: reason.clone(),
            }),
        }
    }

    /// Mark the pass as durably finished
    pub fn finish(&mut self, watermark: DateTime<Utc>, finished_at: DateTime<Utc>) {
        self.watermark = Some(watermark);
        self.finished_at = Some(finished_at);
    }
}
