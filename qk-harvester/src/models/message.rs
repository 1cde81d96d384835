//! Messages as delivered by a message source

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One channel message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMessage {
    /// Account name of the sender
    pub author_name: String,
    /// Display name of the sender (used for "- me" attributions)
    pub author_display_name: String,
    /// True when the harvester's own account posted the message
    pub author_is_self: bool,
    pub content: String,
    pub occurred_at: DateTime<Utc>,
    pub permalink: String,
}
