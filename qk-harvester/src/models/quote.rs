//! Quote records and per-author aggregates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One harvested quote
///
/// Immutable once created; fields are only readable through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRecord {
    /// Full original message text, separator and attribution included
    text: String,
    /// When the message was posted
    occurred_at: DateTime<Utc>,
    /// Permalink back to the message
    source_link: String,
}

impl QuoteRecord {
    pub fn new(
        text: impl Into<String>,
        occurred_at: DateTime<Utc>,
        source_link: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            occurred_at,
            source_link: source_link.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn source_link(&self) -> &str {
        &self.source_link
    }
}

/// All quotes attributed to one canonical author
///
/// Invariant: `total == quotes.len()`. The only mutation is [`AuthorAggregate::append`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorAggregate {
    canonical_name: String,
    total: usize,
    quotes: Vec<QuoteRecord>,
}

impl AuthorAggregate {
    /// Empty aggregate for a display-formatted author name
    pub fn new(canonical_name: impl Into<String>) -> Self {
        Self {
            canonical_name: canonical_name.into(),
            total: 0,
            quotes: Vec::new(),
        }
    }

    /// Rebuild from persisted parts, rejecting a total that disagrees with the list
    pub(crate) fn from_parts(
        canonical_name: String,
        total: usize,
        quotes: Vec<QuoteRecord>,
    ) -> Result<Self, String> {
        if total != quotes.len() {
            return Err(format!(
                "author '{}' has total {} but {} quotes",
                canonical_name,
                total,
                quotes.len()
            ));
        }
        Ok(Self {
            canonical_name,
            total,
            quotes,
        })
    }

    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn quotes(&self) -> &[QuoteRecord] {
        &self.quotes
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// True when `total` matches the number of stored quotes
    pub fn is_consistent(&self) -> bool {
        self.total == self.quotes.len()
    }

    pub(crate) fn append(&mut self, record: QuoteRecord) {
        self.quotes.push(record);
        self.total += 1;
        debug_assert!(self.is_consistent());
    }
}
