//! Query and alias-management surface for the command layer
//!
//! Every author name a caller passes in is resolved through the alias table
//! first, so `jon` and `John` address the same archive entry once `jon` is an
//! alias of `john`. Each call takes the locks it needs once, which keeps
//! multi-step reads (find the author, then pick a quote) consistent with a
//! concurrent pass.

use crate::alias::{normalize_key, AliasChange};
use crate::error::Result;
use crate::extractor;
use crate::models::{AuthorAggregate, QuoteRecord};
use crate::store::{QuoteRef, Totals};
use crate::HarvestState;
use qk_common::events::HarvestEvent;
use qk_common::time;
use rand::Rng;
use serde::Serialize;

/// A quote returned to the command layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeskQuote {
    pub author: String,
    /// Position in the list it was looked up in (author list or global log)
    pub index: usize,
    pub record: QuoteRecord,
}

impl From<QuoteRef<'_>> for DeskQuote {
    fn from(quote: QuoteRef<'_>) -> Self {
        Self {
            author: quote.author.to_string(),
            index: quote.index,
            record: quote.record.clone(),
        }
    }
}

/// Whether a text would be harvested as a quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteCheck {
    /// Byte offset of the attribution separator
    pub split: Option<usize>,
    /// Trimmed author field after the separator
    pub author_field: Option<String>,
}

impl QuoteCheck {
    pub fn accepted(&self) -> bool {
        self.split.is_some()
    }
}

/// Command surface over the shared archive and alias table
#[derive(Clone)]
pub struct QuoteDesk {
    state: HarvestState,
}

impl QuoteDesk {
    pub fn new(state: HarvestState) -> Self {
        Self { state }
    }

    async fn canonical(&self, name: &str) -> String {
        self.state.aliases.read().await.resolve(name)
    }

    /// Full aggregate for an author
    pub async fn author_aggregate(&self, name: &str) -> Result<AuthorAggregate> {
        let key = self.canonical(name).await;
        self.state.store.read().await.get(&key).cloned()
    }

    /// Random quote, optionally restricted to one author
    pub async fn random_quote(&self, name: Option<&str>) -> Result<DeskQuote> {
        let key = self.canonical_opt(name).await;
        let store = self.state.store.read().await;
        store.random_quote(key.as_deref()).map(DeskQuote::from)
    }

    /// Random quote drawn with a caller-supplied generator
    pub async fn random_quote_with<R: Rng + ?Sized>(
        &self,
        name: Option<&str>,
        rng: &mut R,
    ) -> Result<DeskQuote> {
        let key = self.canonical_opt(name).await;
        let store = self.state.store.read().await;
        store.random_quote_with(key.as_deref(), rng).map(DeskQuote::from)
    }

    async fn canonical_opt(&self, name: Option<&str>) -> Option<String> {
        match name {
            Some(name) => Some(self.canonical(name).await),
            None => None,
        }
    }

    /// Per-author counts plus the grand total
    pub async fn totals(&self) -> Totals {
        self.state.store.read().await.totals()
    }

    /// Quote at a position of the chronological log
    pub async fn quote_by_index(&self, index: usize) -> Result<DeskQuote> {
        let store = self.state.store.read().await;
        let entry = store.log_entry(index)?;
        Ok(DeskQuote {
            author: entry.author.to_string(),
            index: entry.index,
            record: entry.record.clone(),
        })
    }

    /// Quote at a position of one author's list
    pub async fn author_quote(&self, name: &str, index: usize) -> Result<DeskQuote> {
        let key = self.canonical(name).await;
        let store = self.state.store.read().await;
        store.quote_at(&key, index).map(DeskQuote::from)
    }

    pub async fn author_history(&self, name: &str) -> Result<Vec<QuoteRecord>> {
        let key = self.canonical(name).await;
        let store = self.state.store.read().await;
        Ok(store.history(&key)?.to_vec())
    }

    /// Run the quote detector without recording anything
    pub fn test_quote(&self, text: &str) -> QuoteCheck {
        match extractor::extract(text) {
            Some(extraction) => QuoteCheck {
                split: Some(extraction.split),
                author_field: Some(extraction.author_field.to_string()),
            },
            None => QuoteCheck {
                split: None,
                author_field: None,
            },
        }
    }

    pub async fn aliases_of(&self, name: &str) -> Vec<String> {
        let aliases = self.state.aliases.read().await;
        aliases.aliases_of(&aliases.resolve(name)).to_vec()
    }

    /// Attach an alias to an author, persisting before returning
    pub async fn add_alias(&self, author: &str, alias: &str) -> Result<AliasChange> {
        let mut aliases = self.state.aliases.write().await;
        let owner = aliases.resolve(author);
        let change = aliases.add_alias(&owner, alias)?;

        if change == AliasChange::Added {
            self.state.events.emit_lossy(HarvestEvent::AliasAdded {
                author: owner,
                alias: normalize_key(alias),
                timestamp: time::now(),
            });
        }
        Ok(change)
    }

    /// Detach an alias from an author, persisting before returning
    pub async fn remove_alias(&self, author: &str, alias: &str) -> Result<AliasChange> {
        let mut aliases = self.state.aliases.write().await;
        let owner = aliases.resolve(author);
        let change = aliases.remove_alias(&owner, alias)?;

        if change == AliasChange::Removed {
            self.state.events.emit_lossy(HarvestEvent::AliasRemoved {
                author: owner,
                alias: normalize_key(alias),
                timestamp: time::now(),
            });
        }
        Ok(change)
    }
}
