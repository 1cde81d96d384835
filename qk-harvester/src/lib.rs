//! qk-harvester library interface
//!
//! Harvests attributed quotes from a conversation channel into a durable
//! per-author archive. The binary wires these pieces together; embedders and
//! integration tests use them directly.

pub mod alias;
pub mod config;
pub mod desk;
pub mod error;
pub mod extractor;
pub mod models;
pub mod normalizer;
pub mod reconcile;
pub mod source;
pub mod store;
pub mod watermark;

pub use crate::error::{HarvestError, Result};

use crate::alias::AliasResolver;
use crate::store::QuoteStore;
use qk_common::events::EventBus;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory artifacts shared by the reconciliation loop and the query desk
#[derive(Clone)]
pub struct HarvestState {
    /// Quote archive; only the reconciliation loop writes it
    pub store: Arc<RwLock<QuoteStore>>,
    /// Alias table; only the desk mutates it
    pub aliases: Arc<RwLock<AliasResolver>>,
    pub events: EventBus,
}

impl HarvestState {
    pub fn new(store: QuoteStore, aliases: AliasResolver, events: EventBus) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            aliases: Arc::new(RwLock::new(aliases)),
            events,
        }
    }

    /// Load the quote archive and alias table (missing files start empty)
    pub fn open(archive_path: &Path, aliases_path: &Path, events: EventBus) -> Result<Self> {
        let store = QuoteStore::load(archive_path)?;
        let aliases = AliasResolver::load(aliases_path)?;
        Ok(Self::new(store, aliases, events))
    }
}
