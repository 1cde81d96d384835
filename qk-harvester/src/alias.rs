//! Alias resolution
//!
//! The alias table maps a canonical author key to the alternative spellings
//! that should be credited to it. The reverse index (alias → owner) is a
//! cache derived from the table; it is rebuilt from the table whenever the
//! table is replaced, so the two cannot drift apart.
//!
//! Keys and aliases are stored lower-cased and trimmed. An alias has at most
//! one owner: claiming an alias that belongs to someone else is rejected with
//! [`HarvestError::AmbiguousAlias`] and changes nothing. Aliases never chain:
//! an author that owns aliases cannot become an alias, and an alias cannot
//! own aliases. Both are rejected with [`HarvestError::InvalidInput`].
//!
//! Mutations are all-or-nothing. The new table is written to disk first and
//! only then swapped in, so a failed write leaves the resolver as it was.

use crate::error::{HarvestError, Result};
use qk_common::persist;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Canonical author key → aliases (persisted form)
pub type AliasTable = BTreeMap<String, Vec<String>>;

/// Lower-cased, trimmed lookup key
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// What an alias mutation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasChange {
    Added,
    /// Alias already belonged to this author
    AlreadyPresent,
    Removed,
    /// Alias was not attached to this author
    NotPresent,
}

/// Alias table with its reverse index
#[derive(Debug, Clone, Default)]
pub struct AliasResolver {
    table: AliasTable,
    reverse: HashMap<String, String>,
    /// Backing file; `None` keeps the table in memory only
    path: Option<PathBuf>,
}

impl AliasResolver {
    /// Resolver without a backing file
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the alias table from `path` (missing file → empty table)
    pub fn load(path: &Path) -> Result<Self> {
        let raw: AliasTable = persist::read_json_or_default(path)?;
        let table = normalize_table(raw).map_err(|reason| {
            HarvestError::CorruptArtifact(format!("{}: {}", path.display(), reason))
        })?;

        let mut resolver = Self {
            table,
            reverse: HashMap::new(),
            path: Some(path.to_path_buf()),
        };
        resolver.rebuild_reverse_index();

        info!(
            authors = resolver.table.len(),
            aliases = resolver.reverse.len(),
            "Loaded alias table from {}",
            path.display()
        );
        Ok(resolver)
    }

    /// Canonical key for a spelling
    ///
    /// Unknown spellings map to themselves (lower-cased, trimmed), so a
    /// first-time author becomes their own canonical identity.
    pub fn resolve(&self, raw: &str) -> String {
        let key = normalize_key(raw);
        match self.reverse.get(&key) {
            Some(owner) => owner.clone(),
            None => key,
        }
    }

    /// Current owner of an alias
    pub fn owner_of(&self, alias: &str) -> Option<&str> {
        self.reverse.get(&normalize_key(alias)).map(String::as_str)
    }

    /// Aliases attached to an author (empty if none)
    pub fn aliases_of(&self, author: &str) -> &[String] {
        self.table
            .get(&normalize_key(author))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn table(&self) -> &AliasTable {
        &self.table
    }

    /// Attach `alias` to `author` and persist
    pub fn add_alias(&mut self, author: &str, alias: &str) -> Result<AliasChange> {
        let (author, alias) = normalize_pair(author, alias)?;

        if let Some(owner) = self.reverse.get(&alias) {
            if *owner == author {
                return Ok(AliasChange::AlreadyPresent);
            }
            return Err(HarvestError::AmbiguousAlias {
                alias,
                owner: owner.clone(),
            });
        }
        if alias != author && self.table.contains_key(&alias) {
            return Err(HarvestError::InvalidInput(format!(
                "'{}' has aliases of its own and cannot become an alias of '{}'",
                alias, author
            )));
        }
        if let Some(owner) = self.reverse.get(&author) {
            return Err(HarvestError::InvalidInput(format!(
                "'{}' is an alias of '{}' and cannot own aliases",
                author, owner
            )));
        }

        let mut table = self.table.clone();
        table.entry(author.clone()).or_default().push(alias.clone());
        self.commit(table)?;

        info!(author = %author, alias = %alias, "Alias added");
        Ok(AliasChange::Added)
    }

    /// Detach `alias` from `author` and persist; absent aliases are a no-op
    pub fn remove_alias(&mut self, author: &str, alias: &str) -> Result<AliasChange> {
        let (author, alias) = normalize_pair(author, alias)?;

        let owned = self
            .table
            .get(&author)
            .is_some_and(|aliases| aliases.contains(&alias));
        if !owned {
            debug!(author = %author, alias = %alias, "Alias not present, nothing to remove");
            return Ok(AliasChange::NotPresent);
        }

        let mut table = self.table.clone();
        if let Some(aliases) = table.get_mut(&author) {
            aliases.retain(|a| *a != alias);
            if aliases.is_empty() {
                table.remove(&author);
            }
        }
        self.commit(table)?;

        info!(author = %author, alias = %alias, "Alias removed");
        Ok(AliasChange::Removed)
    }

    /// Recompute the reverse index from the table
    pub fn rebuild_reverse_index(&mut self) {
        self.reverse = self
            .table
            .iter()
            .flat_map(|(owner, aliases)| aliases.iter().map(move |a| (a.clone(), owner.clone())))
            .collect();
    }

    /// True when the reverse index agrees with the table in both directions
    pub fn is_consistent(&self) -> bool {
        let alias_count: usize = self.table.values().map(Vec::len).sum();
        alias_count == self.reverse.len()
            && self.table.iter().all(|(owner, aliases)| {
                aliases
                    .iter()
                    .all(|a| self.reverse.get(a).is_some_and(|o| o == owner))
            })
    }

    fn commit(&mut self, table: AliasTable) -> Result<()> {
        if let Some(path) = &self.path {
            persist::write_json_atomic(path, &table).map_err(|e| {
                HarvestError::PersistenceFailure(format!("alias table {}: {}", path.display(), e))
            })?;
        }
        self.table = table;
        self.rebuild_reverse_index();
        debug_assert!(self.is_consistent());
        Ok(())
    }
}

fn normalize_pair(author: &str, alias: &str) -> Result<(String, String)> {
    let author = normalize_key(author);
    let alias = normalize_key(alias);
    if author.is_empty() {
        return Err(HarvestError::InvalidInput("author must not be empty".to_string()));
    }
    if alias.is_empty() {
        return Err(HarvestError::InvalidInput("alias must not be empty".to_string()));
    }
    Ok((author, alias))
}

/// Normalize a table read from disk and check that no alias has two owners
fn normalize_table(raw: AliasTable) -> std::result::Result<AliasTable, String> {
    let mut table = AliasTable::new();
    let mut owners: HashMap<String, String> = HashMap::new();

    for (owner, aliases) in raw {
        let owner = normalize_key(&owner);
        if owner.is_empty() {
            return Err("empty author key".to_string());
        }

        for alias in aliases.iter().map(|a| normalize_key(a)).filter(|a| !a.is_empty()) {
            match owners.get(&alias) {
                Some(existing) if *existing == owner => continue,
                Some(existing) => {
                    return Err(format!(
                        "alias '{}' is claimed by both '{}' and '{}'",
                        alias, existing, owner
                    ))
                }
                None => {}
            }
            owners.insert(alias.clone(), owner.clone());
            table.entry(owner.clone()).or_default().push(alias);
        }
    }

    for (alias, owner) in &owners {
        if alias != owner && table.contains_key(alias) {
            return Err(format!(
                "'{}' is an alias of '{}' and also owns aliases",
                alias, owner
            ));
        }
    }
    Ok(table)
}
