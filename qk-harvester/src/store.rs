//! Quote archive
//!
//! Maps a display-formatted author name to that author's aggregate. Authors
//! keep their first-seen order so the persisted document and every listing
//! are deterministic.
//!
//! The whole store is persisted as one JSON document:
//!
//! ```json
//! {
//!     "Sam": {
//!         "total": 1,
//!         "quotes": [
//!             { "text": "Go big or go home - Sam", "occurredAt": "...", "sourceLink": "..." }
//!         ]
//!     }
//! }
//! ```
//!
//! Records carrying a source link that is already archived are not appended
//! again, which makes re-delivered messages harmless.

use crate::alias::normalize_key;
use crate::error::{HarvestError, Result};
use crate::models::{AuthorAggregate, QuoteRecord};
use crate::normalizer::display_name;
use qk_common::persist;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use tracing::info;

/// Outcome of [`QuoteStore::record_quote`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Appended { author: String },
    /// Source link already archived; nothing changed
    Duplicate { author: String },
}

/// A quote together with where it lives in the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteRef<'a> {
    pub author: &'a str,
    /// Position within the author's list
    pub index: usize,
    pub record: &'a QuoteRecord,
}

/// Entry of the chronological quote log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEntry<'a> {
    /// Position in the log
    pub index: usize,
    pub author: &'a str,
    pub record: &'a QuoteRecord,
}

/// Per-author counts in archive order, plus the grand total
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub per_author: Vec<(String, usize)>,
    pub total: usize,
}

/// In-memory quote archive
#[derive(Debug, Clone, Default)]
pub struct QuoteStore {
    authors: Vec<AuthorAggregate>,
    /// Display name → position in `authors`
    index: HashMap<String, usize>,
    /// Every non-empty source link in the archive
    links: HashSet<String>,
}

/// Display-formatted archive key for any spelling of a name
fn archive_key(name: &str) -> Result<String> {
    display_name(&normalize_key(name))
}

impl QuoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the archive from `path` (missing file → empty store)
    pub fn load(path: &Path) -> Result<Self> {
        let store: QuoteStore = persist::read_json_or_default(path)?;
        info!(
            authors = store.author_count(),
            quotes = store.quote_count(),
            "Loaded quote archive from {}",
            path.display()
        );
        Ok(store)
    }

    /// Replace the archive file with this store
    pub fn save(&self, path: &Path) -> Result<()> {
        persist::write_json_atomic(path, self).map_err(|e| {
            HarvestError::PersistenceFailure(format!("quote archive {}: {}", path.display(), e))
        })
    }

    /// Canonical serialized form (what [`QuoteStore::save`] writes)
    pub fn to_canonical_json(&self) -> Result<Vec<u8>> {
        Ok(persist::to_pretty_json(self)?)
    }

    /// Append a quote for a canonical author key, creating the author if new
    pub fn record_quote(
        &mut self,
        canonical_author: &str,
        record: QuoteRecord,
    ) -> Result<RecordOutcome> {
        let name = archive_key(canonical_author)?;

        let link = record.source_link();
        if !link.is_empty() && self.links.contains(link) {
            return Ok(RecordOutcome::Duplicate { author: name });
        }
        if !link.is_empty() {
            self.links.insert(link.to_string());
        }

        let pos = match self.index.get(&name) {
            Some(&pos) => pos,
            None => {
                self.authors.push(AuthorAggregate::new(name.clone()));
                self.index.insert(name.clone(), self.authors.len() - 1);
                self.authors.len() - 1
            }
        };
        self.authors[pos].append(record);

        Ok(RecordOutcome::Appended { author: name })
    }

    /// Aggregate for an author (any spelling of the display name)
    pub fn get(&self, author: &str) -> Result<&AuthorAggregate> {
        let name =
            archive_key(author).map_err(|_| HarvestError::NotFound(author.trim().to_string()))?;
        self.index
            .get(&name)
            .map(|&pos| &self.authors[pos])
            .ok_or(HarvestError::NotFound(name))
    }

    pub fn contains(&self, author: &str) -> bool {
        self.get(author).is_ok()
    }

    /// Aggregates in archive order
    pub fn authors(&self) -> impl Iterator<Item = &AuthorAggregate> {
        self.authors.iter()
    }

    pub fn author_count(&self) -> usize {
        self.authors.len()
    }

    pub fn quote_count(&self) -> usize {
        self.authors.iter().map(AuthorAggregate::total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.quote_count() == 0
    }

    pub fn totals(&self) -> Totals {
        let per_author: Vec<(String, usize)> = self
            .authors
            .iter()
            .map(|a| (a.canonical_name().to_string(), a.total()))
            .collect();
        let total = per_author.iter().map(|(_, n)| n).sum();
        Totals { per_author, total }
    }

    /// One author's quote by position
    pub fn quote_at(&self, author: &str, index: usize) -> Result<QuoteRef<'_>> {
        let aggregate = self.non_empty(author)?;
        let record = aggregate.quotes().get(index).ok_or(HarvestError::IndexOutOfRange {
            index,
            len: aggregate.total(),
        })?;
        Ok(QuoteRef {
            author: aggregate.canonical_name(),
            index,
            record,
        })
    }

    /// Every quote of one author, in archive order
    pub fn history(&self, author: &str) -> Result<&[QuoteRecord]> {
        Ok(self.non_empty(author)?.quotes())
    }

    /// Random quote using the thread-local generator
    pub fn random_quote(&self, author: Option<&str>) -> Result<QuoteRef<'_>> {
        self.random_quote_with(author, &mut rand::thread_rng())
    }

    /// Random quote, uniform over authors with quotes and then over their quotes
    ///
    /// With an author given, uniform over that author's quotes.
    pub fn random_quote_with<R: Rng + ?Sized>(
        &self,
        author: Option<&str>,
        rng: &mut R,
    ) -> Result<QuoteRef<'_>> {
        let aggregate = match author {
            Some(author) => self.non_empty(author)?,
            None => {
                let candidates: Vec<&AuthorAggregate> =
                    self.authors.iter().filter(|a| !a.is_empty()).collect();
                *candidates.choose(rng).ok_or(HarvestError::EmptyStore)?
            }
        };

        let index = rng.gen_range(0..aggregate.total());
        Ok(QuoteRef {
            author: aggregate.canonical_name(),
            index,
            record: &aggregate.quotes()[index],
        })
    }

    /// Every quote in chronological order
    ///
    /// Ties keep archive order (author first-seen order, then list position).
    pub fn log(&self) -> Vec<LogEntry<'_>> {
        let mut entries: Vec<(&str, &QuoteRecord)> = self
            .authors
            .iter()
            .flat_map(|a| a.quotes().iter().map(move |q| (a.canonical_name(), q)))
            .collect();
        entries.sort_by_key(|(_, q)| q.occurred_at());

        entries
            .into_iter()
            .enumerate()
            .map(|(index, (author, record))| LogEntry { index, author, record })
            .collect()
    }

    /// One entry of the chronological log
    pub fn log_entry(&self, index: usize) -> Result<LogEntry<'_>> {
        let log = self.log();
        let len = log.len();
        if len == 0 {
            return Err(HarvestError::EmptyStore);
        }
        log.into_iter()
            .nth(index)
            .ok_or(HarvestError::IndexOutOfRange { index, len })
    }

    /// True when every aggregate satisfies `total == len(quotes)`
    pub fn is_consistent(&self) -> bool {
        self.authors.iter().all(AuthorAggregate::is_consistent)
            && self.index.len() == self.authors.len()
    }

    fn non_empty(&self, author: &str) -> Result<&AuthorAggregate> {
        let aggregate = self.get(author)?;
        if aggregate.is_empty() {
            return Err(HarvestError::EmptyHistory(aggregate.canonical_name().to_string()));
        }
        Ok(aggregate)
    }

    /// Add an aggregate read from disk
    fn insert_loaded(
        &mut self,
        name: String,
        total: usize,
        quotes: Vec<QuoteRecord>,
    ) -> std::result::Result<(), String> {
        let key = archive_key(&name).map_err(|_| format!("empty author name '{}'", name))?;
        if self.index.contains_key(&key) {
            return Err(format!("author '{}' appears more than once", key));
        }

        let aggregate = AuthorAggregate::from_parts(key.clone(), total, quotes)?;
        self.links.extend(
            aggregate
                .quotes()
                .iter()
                .map(QuoteRecord::source_link)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        );
        self.authors.push(aggregate);
        self.index.insert(key, self.authors.len() - 1);
        Ok(())
    }
}

// ============================================================================
// Persisted form
// ============================================================================

#[derive(Serialize)]
struct AggregateRef<'a> {
    total: usize,
    quotes: &'a [QuoteRecord],
}

#[derive(Deserialize)]
struct AggregateDoc {
    total: usize,
    quotes: Vec<QuoteRecord>,
}

impl Serialize for QuoteStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.authors.len()))?;
        for aggregate in &self.authors {
            map.serialize_entry(
                aggregate.canonical_name(),
                &AggregateRef {
                    total: aggregate.total(),
                    quotes: aggregate.quotes(),
                },
            )?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for QuoteStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct StoreVisitor;

        impl<'de> Visitor<'de> for StoreVisitor {
            type Value = QuoteStore;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of author name to quote aggregate")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<QuoteStore, A::Error> {
                let mut store = QuoteStore::new();
                while let Some((name, doc)) = map.next_entry::<String, AggregateDoc>()? {
                    store
                        .insert_loaded(name, doc.total, doc.quotes)
                        .map_err(de::Error::custom)?;
                }
                Ok(store)
            }
        }

        deserializer.deserialize_map(StoreVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
    }

    fn quote(text: &str, minute: u32, link: &str) -> QuoteRecord {
        QuoteRecord::new(text, at(minute), link)
    }

    fn sample_store() -> QuoteStore {
        let mut store = QuoteStore::new();
        store.record_quote("sam", quote("Go big - Sam", 5, "m/1")).unwrap();
        store.record_quote("pat", quote("Stay small - Pat", 1, "m/2")).unwrap();
        store.record_quote("sam", quote("Go home - Sam", 9, "m/3")).unwrap();
        store
    }

    #[test]
    fn test_record_creates_display_named_author() {
        let mut store = QuoteStore::new();
        let outcome = store.record_quote("mary ann", quote("Hi - mary ann", 0, "m/1")).unwrap();
        assert_eq!(outcome, RecordOutcome::Appended { author: "Mary Ann".to_string() });

        let aggregate = store.get("MARY ANN").unwrap();
        assert_eq!(aggregate.canonical_name(), "Mary Ann");
        assert_eq!(aggregate.total(), 1);
        assert!(store.is_consistent());
    }

    #[test]
    fn test_totals_follow_first_seen_order() {
        let store = sample_store();
        let totals = store.totals();
        assert_eq!(
            totals.per_author,
            vec![("Sam".to_string(), 2), ("Pat".to_string(), 1)]
        );
        assert_eq!(totals.total, 3);
        assert_eq!(store.quote_count(), 3);
    }

    #[test]
    fn test_duplicate_link_not_appended() {
        let mut store = sample_store();
        let outcome = store.record_quote("sam", quote("Go big - Sam", 5, "m/1")).unwrap();
        assert_eq!(outcome, RecordOutcome::Duplicate { author: "Sam".to_string() });
        assert_eq!(store.get("sam").unwrap().total(), 2);

        // Empty links never count as duplicates
        store.record_quote("sam", quote("a - Sam", 10, "")).unwrap();
        store.record_quote("sam", quote("a - Sam", 10, "")).unwrap();
        assert_eq!(store.get("sam").unwrap().total(), 4);
        assert!(store.is_consistent());
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let store = sample_store();
        assert!(matches!(store.get("nobody"), Err(HarvestError::NotFound(ref n)) if n == "Nobody"));
        assert!(matches!(store.get("   "), Err(HarvestError::NotFound(_))));
    }

    #[test]
    fn test_empty_canonical_key_is_error() {
        let mut store = QuoteStore::new();
        let err = store.record_quote("  ", quote("x - ", 0, "m/9")).unwrap_err();
        assert!(matches!(err, HarvestError::EmptyName));
        // Rejected record must not poison the link set
        store.record_quote("sam", quote("x - Sam", 0, "m/9")).unwrap();
        assert_eq!(store.quote_count(), 1);
    }

    #[test]
    fn test_random_quote_empty_store() {
        let store = QuoteStore::new();
        assert!(matches!(store.random_quote(None), Err(HarvestError::EmptyStore)));
    }

    #[test]
    fn test_random_quote_is_uniform_over_authors() {
        let store = sample_store();
        let mut rng = StdRng::seed_from_u64(7);

        let mut pat = 0;
        let draws = 4000;
        for _ in 0..draws {
            let picked = store.random_quote_with(None, &mut rng).unwrap();
            assert_eq!(&store.get(picked.author).unwrap().quotes()[picked.index], picked.record);
            if picked.author == "Pat" {
                pat += 1;
            }
        }
        // Pat owns 1 of 3 quotes but half of the author draws
        assert!((1700..2300).contains(&pat), "pat drawn {} times", pat);
    }

    #[test]
    fn test_random_quote_for_author() {
        let store = sample_store();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let picked = store.random_quote_with(Some("SAM"), &mut rng).unwrap();
            assert_eq!(picked.author, "Sam");
            assert!(picked.index < 2);
        }
        assert!(matches!(
            store.random_quote_with(Some("nobody"), &mut rng),
            Err(HarvestError::NotFound(_))
        ));
    }

    #[test]
    fn test_quote_at_bounds() {
        let store = sample_store();
        assert_eq!(store.quote_at("sam", 1).unwrap().record.text(), "Go home - Sam");
        assert!(matches!(
            store.quote_at("sam", 2),
            Err(HarvestError::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_history_in_archive_order() {
        let store = sample_store();
        let texts: Vec<&str> = store
            .history("Sam")
            .unwrap()
            .iter()
            .map(QuoteRecord::text)
            .collect();
        assert_eq!(texts, vec!["Go big - Sam", "Go home - Sam"]);
        assert!(matches!(store.history("nobody"), Err(HarvestError::NotFound(_))));
    }

    #[test]
    fn test_log_is_chronological() {
        let store = sample_store();
        let log = store.log();
        let texts: Vec<&str> = log.iter().map(|e| e.record.text()).collect();
        assert_eq!(texts, vec!["Stay small - Pat", "Go big - Sam", "Go home - Sam"]);
        assert_eq!(store.log_entry(2).unwrap().author, "Sam");
        assert!(matches!(
            store.log_entry(3),
            Err(HarvestError::IndexOutOfRange { index: 3, len: 3 })
        ));
        assert!(matches!(QuoteStore::new().log_entry(0), Err(HarvestError::EmptyStore)));
    }

    #[test]
    fn test_save_and_load_preserve_order_and_links() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quotes.json");
        let store = sample_store();
        store.save(&path).unwrap();

        let mut loaded = QuoteStore::load(&path).unwrap();
        assert_eq!(loaded.totals(), store.totals());
        assert_eq!(loaded.to_canonical_json().unwrap(), store.to_canonical_json().unwrap());

        // Link set is rebuilt on load
        let outcome = loaded.record_quote("pat", quote("Stay small - Pat", 1, "m/2")).unwrap();
        assert!(matches!(outcome, RecordOutcome::Duplicate { .. }));
    }

    #[test]
    fn test_persisted_shape() {
        let mut store = QuoteStore::new();
        store
            .record_quote("sam", quote("Go big or go home \u{2014} Sam", 0, "m/1"))
            .unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&store.to_canonical_json().unwrap()).unwrap();

        assert_eq!(json["Sam"]["total"], 1);
        assert_eq!(json["Sam"]["quotes"][0]["text"], "Go big or go home \u{2014} Sam");
        assert_eq!(json["Sam"]["quotes"][0]["sourceLink"], "m/1");
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = QuoteStore::load(&dir.path().join("quotes.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_rejects_total_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quotes.json");
        std::fs::write(
            &path,
            r#"{ "Sam": { "total": 2, "quotes": [
                { "text": "x - Sam", "occurredAt": "2024-01-01T00:00:00Z", "sourceLink": "m/1" }
            ] } }"#,
        )
        .unwrap();

        let err = QuoteStore::load(&path).unwrap_err();
        assert!(matches!(err, HarvestError::CorruptArtifact(ref m) if m.contains("total 2")));
    }

    #[test]
    fn test_load_rejects_missing_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quotes.json");
        std::fs::write(&path, r#"{ "Sam": { "total": 0 } }"#).unwrap();
        assert!(matches!(QuoteStore::load(&path), Err(HarvestError::CorruptArtifact(_))));
    }
}
