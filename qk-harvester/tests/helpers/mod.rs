//! Shared fixtures for qk-harvester integration tests

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use qk_common::config::RootFolderInitializer;
use qk_common::events::EventBus;
use qk_harvester::models::SourceMessage;
use qk_harvester::reconcile::ReconciliationLoop;
use qk_harvester::source::MemorySource;
use qk_harvester::watermark::Watermark;
use qk_harvester::HarvestState;
use std::path::PathBuf;
use tempfile::TempDir;

/// Root folder in a temp dir, an in-memory channel and the loaded artifacts
pub struct Fixture {
    pub dir: TempDir,
    pub source: MemorySource,
    pub state: HarvestState,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let paths = RootFolderInitializer::new(dir.path().to_path_buf());
        let state =
            HarvestState::open(&paths.archive_path(), &paths.aliases_path(), EventBus::new(64))
                .unwrap();
        Self {
            dir,
            source: MemorySource::new("quotes"),
            state,
        }
    }

    fn paths(&self) -> RootFolderInitializer {
        RootFolderInitializer::new(self.dir.path().to_path_buf())
    }

    pub fn archive_path(&self) -> PathBuf {
        self.paths().archive_path()
    }

    pub fn aliases_path(&self) -> PathBuf {
        self.paths().aliases_path()
    }

    pub fn watermark_path(&self) -> PathBuf {
        self.paths().watermark_path()
    }

    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        Watermark::new(self.watermark_path()).load().unwrap()
    }

    /// Archive bytes on disk, `None` if never written
    pub fn archive_bytes(&self) -> Option<Vec<u8>> {
        std::fs::read(self.archive_path()).ok()
    }

    /// Loop over the fixture's channel and shared state
    pub fn harvester(&self) -> ReconciliationLoop<MemorySource> {
        ReconciliationLoop::new(
            self.source.clone(),
            self.state.clone(),
            self.archive_path(),
            Watermark::new(self.watermark_path()),
        )
        .unwrap()
    }

    /// Artifacts as a restarted process would load them
    pub fn reopen(&self) -> HarvestState {
        HarvestState::open(&self.archive_path(), &self.aliases_path(), EventBus::new(64)).unwrap()
    }
}

/// Message from `sender` posted `minutes_ago` minutes before now
pub fn message(content: &str, sender: &str, link: &str, minutes_ago: i64) -> SourceMessage {
    SourceMessage {
        author_name: sender.to_lowercase(),
        author_display_name: sender.to_string(),
        author_is_self: false,
        content: content.to_string(),
        occurred_at: Utc::now() - Duration::minutes(minutes_ago),
        permalink: link.to_string(),
    }
}
