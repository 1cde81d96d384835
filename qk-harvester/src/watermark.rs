//! Persisted reconciliation watermark
//!
//! A single timestamp in its own file. Absence means nothing has been
//! reconciled yet and the next pass reads the whole channel history.

use crate::error::{HarvestError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use qk_common::{persist, time};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Watermark file handle
#[derive(Debug, Clone)]
pub struct Watermark {
    path: PathBuf,
}

impl Watermark {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last reconciled timestamp, `None` when never written
    pub fn load(&self) -> Result<Option<DateTime<Utc>>> {
        let Some(text) = persist::read_text_optional(&self.path)? else {
            debug!("No watermark at {}", self.path.display());
            return Ok(None);
        };

        match time::parse_timestamp(&text) {
            Some(ts) => Ok(Some(ts)),
            None => Err(HarvestError::CorruptArtifact(format!(
                "{}: not an ISO-8601 timestamp: {:?}",
                self.path.display(),
                text.trim()
            ))),
        }
    }

    /// Atomically replace the watermark
    ///
    /// Written at full precision so a reload compares equal to the message
    /// timestamps the watermark was taken from.
    pub fn store(&self, ts: DateTime<Utc>) -> Result<()> {
        let text = ts.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        persist::write_atomic(&self.path, text.as_bytes()).map_err(|e| {
            HarvestError::PersistenceFailure(format!("watermark {}: {}", self.path.display(), e))
        })
    }
}
