//! Error types for qk-harvester
//!
//! Variants are grouped by where they are handled:
//! - per message (skipped, pass continues): `MalformedMessage`, `EmptyName`
//! - per pass (pass aborted, loop continues): `SourceUnavailable`, `PersistenceFailure`
//! - fatal at startup: `ConfigInvalid`, `CorruptArtifact`
//! - returned to the command layer: everything else

use thiserror::Error;

/// Harvester error type
#[derive(Debug, Error)]
pub enum HarvestError {
    /// A message (or a field of it) cannot be turned into a quote
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Author name was empty after trimming
    #[error("Author name is empty")]
    EmptyName,

    /// The message source could not be reached
    #[error("Message source unavailable: {0}")]
    SourceUnavailable(String),

    /// Missing or unusable configuration
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// A store, alias table or watermark write failed
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    /// A persisted document exists but fails validation
    #[error("Corrupt artifact: {0}")]
    CorruptArtifact(String),

    /// The alias already belongs to a different canonical author
    #[error("Alias '{alias}' already belongs to '{owner}'")]
    AmbiguousAlias { alias: String, owner: String },

    /// Unknown author
    #[error("No quotes recorded for '{0}'")]
    NotFound(String),

    /// Known author without quotes
    #[error("'{0}' has no quote history")]
    EmptyHistory(String),

    /// No quotes at all
    #[error("The quote archive is empty")]
    EmptyStore,

    /// Indexed lookup past the end of a list
    #[error("Index {index} is out of range (have {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<qk_common::Error> for HarvestError {
    fn from(err: qk_common::Error) -> Self {
        match err {
            qk_common::Error::Corrupt { .. } => HarvestError::CorruptArtifact(err.to_string()),
            qk_common::Error::Config(msg) => HarvestError::ConfigInvalid(msg),
            qk_common::Error::InvalidInput(msg) => HarvestError::InvalidInput(msg),
            other => HarvestError::PersistenceFailure(other.to_string()),
        }
    }
}

/// Result type for harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;
