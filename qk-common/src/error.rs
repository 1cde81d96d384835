//! Common error types for quotekeeper

use thiserror::Error;

/// Common result type for quotekeeper operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the quotekeeper crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error (wraps serde_json::Error)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A persisted document exists but could not be understood
    #[error("Corrupt document {path}: {reason}")]
    Corrupt { path: String, reason: String },

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Build a [`Error::Corrupt`] for a file path
    pub fn corrupt(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Error::Corrupt {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_display() {
        let errors = vec![
            (
                Error::Config("channel_id missing".to_string()),
                "Configuration error: channel_id missing",
            ),
            (
                Error::corrupt(Path::new("/data/quotes.json"), "total mismatch"),
                "Corrupt document /data/quotes.json: total mismatch",
            ),
            (
                Error::InvalidInput("empty alias".to_string()),
                "Invalid input: empty alias",
            ),
        ];

        for (error, expected) in errors {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
