//! Error types for the Lethe core library.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for all Lethe operations.
///
/// Only the persistence boundary and configuration loading can fail; the
/// sanitizer, the scorer and the decay pass are total.
#[derive(Error, Debug)]
pub enum LetheError {
    /// The persisted file exists but does not parse into the expected shape.
    #[error("Malformed persisted state at {}: {reason}", path.display())]
    MalformedPersistedState {
        /// File that failed to parse.
        path: PathBuf,
        /// Parser diagnostic.
        reason: String,
    },

    /// Read or write failure at the filesystem boundary.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Encoding a snapshot failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A background save task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    TaskJoin(String),
}

impl LetheError {
    /// Wrap an [`std::io::Error`] with the path it happened on.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether retrying the same operation might succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::TaskJoin(_))
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, LetheError>;
