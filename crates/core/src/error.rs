//! Unified error types for wikisweep.
//!
//! `Error` covers process-level failures (a corrupt cache, a missing title
//! list) that abort a run before any mutation is attempted. Per-item failures
//! against the wiki are carried by [`StoreError`] and never escape the scan
//! pool or the committer.

use std::path::PathBuf;

use crate::store::StoreError;

/// Unified error type for wikisweep.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an empty search term list).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The durable content cache exists but cannot be parsed.
    #[error("CACHE_CORRUPT: {path}: {reason}")]
    CacheCorrupt { path: PathBuf, reason: String },

    /// The title list that drives a scan does not exist.
    #[error("TITLE_LIST_MISSING: {0}")]
    TitleListMissing(PathBuf),

    /// A discovery artifact is required but has not been produced yet.
    #[error("ARTIFACT_MISSING: {0}")]
    ArtifactMissing(PathBuf),

    /// A discovery artifact exists but cannot be parsed.
    #[error("ARTIFACT_CORRUPT: {path}: {reason}")]
    ArtifactCorrupt { path: PathBuf, reason: String },

    /// A regex pattern failed to compile.
    #[error("INVALID_PATTERN: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// The mutation queue was sealed while producers still held a handle.
    #[error("QUEUE_IN_USE: {0} producer handle(s) still alive")]
    QueueInUse(usize),

    /// Filesystem operation failed.
    #[error("IO_ERROR: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization of a durable artifact failed.
    #[error("SERIALIZE_ERROR: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A wiki call failed outside of the per-item isolation boundary.
    #[error("STORE_ERROR: {0}")]
    Store(#[from] StoreError),

    /// A background task panicked or was cancelled.
    #[error("TASK_FAILED: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Task(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::TitleListMissing(PathBuf::from("search_results.txt"));
        assert!(err.to_string().contains("TITLE_LIST_MISSING"));
        assert!(err.to_string().contains("search_results.txt"));
    }

    #[test]
    fn test_cache_corrupt_display() {
        let err = Error::CacheCorrupt { path: PathBuf::from("wiki_cache.json"), reason: "EOF".into() };
        assert_eq!(err.to_string(), "CACHE_CORRUPT: wiki_cache.json: EOF");
    }

    #[test]
    fn test_store_error_conversion() {
        let err: Error = StoreError::new(StoreErrorKind::Locked, "protectedpage").into();
        assert!(err.to_string().starts_with("STORE_ERROR"));
    }
}
