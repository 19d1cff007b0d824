//! The capability surface wikisweep needs from a remote wiki.
//!
//! Every call returns `Result<T, StoreError>` with a structured
//! [`StoreErrorKind`]. Implementations classify failures once, at their own
//! boundary, so the pipeline never inspects error text.

pub mod memory;

pub use memory::{MemoryStore, StoreOp};

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque document identifier. Compared byte-for-byte; callers normalize.
pub type Title = String;

/// Failure classes for a single store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreErrorKind {
    /// The document does not exist (or vanished since it was scanned).
    NotFound,
    /// The document is protected against this action.
    Locked,
    /// The account lacks the right to perform this action.
    PermissionDenied,
    /// Network failure, timeout, rate limiting or a 5xx response.
    Transient,
    /// Anything the implementation could not classify.
    Unknown,
}

impl StoreErrorKind {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(self) -> bool {
        matches!(self, StoreErrorKind::Transient)
    }
}

/// Error returned by every [`ContentStore`] call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn not_found(title: &str) -> Self {
        Self::new(StoreErrorKind::NotFound, format!("page does not exist: {title}"))
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == StoreErrorKind::NotFound
    }
}

/// One entry of a document's edit history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// Editor name. `None` when the wiki hides it (suppressed or deleted user).
    pub editor: Option<String>,
    pub revision_id: u64,
    /// Revision text, when the history call fetched content.
    pub text: Option<String>,
}

/// Remote document store.
///
/// Reads are issued concurrently by the scan pool; mutations are only ever
/// issued by the committer, one at a time.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn exists(&self, title: &str) -> Result<bool, StoreError>;

    /// Current text of a document. Fails with `NotFound` when absent.
    async fn get_text(&self, title: &str) -> Result<String, StoreError>;

    /// Texts for many titles. Absent titles are omitted from the map.
    async fn get_texts(&self, titles: &[Title]) -> Result<HashMap<Title, String>, StoreError> {
        let mut texts = HashMap::with_capacity(titles.len());
        for title in titles {
            match self.get_text(title).await {
                Ok(text) => {
                    texts.insert(title.clone(), text);
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(texts)
    }

    /// Full edit history, newest first.
    async fn get_history(&self, title: &str) -> Result<Vec<Revision>, StoreError>;

    /// Create or overwrite a document.
    async fn save(&self, title: &str, text: &str, summary: &str, tags: &[String]) -> Result<(), StoreError>;

    async fn delete(&self, title: &str, reason: &str) -> Result<(), StoreError>;

    async fn move_page(&self, title: &str, new_title: &str, reason: &str) -> Result<(), StoreError>;

    /// Titles linking to `title`; with `redirects_only`, only redirect pages.
    async fn backlinks(&self, title: &str, redirects_only: bool) -> Result<Vec<Title>, StoreError>;

    /// Every non-redirect title in the main namespace.
    async fn all_titles(&self) -> Result<Vec<Title>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_kind() {
        assert!(StoreErrorKind::Transient.is_transient());
        assert!(!StoreErrorKind::Locked.is_transient());
        assert!(!StoreErrorKind::Unknown.is_transient());
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::not_found("Foo");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "NotFound: page does not exist: Foo");
    }

    #[tokio::test]
    async fn test_default_get_texts_omits_missing() {
        let store = MemoryStore::new();
        store.insert("Foo", "foo text");
        let texts = store
            .get_texts(&["Foo".to_string(), "Missing".to_string()])
            .await
            .unwrap();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts["Foo"], "foo text");
    }
}
