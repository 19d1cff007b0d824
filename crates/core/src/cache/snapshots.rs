//! Whole-corpus content snapshot.
//!
//! The durable form is a JSON object `{ "Title": "text", ... }`. Its mtime is
//! the snapshot's `fetched_at`. A snapshot is either valid and used wholesale,
//! or stale and rebuilt from scratch; there is no partial refresh.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::durable::{file_age, is_fresh, write_atomic_async};
use crate::store::{ContentStore, Title};
use crate::Error;

/// Default titles per batched read.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Default concurrent batched reads.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// An immutable `title -> text` mapping and the moment it was fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSnapshot {
    pub texts: BTreeMap<Title, String>,
    pub fetched_at: DateTime<Utc>,
}

impl ContentSnapshot {
    pub fn get(&self, title: &str) -> Option<&str> {
        self.texts.get(title).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn titles(&self) -> impl Iterator<Item = &Title> {
        self.texts.keys()
    }
}

/// TTL-gated on-disk snapshot of the corpus.
#[derive(Debug, Clone)]
pub struct ContentCache {
    path: PathBuf,
    max_age: Duration,
    batch_size: usize,
    concurrency: usize,
}

impl ContentCache {
    pub fn new(path: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self { path: path.into(), max_age, batch_size: DEFAULT_BATCH_SIZE, concurrency: DEFAULT_CONCURRENCY }
    }

    /// Override batch size and batch-read width used by [`rebuild`](Self::rebuild).
    pub fn with_batching(mut self, batch_size: usize, concurrency: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// True iff a durable snapshot exists and is younger than `max_age`.
    pub fn is_valid(&self) -> bool {
        is_fresh(&self.path, self.max_age)
    }

    /// Age of the durable snapshot, if one exists.
    pub fn age(&self) -> Option<Duration> {
        file_age(&self.path)
    }

    /// Read the durable snapshot.
    ///
    /// # Errors
    ///
    /// `CacheCorrupt` if the file cannot be parsed, `Io` if it cannot be read.
    pub async fn load(&self) -> Result<ContentSnapshot, Error> {
        let bytes = tokio::fs::read(&self.path).await?;
        let texts: BTreeMap<Title, String> = serde_json::from_slice(&bytes)
            .map_err(|e| Error::CacheCorrupt { path: self.path.clone(), reason: e.to_string() })?;

        let modified = tokio::fs::metadata(&self.path)
            .await?
            .modified()
            .unwrap_or_else(|_| SystemTime::now());

        tracing::debug!("loaded {} cached pages from {}", texts.len(), self.path.display());
        Ok(ContentSnapshot { texts, fetched_at: DateTime::<Utc>::from(modified) })
    }

    /// Fetch every title in batches, publish the result, and return it.
    ///
    /// Batches are read concurrently, at most `concurrency` at a time. A batch
    /// that fails is logged and its titles are simply absent from the result.
    pub async fn rebuild(&self, titles: &[Title], store: Arc<dyn ContentStore>) -> Result<ContentSnapshot, Error> {
        let batches: Vec<Vec<Title>> = titles.chunks(self.batch_size).map(<[Title]>::to_vec).collect();
        let total_batches = batches.len();
        tracing::info!(
            "rebuilding content cache: {} titles in {} batches of up to {}",
            titles.len(),
            total_batches,
            self.batch_size
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();

        for (index, batch) in batches.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let store = store.clone();
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = store.get_texts(&batch).await;
                (index, batch.len(), result)
            });
        }

        let mut texts = BTreeMap::new();
        let mut failed_batches = 0usize;

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, _, Ok(batch_texts))) => texts.extend(batch_texts),
                Ok((index, size, Err(e))) => {
                    failed_batches += 1;
                    tracing::warn!("cache batch {} ({} titles) failed: {}", index, size, e);
                }
                Err(e) => {
                    failed_batches += 1;
                    tracing::warn!("cache batch task failed: {}", e);
                }
            }
        }

        let json = serde_json::to_vec(&texts)?;
        write_atomic_async(&self.path, json).await?;

        tracing::info!(
            "content cache saved to {}: {} pages, {} of {} batches failed",
            self.path.display(),
            texts.len(),
            failed_batches,
            total_batches
        );

        Ok(ContentSnapshot { texts, fetched_at: Utc::now() })
    }

    /// Load the snapshot if it is valid, otherwise rebuild it.
    pub async fn load_or_rebuild(&self, titles: &[Title], store: Arc<dyn ContentStore>) -> Result<ContentSnapshot, Error> {
        if self.is_valid() {
            return self.load().await;
        }
        self.rebuild(titles, store).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreErrorKind, StoreOp};
    use std::fs::File;

    fn titles(names: &[&str]) -> Vec<Title> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn backdate(path: &Path, by: Duration) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() - by)
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_cache_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path().join("wiki_cache.json"), Duration::from_secs(3600));
        assert!(!cache.is_valid());
        assert!(cache.age().is_none());
    }

    #[tokio::test]
    async fn test_rebuild_then_valid_then_stale() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path().join("wiki_cache.json"), Duration::from_secs(3600));
        let store = Arc::new(MemoryStore::new());
        store.insert("Foo", "foo text");
        store.insert("Bar", "bar text");

        let snapshot = cache.rebuild(&titles(&["Foo", "Bar"]), store).await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(cache.is_valid());

        backdate(cache.path(), Duration::from_secs(7200));
        assert!(!cache.is_valid());
    }

    #[tokio::test]
    async fn test_load_roundtrips_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path().join("wiki_cache.json"), Duration::from_secs(3600));
        let store = Arc::new(MemoryStore::new());
        store.insert("Foo", "line one\nline two");

        let built = cache.rebuild(&titles(&["Foo"]), store).await.unwrap();
        let loaded = cache.load().await.unwrap();
        assert_eq!(loaded.texts, built.texts);
        assert_eq!(loaded.get("Foo"), Some("line one\nline two"));
    }

    #[tokio::test]
    async fn test_load_corrupt_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wiki_cache.json");
        std::fs::write(&path, "{ not json").unwrap();

        let cache = ContentCache::new(&path, Duration::from_secs(3600));
        let result = cache.load().await;
        assert!(matches!(result, Err(Error::CacheCorrupt { .. })));
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_titles_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path().join("wiki_cache.json"), Duration::from_secs(3600)).with_batching(2, 2);
        let store = Arc::new(MemoryStore::new());
        for name in ["A", "B", "C", "D", "E"] {
            store.insert(name, name);
        }
        // "C" sits in the second batch ["C", "D"].
        store.fail(StoreOp::GetText, "C", StoreErrorKind::Transient);

        let snapshot = cache
            .rebuild(&titles(&["A", "B", "C", "D", "E"]), store)
            .await
            .unwrap();

        let kept: Vec<&str> = snapshot.titles().map(String::as_str).collect();
        assert_eq!(kept, vec!["A", "B", "E"]);
        assert!(cache.is_valid());
    }

    #[tokio::test]
    async fn test_missing_pages_are_omitted() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path().join("wiki_cache.json"), Duration::from_secs(3600));
        let store = Arc::new(MemoryStore::new());
        store.insert("Foo", "text");

        let snapshot = cache.rebuild(&titles(&["Foo", "Gone"]), store).await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get("Gone").is_none());
    }

    #[tokio::test]
    async fn test_load_or_rebuild_uses_valid_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path().join("wiki_cache.json"), Duration::from_secs(3600));
        let store = Arc::new(MemoryStore::new());
        store.insert("Foo", "old");
        cache.rebuild(&titles(&["Foo"]), store.clone()).await.unwrap();

        store.insert("Foo", "new");
        let snapshot = cache.load_or_rebuild(&titles(&["Foo"]), store.clone()).await.unwrap();
        assert_eq!(snapshot.get("Foo"), Some("old"));

        backdate(cache.path(), Duration::from_secs(7200));
        let snapshot = cache.load_or_rebuild(&titles(&["Foo"]), store).await.unwrap();
        assert_eq!(snapshot.get("Foo"), Some("new"));
    }
}
