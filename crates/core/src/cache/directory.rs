//! Title directory: every main-namespace title, one per line.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::artifacts::{read_titles, write_titles};
use crate::durable::is_fresh;
use crate::store::{ContentStore, Title};
use crate::Error;

/// TTL-gated listing of the corpus.
#[derive(Debug, Clone)]
pub struct TitleDirectory {
    path: PathBuf,
    max_age: Duration,
}

impl TitleDirectory {
    pub fn new(path: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self { path: path.into(), max_age }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_valid(&self) -> bool {
        is_fresh(&self.path, self.max_age)
    }

    pub fn load(&self) -> Result<Vec<Title>, Error> {
        read_titles(&self.path)
    }

    /// List every title from the store and publish the directory.
    pub async fn rebuild(&self, store: Arc<dyn ContentStore>) -> Result<Vec<Title>, Error> {
        let titles = store.all_titles().await?;
        let path = self.path.clone();
        let published = titles.clone();
        tokio::task::spawn_blocking(move || write_titles(&path, &published)).await??;
        tracing::info!("title directory saved to {}: {} titles", self.path.display(), titles.len());
        Ok(titles)
    }

    /// Load the directory if valid, otherwise rebuild it.
    pub async fn load_or_rebuild(&self, store: Arc<dyn ContentStore>) -> Result<Vec<Title>, Error> {
        if self.is_valid() {
            return self.load();
        }
        self.rebuild(store).await
    }
}
