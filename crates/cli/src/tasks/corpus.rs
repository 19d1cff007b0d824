//! Title directory and content cache maintenance.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use wikisweep_core::{ContentSnapshot, ContentStore, Error, Title, TitleDirectory};

use crate::context::Context;
use crate::progress;

/// Title directory that may still be rebuilding in the background.
///
/// A stale directory starts rebuilding as soon as the warmup is created, so
/// the listing overlaps with whatever the caller does before it needs titles.
pub struct DirectoryWarmup {
    directory: TitleDirectory,
    rebuild: Option<JoinHandle<Result<Vec<Title>, Error>>>,
}

impl DirectoryWarmup {
    pub fn start(directory: TitleDirectory, store: Arc<dyn ContentStore>) -> Self {
        if directory.is_valid() {
            return Self { directory, rebuild: None };
        }

        tracing::info!("title directory {} is stale, rebuilding in background", directory.path().display());
        let background = directory.clone();
        let rebuild = tokio::spawn(async move { background.rebuild(store).await });
        Self { directory, rebuild: Some(rebuild) }
    }

    pub fn is_rebuilding(&self) -> bool {
        self.rebuild.is_some()
    }

    /// Wait for the rebuild if one is running, otherwise read the directory.
    pub async fn titles(self) -> Result<Vec<Title>, Error> {
        match self.rebuild {
            Some(handle) => handle.await?,
            None => self.directory.load(),
        }
    }
}

/// Load the content cache, rebuilding it (and the directory) when stale.
pub async fn snapshot(ctx: &Context, force_refresh: bool) -> Result<ContentSnapshot> {
    let cache = ctx.content_cache();
    if cache.is_valid() && !force_refresh {
        return Ok(cache.load().await?);
    }

    let store = ctx.store();
    let titles = DirectoryWarmup::start(ctx.directory(), store.clone()).titles().await?;
    let spinner = progress::spinner(&format!("Fetching {} pages", titles.len()));
    let snapshot = cache.rebuild(&titles, store).await;
    spinner.finish_and_clear();
    Ok(snapshot?)
}

pub async fn refresh_directory(ctx: &Context) -> Result<()> {
    ctx.login_if_configured().await?;
    let spinner = progress::spinner("Listing titles");
    let titles = ctx.directory().rebuild(ctx.store()).await;
    spinner.finish_and_clear();
    println!("{} titles written to {}", titles?.len(), ctx.config.directory_path.display());
    Ok(())
}

pub async fn refresh_cache(ctx: &Context) -> Result<()> {
    ctx.login_if_configured().await?;
    let snapshot = snapshot(ctx, true).await?;
    println!("{} pages cached in {}", snapshot.len(), ctx.config.cache_path.display());
    Ok(())
}

pub fn status(ctx: &Context) -> Result<()> {
    let cache = ctx.content_cache();
    let directory = ctx.directory();

    println!(
        "cache      {}  {}",
        ctx.config.cache_path.display(),
        freshness(cache.age(), cache.is_valid())
    );
    println!(
        "directory  {}  {}",
        ctx.config.directory_path.display(),
        freshness(wikisweep_core::durable::file_age(directory.path()), directory.is_valid())
    );
    Ok(())
}

fn freshness(age: Option<Duration>, valid: bool) -> String {
    match age {
        None => "missing".to_string(),
        Some(age) => {
            let state = if valid { "fresh" } else { "stale" };
            format!("{state} (age {})", format_age(age))
        }
    }
}

fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    match secs {
        0..=59 => format!("{secs}s"),
        60..=3599 => format!("{}m", secs / 60),
        _ => format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wikisweep_core::MemoryStore;

    #[tokio::test]
    async fn test_warmup_rebuilds_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wiki_directory.txt");
        let store = Arc::new(MemoryStore::new());
        store.insert("Alpha", "a");
        store.insert("Beta", "b");

        let warmup = DirectoryWarmup::start(TitleDirectory::new(&path, Duration::from_secs(60)), store);
        assert!(warmup.is_rebuilding());

        let mut titles = warmup.titles().await.unwrap();
        titles.sort();
        assert_eq!(titles, vec!["Alpha", "Beta"]);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_warmup_reuses_fresh_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wiki_directory.txt");
        std::fs::write(&path, "Cached\n").unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert("Live", "x");

        let warmup = DirectoryWarmup::start(TitleDirectory::new(&path, Duration::from_secs(60)), store);
        assert!(!warmup.is_rebuilding());
        assert_eq!(warmup.titles().await.unwrap(), vec!["Cached"]);
    }

    #[test]
    fn test_freshness_labels() {
        assert_eq!(freshness(None, false), "missing");
        assert_eq!(freshness(Some(Duration::from_secs(42)), true), "fresh (age 42s)");
        assert_eq!(freshness(Some(Duration::from_secs(90_000)), false), "stale (age 25h00m)");
    }
}
