//! Redirect discovery and bulk deletion.
//!
//! Discovery writes a `Page -> [redirects]` map (JSON plus a CSV for review).
//! Deletion is a separate run that loads the map and removes every page and
//! redirect in it.

use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use wikisweep_core::{
    Applied, CommitQueue, ContentStore, EditorAllowList, Error, Gated, Inspector, Mutator, QueueItem, RedirectMap,
    StoreError, Title, Verdict,
};

use crate::cli::{DeleteArgs, DiscoverArgs};
use crate::context::Context;

/// Collects the redirects that point at each page.
pub struct RedirectInspector {
    store: Arc<dyn ContentStore>,
}

impl RedirectInspector {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Inspector for RedirectInspector {
    type Payload = Vec<Title>;

    async fn inspect(&self, title: &str) -> Result<Verdict<Vec<Title>>, Error> {
        let redirects = self.store.backlinks(title, true).await?;
        tracing::debug!("{} has {} redirects", title, redirects.len());
        Ok(Verdict::mutate(title, redirects))
    }
}

pub struct DeleteMutator {
    reason: String,
}

impl DeleteMutator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait]
impl Mutator for DeleteMutator {
    type Payload = ();

    fn describe(&self, item: &QueueItem<()>) -> String {
        format!("delete {}", item.title)
    }

    async fn apply(&self, store: &dyn ContentStore, item: &QueueItem<()>) -> Result<Applied, StoreError> {
        store.delete(&item.title, &self.reason).await?;
        Ok(Applied::Done)
    }
}

/// Allowed editors from config plus `--allow`, deduplicated.
fn allowed_editors(configured: &[String], extra: &[String]) -> Vec<String> {
    let mut editors: Vec<String> = configured.iter().chain(extra).cloned().collect();
    editors.sort();
    editors.dedup();
    editors
}

/// The editors the gate allows, or `None` when the gate is switched off.
///
/// An empty allow-list is refused unless the gate was explicitly disabled.
fn gate_editors(editors: Vec<String>, unsafe_no_gate: bool) -> Result<Option<Vec<String>>> {
    if unsafe_no_gate {
        return Ok(None);
    }
    if editors.is_empty() {
        bail!("no allowed editors: set allowed_editors in config, pass --allow, or pass --unsafe-no-gate");
    }
    Ok(Some(editors))
}

pub async fn discover(ctx: &Context, args: DiscoverArgs) -> Result<()> {
    let editors = allowed_editors(&ctx.config.allowed_editors, &args.allow);
    let editors = gate_editors(editors, args.unsafe_no_gate)?;

    let titles = ctx.read_input(&args.input)?;
    ctx.login_if_configured().await?;

    let pipeline = ctx.pipeline();
    let inspector = RedirectInspector::new(ctx.store());
    let (_, queue) = match editors {
        Some(editors) => {
            tracing::info!("only pages edited exclusively by {} are kept", editors.join(", "));
            let gate = Arc::new(EditorAllowList::new(ctx.store(), &editors));
            ctx.scan(&pipeline, &titles, Arc::new(Gated::new(gate, inspector))).await?
        }
        None => {
            tracing::warn!("editor check disabled; every page is kept regardless of who edited it");
            ctx.scan(&pipeline, &titles, Arc::new(inspector)).await?
        }
    };

    let map: RedirectMap = queue.map(|item| (item.title, item.payload)).collect();
    map.save(&args.output)?;
    map.save_csv(&args.csv)?;
    println!(
        "{} pages with {} redirects written to {} and {}",
        map.len(),
        map.redirect_count(),
        args.output.display(),
        args.csv.display()
    );
    Ok(())
}

pub async fn delete(ctx: &Context, args: DeleteArgs) -> Result<()> {
    let map = RedirectMap::load(&args.input)?;
    let queue = CommitQueue::from(map.flatten());
    println!("{} pages and {} redirects to delete", map.len(), map.redirect_count());

    ctx.login_for_writes().await?;
    if !ctx.options.dry_run {
        let user = ctx.user_info().await?;
        if !user.has_right("delete") {
            tracing::warn!("{} lacks the delete right; deletions will fail", user.name);
        }
    }

    let pipeline = ctx.pipeline();
    ctx.commit(&pipeline, queue, &DeleteMutator::new(args.reason), "Delete").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wikisweep_core::{CommitResult, Committer, FixedDelay, MemoryStore, Pipeline, ScanPool};

    fn store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::with_editor("Bot"));
        store.insert("Page A", "content");
        store.insert("Page B", "content");
        store.insert("Alias A", "#REDIRECT [[Page A]]");
        store.insert("Other A", "#REDIRECT [[Page A]]");
        store
    }

    #[test]
    fn test_allowed_editors_merged() {
        let editors = allowed_editors(&["Bot".into(), "Admin".into()], &["Bot".into()]);
        assert_eq!(editors, vec!["Admin", "Bot"]);
    }

    #[test]
    fn test_empty_allow_list_refused_without_opt_out() {
        let err = gate_editors(Vec::new(), false).unwrap_err();
        assert!(err.to_string().contains("--unsafe-no-gate"));

        assert_eq!(gate_editors(Vec::new(), true).unwrap(), None);
        assert_eq!(gate_editors(vec!["Bot".into()], true).unwrap(), None);
        assert_eq!(gate_editors(vec!["Bot".into()], false).unwrap(), Some(vec!["Bot".to_string()]));
    }

    #[tokio::test]
    async fn test_discover_builds_redirect_map() {
        let store = store();
        let pipeline = Pipeline::new(ScanPool::new(4), Committer::new(store.clone()));
        let titles = vec!["Page A".to_string(), "Page B".to_string()];

        let (summary, queue) = pipeline.scan(&titles, Arc::new(RedirectInspector::new(store))).await.unwrap();
        let map: RedirectMap = queue.map(|item| (item.title, item.payload)).collect();

        assert_eq!(summary.needs_mutation, 2);
        let mut redirects = map.get("Page A").unwrap().to_vec();
        redirects.sort();
        assert_eq!(redirects, vec!["Alias A", "Other A"]);
        assert_eq!(map.get("Page B"), Some(&[][..]));
    }

    #[tokio::test]
    async fn test_gated_discovery_drops_pages_with_foreign_edits() {
        let store = store();
        store.insert_with_history("Page C", &[("Bot", "v1"), ("Human", "v2")]);
        let pipeline = Pipeline::new(ScanPool::new(4), Committer::new(store.clone()));
        let gate = Arc::new(EditorAllowList::new(store.clone(), &["Bot"]));
        let inspector = Arc::new(Gated::new(gate, RedirectInspector::new(store)));

        let titles = vec!["Page A".to_string(), "Page C".to_string()];
        let (summary, queue) = pipeline.scan(&titles, inspector).await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(queue.titles(), vec!["Page A"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_pages_and_redirects() {
        let store = store();
        let mut map = RedirectMap::new();
        map.insert("Page A".into(), vec!["Alias A".into()]);
        map.insert("Gone".into(), Vec::new());

        let committer = Committer::new(store.clone()).with_throttle(FixedDelay(Duration::from_secs(6)));
        let summary = committer.run(CommitQueue::from(map.flatten()), &DeleteMutator::new("cleanup")).await;

        assert_eq!(summary.successful, 2);
        assert_eq!(summary.skipped_not_found, 1);
        assert!(!store.contains("Page A"));
        assert!(!store.contains("Alias A"));
        assert!(store.contains("Other A"));
        let gone = summary.items.iter().find(|r| r.title == "Gone").unwrap();
        assert_eq!(gone.result, CommitResult::SkippedNotFound);
    }
}
