//! Move pages to `<last path segment> <suffix>`.

use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use wikisweep_core::queue::retain_unique_targets;
use wikisweep_core::{Applied, CommitQueue, ContentStore, Error, Inspector, Mutator, QueueItem, StoreError, Title, Verdict};

use crate::cli::MoveArgs;
use crate::context::Context;

/// `Items/Widgets/Gear` with suffix `(part)` becomes `Gear (part)`.
pub fn move_target(title: &str, suffix: &str) -> Title {
    let last = title.rsplit('/').next().unwrap_or(title).trim();
    format!("{last} {}", suffix.trim()).trim().to_string()
}

/// Computes each page's new title and skips moves onto existing pages.
pub struct MoveInspector {
    store: Arc<dyn ContentStore>,
    suffix: String,
}

impl MoveInspector {
    pub fn new(store: Arc<dyn ContentStore>, suffix: impl Into<String>) -> Self {
        Self { store, suffix: suffix.into() }
    }
}

#[async_trait]
impl Inspector for MoveInspector {
    type Payload = Title;

    async fn inspect(&self, title: &str) -> Result<Verdict<Title>, Error> {
        let target = move_target(title, &self.suffix);
        if target == title {
            return Ok(Verdict::skip("already at target title"));
        }
        if self.store.exists(&target).await? {
            return Ok(Verdict::skip(format!("{target} already exists")));
        }
        Ok(Verdict::mutate(title, target))
    }
}

/// Drop every move whose target is shared with another page.
pub fn unique_moves(queue: CommitQueue<Title>) -> (CommitQueue<Title>, usize) {
    let before = queue.len();
    let kept = retain_unique_targets(queue.map(|item| (item.title, item.payload)));
    let dropped = before - kept.len();
    let items = kept.into_iter().map(|(title, target)| QueueItem::new(title, target)).collect();
    (CommitQueue::from_items(items), dropped)
}

pub struct MoveMutator {
    reason: Option<String>,
}

impl MoveMutator {
    pub fn new(reason: Option<String>) -> Self {
        Self { reason }
    }

    fn reason_for(&self, target: &str) -> String {
        match &self.reason {
            Some(reason) => reason.clone(),
            None => format!("Moving page to {target}"),
        }
    }
}

#[async_trait]
impl Mutator for MoveMutator {
    type Payload = Title;

    fn describe(&self, item: &QueueItem<Title>) -> String {
        format!("move {} -> {}", item.title, item.payload)
    }

    async fn apply(&self, store: &dyn ContentStore, item: &QueueItem<Title>) -> Result<Applied, StoreError> {
        store.move_page(&item.title, &item.payload, &self.reason_for(&item.payload)).await?;
        Ok(Applied::Done)
    }
}

pub async fn run(ctx: &Context, args: MoveArgs) -> Result<()> {
    if args.suffix.trim().is_empty() {
        bail!("--suffix must not be empty");
    }
    let titles = ctx.read_input(&args.input)?;
    ctx.login_for_writes().await?;

    let pipeline = ctx.pipeline();
    let inspector = Arc::new(MoveInspector::new(ctx.store(), args.suffix));
    let (_, queue) = ctx.scan(&pipeline, &titles, inspector).await?;

    let (queue, dropped) = unique_moves(queue);
    if dropped > 0 {
        println!("{dropped} moves dropped: their target is shared with another page");
    }

    ctx.commit(&pipeline, queue, &MoveMutator::new(args.reason), "Move").await?;
    Ok(())
}
