//! Undo the latest edit of listed pages by restoring the previous revision.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use wikisweep_core::{Applied, ContentStore, Error, Inspector, Mutator, QueueItem, StoreError, Verdict};

use crate::cli::RevertArgs;
use crate::context::Context;

/// The revision a revert undoes and the text it restores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevertPlan {
    pub latest_revision: u64,
    pub text: String,
}

/// Queues the text of the second-newest revision.
pub struct RevertInspector {
    store: Arc<dyn ContentStore>,
}

impl RevertInspector {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Inspector for RevertInspector {
    type Payload = RevertPlan;

    async fn inspect(&self, title: &str) -> Result<Verdict<RevertPlan>, Error> {
        let history = match self.store.get_history(title).await {
            Ok(history) => history,
            Err(e) if e.is_not_found() => return Ok(Verdict::skip("page does not exist")),
            Err(e) => return Err(e.into()),
        };
        let (Some(latest), Some(previous)) = (history.first(), history.get(1)) else {
            return Ok(Verdict::skip("not enough history to revert"));
        };
        match &previous.text {
            Some(text) => {
                Ok(Verdict::mutate(title, RevertPlan { latest_revision: latest.revision_id, text: text.clone() }))
            }
            None => Ok(Verdict::skip(format!("revision {} has no visible text", previous.revision_id))),
        }
    }
}

pub struct RevertMutator {
    summary: String,
    tags: Vec<String>,
}

impl RevertMutator {
    pub fn new(summary: impl Into<String>, tags: Vec<String>) -> Self {
        Self { summary: summary.into(), tags }
    }
}

#[async_trait]
impl Mutator for RevertMutator {
    type Payload = RevertPlan;

    fn describe(&self, item: &QueueItem<RevertPlan>) -> String {
        format!("revert {} r{} ({} bytes)", item.title, item.payload.latest_revision, item.payload.text.len())
    }

    async fn apply(&self, store: &dyn ContentStore, item: &QueueItem<RevertPlan>) -> Result<Applied, StoreError> {
        let history = store.get_history(&item.title).await?;
        let Some(latest) = history.first() else {
            return Ok(Applied::Unchanged);
        };
        if latest.revision_id != item.payload.latest_revision {
            tracing::warn!(
                "{} was edited after the scan (r{} is now r{}), leaving it alone",
                item.title,
                item.payload.latest_revision,
                latest.revision_id
            );
            return Ok(Applied::Unchanged);
        }
        if latest.text.as_deref() == Some(item.payload.text.as_str()) {
            return Ok(Applied::Unchanged);
        }
        store.save(&item.title, &item.payload.text, &self.summary, &self.tags).await?;
        Ok(Applied::Done)
    }
}

pub async fn run(ctx: &Context, args: RevertArgs) -> Result<()> {
    // A resumed queue is inspected again: the plan depends on the newest revision.
    let titles = match ctx.resume_queue(&args.input, &args.queue)? {
        Some(queued) => queued,
        None => ctx.read_input(&args.input)?,
    };
    ctx.login_for_writes().await?;

    let pipeline = ctx.pipeline();
    let (_, queue) = ctx.scan(&pipeline, &titles, Arc::new(RevertInspector::new(ctx.store()))).await?;
    ctx.save_queue(&args.queue, &queue)?;

    let mutator = RevertMutator::new(args.summary, ctx.config.edit_tags.clone());
    let result = ctx.commit(&pipeline, queue, &mutator, "Revert").await?;
    ctx.settle_queue(&args.queue, &result)
}
