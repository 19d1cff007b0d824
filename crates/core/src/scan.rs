//! Bounded-concurrency scan phase.
//!
//! [`ScanPool`] runs an [`Inspector`] over every input title with at most
//! `width` inspections in flight. Items the inspector asks for are pushed
//! into a shared [`MutationQueue`]. Each input title yields exactly one
//! [`ScanOutcome`]: an inspector error or panic becomes `Error` for that
//! title and never stops the rest of the pool.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::Error;
use crate::queue::{MutationQueue, QueueItem};
use crate::store::Title;

/// Default scan width for store-bound inspections.
pub const DEFAULT_SCAN_WIDTH: usize = 50;

/// What an inspector decided for one title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict<P> {
    /// Enqueue these items. One title may produce several (a page and its
    /// redirects) or items for other titles (a redirect to create).
    Mutate(Vec<QueueItem<P>>),
    Skip(String),
}

impl<P> Verdict<P> {
    /// A single item for `title`.
    pub fn mutate(title: impl Into<Title>, payload: P) -> Self {
        Verdict::Mutate(vec![QueueItem::new(title, payload)])
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Verdict::Skip(reason.into())
    }
}

/// Read-only per-title predicate.
#[async_trait]
pub trait Inspector: Send + Sync + 'static {
    type Payload: Send + Sync + 'static;

    async fn inspect(&self, title: &str) -> Result<Verdict<Self::Payload>, Error>;
}

/// Result of inspecting one input title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScanOutcome {
    NeedsMutation { title: Title, items: usize },
    Skipped { title: Title, reason: String },
    Error { title: Title, cause: String },
}

impl ScanOutcome {
    pub fn title(&self) -> &str {
        match self {
            ScanOutcome::NeedsMutation { title, .. }
            | ScanOutcome::Skipped { title, .. }
            | ScanOutcome::Error { title, .. } => title,
        }
    }
}

/// A title whose inspection failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanError {
    pub title: Title,
    pub cause: String,
}

/// Aggregate of one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub total: usize,
    pub needs_mutation: usize,
    /// Items enqueued; may exceed `needs_mutation`.
    pub queued_items: usize,
    pub skipped: usize,
    pub errors: Vec<ScanError>,
}

impl ScanSummary {
    pub fn record(&mut self, outcome: &ScanOutcome) {
        self.total += 1;
        match outcome {
            ScanOutcome::NeedsMutation { items, .. } => {
                self.needs_mutation += 1;
                self.queued_items += items;
            }
            ScanOutcome::Skipped { .. } => self.skipped += 1,
            ScanOutcome::Error { title, cause } => {
                self.errors.push(ScanError { title: title.clone(), cause: cause.clone() });
            }
        }
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// Worker pool for the scan phase.
#[derive(Debug, Clone, Copy)]
pub struct ScanPool {
    width: usize,
}

impl Default for ScanPool {
    fn default() -> Self {
        Self::new(DEFAULT_SCAN_WIDTH)
    }
}

impl ScanPool {
    pub fn new(width: usize) -> Self {
        Self { width: width.max(1) }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub async fn run<I: Inspector>(
        &self,
        titles: &[Title],
        inspector: Arc<I>,
        queue: &Arc<MutationQueue<I::Payload>>,
    ) -> ScanSummary {
        self.run_with(titles, inspector, queue, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `on_outcome` as each title completes.
    pub async fn run_with<I, F>(
        &self,
        titles: &[Title],
        inspector: Arc<I>,
        queue: &Arc<MutationQueue<I::Payload>>,
        mut on_outcome: F,
    ) -> ScanSummary
    where
        I: Inspector,
        F: FnMut(&ScanOutcome),
    {
        tracing::info!("scanning {} titles with width {}", titles.len(), self.width);

        let semaphore = Arc::new(Semaphore::new(self.width));
        let mut join_set = JoinSet::new();
        let mut in_flight = HashMap::with_capacity(titles.len());

        for title in titles {
            let semaphore = semaphore.clone();
            let inspector = inspector.clone();
            let queue = queue.clone();
            let task_title = title.clone();

            let handle = join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let verdict = inspector.inspect(&task_title).await;
                settle(task_title, verdict, &queue)
            });
            in_flight.insert(handle.id(), title.clone());
        }

        let mut summary = ScanSummary::default();
        while let Some(joined) = join_set.join_next_with_id().await {
            let outcome = match joined {
                Ok((id, outcome)) => {
                    in_flight.remove(&id);
                    outcome
                }
                Err(e) => {
                    let title = in_flight.remove(&e.id()).unwrap_or_default();
                    tracing::warn!("inspection of {} aborted: {}", title, e);
                    ScanOutcome::Error { title, cause: e.to_string() }
                }
            };
            on_outcome(&outcome);
            summary.record(&outcome);
        }

        tracing::info!(
            "scan finished: {} need mutation ({} items), {} skipped, {} errors",
            summary.needs_mutation,
            summary.queued_items,
            summary.skipped,
            summary.error_count()
        );
        summary
    }
}

fn settle<P>(title: Title, verdict: Result<Verdict<P>, Error>, queue: &MutationQueue<P>) -> ScanOutcome {
    match verdict {
        Ok(Verdict::Mutate(items)) if items.is_empty() => {
            ScanOutcome::Skipped { title, reason: "nothing to enqueue".to_string() }
        }
        Ok(Verdict::Mutate(items)) => {
            let count = items.len();
            queue.push_many(items);
            tracing::debug!("{} needs mutation ({} items)", title, count);
            ScanOutcome::NeedsMutation { title, items: count }
        }
        Ok(Verdict::Skip(reason)) => ScanOutcome::Skipped { title, reason },
        Err(e) => {
            tracing::warn!("inspection of {} failed: {}", title, e);
            ScanOutcome::Error { title, cause: e.to_string() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ContentStore, MemoryStore, StoreErrorKind, StoreOp};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ContainsInspector {
        store: Arc<MemoryStore>,
        needle: &'static str,
    }

    #[async_trait]
    impl Inspector for ContainsInspector {
        type Payload = ();

        async fn inspect(&self, title: &str) -> Result<Verdict<()>, Error> {
            if title == "Boom" {
                panic!("inspector blew up");
            }
            let text = self.store.get_text(title).await?;
            if text.contains(self.needle) {
                Ok(Verdict::mutate(title, ()))
            } else {
                Ok(Verdict::skip("no match"))
            }
        }
    }

    fn titles(names: &[&str]) -> Vec<Title> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_one_outcome_per_title() {
        let store = Arc::new(MemoryStore::new());
        store.insert("Foo", "target here");
        store.insert("Bar", "nothing");
        store.insert("Flaky", "target");
        store.fail(StoreOp::GetText, "Flaky", StoreErrorKind::Transient);
        let inspector = Arc::new(ContainsInspector { store, needle: "target" });
        let input = titles(&["Foo", "Bar", "Missing", "Flaky", "Boom", "Foo"]);

        let queue = MutationQueue::shared();
        let mut seen = Vec::new();
        let summary = ScanPool::new(3)
            .run_with(&input, inspector, &queue, |o| seen.push(o.title().to_string()))
            .await;

        assert_eq!(summary.total, input.len());
        assert_eq!(seen.len(), input.len());
        seen.sort();
        let mut expected = input.clone();
        expected.sort();
        assert_eq!(seen, expected);

        assert_eq!(summary.needs_mutation, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.error_count(), 3);
        assert!(summary.errors.iter().any(|e| e.title == "Boom"));
        assert_eq!(queue.seal().unwrap().titles(), vec!["Foo", "Foo"]);
    }

    struct WidthGauge {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Inspector for WidthGauge {
        type Payload = ();

        async fn inspect(&self, _title: &str) -> Result<Verdict<()>, Error> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(Verdict::skip("measured"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_width_is_bounded() {
        let gauge = Arc::new(WidthGauge { active: AtomicUsize::new(0), peak: AtomicUsize::new(0) });
        let input: Vec<Title> = (0..40).map(|i| format!("Page {i}")).collect();
        let queue = MutationQueue::shared();

        let summary = ScanPool::new(4).run(&input, gauge.clone(), &queue).await;

        assert_eq!(summary.skipped, 40);
        assert!(gauge.peak.load(Ordering::SeqCst) <= 4);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_empty_mutate_counts_as_skip() {
        struct Nothing;

        #[async_trait]
        impl Inspector for Nothing {
            type Payload = ();

            async fn inspect(&self, _title: &str) -> Result<Verdict<()>, Error> {
                Ok(Verdict::Mutate(Vec::new()))
            }
        }

        let queue = MutationQueue::shared();
        let summary = ScanPool::default().run(&titles(&["A"]), Arc::new(Nothing), &queue).await;
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.needs_mutation, 0);
    }
}
