//! Serial, rate-limited commit phase.
//!
//! The [`Committer`] drains a [`CommitQueue`] one item at a time. For each
//! item it re-checks the [`Precondition`] against the store, lets the
//! [`Mutator`] issue its call, and classifies the response into a
//! [`CommitResult`]. The throttle runs around every item that reached the
//! mutator, so two mutation calls are never closer than the configured
//! pacing. Items skipped by the precondition cost no delay.
//!
//! A failure is recorded for its item and the run moves on. Nothing already
//! committed is rolled back.

pub mod retry;
pub mod throttle;

pub use retry::RetryPolicy;
pub use throttle::{DEFAULT_COMMIT_DELAY, FixedDelay, MinInterval, Throttle, Unthrottled};

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::durable::write_atomic;
use crate::queue::{CommitQueue, QueueItem};
use crate::store::{ContentStore, StoreError, StoreErrorKind, Title};

/// Existence check made right before an item is mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Edits, deletes, moves. A vanished page is skipped.
    MustExist,
    /// Creations. An existing page is never overwritten.
    MustNotExist,
}

/// What the mutator did with a page that passed its precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The mutation call succeeded.
    Done,
    /// Nothing left to change; no mutation call was issued.
    Unchanged,
}

/// The write half of a workload.
#[async_trait]
pub trait Mutator: Send + Sync {
    type Payload: Send + Sync + 'static;

    /// Existence check for `item`. Most workloads use one for every item.
    fn precondition(&self, _item: &QueueItem<Self::Payload>) -> Precondition {
        Precondition::MustExist
    }

    /// One-line description of the pending action, for logs and dry runs.
    fn describe(&self, item: &QueueItem<Self::Payload>) -> String;

    /// Issue at most one mutation call for `item`.
    async fn apply(&self, store: &dyn ContentStore, item: &QueueItem<Self::Payload>) -> Result<Applied, StoreError>;
}

/// Outcome of committing one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "detail", rename_all = "snake_case")]
pub enum CommitResult {
    Success,
    SkippedNotFound,
    SkippedExists,
    Unchanged,
    FailedPermission,
    FailedLocked,
    FailedOther(String),
    /// Dry run: the action was described but not performed.
    Planned(String),
}

impl CommitResult {
    /// Classify a store failure.
    pub fn from_error(err: &StoreError) -> Self {
        match err.kind {
            StoreErrorKind::NotFound => CommitResult::SkippedNotFound,
            StoreErrorKind::Locked => CommitResult::FailedLocked,
            StoreErrorKind::PermissionDenied => CommitResult::FailedPermission,
            StoreErrorKind::Transient | StoreErrorKind::Unknown => CommitResult::FailedOther(err.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            CommitResult::FailedPermission | CommitResult::FailedLocked | CommitResult::FailedOther(_)
        )
    }
}

impl fmt::Display for CommitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitResult::Success => f.write_str("success"),
            CommitResult::SkippedNotFound => f.write_str("skipped: page not found"),
            CommitResult::SkippedExists => f.write_str("skipped: page already exists"),
            CommitResult::Unchanged => f.write_str("unchanged"),
            CommitResult::FailedPermission => f.write_str("failed: permission denied"),
            CommitResult::FailedLocked => f.write_str("failed: page is protected"),
            CommitResult::FailedOther(detail) => write!(f, "failed: {detail}"),
            CommitResult::Planned(action) => write!(f, "planned: {action}"),
        }
    }
}

/// One committed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub title: Title,
    #[serde(flatten)]
    pub result: CommitResult,
}

/// Run-level counters plus the per-item log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub successful: usize,
    pub skipped_not_found: usize,
    pub skipped_exists: usize,
    pub unchanged: usize,
    pub failed_permission: usize,
    pub failed_locked: usize,
    pub failed_other: usize,
    pub planned: usize,
    pub items: Vec<CommitRecord>,
}

impl CommitSummary {
    pub fn record(&mut self, title: Title, result: CommitResult) {
        match &result {
            CommitResult::Success => self.successful += 1,
            CommitResult::SkippedNotFound => self.skipped_not_found += 1,
            CommitResult::SkippedExists => self.skipped_exists += 1,
            CommitResult::Unchanged => self.unchanged += 1,
            CommitResult::FailedPermission => self.failed_permission += 1,
            CommitResult::FailedLocked => self.failed_locked += 1,
            CommitResult::FailedOther(_) => self.failed_other += 1,
            CommitResult::Planned(_) => self.planned += 1,
        }
        self.items.push(CommitRecord { title, result });
    }

    pub fn skipped(&self) -> usize {
        self.skipped_not_found + self.skipped_exists
    }

    pub fn failed(&self) -> usize {
        self.failed_permission + self.failed_locked + self.failed_other
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// Failed items, in commit order.
    pub fn failures(&self) -> impl Iterator<Item = &CommitRecord> {
        self.items.iter().filter(|record| record.result.is_failure())
    }

    /// Write the summary as pretty JSON.
    pub fn save_json(&self, path: &Path) -> Result<(), Error> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &json)
    }
}

impl fmt::Display for CommitSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "successful={}, skipped={} (not found {}, exists {}), unchanged={}, failed={} (permission {}, locked {}, other {})",
            self.successful,
            self.skipped(),
            self.skipped_not_found,
            self.skipped_exists,
            self.unchanged,
            self.failed(),
            self.failed_permission,
            self.failed_locked,
            self.failed_other
        )?;
        if self.planned > 0 {
            write!(f, ", planned={}", self.planned)?;
        }
        Ok(())
    }
}

/// Single consumer of the commit queue.
#[derive(Clone)]
pub struct Committer {
    store: Arc<dyn ContentStore>,
    throttle: Arc<dyn Throttle>,
    retry: RetryPolicy,
    dry_run: bool,
}

impl fmt::Debug for Committer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Committer")
            .field("retry", &self.retry)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl Committer {
    /// Committer with the default fixed delay and no retries.
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store, throttle: Arc::new(FixedDelay::default()), retry: RetryPolicy::NONE, dry_run: false }
    }

    pub fn with_throttle(mut self, throttle: impl Throttle + 'static) -> Self {
        self.throttle = Arc::new(throttle);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Describe every action without touching the store.
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub async fn run<M: Mutator>(&self, queue: CommitQueue<M::Payload>, mutator: &M) -> CommitSummary {
        self.run_with(queue, mutator, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `on_record` after each item.
    pub async fn run_with<M, F>(&self, queue: CommitQueue<M::Payload>, mutator: &M, mut on_record: F) -> CommitSummary
    where
        M: Mutator,
        F: FnMut(&CommitRecord),
    {
        tracing::info!("committing {} items{}", queue.len(), if self.dry_run { " (dry run)" } else { "" });

        let mut summary = CommitSummary::default();
        for item in queue {
            let result = self.commit_item(&item, mutator).await;
            summary.record(item.title, result);
            if let Some(record) = summary.items.last() {
                on_record(record);
            }
        }

        tracing::info!("commit finished: {}", summary);
        summary
    }

    async fn commit_item<M: Mutator>(&self, item: &QueueItem<M::Payload>, mutator: &M) -> CommitResult {
        if self.dry_run {
            let action = mutator.describe(item);
            tracing::info!("[dry run] {}", action);
            return CommitResult::Planned(action);
        }

        let exists = match self.store.exists(&item.title).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!("existence check for {} failed: {}", item.title, e);
                return CommitResult::from_error(&e);
            }
        };
        match (mutator.precondition(item), exists) {
            (Precondition::MustExist, false) => {
                tracing::info!("{} no longer exists, skipping", item.title);
                return CommitResult::SkippedNotFound;
            }
            (Precondition::MustNotExist, true) => {
                tracing::info!("{} already exists, skipping", item.title);
                return CommitResult::SkippedExists;
            }
            _ => {}
        }

        let mut attempt = 0;
        loop {
            self.throttle.before_call().await;
            let applied = mutator.apply(self.store.as_ref(), item).await;

            let err = match applied {
                Ok(Applied::Unchanged) => {
                    tracing::debug!("{} already up to date", item.title);
                    return CommitResult::Unchanged;
                }
                Ok(Applied::Done) => {
                    tracing::info!("{}", mutator.describe(item));
                    self.throttle.after_call().await;
                    return CommitResult::Success;
                }
                Err(e) => e,
            };

            self.throttle.after_call().await;
            match self.retry.next_delay(&err, attempt) {
                Some(delay) => {
                    attempt += 1;
                    tracing::warn!(
                        "{} failed ({}), retry {}/{} in {:?}",
                        item.title,
                        err,
                        attempt,
                        self.retry.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    let result = CommitResult::from_error(&err);
                    if result.is_failure() {
                        tracing::warn!("{}: {}", item.title, result);
                    } else {
                        tracing::info!("{}: {}", item.title, result);
                    }
                    return result;
                }
            }
        }
    }
}
