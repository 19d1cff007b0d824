//! Hand-off between the scan phase and the commit phase.
//!
//! [`MutationQueue`] is shared by scan workers through an `Arc` and accepts
//! items in any order. [`MutationQueue::seal`] consumes the last handle, sorts
//! the items by title and returns a [`CommitQueue`], a plain FIFO that only
//! the committer reads.

pub mod dedup;

pub use dedup::{TargetVotes, retain_unique_targets};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::store::Title;

/// A title to act on, plus whatever the workload computed for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem<P> {
    pub title: Title,
    pub payload: P,
}

impl<P> QueueItem<P> {
    pub fn new(title: impl Into<Title>, payload: P) -> Self {
        Self { title: title.into(), payload }
    }
}

impl QueueItem<()> {
    /// Item with no payload.
    pub fn bare(title: impl Into<Title>) -> Self {
        Self::new(title, ())
    }
}

/// Multi-producer collection filled during a scan.
#[derive(Debug)]
pub struct MutationQueue<P> {
    items: Mutex<Vec<QueueItem<P>>>,
}

impl<P> Default for MutationQueue<P> {
    fn default() -> Self {
        Self { items: Mutex::new(Vec::new()) }
    }
}

impl<P> MutationQueue<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle for scan workers.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<QueueItem<P>>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, item: QueueItem<P>) {
        self.lock().push(item);
    }

    pub fn push_many(&self, items: impl IntoIterator<Item = QueueItem<P>>) {
        self.lock().extend(items);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// End the producer phase and order the items for commit.
    ///
    /// # Errors
    ///
    /// `QueueInUse` if any other handle to the queue is still alive.
    pub fn seal(self: Arc<Self>) -> Result<CommitQueue<P>, Error> {
        match Arc::try_unwrap(self) {
            Ok(queue) => Ok(queue.into_commit_queue()),
            Err(shared) => Err(Error::QueueInUse(Arc::strong_count(&shared) - 1)),
        }
    }

    /// Order the items for commit.
    pub fn into_commit_queue(self) -> CommitQueue<P> {
        let items = self.items.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
        CommitQueue::from_items(items)
    }
}

/// Sorted FIFO drained by the committer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitQueue<P> {
    items: VecDeque<QueueItem<P>>,
}

impl<P> CommitQueue<P> {
    /// Sort `items` by title. Items sharing a title keep their relative order.
    pub fn from_items(mut items: Vec<QueueItem<P>>) -> Self {
        items.sort_by(|a, b| a.title.cmp(&b.title));
        Self { items: items.into() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn titles(&self) -> Vec<Title> {
        self.items.iter().map(|item| item.title.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueItem<P>> {
        self.items.iter()
    }

    /// Drop items before the commit phase starts.
    pub fn retain(&mut self, keep: impl FnMut(&QueueItem<P>) -> bool) {
        self.items.retain(keep);
    }

    pub fn pop(&mut self) -> Option<QueueItem<P>> {
        self.items.pop_front()
    }
}

impl<P> Iterator for CommitQueue<P> {
    type Item = QueueItem<P>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pop()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.items.len(), Some(self.items.len()))
    }
}

impl<P> ExactSizeIterator for CommitQueue<P> {}

impl From<Vec<Title>> for CommitQueue<()> {
    fn from(titles: Vec<Title>) -> Self {
        Self::from_items(titles.into_iter().map(QueueItem::bare).collect())
    }
}
