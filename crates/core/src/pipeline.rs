//! Scan, queue and commit composed for one workload.
//!
//! The phases can run back to back through [`Pipeline::run`], or separately:
//! a discovery run persists its queue as an artifact for human review and a
//! later run loads it into a [`CommitQueue`] and calls [`Pipeline::commit`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::commit::{CommitRecord, CommitSummary, Committer, Mutator};
use crate::queue::{CommitQueue, MutationQueue};
use crate::scan::{Inspector, ScanOutcome, ScanPool, ScanSummary};
use crate::store::Title;

/// Both halves of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub scan: ScanSummary,
    pub commit: CommitSummary,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    pool: ScanPool,
    committer: Committer,
}

impl Pipeline {
    pub fn new(pool: ScanPool, committer: Committer) -> Self {
        Self { pool, committer }
    }

    pub fn committer(&self) -> &Committer {
        &self.committer
    }

    /// Scan `titles` and return the sealed, sorted queue.
    pub async fn scan<I: Inspector>(
        &self,
        titles: &[Title],
        inspector: Arc<I>,
    ) -> Result<(ScanSummary, CommitQueue<I::Payload>), Error> {
        self.scan_with(titles, inspector, |_| {}).await
    }

    /// Like [`scan`](Self::scan), reporting each outcome as it lands.
    pub async fn scan_with<I, F>(
        &self,
        titles: &[Title],
        inspector: Arc<I>,
        on_outcome: F,
    ) -> Result<(ScanSummary, CommitQueue<I::Payload>), Error>
    where
        I: Inspector,
        F: FnMut(&ScanOutcome),
    {
        let queue = MutationQueue::shared();
        let summary = self.pool.run_with(titles, inspector, &queue, on_outcome).await;
        Ok((summary, queue.seal()?))
    }

    pub async fn commit<M: Mutator>(&self, queue: CommitQueue<M::Payload>, mutator: &M) -> CommitSummary {
        self.committer.run(queue, mutator).await
    }

    pub async fn commit_with<M, F>(&self, queue: CommitQueue<M::Payload>, mutator: &M, on_record: F) -> CommitSummary
    where
        M: Mutator,
        F: FnMut(&CommitRecord),
    {
        self.committer.run_with(queue, mutator, on_record).await
    }

    pub async fn run<I, M>(&self, titles: &[Title], inspector: Arc<I>, mutator: &M) -> Result<PipelineReport, Error>
    where
        I: Inspector,
        M: Mutator<Payload = I::Payload>,
    {
        let (scan, queue) = self.scan(titles, inspector).await?;
        let commit = self.commit(queue, mutator).await;
        Ok(PipelineReport { scan, commit })
    }
}
