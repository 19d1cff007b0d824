//! Unique-target filtering for workloads that create pages.
//!
//! Two sources proposing the same target would collide, so a candidate is
//! retained only when its target is proposed exactly once across the batch.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::store::Title;

/// Concurrent vote counter keyed by target title.
///
/// Scan workers call [`vote`](Self::vote) as they discover candidates; after
/// the scan the committer keeps only targets with a single vote.
#[derive(Debug, Default)]
pub struct TargetVotes {
    votes: Mutex<HashMap<Title, usize>>,
}

impl TargetVotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vote(&self, target: &str) {
        let mut votes = self.votes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *votes.entry(target.to_string()).or_default() += 1;
    }

    pub fn count(&self, target: &str) -> usize {
        let votes = self.votes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        votes.get(target).copied().unwrap_or_default()
    }

    pub fn is_unique(&self, target: &str) -> bool {
        self.count(target) == 1
    }

    /// Targets proposed more than once, sorted.
    pub fn collisions(&self) -> Vec<Title> {
        let votes = self.votes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut collided: Vec<Title> = votes
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(target, _)| target.clone())
            .collect();
        collided.sort();
        collided
    }
}

/// Keep `source -> target` pairs whose target appears exactly once.
pub fn retain_unique_targets(candidates: impl IntoIterator<Item = (Title, Title)>) -> BTreeMap<Title, Title> {
    let candidates: Vec<(Title, Title)> = candidates.into_iter().collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for (_, target) in &candidates {
        *counts.entry(target.as_str()).or_default() += 1;
    }
    let unique: Vec<(Title, Title)> = candidates
        .iter()
        .filter(|(_, target)| counts.get(target.as_str()) == Some(&1))
        .cloned()
        .collect();
    unique.into_iter().collect()
}
