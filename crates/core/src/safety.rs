//! Scan-time gate that keeps human-authored pages out of destructive runs.
//!
//! [`EditorAllowList`] is fail-closed: a page is safe only when its history
//! could be read, is non-empty, and every revision was made by a named editor
//! on the allow-list. One outside edit among a hundred makes the page unsafe.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::Error;
use crate::scan::{Inspector, Verdict};
use crate::store::ContentStore;

/// Result of a safety check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Safety {
    Safe,
    Unsafe(String),
}

impl Safety {
    pub fn is_safe(&self) -> bool {
        matches!(self, Safety::Safe)
    }
}

/// Per-title precondition evaluated before a title may be enqueued.
#[async_trait]
pub trait SafetyGate: Send + Sync {
    async fn check(&self, title: &str) -> Safety;

    async fn is_safe(&self, title: &str) -> bool {
        self.check(title).await.is_safe()
    }
}

/// Safe iff every editor in the page's history is allow-listed.
pub struct EditorAllowList {
    store: Arc<dyn ContentStore>,
    allowed: HashSet<String>,
}

impl EditorAllowList {
    pub fn new<S: AsRef<str>>(store: Arc<dyn ContentStore>, allowed: &[S]) -> Self {
        let allowed = allowed.iter().map(|s| s.as_ref().trim().to_string()).filter(|s| !s.is_empty()).collect();
        Self { store, allowed }
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

#[async_trait]
impl SafetyGate for EditorAllowList {
    async fn check(&self, title: &str) -> Safety {
        let history = match self.store.get_history(title).await {
            Ok(history) => history,
            Err(e) => return Safety::Unsafe(format!("history unavailable: {e}")),
        };
        if history.is_empty() {
            return Safety::Unsafe("empty history".to_string());
        }

        for revision in &history {
            match revision.editor.as_deref() {
                Some(editor) if self.allowed.contains(editor) => {}
                Some(editor) => {
                    return Safety::Unsafe(format!("revision {} by {}", revision.revision_id, editor));
                }
                None => return Safety::Unsafe(format!("revision {} has a hidden editor", revision.revision_id)),
            }
        }
        Safety::Safe
    }
}

/// Inspector that consults a gate before delegating.
pub struct Gated<I> {
    gate: Arc<dyn SafetyGate>,
    inner: I,
}

impl<I> Gated<I> {
    pub fn new(gate: Arc<dyn SafetyGate>, inner: I) -> Self {
        Self { gate, inner }
    }
}

#[async_trait]
impl<I: Inspector> Inspector for Gated<I> {
    type Payload = I::Payload;

    async fn inspect(&self, title: &str) -> Result<Verdict<Self::Payload>, Error> {
        match self.gate.check(title).await {
            Safety::Safe => self.inner.inspect(title).await,
            Safety::Unsafe(reason) => {
                tracing::debug!("{} is unsafe: {}", title, reason);
                Ok(Verdict::Skip(format!("unsafe: {reason}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MutationQueue;
    use crate::scan::ScanPool;
    use crate::store::{MemoryStore, StoreErrorKind, StoreOp};

    fn gate(store: Arc<MemoryStore>) -> EditorAllowList {
        EditorAllowList::new(store, &["MaintenanceBot", "Admin"])
    }

    #[tokio::test]
    async fn test_single_outside_edit_is_unsafe() {
        let store = Arc::new(MemoryStore::new());
        let mut revisions: Vec<(&str, &str)> = vec![("MaintenanceBot", "text"); 99];
        revisions.insert(42, ("SomeUser", "human text"));
        store.insert_with_history("Mostly Bot", &revisions);

        let safety = gate(store).check("Mostly Bot").await;
        assert!(!safety.is_safe());
        assert!(matches!(safety, Safety::Unsafe(reason) if reason.contains("SomeUser")));
    }

    #[tokio::test]
    async fn test_all_allowed_is_safe() {
        let store = Arc::new(MemoryStore::new());
        store.insert_with_history("Bot Page", &[("MaintenanceBot", "a"), ("Admin", "b")]);
        assert!(gate(store).is_safe("Bot Page").await);
    }

    #[tokio::test]
    async fn test_fails_closed() {
        let store = Arc::new(MemoryStore::new());
        store.insert_with_history("Hidden", &[("MaintenanceBot", "a"), ("", "b")]);
        store.insert_with_history("Empty", &[]);
        store.insert("Broken", "text");
        store.fail(StoreOp::GetHistory, "Broken", StoreErrorKind::Transient);
        let gate = gate(store);

        assert!(!gate.is_safe("Hidden").await);
        assert!(!gate.is_safe("Empty").await);
        assert!(!gate.is_safe("Broken").await);
        assert!(!gate.is_safe("Missing").await);
    }

    struct Always;

    #[async_trait]
    impl Inspector for Always {
        type Payload = ();

        async fn inspect(&self, title: &str) -> Result<Verdict<()>, Error> {
            Ok(Verdict::mutate(title, ()))
        }
    }

    #[tokio::test]
    async fn test_gated_inspector_keeps_unsafe_out_of_queue() {
        let store = Arc::new(MemoryStore::new());
        store.insert_with_history("Safe", &[("Admin", "a")]);
        store.insert_with_history("Human", &[("Admin", "a"), ("Editor", "b")]);
        let gate: Arc<dyn SafetyGate> = Arc::new(gate(store));
        let inspector = Arc::new(Gated::new(gate, Always));

        let queue = MutationQueue::shared();
        let titles = vec!["Safe".to_string(), "Human".to_string()];
        let summary = ScanPool::new(2).run(&titles, inspector, &queue).await;

        assert_eq!(summary.needs_mutation, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(queue.seal().unwrap().titles(), vec!["Safe"]);
    }
}
