//! In-memory [`ContentStore`] for tests and offline runs.
//!
//! Pages are plain text. A page whose text starts with `#REDIRECT [[Target]]`
//! is treated as a redirect to `Target` when answering backlink queries.
//! Failures can be injected per operation and title, and every call is logged
//! with a `tokio::time::Instant` so callers can check pacing under a paused
//! clock.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::time::Instant;

use super::{ContentStore, Revision, StoreError, StoreErrorKind, Title};

const DEFAULT_EDITOR: &str = "WikiSweep";

/// Store operations, used for failure injection and the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Exists,
    GetText,
    GetHistory,
    Save,
    Delete,
    Move,
    Backlinks,
    AllTitles,
}

impl StoreOp {
    /// Whether the operation changes the wiki.
    pub fn is_mutation(self) -> bool {
        matches!(self, StoreOp::Save | StoreOp::Delete | StoreOp::Move)
    }
}

/// One logged call.
#[derive(Debug, Clone)]
pub struct StoreCall {
    pub op: StoreOp,
    pub title: Title,
    pub at: Instant,
}

#[derive(Debug, Clone)]
struct Page {
    /// Newest first.
    history: Vec<Revision>,
}

impl Page {
    fn text(&self) -> &str {
        self.history
            .first()
            .and_then(|r| r.text.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy)]
struct InjectedFailure {
    kind: StoreErrorKind,
    /// `None` fails forever.
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct State {
    pages: BTreeMap<Title, Page>,
    failures: HashMap<(StoreOp, Title), InjectedFailure>,
    calls: Vec<StoreCall>,
    next_revision: u64,
}

/// In-memory wiki.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    editor: String,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_editor(DEFAULT_EDITOR)
    }

    /// Store whose own saves are attributed to `editor`.
    pub fn with_editor(editor: impl Into<String>) -> Self {
        Self { state: Mutex::new(State { next_revision: 1, ..Default::default() }), editor: editor.into() }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not poison every later assertion.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a page with a single revision by the store's own editor.
    pub fn insert(&self, title: &str, text: &str) {
        let editor = self.editor.clone();
        self.insert_with_history(title, &[(editor.as_str(), text)]);
    }

    /// Insert a page with the given history, oldest revision first.
    pub fn insert_with_history(&self, title: &str, revisions: &[(&str, &str)]) {
        let mut state = self.lock();
        let mut history = Vec::with_capacity(revisions.len());
        for (editor, text) in revisions {
            let revision_id = state.next_revision;
            state.next_revision += 1;
            history.push(Revision {
                editor: Some((*editor).to_string()).filter(|e| !e.is_empty()),
                revision_id,
                text: Some((*text).to_string()),
            });
        }
        history.reverse();
        state.pages.insert(title.to_string(), Page { history });
    }

    /// Remove a page without logging a call, as if someone else deleted it.
    pub fn remove(&self, title: &str) {
        self.lock().pages.remove(title);
    }

    pub fn text(&self, title: &str) -> Option<String> {
        self.lock().pages.get(title).map(|p| p.text().to_string())
    }

    pub fn contains(&self, title: &str) -> bool {
        self.lock().pages.contains_key(title)
    }

    pub fn titles(&self) -> Vec<Title> {
        self.lock().pages.keys().cloned().collect()
    }

    /// Make every `op` on `title` fail with `kind`.
    pub fn fail(&self, op: StoreOp, title: &str, kind: StoreErrorKind) {
        self.lock()
            .failures
            .insert((op, title.to_string()), InjectedFailure { kind, remaining: None });
    }

    /// Make the next `times` calls of `op` on `title` fail with `kind`.
    pub fn fail_times(&self, op: StoreOp, title: &str, kind: StoreErrorKind, times: usize) {
        self.lock()
            .failures
            .insert((op, title.to_string()), InjectedFailure { kind, remaining: Some(times) });
    }

    /// Every call made so far, in issue order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Only the calls that change the wiki.
    pub fn mutation_calls(&self) -> Vec<StoreCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.op.is_mutation())
            .cloned()
            .collect()
    }

    /// Log the call and apply any injected failure.
    fn enter(&self, state: &mut State, op: StoreOp, title: &str) -> Result<(), StoreError> {
        state.calls.push(StoreCall { op, title: title.to_string(), at: Instant::now() });

        let key = (op, title.to_string());
        let Some(failure) = state.failures.get_mut(&key) else {
            return Ok(());
        };
        let kind = failure.kind;
        match failure.remaining.as_mut() {
            None => {}
            Some(0) => {
                state.failures.remove(&key);
                return Ok(());
            }
            Some(n) => {
                *n -= 1;
                if *n == 0 {
                    state.failures.remove(&key);
                }
            }
        }
        Err(StoreError::new(kind, format!("injected {op:?} failure for {title}")))
    }

    fn push_revision(&self, state: &mut State, title: &str, text: &str) {
        let revision_id = state.next_revision;
        state.next_revision += 1;
        let revision = Revision { editor: Some(self.editor.clone()), revision_id, text: Some(text.to_string()) };
        state
            .pages
            .entry(title.to_string())
            .or_insert_with(|| Page { history: Vec::new() })
            .history
            .insert(0, revision);
    }
}

/// Target of a `#REDIRECT [[Target]]` page, if the text is a redirect.
fn redirect_target(text: &str) -> Option<&str> {
    let head = text.trim_start();
    if !head.get(..9)?.eq_ignore_ascii_case("#redirect") {
        return None;
    }
    let rest = head[9..].trim_start();
    let inner = rest.strip_prefix("[[")?;
    let end = inner.find("]]")?;
    Some(inner[..end].split('|').next().unwrap_or_default().trim())
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn exists(&self, title: &str) -> Result<bool, StoreError> {
        let mut state = self.lock();
        self.enter(&mut state, StoreOp::Exists, title)?;
        Ok(state.pages.contains_key(title))
    }

    async fn get_text(&self, title: &str) -> Result<String, StoreError> {
        let mut state = self.lock();
        self.enter(&mut state, StoreOp::GetText, title)?;
        state
            .pages
            .get(title)
            .map(|p| p.text().to_string())
            .ok_or_else(|| StoreError::not_found(title))
    }

    async fn get_history(&self, title: &str) -> Result<Vec<Revision>, StoreError> {
        let mut state = self.lock();
        self.enter(&mut state, StoreOp::GetHistory, title)?;
        state
            .pages
            .get(title)
            .map(|p| p.history.clone())
            .ok_or_else(|| StoreError::not_found(title))
    }

    async fn save(&self, title: &str, text: &str, _summary: &str, _tags: &[String]) -> Result<(), StoreError> {
        let mut state = self.lock();
        self.enter(&mut state, StoreOp::Save, title)?;
        self.push_revision(&mut state, title, text);
        Ok(())
    }

    async fn delete(&self, title: &str, _reason: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        self.enter(&mut state, StoreOp::Delete, title)?;
        state
            .pages
            .remove(title)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(title))
    }

    async fn move_page(&self, title: &str, new_title: &str, _reason: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        self.enter(&mut state, StoreOp::Move, title)?;
        if state.pages.contains_key(new_title) {
            return Err(StoreError::new(StoreErrorKind::Unknown, format!("target exists: {new_title}")));
        }
        let page = state
            .pages
            .remove(title)
            .ok_or_else(|| StoreError::not_found(title))?;
        state.pages.insert(new_title.to_string(), page);
        let redirect = format!("#REDIRECT [[{new_title}]]");
        self.push_revision(&mut state, title, &redirect);
        Ok(())
    }

    async fn backlinks(&self, title: &str, redirects_only: bool) -> Result<Vec<Title>, StoreError> {
        let mut state = self.lock();
        self.enter(&mut state, StoreOp::Backlinks, title)?;
        let link = format!("[[{title}]]");
        let piped = format!("[[{title}|");
        let found = state
            .pages
            .iter()
            .filter(|(source, _)| source.as_str() != title)
            .filter(|(_, page)| {
                let text = page.text();
                match redirect_target(text) {
                    Some(target) => target == title,
                    None => !redirects_only && (text.contains(&link) || text.contains(&piped)),
                }
            })
            .map(|(source, _)| source.clone())
            .collect();
        Ok(found)
    }

    async fn all_titles(&self) -> Result<Vec<Title>, StoreError> {
        let mut state = self.lock();
        self.enter(&mut state, StoreOp::AllTitles, "")?;
        Ok(state
            .pages
            .iter()
            .filter(|(_, page)| redirect_target(page.text()).is_none())
            .map(|(title, _)| title.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_target() {
        assert_eq!(redirect_target("#REDIRECT [[Foo]]"), Some("Foo"));
        assert_eq!(redirect_target("#redirect [[Foo|bar]]\n"), Some("Foo"));
        assert_eq!(redirect_target("Foo links [[Bar]]"), None);
        assert_eq!(redirect_target(""), None);
    }

    #[tokio::test]
    async fn test_save_appends_revision() {
        let store = MemoryStore::with_editor("Bot");
        store.insert_with_history("Foo", &[("Alice", "v1")]);
        store.save("Foo", "v2", "edit", &[]).await.unwrap();

        let history = store.get_history("Foo").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].editor.as_deref(), Some("Bot"));
        assert_eq!(history[0].text.as_deref(), Some("v2"));
        assert_eq!(history[1].editor.as_deref(), Some("Alice"));
        assert_eq!(store.text("Foo").as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_backlinks_redirects_only() {
        let store = MemoryStore::new();
        store.insert("Target", "content");
        store.insert("Alias", "#REDIRECT [[Target]]");
        store.insert("Linker", "see [[Target]]");
        store.insert("Other", "#REDIRECT [[Elsewhere]]");

        let redirects = store.backlinks("Target", true).await.unwrap();
        assert_eq!(redirects, vec!["Alias".to_string()]);

        let all = store.backlinks("Target", false).await.unwrap();
        assert_eq!(all, vec!["Alias".to_string(), "Linker".to_string()]);
    }

    #[tokio::test]
    async fn test_fail_times_recovers() {
        let store = MemoryStore::new();
        store.insert("Foo", "text");
        store.fail_times(StoreOp::GetText, "Foo", StoreErrorKind::Transient, 1);

        let first = store.get_text("Foo").await;
        assert!(matches!(first, Err(ref e) if e.kind == StoreErrorKind::Transient));
        assert_eq!(store.get_text("Foo").await.unwrap(), "text");
    }

    #[tokio::test]
    async fn test_move_leaves_redirect() {
        let store = MemoryStore::new();
        store.insert("Old", "body");
        store.move_page("Old", "New", "rename").await.unwrap();

        assert_eq!(store.text("New").as_deref(), Some("body"));
        assert_eq!(store.text("Old").as_deref(), Some("#REDIRECT [[New]]"));
        assert_eq!(store.all_titles().await.unwrap(), vec!["New".to_string()]);
    }

    #[tokio::test]
    async fn test_call_log_marks_mutations() {
        let store = MemoryStore::new();
        store.insert("Foo", "text");
        store.exists("Foo").await.unwrap();
        store.delete("Foo", "cleanup").await.unwrap();

        assert_eq!(store.calls().len(), 2);
        let mutations = store.mutation_calls();
        assert_eq!(mutations.len(), 1);
        assert_eq!(mutations[0].op, StoreOp::Delete);
    }
}
