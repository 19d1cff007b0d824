//! Create redirects from `{{Title|X}}` display titles.
//!
//! A page declaring `{{Title|X}}` gets a redirect `X -> page`. Two pages
//! claiming the same `X` would race for one target, so only targets claimed
//! by exactly one page are created.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use wikisweep_core::{
    Applied, CommitQueue, ContentStore, Error, Inspector, Mutator, Precondition, QueueItem, StoreError, TargetVotes,
    Title, Verdict,
};

use crate::cli::TitleRedirectsArgs;
use crate::context::Context;
use crate::tasks::read_page;

const TITLE_TEMPLATE: &str = "{{Title|";

const ILLEGAL_TITLE_CHARS: &[char] = &[
    '{', '}', '[', ']', '<', '>', '|', ':', '?', '*', '"', '\\', '/', '#', '@', '&', '%',
];

/// The value of the first `{{Title|...}}` line, trimmed.
pub fn display_title(text: &str) -> Option<&str> {
    let line = text.lines().map(str::trim).find(|line| line.starts_with(TITLE_TEMPLATE))?;
    let rest = &line[TITLE_TEMPLATE.len()..];
    let value = rest.split("}}").next().unwrap_or(rest).trim();
    (!value.is_empty()).then_some(value)
}

pub fn is_legal_title(title: &str) -> bool {
    !title.contains(ILLEGAL_TITLE_CHARS)
}

/// Reads each page's display title and votes for it as a redirect target.
///
/// Items are keyed by the target to create; the payload is the page the
/// redirect will point at.
pub struct DisplayTitleInspector {
    store: Arc<dyn ContentStore>,
    votes: Arc<TargetVotes>,
}

impl DisplayTitleInspector {
    pub fn new(store: Arc<dyn ContentStore>, votes: Arc<TargetVotes>) -> Self {
        Self { store, votes }
    }
}

#[async_trait]
impl Inspector for DisplayTitleInspector {
    type Payload = Title;

    async fn inspect(&self, title: &str) -> Result<Verdict<Title>, Error> {
        let Some(text) = read_page(self.store.as_ref(), title).await? else {
            return Ok(Verdict::skip("page does not exist"));
        };
        let Some(target) = display_title(&text) else {
            return Ok(Verdict::skip("no display title"));
        };
        if target == title {
            return Ok(Verdict::skip("display title equals page title"));
        }
        if !is_legal_title(target) {
            return Ok(Verdict::skip(format!("illegal characters in {target}")));
        }

        self.votes.vote(target);
        Ok(Verdict::mutate(target, title.to_string()))
    }
}

/// Keep only items whose target was claimed once.
pub fn retain_unique(queue: &mut CommitQueue<Title>, votes: &TargetVotes) -> Vec<Title> {
    let collisions = votes.collisions();
    queue.retain(|item| votes.is_unique(&item.title));
    collisions
}

/// Creates the item title as `#REDIRECT [[payload]]`, never overwriting.
pub struct CreateRedirect {
    summary: String,
    tags: Vec<String>,
}

impl CreateRedirect {
    pub fn new(summary: impl Into<String>, tags: Vec<String>) -> Self {
        Self { summary: summary.into(), tags }
    }
}

#[async_trait]
impl Mutator for CreateRedirect {
    type Payload = Title;

    fn precondition(&self, _item: &QueueItem<Title>) -> Precondition {
        Precondition::MustNotExist
    }

    fn describe(&self, item: &QueueItem<Title>) -> String {
        format!("create redirect {} -> {}", item.title, item.payload)
    }

    async fn apply(&self, store: &dyn ContentStore, item: &QueueItem<Title>) -> Result<Applied, StoreError> {
        let text = format!("#REDIRECT [[{}]]", item.payload);
        store.save(&item.title, &text, &self.summary, &self.tags).await?;
        Ok(Applied::Done)
    }
}

pub async fn run(ctx: &Context, args: TitleRedirectsArgs) -> Result<()> {
    let titles = ctx.read_input(&args.input)?;
    ctx.login_for_writes().await?;

    let votes = Arc::new(TargetVotes::new());
    let pipeline = ctx.pipeline();
    let inspector = Arc::new(DisplayTitleInspector::new(ctx.store(), votes.clone()));
    let (_, mut queue) = ctx.scan(&pipeline, &titles, inspector).await?;

    let collisions = retain_unique(&mut queue, &votes);
    if !collisions.is_empty() {
        println!("{} targets claimed by more than one page were dropped", collisions.len());
        for target in &collisions {
            tracing::info!("dropped contested target {} ({} claims)", target, votes.count(target));
        }
    }

    let mutator = CreateRedirect::new(args.summary, ctx.config.edit_tags.clone());
    ctx.commit(&pipeline, queue, &mutator, "Create").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wikisweep_core::{CommitResult, Committer, FixedDelay, MemoryStore, Pipeline, ScanPool};

    #[test]
    fn test_display_title_first_line_wins() {
        let text = "intro\n {{Title|Fancy Name}} \n{{Title|Second}}";
        assert_eq!(display_title(text), Some("Fancy Name"));
        assert_eq!(display_title("{{Title|Trailing}} and more"), Some("Trailing"));
        assert_eq!(display_title("{{Title| }}"), None);
        assert_eq!(display_title("no template"), None);
    }

    #[test]
    fn test_illegal_characters() {
        assert!(is_legal_title("Plain Name (thing)"));
        assert!(!is_legal_title("A/B"));
        assert!(!is_legal_title("Q?"));
        assert!(!is_legal_title("Ns:Thing"));
        assert!(!is_legal_title("50%"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_unique_targets_are_created() {
        let store = Arc::new(MemoryStore::new());
        store.insert("P1", "{{Title|X}}");
        store.insert("P2", "{{Title|X}}");
        store.insert("P3", "{{Title|Y}}");
        store.insert("P4", "{{Title|Bad/Name}}");
        store.insert("P5", "{{Title|Taken}}");
        store.insert("Taken", "existing page");

        let votes = Arc::new(TargetVotes::new());
        let committer = Committer::new(store.clone()).with_throttle(FixedDelay(Duration::from_secs(6)));
        let pipeline = Pipeline::new(ScanPool::new(8), committer);
        let titles: Vec<Title> = ["P1", "P2", "P3", "P4", "P5"].iter().map(|s| s.to_string()).collect();

        let (summary, mut queue) = pipeline
            .scan(&titles, Arc::new(DisplayTitleInspector::new(store.clone(), votes.clone())))
            .await
            .unwrap();
        assert_eq!(summary.needs_mutation, 4);

        let collisions = retain_unique(&mut queue, &votes);
        assert_eq!(collisions, vec!["X"]);
        assert_eq!(queue.titles(), vec!["Taken", "Y"]);

        let result = pipeline.commit(queue, &CreateRedirect::new("Create redirect", Vec::new())).await;

        assert_eq!(result.successful, 1);
        assert_eq!(result.skipped_exists, 1);
        assert_eq!(store.text("Y").as_deref(), Some("#REDIRECT [[P3]]"));
        assert_eq!(store.text("Taken").as_deref(), Some("existing page"));
        assert!(!store.contains("X"));
        let taken = result.items.iter().find(|r| r.title == "Taken").unwrap();
        assert_eq!(taken.result, CommitResult::SkippedExists);
    }
}
