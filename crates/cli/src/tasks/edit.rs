//! Text rewrites: find-and-replace and line removal.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use wikisweep_core::{Applied, CommitQueue, ContentStore, Error, Inspector, Mutator, QueueItem, StoreError, Verdict};

use crate::cli::{InputArgs, QueueArgs, RemoveLinesArgs, ReplaceArgs};
use crate::context::Context;
use crate::tasks::read_page;

const MAPPING_SEPARATOR: &str = "=>";

/// A pure rewrite of page text.
#[derive(Debug, Clone)]
pub enum TextEdit {
    /// Literal substring replacements, applied in order.
    Literal(Vec<(String, String)>),
    /// Regex replacements, applied in order; `$1` refers to capture groups.
    Pattern(Vec<(Regex, String)>),
    /// Drop every line containing any of the targets.
    RemoveLines(Vec<String>),
}

impl TextEdit {
    /// Parse `FROM=>TO` mappings.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a mapping without `=>` or with an empty `FROM`,
    /// `InvalidPattern` if `regex` is set and a pattern does not compile.
    pub fn parse_mappings(raw: &[String], regex: bool) -> Result<Self, Error> {
        let mut pairs = Vec::with_capacity(raw.len());
        for mapping in raw {
            let (from, to) = mapping
                .split_once(MAPPING_SEPARATOR)
                .ok_or_else(|| Error::InvalidInput(format!("mapping must look like FROM=>TO: {mapping}")))?;
            if from.is_empty() {
                return Err(Error::InvalidInput(format!("empty search text in mapping: {mapping}")));
            }
            pairs.push((from.to_string(), to.to_string()));
        }

        if !regex {
            return Ok(TextEdit::Literal(pairs));
        }
        let patterns = pairs
            .into_iter()
            .map(|(from, to)| Ok((RegexBuilder::new(&from).dot_matches_new_line(true).build()?, to)))
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(TextEdit::Pattern(patterns))
    }

    pub fn remove_lines(targets: Vec<String>) -> Result<Self, Error> {
        let targets: Vec<String> = targets.into_iter().filter(|t| !t.is_empty()).collect();
        if targets.is_empty() {
            return Err(Error::InvalidInput("no target lines given".to_string()));
        }
        Ok(TextEdit::RemoveLines(targets))
    }

    pub fn apply(&self, text: &str) -> String {
        match self {
            TextEdit::Literal(pairs) => pairs.iter().fold(text.to_string(), |acc, (from, to)| acc.replace(from, to)),
            TextEdit::Pattern(patterns) => patterns
                .iter()
                .fold(text.to_string(), |acc, (re, to)| re.replace_all(&acc, to.as_str()).into_owned()),
            TextEdit::RemoveLines(targets) => text
                .split('\n')
                .filter(|line| !targets.iter().any(|t| line.contains(t.as_str())))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// The rewritten text, or `None` if the edit changes nothing.
    pub fn changed(&self, text: &str) -> Option<String> {
        let updated = self.apply(text);
        (updated != text).then_some(updated)
    }
}

/// Marks pages whose current text the edit would change.
pub struct EditInspector {
    store: Arc<dyn ContentStore>,
    edit: Arc<TextEdit>,
}

impl EditInspector {
    pub fn new(store: Arc<dyn ContentStore>, edit: Arc<TextEdit>) -> Self {
        Self { store, edit }
    }
}

#[async_trait]
impl Inspector for EditInspector {
    type Payload = ();

    async fn inspect(&self, title: &str) -> Result<Verdict<()>, Error> {
        let Some(text) = read_page(self.store.as_ref(), title).await? else {
            return Ok(Verdict::skip("page does not exist"));
        };
        Ok(match self.edit.changed(&text) {
            Some(_) => Verdict::mutate(title, ()),
            None => Verdict::skip("no change needed"),
        })
    }
}

/// Re-reads the page at commit time, re-applies the edit and saves.
pub struct EditMutator {
    edit: Arc<TextEdit>,
    summary: String,
    tags: Vec<String>,
}

impl EditMutator {
    pub fn new(edit: Arc<TextEdit>, summary: impl Into<String>, tags: Vec<String>) -> Self {
        Self { edit, summary: summary.into(), tags }
    }
}

#[async_trait]
impl Mutator for EditMutator {
    type Payload = ();

    fn describe(&self, item: &QueueItem<()>) -> String {
        format!("edit {} ({})", item.title, self.summary)
    }

    async fn apply(&self, store: &dyn ContentStore, item: &QueueItem<()>) -> Result<Applied, StoreError> {
        let current = store.get_text(&item.title).await?;
        let Some(updated) = self.edit.changed(&current) else {
            tracing::debug!("{} no longer needs editing", item.title);
            return Ok(Applied::Unchanged);
        };
        store.save(&item.title, &updated, &self.summary, &self.tags).await?;
        Ok(Applied::Done)
    }
}

pub async fn replace(ctx: &Context, args: ReplaceArgs) -> Result<()> {
    let edit = TextEdit::parse_mappings(&args.mappings, args.regex)?;
    run_edit(ctx, &args.input, &args.queue, edit, args.summary).await
}

pub async fn remove_lines(ctx: &Context, args: RemoveLinesArgs) -> Result<()> {
    let edit = TextEdit::remove_lines(args.targets)?;
    run_edit(ctx, &args.input, &args.queue, edit, args.summary).await
}

async fn run_edit(
    ctx: &Context,
    input: &InputArgs,
    queue_args: &QueueArgs,
    edit: TextEdit,
    summary: String,
) -> Result<()> {
    let resumed = ctx.resume_queue(input, queue_args)?;
    ctx.login_for_writes().await?;

    let edit = Arc::new(edit);
    let pipeline = ctx.pipeline();
    // The mutator re-reads every page, so a title list is all a resumed run needs.
    let queue = match resumed {
        Some(queued) => CommitQueue::from(queued),
        None => {
            let titles = ctx.read_input(input)?;
            let inspector = Arc::new(EditInspector::new(ctx.store(), edit.clone()));
            let (_, queue) = ctx.scan(&pipeline, &titles, inspector).await?;
            ctx.save_queue(queue_args, &queue)?;
            queue
        }
    };

    let mutator = EditMutator::new(edit, summary, ctx.config.edit_tags.clone());
    let result = ctx.commit(&pipeline, queue, &mutator, "Edit").await?;
    ctx.settle_queue(queue_args, &result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wikisweep_core::artifacts::{read_titles, write_titles};
    use wikisweep_core::{CommitResult, Committer, FixedDelay, MemoryStore, Pipeline, ScanPool, Title};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_literal_mappings() {
        let edit = TextEdit::parse_mappings(&strings(&["foo=>bar", "x=>"]), false).unwrap();
        assert_eq!(edit.apply("foo x foo"), "bar  bar");
    }

    #[test]
    fn test_parse_rejects_malformed_mapping() {
        assert!(matches!(
            TextEdit::parse_mappings(&strings(&["no separator"]), false),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(TextEdit::parse_mappings(&strings(&["=>x"]), false), Err(Error::InvalidInput(_))));
        assert!(matches!(TextEdit::parse_mappings(&strings(&["(=>x"]), true), Err(Error::InvalidPattern(_))));
    }

    #[test]
    fn test_regex_dot_matches_newline() {
        let edit = TextEdit::parse_mappings(&strings(&["<!--.*?-->=>"]), true).unwrap();
        assert_eq!(edit.apply("keep<!-- multi\nline -->this"), "keepthis");

        let groups = TextEdit::parse_mappings(&strings(&[r"\[\[(\w+)\]\]=>{{$1}}"]), true).unwrap();
        assert_eq!(groups.apply("see [[Foo]]"), "see {{Foo}}");
    }

    #[test]
    fn test_remove_lines() {
        let edit = TextEdit::remove_lines(strings(&["[[Category:Old]]", ""])).unwrap();
        let text = "intro\n[[Category:Old]]\nbody\nmore [[Category:Old]] here\nend";
        assert_eq!(edit.apply(text), "intro\nbody\nend");
        assert_eq!(edit.changed("unrelated"), None);

        assert!(TextEdit::remove_lines(strings(&[""])).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_end_to_end() {
        let store = Arc::new(MemoryStore::new());
        store.insert("Foo", "old value");
        store.insert("Bar", "untouched");
        let edit = Arc::new(TextEdit::parse_mappings(&strings(&["old=>new"]), false).unwrap());

        let committer = Committer::new(store.clone()).with_throttle(FixedDelay(Duration::from_secs(6)));
        let pipeline = Pipeline::new(ScanPool::new(4), committer);
        let titles: Vec<Title> = strings(&["Foo", "Bar", "Missing"]);
        let inspector = Arc::new(EditInspector::new(store.clone(), edit.clone()));
        let mutator = EditMutator::new(edit, "Find and replace", strings(&["bot"]));

        let report = pipeline.run(&titles, inspector, &mutator).await.unwrap();

        assert_eq!(report.scan.needs_mutation, 1);
        assert_eq!(report.scan.skipped, 2);
        assert_eq!(report.commit.successful, 1);
        assert_eq!(store.text("Foo").as_deref(), Some("new value"));
        assert_eq!(store.text("Bar").as_deref(), Some("untouched"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_saved_queue_resumes_commit() {
        let dir = tempfile::tempdir().unwrap();
        let queue_file = dir.path().join("queue.txt");
        let store = Arc::new(MemoryStore::new());
        store.insert("Foo", "old value");
        store.insert("Bar", "old too");
        store.insert("Baz", "untouched");
        let edit = Arc::new(TextEdit::parse_mappings(&strings(&["old=>new"]), false).unwrap());

        let committer = Committer::new(store.clone()).with_throttle(FixedDelay(Duration::from_secs(6)));
        let pipeline = Pipeline::new(ScanPool::new(4), committer);
        let titles: Vec<Title> = strings(&["Foo", "Bar", "Baz"]);
        let inspector = Arc::new(EditInspector::new(store.clone(), edit.clone()));
        let (_, queue) = pipeline.scan(&titles, inspector).await.unwrap();
        write_titles(&queue_file, &queue.titles()).unwrap();
        store.insert("Bar", "fixed by hand");

        let resumed = CommitQueue::from(read_titles(&queue_file).unwrap());
        assert_eq!(resumed.titles(), vec!["Bar", "Foo"]);
        let summary = pipeline.commit(resumed, &EditMutator::new(edit, "s", Vec::new())).await;

        assert_eq!(summary.successful, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(store.text("Foo").as_deref(), Some("new value"));
        assert_eq!(store.text("Bar").as_deref(), Some("fixed by hand"));
        assert_eq!(store.text("Baz").as_deref(), Some("untouched"));
    }

    #[tokio::test]
    async fn test_mutator_reports_unchanged_after_concurrent_fix() {
        let store = Arc::new(MemoryStore::new());
        store.insert("Foo", "already new");
        let edit = Arc::new(TextEdit::parse_mappings(&strings(&["old=>new"]), false).unwrap());

        let committer = Committer::new(store.clone()).with_throttle(FixedDelay(Duration::ZERO));
        let queue = CommitQueue::from(vec!["Foo".to_string()]);
        let summary = committer.run(queue, &EditMutator::new(edit, "s", Vec::new())).await;

        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.items[0].result, CommitResult::Unchanged);
        assert!(store.mutation_calls().is_empty());
    }
}
