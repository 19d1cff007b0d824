//! Search cached page text and write the matching titles.

use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use wikisweep_core::artifacts::write_titles;
use wikisweep_core::query::Decision;
use wikisweep_core::{ContentSnapshot, Error, Inspector, MutationQueue, ScanPool, SearchQuery, Verdict};

use crate::cli::SearchArgs;
use crate::context::Context;
use crate::progress;
use crate::tasks::corpus;

/// Evaluates the query against a loaded snapshot; never calls the wiki.
pub struct SearchInspector {
    snapshot: Arc<ContentSnapshot>,
    query: SearchQuery,
}

impl SearchInspector {
    pub fn new(snapshot: Arc<ContentSnapshot>, query: SearchQuery) -> Self {
        Self { snapshot, query }
    }
}

#[async_trait]
impl Inspector for SearchInspector {
    type Payload = ();

    async fn inspect(&self, title: &str) -> Result<Verdict<()>, Error> {
        let Some(text) = self.snapshot.get(title) else {
            return Ok(Verdict::skip("not in cache"));
        };
        Ok(match self.query.evaluate(title, text) {
            Decision::Match => Verdict::mutate(title, ()),
            Decision::NoMatch => Verdict::skip("no match"),
            Decision::Ignored => Verdict::skip("ignored"),
            Decision::Translation => Verdict::skip("translation"),
        })
    }
}

pub fn build_query(terms: &[String], ignores: &[String], case_sensitive: bool, translations: bool) -> SearchQuery {
    let query = SearchQuery::new(terms, ignores, case_sensitive);
    if translations { query } else { query.skip_translations() }
}

/// Collect expressions interactively until an empty answer.
fn prompt_terms(prompt: &str, help: &str) -> Result<Vec<String>> {
    let mut terms = Vec::new();
    while let Some(term) = progress::ask(prompt, help)? {
        terms.push(term);
    }
    Ok(terms)
}

pub async fn run(ctx: &Context, args: SearchArgs) -> Result<()> {
    let cache = ctx.content_cache();
    let stale = args.refresh || !cache.is_valid();

    let warmup = if stale {
        ctx.login_if_configured().await?;
        Some(corpus::DirectoryWarmup::start(ctx.directory(), ctx.store()))
    } else {
        None
    };

    let (terms, ignores) = if args.terms.is_empty() {
        let help = "Join terms with ~AND~ / ~OR~, use \\n for a newline; empty answer to finish";
        (prompt_terms("Search for:", help)?, prompt_terms("Ignore pages containing:", help)?)
    } else {
        (args.terms, args.ignores)
    };

    let query = build_query(&terms, &ignores, args.case_sensitive, args.include_translations);
    if !query.has_search_terms() {
        bail!("no search terms given");
    }

    let snapshot = match warmup {
        Some(warmup) => {
            let titles = warmup.titles().await?;
            let spinner = progress::spinner(&format!("Fetching {} pages", titles.len()));
            let snapshot = cache.rebuild(&titles, ctx.store()).await;
            spinner.finish_and_clear();
            snapshot?
        }
        None => corpus::snapshot(ctx, false).await?,
    };
    tracing::info!("searching {} cached pages fetched at {}", snapshot.len(), snapshot.fetched_at);

    let titles: Vec<_> = snapshot.titles().cloned().collect();
    let inspector = Arc::new(SearchInspector::new(Arc::new(snapshot), query));
    let matches = search(&titles, inspector, ctx.config.scan_concurrency).await?;

    write_titles(&args.output, &matches)?;
    println!("{} matching pages written to {}", matches.len(), args.output.display());
    Ok(())
}

/// Run the search over `titles` and return the matches sorted by title.
pub async fn search(titles: &[String], inspector: Arc<SearchInspector>, width: usize) -> Result<Vec<String>, Error> {
    let queue = MutationQueue::shared();
    let bar = progress::bar(titles.len() as u64, "Searching");
    ScanPool::new(width).run_with(titles, inspector, &queue, |_| bar.inc(1)).await;
    bar.finish_and_clear();
    Ok(queue.seal()?.titles())
}
