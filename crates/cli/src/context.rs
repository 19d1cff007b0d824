//! Per-invocation wiring: config, wiki session, pipeline and run options.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use wikisweep_client::{MediaWikiClient, UserInfo, WikiConfig};
use wikisweep_core::artifacts::{read_titles, read_titles_or_empty, subtract, write_titles};
use wikisweep_core::{
    AppConfig, CommitQueue, CommitSummary, Committer, ContentCache, ContentStore, FixedDelay, Inspector, Mutator,
    Pipeline, RetryPolicy, ScanPool, ScanSummary, Title, TitleDirectory,
};

use crate::cli::{InputArgs, QueueArgs};
use crate::progress;

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    pub assume_yes: bool,
    pub report: Option<PathBuf>,
}

pub struct Context {
    pub config: AppConfig,
    pub options: RunOptions,
    client: Arc<MediaWikiClient>,
}

impl Context {
    pub fn new(config: AppConfig, options: RunOptions) -> Result<Self> {
        let client = MediaWikiClient::new(WikiConfig::from(&config)).context("failed to build wiki client")?;
        Ok(Self { config, options, client: Arc::new(client) })
    }

    pub fn store(&self) -> Arc<dyn ContentStore> {
        self.client.clone()
    }

    /// Log in with the configured bot password.
    pub async fn login(&self) -> Result<String> {
        let (username, password) = self.config.require_credentials()?;
        let name = self.client.login(username, password).await?;
        tracing::info!("logged in to {} as {}", self.client.api_url(), name);
        Ok(name)
    }

    /// Log in when credentials are configured; reads work anonymously.
    pub async fn login_if_configured(&self) -> Result<()> {
        if self.config.username.is_some() && self.config.password.is_some() {
            self.login().await?;
        } else {
            tracing::debug!("no credentials configured, reading anonymously");
        }
        Ok(())
    }

    /// Log in for a mutating workload; a dry run tolerates missing credentials.
    pub async fn login_for_writes(&self) -> Result<()> {
        if self.options.dry_run {
            return self.login_if_configured().await;
        }
        self.login().await.map(|_| ())
    }

    pub async fn user_info(&self) -> Result<UserInfo> {
        Ok(self.client.user_info().await?)
    }

    pub fn directory(&self) -> TitleDirectory {
        TitleDirectory::new(&self.config.directory_path, self.config.directory_max_age())
    }

    pub fn content_cache(&self) -> ContentCache {
        ContentCache::new(&self.config.cache_path, self.config.cache_max_age())
            .with_batching(self.config.cache_batch_size, self.config.cache_concurrency)
    }

    pub fn committer(&self) -> Committer {
        Committer::new(self.store())
            .with_throttle(FixedDelay(self.config.commit_delay()))
            .with_retry(RetryPolicy::new(self.config.max_retries, self.config.retry_initial_delay()))
            .dry_run(self.options.dry_run)
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(ScanPool::new(self.config.scan_concurrency), self.committer())
    }

    /// Read the input title list minus the optional blacklist.
    pub fn read_input(&self, input: &InputArgs) -> Result<Vec<Title>> {
        read_list(&input.titles, input.blacklist.as_deref())
    }

    /// Titles saved by an earlier `--queue-out`, when `--queue-in` is set.
    ///
    /// The blacklist applies to a resumed queue as it does to the input.
    pub fn resume_queue(&self, input: &InputArgs, queue: &QueueArgs) -> Result<Option<Vec<Title>>> {
        let Some(path) = &queue.queue_in else {
            return Ok(None);
        };
        let titles = read_list(path, input.blacklist.as_deref())?;
        println!("Resuming {} queued titles from {}", titles.len(), path.display());
        Ok(Some(titles))
    }

    /// Write the sealed scan queue for `--queue-out`.
    pub fn save_queue<P>(&self, args: &QueueArgs, queue: &CommitQueue<P>) -> Result<()> {
        if let Some(path) = &args.queue_out {
            write_titles(path, &queue.titles())?;
            println!("{} queued titles written to {}", queue.len(), path.display());
        }
        Ok(())
    }

    /// Shrink the queue file to the titles whose commit failed.
    ///
    /// A dry run or an aborted commit leaves the file alone.
    pub fn settle_queue(&self, args: &QueueArgs, summary: &CommitSummary) -> Result<()> {
        let Some(path) = args.path() else {
            return Ok(());
        };
        if self.options.dry_run || summary.items.is_empty() {
            return Ok(());
        }
        let pending = pending_titles(summary);
        write_titles(path, &pending)?;
        tracing::info!("{} titles left in queue file {}", pending.len(), path.display());
        Ok(())
    }

    /// Ask before committing; `--yes` and `--dry-run` skip the prompt.
    pub fn confirm(&self, prompt: &str) -> Result<bool> {
        if self.options.assume_yes || self.options.dry_run {
            return Ok(true);
        }
        progress::confirm(prompt)
    }

    /// Scan `titles` with a progress bar and return the sealed queue.
    pub async fn scan<I: Inspector>(
        &self,
        pipeline: &Pipeline,
        titles: &[Title],
        inspector: Arc<I>,
    ) -> Result<(ScanSummary, CommitQueue<I::Payload>)> {
        let bar = progress::bar(titles.len() as u64, "Scanning");
        let result = pipeline
            .scan_with(titles, inspector, |outcome| {
                bar.set_message(outcome.title().to_string());
                bar.inc(1);
            })
            .await;
        bar.finish_and_clear();
        let (summary, queue) = result?;
        println!(
            "Scanned {}: {} need changes ({} items), {} skipped, {} errors",
            summary.total,
            summary.needs_mutation,
            summary.queued_items,
            summary.skipped,
            summary.error_count()
        );
        Ok((summary, queue))
    }

    /// Confirm, then commit `queue` with a progress bar and report the result.
    pub async fn commit<M: Mutator>(
        &self,
        pipeline: &Pipeline,
        queue: CommitQueue<M::Payload>,
        mutator: &M,
        action: &str,
    ) -> Result<CommitSummary> {
        if queue.is_empty() {
            println!("Nothing to {action}.");
            return Ok(CommitSummary::default());
        }
        if !self.confirm(&format!("{action} {} page(s)?", queue.len()))? {
            println!("Aborted.");
            return Ok(CommitSummary::default());
        }

        let bar = progress::bar(queue.len() as u64, action);
        let summary = pipeline
            .commit_with(queue, mutator, |record| {
                if record.result.is_failure() {
                    bar.println(format!("{}: {}", record.title, record.result));
                }
                bar.set_message(record.title.clone());
                bar.inc(1);
            })
            .await;
        bar.finish_and_clear();

        self.finish(&summary)?;
        Ok(summary)
    }

    /// Print the summary and write the JSON report if one was requested.
    pub fn finish(&self, summary: &CommitSummary) -> Result<()> {
        println!("{summary}");
        if let Some(path) = &self.options.report {
            summary.save_json(path)?;
            tracing::info!("commit report written to {}", path.display());
        }
        Ok(())
    }
}

fn read_list(path: &Path, blacklist: Option<&Path>) -> Result<Vec<Title>> {
    let titles = read_titles(path)?;
    let titles = match blacklist {
        Some(blacklist_path) => {
            let blacklist = read_titles_or_empty(blacklist_path)?;
            let kept = subtract(titles, &blacklist);
            tracing::info!("{} titles left after blacklist {}", kept.len(), blacklist_path.display());
            kept
        }
        None => titles,
    };
    if titles.is_empty() {
        bail!("no titles to process in {}", path.display());
    }
    Ok(titles)
}

/// Titles still worth another attempt after a commit.
pub fn pending_titles(summary: &CommitSummary) -> Vec<Title> {
    summary
        .items
        .iter()
        .filter(|record| record.result.is_failure())
        .map(|record| record.title.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wikisweep_core::CommitResult;

    fn context(dry_run: bool) -> Context {
        let options = RunOptions { dry_run, ..Default::default() };
        Context::new(AppConfig::default(), options).unwrap()
    }

    fn queue_args(queue_in: Option<PathBuf>, queue_out: Option<PathBuf>) -> QueueArgs {
        QueueArgs { queue_out, queue_in }
    }

    #[test]
    fn test_queue_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.txt");
        let blacklist = dir.path().join("blacklist.txt");
        std::fs::write(&blacklist, "Skip me\n").unwrap();
        let ctx = context(false);

        let queue = CommitQueue::from(vec!["B".to_string(), "Skip me".to_string(), "A".to_string()]);
        ctx.save_queue(&queue_args(None, Some(path.clone())), &queue).unwrap();

        let input = InputArgs { titles: dir.path().join("unused.txt"), blacklist: Some(blacklist) };
        let resumed = ctx.resume_queue(&input, &queue_args(Some(path), None)).unwrap().unwrap();
        assert_eq!(resumed, vec!["A", "B"]);
        assert_eq!(CommitQueue::from(resumed).titles(), vec!["A", "B"]);
    }

    #[test]
    fn test_no_queue_in_means_scan() {
        let ctx = context(false);
        let input = InputArgs { titles: PathBuf::from("missing.txt"), blacklist: None };
        assert!(ctx.resume_queue(&input, &QueueArgs::default()).unwrap().is_none());
    }

    #[test]
    fn test_settle_keeps_only_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.txt");
        std::fs::write(&path, "A\nB\nC\n").unwrap();
        let mut summary = CommitSummary::default();
        summary.record("A".into(), CommitResult::Success);
        summary.record("B".into(), CommitResult::FailedLocked);
        summary.record("C".into(), CommitResult::Unchanged);

        context(true).settle_queue(&queue_args(Some(path.clone()), None), &summary).unwrap();
        assert_eq!(read_titles(&path).unwrap(), vec!["A", "B", "C"]);

        context(false).settle_queue(&queue_args(Some(path.clone()), None), &summary).unwrap();
        assert_eq!(read_titles(&path).unwrap(), vec!["B"]);

        context(false).settle_queue(&queue_args(Some(path.clone()), None), &CommitSummary::default()).unwrap();
        assert_eq!(read_titles(&path).unwrap(), vec!["B"]);
    }
}
