//! Command-line definitions.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::context::RunOptions;

/// Bulk wiki maintenance: scan pages in parallel, commit changes serially.
#[derive(Parser, Debug)]
#[command(name = "wikisweep", version, about, long_about = None)]
pub struct Cli {
    /// TOML config file, layered between defaults and WIKISWEEP_* variables
    #[arg(long, global = true, env = "WIKISWEEP_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Record what would be committed without touching the wiki
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Answer yes to every confirmation prompt
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    /// Write the commit summary and per-item results as JSON
    #[arg(long, global = true, value_name = "FILE")]
    pub report: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn options(&self) -> RunOptions {
        RunOptions { dry_run: self.dry_run, assume_yes: self.yes, report: self.report.clone() }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage the title directory
    Directory {
        #[command(subcommand)]
        action: DirectoryAction,
    },

    /// Manage the content cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Search cached page text and write matching titles
    Search(SearchArgs),

    /// Find and replace text on listed pages
    Replace(ReplaceArgs),

    /// Remove every line containing a target string
    #[command(name = "remove-lines")]
    RemoveLines(RemoveLinesArgs),

    /// Discover or delete redirects pointing at listed pages
    Redirects {
        #[command(subcommand)]
        action: RedirectsAction,
    },

    /// Create redirects from `{{Title|X}}` display titles
    #[command(name = "title-redirects")]
    TitleRedirects(TitleRedirectsArgs),

    /// Create or retarget redirects listed in an alias table
    #[command(name = "fix-redirects")]
    FixRedirects(FixRedirectsArgs),

    /// Move listed pages to `<last path segment> <suffix>`
    Move(MoveArgs),

    /// Restore the previous revision of listed pages
    Revert(RevertArgs),

    /// Show the logged-in account, groups and rights
    Whoami,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum DirectoryAction {
    /// Rebuild the title directory from the wiki
    Refresh,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum CacheAction {
    /// Rebuild the content cache from the title directory
    Refresh,
    /// Show cache and directory freshness
    Status,
}

#[derive(Subcommand, Debug)]
pub enum RedirectsAction {
    /// Collect redirects for listed pages into a redirect map
    Discover(DiscoverArgs),
    /// Delete every page and redirect in a redirect map
    Delete(DeleteArgs),
}

/// Title list that drives a scan.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Title list, one title per line
    #[arg(short, long, default_value = "search_results.txt")]
    pub titles: PathBuf,

    /// Titles to leave alone, one per line
    #[arg(long, value_name = "FILE")]
    pub blacklist: Option<PathBuf>,
}

/// Saved commit queue, so a run can stop after the scan and resume later.
#[derive(Args, Debug, Clone, Default)]
pub struct QueueArgs {
    /// Write the titles queued by the scan to FILE
    #[arg(long, value_name = "FILE", conflicts_with = "queue_in")]
    pub queue_out: Option<PathBuf>,

    /// Skip the scan and commit the titles queued in FILE
    #[arg(long, value_name = "FILE")]
    pub queue_in: Option<PathBuf>,
}

impl QueueArgs {
    /// The queue file in use, whichever direction.
    pub fn path(&self) -> Option<&Path> {
        self.queue_in.as_deref().or(self.queue_out.as_deref())
    }
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search expression; terms joined with ~AND~ / ~OR~. Repeat to OR whole expressions.
    #[arg(short = 's', long = "term")]
    pub terms: Vec<String>,

    /// Pages matching any of these expressions are left out
    #[arg(short, long = "ignore")]
    pub ignores: Vec<String>,

    #[arg(long)]
    pub case_sensitive: bool,

    /// Keep translation subpages such as `Foo/de`
    #[arg(long)]
    pub include_translations: bool,

    /// Rebuild the content cache even if it is fresh
    #[arg(long)]
    pub refresh: bool,

    #[arg(short, long, default_value = "search_results.txt")]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct ReplaceArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub queue: QueueArgs,

    /// Replacement as `FROM=>TO`; repeatable, applied in order
    #[arg(short, long = "map", required = true, value_name = "FROM=>TO")]
    pub mappings: Vec<String>,

    /// Treat FROM as a regular expression (`.` also matches newlines)
    #[arg(long)]
    pub regex: bool,

    #[arg(long, default_value = "Find and replace")]
    pub summary: String,
}

#[derive(Args, Debug)]
pub struct RemoveLinesArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub queue: QueueArgs,

    /// Lines containing this string are removed; repeatable
    #[arg(long = "target", required = true)]
    pub targets: Vec<String>,

    #[arg(long, default_value = "Remove line(s).")]
    pub summary: String,
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Skip the editor check and keep every page; needed when no editors are allowed
    #[arg(long)]
    pub unsafe_no_gate: bool,

    /// Additional allowed editor; repeatable
    #[arg(long = "allow", value_name = "USER")]
    pub allow: Vec<String>,

    #[arg(short, long, default_value = "redirect_data.json")]
    pub output: PathBuf,

    #[arg(long, default_value = "redirects.csv")]
    pub csv: PathBuf,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Redirect map written by `redirects discover`
    #[arg(short, long, default_value = "redirect_data.json")]
    pub input: PathBuf,

    #[arg(long, default_value = "Cleanup of bot-created pages")]
    pub reason: String,
}

#[derive(Args, Debug)]
pub struct TitleRedirectsArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[arg(long, default_value = "Create redirect")]
    pub summary: String,
}

#[derive(Args, Debug)]
pub struct FixRedirectsArgs {
    /// CSV whose rows are `target,alias,alias,...`; the first row is a header
    #[arg(long, default_value = "item_id_dictionary.csv")]
    pub table: PathBuf,

    /// Alias cells containing this string are ignored; repeatable, replaces the defaults
    #[arg(
        long = "exclude",
        value_name = "TEXT",
        default_values = ["See [[#Variants|Variants]]", "Base.VHS_Home", "Base.VHS_Retail", "Base.Disc_Retail"]
    )]
    pub excludes: Vec<String>,

    #[arg(long, default_value = "Redirect fix")]
    pub summary: String,
}

#[derive(Args, Debug)]
pub struct MoveArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Appended to the last path segment, e.g. `(scripts item parameter)`
    #[arg(long)]
    pub suffix: String,

    /// Move reason; defaults to `Moving page to <new title>`
    #[arg(long)]
    pub reason: Option<String>,
}

#[derive(Args, Debug)]
pub struct RevertArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub queue: QueueArgs,

    #[arg(long, default_value = "Revert bot error")]
    pub summary: String,
}
