//! wikisweep entry point.
//!
//! Logging goes to stderr so stdout carries only result listings.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use wikisweep_core::AppConfig;

mod cli;
mod context;
mod progress;
mod tasks;

use cli::{CacheAction, Cli, Commands, DirectoryAction, RedirectsAction};
use context::Context;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = AppConfig::load_from(cli.config.as_deref())?;
    tracing::debug!("loaded config for {}", config.api_url);

    let ctx = Context::new(config, cli.options())?;

    match cli.command {
        Commands::Directory { action: DirectoryAction::Refresh } => tasks::corpus::refresh_directory(&ctx).await,
        Commands::Cache { action: CacheAction::Refresh } => tasks::corpus::refresh_cache(&ctx).await,
        Commands::Cache { action: CacheAction::Status } => tasks::corpus::status(&ctx),
        Commands::Search(args) => tasks::search::run(&ctx, args).await,
        Commands::Replace(args) => tasks::edit::replace(&ctx, args).await,
        Commands::RemoveLines(args) => tasks::edit::remove_lines(&ctx, args).await,
        Commands::Redirects { action: RedirectsAction::Discover(args) } => tasks::redirects::discover(&ctx, args).await,
        Commands::Redirects { action: RedirectsAction::Delete(args) } => tasks::redirects::delete(&ctx, args).await,
        Commands::TitleRedirects(args) => tasks::title_redirects::run(&ctx, args).await,
        Commands::FixRedirects(args) => tasks::fix_redirects::run(&ctx, args).await,
        Commands::Move(args) => tasks::move_pages::run(&ctx, args).await,
        Commands::Revert(args) => tasks::revert::run(&ctx, args).await,
        Commands::Whoami => tasks::whoami::run(&ctx).await,
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
