//! Repair redirects from an alias table.
//!
//! Every alias cell in the table names a page that should read
//! `#REDIRECT [[target]]`. A missing alias page is created. An existing
//! redirect that points elsewhere is rewritten. Articles and disambiguation
//! pages are left alone.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use wikisweep_core::artifacts::{AliasRow, read_alias_table};
use wikisweep_core::{
    Applied, ContentStore, Error, Inspector, Mutator, Precondition, QueueItem, StoreError, Title, Verdict,
};

use crate::cli::FixRedirectsArgs;
use crate::context::Context;
use crate::tasks::read_page;

/// The page name an alias cell stands for, if the cell is usable.
///
/// Blank cells and cells containing an excluded string are dropped. A
/// dotted identifier such as `Base.Axe` keeps only the part after the last
/// dot.
pub fn alias_title(cell: &str, excludes: &[String]) -> Option<Title> {
    let cell = cell.trim();
    if cell.is_empty() || excludes.iter().any(|excluded| cell.contains(excluded.as_str())) {
        return None;
    }
    let name = cell.rsplit('.').next().unwrap_or(cell).trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// `alias -> target` for every alias, minus aliases claimed by two targets.
#[derive(Debug, Default)]
pub struct AliasPlan {
    pub targets: BTreeMap<Title, Title>,
    pub contested: Vec<Title>,
}

pub fn plan_aliases(rows: &[AliasRow], excludes: &[String]) -> AliasPlan {
    let mut plan = AliasPlan::default();
    for row in rows {
        for cell in &row.aliases {
            let Some(alias) = alias_title(cell, excludes) else { continue };
            if alias == row.target {
                continue;
            }
            match plan.targets.get(&alias) {
                Some(existing) if *existing != row.target => {
                    if !plan.contested.contains(&alias) {
                        plan.contested.push(alias);
                    }
                }
                Some(_) => {}
                None => {
                    plan.targets.insert(alias, row.target.clone());
                }
            }
        }
    }
    for alias in &plan.contested {
        plan.targets.remove(alias);
    }
    plan
}

pub fn redirect_text(target: &str) -> String {
    format!("#REDIRECT [[{target}]]")
}

fn is_redirect(text: &str) -> bool {
    text.trim_start().get(..9).is_some_and(|head| head.eq_ignore_ascii_case("#redirect"))
}

/// Why an existing page must not be rewritten, if it must not.
fn keep_reason(text: &str, target: &str) -> Option<&'static str> {
    if !is_redirect(text) {
        Some("not a redirect")
    } else if text.trim() == redirect_text(target) {
        Some("already redirects to its target")
    } else if text.contains("disambiguation") {
        Some("disambiguation page")
    } else {
        None
    }
}

/// What to do with one alias page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectFix {
    Create(Title),
    Retarget(Title),
}

impl RedirectFix {
    pub fn target(&self) -> &str {
        match self {
            RedirectFix::Create(target) | RedirectFix::Retarget(target) => target.as_str(),
        }
    }
}

/// Looks up each alias page and decides between creating and retargeting.
pub struct AliasInspector {
    store: Arc<dyn ContentStore>,
    targets: Arc<BTreeMap<Title, Title>>,
}

impl AliasInspector {
    pub fn new(store: Arc<dyn ContentStore>, targets: Arc<BTreeMap<Title, Title>>) -> Self {
        Self { store, targets }
    }
}

#[async_trait]
impl Inspector for AliasInspector {
    type Payload = RedirectFix;

    async fn inspect(&self, title: &str) -> Result<Verdict<RedirectFix>, Error> {
        let Some(target) = self.targets.get(title) else {
            return Ok(Verdict::skip("not in the alias table"));
        };
        match read_page(self.store.as_ref(), title).await? {
            None => Ok(Verdict::mutate(title, RedirectFix::Create(target.clone()))),
            Some(text) => match keep_reason(&text, target) {
                Some(reason) => Ok(Verdict::skip(reason)),
                None => Ok(Verdict::mutate(title, RedirectFix::Retarget(target.clone()))),
            },
        }
    }
}

pub struct RedirectFixer {
    summary: String,
    tags: Vec<String>,
}

impl RedirectFixer {
    pub fn new(summary: impl Into<String>, tags: Vec<String>) -> Self {
        Self { summary: summary.into(), tags }
    }
}

#[async_trait]
impl Mutator for RedirectFixer {
    type Payload = RedirectFix;

    fn precondition(&self, item: &QueueItem<RedirectFix>) -> Precondition {
        match item.payload {
            RedirectFix::Create(_) => Precondition::MustNotExist,
            RedirectFix::Retarget(_) => Precondition::MustExist,
        }
    }

    fn describe(&self, item: &QueueItem<RedirectFix>) -> String {
        match &item.payload {
            RedirectFix::Create(target) => format!("create redirect {} -> {}", item.title, target),
            RedirectFix::Retarget(target) => format!("retarget {} -> {}", item.title, target),
        }
    }

    async fn apply(&self, store: &dyn ContentStore, item: &QueueItem<RedirectFix>) -> Result<Applied, StoreError> {
        let target = item.payload.target();
        if let RedirectFix::Retarget(_) = item.payload {
            let text = store.get_text(&item.title).await?;
            if keep_reason(&text, target).is_some() {
                return Ok(Applied::Unchanged);
            }
        }
        store.save(&item.title, &redirect_text(target), &self.summary, &self.tags).await?;
        Ok(Applied::Done)
    }
}

pub async fn run(ctx: &Context, args: FixRedirectsArgs) -> Result<()> {
    let rows = read_alias_table(&args.table)?;
    let plan = plan_aliases(&rows, &args.excludes);
    let cells: usize = rows.iter().map(AliasRow::cells).sum();
    println!(
        "{} rows, {} alias cells, {} aliases to check in {}",
        rows.len(),
        cells,
        plan.targets.len(),
        args.table.display()
    );
    for alias in &plan.contested {
        tracing::warn!("{} is listed under more than one target, skipping it", alias);
    }

    ctx.login_for_writes().await?;
    let titles: Vec<Title> = plan.targets.keys().cloned().collect();
    let pipeline = ctx.pipeline();
    let inspector = Arc::new(AliasInspector::new(ctx.store(), Arc::new(plan.targets)));
    let (_, queue) = ctx.scan(&pipeline, &titles, inspector).await?;

    let mutator = RedirectFixer::new(args.summary, ctx.config.edit_tags.clone());
    ctx.commit(&pipeline, queue, &mutator, "Fix").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wikisweep_core::artifacts::parse_alias_table;
    use wikisweep_core::{CommitQueue, CommitResult, Committer, FixedDelay, MemoryStore, Pipeline, ScanPool};

    fn excludes() -> Vec<String> {
        vec!["See [[#Variants|Variants]]".to_string(), "Base.VHS_Home".to_string()]
    }

    #[test]
    fn test_alias_title() {
        let excludes = excludes();
        assert_eq!(alias_title(" Base.Axe ", &excludes).as_deref(), Some("Axe"));
        assert_eq!(alias_title("Hatchet", &excludes).as_deref(), Some("Hatchet"));
        assert_eq!(alias_title("Mod.Base.Knife", &excludes).as_deref(), Some("Knife"));
        assert_eq!(alias_title("See [[#Variants|Variants]]", &excludes), None);
        assert_eq!(alias_title("Base.VHS_Home", &excludes), None);
        assert_eq!(alias_title("Base.", &excludes), None);
        assert_eq!(alias_title("   ", &excludes), None);
    }

    #[test]
    fn test_plan_drops_contested_aliases() {
        let table = "Item,ID 1,ID 2,ID 3\n\
                     Axe,Base.Axe,Base.Chopper,Base.Hatchet\n\
                     Stone Axe,Base.Chopper\n\
                     Knife,Base.Knife,Knife\n\
                     Hand Axe,Base.Hatchet\n";
        let rows = parse_alias_table(table).unwrap();

        let plan = plan_aliases(&rows, &excludes());

        assert_eq!(plan.contested, vec!["Chopper", "Hatchet"]);
        assert!(plan.targets.is_empty());

        let rows = parse_alias_table("Item,ID\nAxe,Base.Hatchet,Hatchet\n").unwrap();
        let plan = plan_aliases(&rows, &excludes());
        assert!(plan.contested.is_empty());
        assert_eq!(plan.targets.get("Hatchet").map(String::as_str), Some("Axe"));
    }

    #[test]
    fn test_keep_reason() {
        assert_eq!(keep_reason("An article", "Axe"), Some("not a redirect"));
        assert_eq!(keep_reason("#REDIRECT [[Axe]]\n", "Axe"), Some("already redirects to its target"));
        assert_eq!(keep_reason("#REDIRECT [[Axes]]\n{{disambiguation}}", "Axe"), Some("disambiguation page"));
        assert_eq!(keep_reason("#redirect [[Old Axe]]", "Axe"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_creates_missing_and_rewrites_stale_redirects() {
        let store = Arc::new(MemoryStore::new());
        store.insert("Axe", "The axe article");
        store.insert("Hatchet", "#REDIRECT [[Old Axe]]");
        store.insert("Chopper", "#REDIRECT [[Axe]]");
        store.insert("Cleaver", "A different article");
        store.insert("Blade", "#REDIRECT [[Knife]]\n{{disambiguation}}");

        let rows = parse_alias_table("Item,IDs\nAxe,Base.Hatchet,Chopper,Base.Cleaver,Blade,Base.Pick,Base.VHS_Home\n")
            .unwrap();
        let plan = plan_aliases(&rows, &excludes());
        let titles: Vec<Title> = plan.targets.keys().cloned().collect();
        assert_eq!(titles, vec!["Blade", "Chopper", "Cleaver", "Hatchet", "Pick"]);

        let committer = Committer::new(store.clone()).with_throttle(FixedDelay(Duration::from_secs(6)));
        let pipeline = Pipeline::new(ScanPool::new(4), committer);
        let inspector = Arc::new(AliasInspector::new(store.clone(), Arc::new(plan.targets)));
        let mutator = RedirectFixer::new("Redirect fix", vec!["bot".into()]);

        let report = pipeline.run(&titles, inspector, &mutator).await.unwrap();

        assert_eq!(report.scan.needs_mutation, 2);
        assert_eq!(report.scan.skipped, 3);
        assert_eq!(report.commit.successful, 2);
        assert_eq!(store.text("Hatchet").as_deref(), Some("#REDIRECT [[Axe]]"));
        assert_eq!(store.text("Pick").as_deref(), Some("#REDIRECT [[Axe]]"));
        assert_eq!(store.text("Cleaver").as_deref(), Some("A different article"));
        assert_eq!(store.text("Blade").as_deref(), Some("#REDIRECT [[Knife]]\n{{disambiguation}}"));
        assert!(!store.contains("VHS_Home"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_rechecks_before_writing() {
        let store = Arc::new(MemoryStore::new());
        store.insert("Hatchet", "#REDIRECT [[Axe]]");
        store.insert("Pick", "created meanwhile");
        let committer = Committer::new(store.clone()).with_throttle(FixedDelay(Duration::from_secs(6)));
        let queue = CommitQueue::from_items(vec![
            QueueItem::new("Hatchet", RedirectFix::Retarget("Axe".into())),
            QueueItem::new("Pick", RedirectFix::Create("Axe".into())),
        ]);

        let summary = committer.run(queue, &RedirectFixer::new("Redirect fix", Vec::new())).await;

        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.skipped_exists, 1);
        assert!(store.mutation_calls().is_empty());
        let pick = summary.items.iter().find(|r| r.title == "Pick").unwrap();
        assert_eq!(pick.result, CommitResult::SkippedExists);
    }
}
