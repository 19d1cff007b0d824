//! One module per maintenance workload.
//!
//! A workload is an [`Inspector`](wikisweep_core::Inspector) that decides
//! which pages need work and a [`Mutator`](wikisweep_core::Mutator) that
//! performs it, plus the glue that feeds them through the pipeline.

pub mod corpus;
pub mod edit;
pub mod fix_redirects;
pub mod move_pages;
pub mod redirects;
pub mod revert;
pub mod search;
pub mod title_redirects;
pub mod whoami;

use wikisweep_core::{ContentStore, Error};

/// Current text of a page, or `None` if it does not exist.
pub(crate) async fn read_page(store: &dyn ContentStore, title: &str) -> Result<Option<String>, Error> {
    match store.get_text(title).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}
