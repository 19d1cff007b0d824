//! The redirect-discovery artifact.
//!
//! Discovery writes a [`RedirectMap`] to JSON; a separately invoked commit
//! phase reads it back. The file is meant to be reviewed (and edited) by a
//! human in between, so it is pretty-printed and key-ordered.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::csv;
use crate::durable::write_atomic;
use crate::store::Title;
use crate::Error;

/// `source title -> redirects pointing at it`, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RedirectMap(BTreeMap<Title, Vec<Title>>);

impl RedirectMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, page: Title, redirects: Vec<Title>) {
        self.0.insert(page, redirects);
    }

    pub fn get(&self, page: &str) -> Option<&[Title]> {
        self.0.get(page).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Title, &Vec<Title>)> {
        self.0.iter()
    }

    /// Total number of redirects across all pages.
    pub fn redirect_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    /// Every page followed by its redirects, pages in key order.
    pub fn flatten(&self) -> Vec<Title> {
        self.0
            .iter()
            .flat_map(|(page, redirects)| std::iter::once(page).chain(redirects))
            .cloned()
            .collect()
    }

    /// Write as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, json.as_bytes())
    }

    /// Read a previously saved map.
    ///
    /// # Errors
    ///
    /// `ArtifactMissing` if the file does not exist, `ArtifactCorrupt` if it
    /// does not parse.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ArtifactMissing(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&contents)
            .map_err(|e| Error::ArtifactCorrupt { path: path.to_path_buf(), reason: e.to_string() })
    }

    /// Render as CSV: `Page Name,Redirect 1,...,Redirect N`, one ragged row per page.
    pub fn to_csv(&self) -> String {
        let widest = self.0.values().map(Vec::len).max().unwrap_or(0).max(1);

        let mut out = String::from("Page Name");
        for n in 1..=widest {
            out.push_str(&format!(",Redirect {n}"));
        }
        out.push('\n');

        for (page, redirects) in &self.0 {
            out.push_str(&csv::field(page));
            for redirect in redirects {
                out.push(',');
                out.push_str(&csv::field(redirect));
            }
            out.push('\n');
        }
        out
    }

    pub fn save_csv(&self, path: &Path) -> Result<(), Error> {
        write_atomic(path, self.to_csv().as_bytes())
    }
}

impl FromIterator<(Title, Vec<Title>)> for RedirectMap {
    fn from_iter<I: IntoIterator<Item = (Title, Vec<Title>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
