//! Alias table: a CSV whose rows name a page followed by names that should
//! redirect to it.
//!
//! ```text
//! Item,ID 1,ID 2
//! Axe,Base.Axe,Base.AxeStone
//! ```
//!
//! The first row is a header and is ignored.

use std::path::Path;

use super::csv;
use crate::store::Title;
use crate::Error;

/// One row: the redirect target and the raw alias cells that follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasRow {
    pub target: Title,
    pub aliases: Vec<String>,
}

impl AliasRow {
    /// Number of alias cells, blank ones included.
    pub fn cells(&self) -> usize {
        self.aliases.len()
    }
}

/// Parse an alias table. Rows with a blank first cell are dropped.
pub fn parse_alias_table(contents: &str) -> Result<Vec<AliasRow>, String> {
    let records = csv::parse_records(contents)?;
    Ok(records
        .into_iter()
        .skip(1)
        .filter_map(|mut record| {
            let target = record.first()?.trim().to_string();
            if target.is_empty() {
                return None;
            }
            let aliases = record.split_off(1);
            Some(AliasRow { target, aliases })
        })
        .collect())
}

/// Read an alias table from disk.
///
/// # Errors
///
/// `ArtifactMissing` if the file does not exist, `ArtifactCorrupt` if it
/// does not parse.
pub fn read_alias_table(path: &Path) -> Result<Vec<AliasRow>, Error> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::ArtifactMissing(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    parse_alias_table(&contents).map_err(|reason| Error::ArtifactCorrupt { path: path.to_path_buf(), reason })
}
