//! Files exchanged between runs: title lists, the redirect map and alias tables.

pub mod aliases;
mod csv;
pub mod redirects;
pub mod titles;

pub use aliases::{AliasRow, parse_alias_table, read_alias_table};
pub use redirects::RedirectMap;
pub use titles::{parse_titles, read_titles, read_titles_or_empty, subtract, write_titles};
