//! File-backed caches that make repeated scans cheap.
//!
//! - [`ContentCache`]: the whole corpus as `title -> text`, rebuilt by
//!   batched concurrent reads and published atomically.
//! - [`TitleDirectory`]: the list of titles the cache is built from.
//!
//! Both are valid while their file is younger than a configured age and are
//! otherwise rebuilt wholesale.

pub mod directory;
pub mod snapshots;

pub use directory::TitleDirectory;
pub use snapshots::{ContentCache, ContentSnapshot};
