//! Durable file helpers shared by the cache and the artifacts.
//!
//! Files are published with write-temp-then-rename so a reader never sees a
//! half-written snapshot. Freshness is judged from the file's mtime.

use std::io::Write;
use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::Error;

/// Age of the file at `path`, or `None` if it does not exist.
///
/// A modification time in the future counts as age zero.
pub fn file_age(path: &Path) -> Option<Duration> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(SystemTime::now().duration_since(modified).unwrap_or_default())
}

/// True iff the file exists and is younger than `max_age`.
pub fn is_fresh(path: &Path, max_age: Duration) -> bool {
    file_age(path).is_some_and(|age| age < max_age)
}

/// Write `contents` to a temp file beside `path`, then rename it over `path`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), Error> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::debug!("published {} ({} bytes)", path.display(), contents.len());
    Ok(())
}

/// [`write_atomic`] on the blocking pool.
pub async fn write_atomic_async(path: &Path, contents: Vec<u8>) -> Result<(), Error> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic(&path, &contents)).await?
}
