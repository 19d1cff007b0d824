//! Newline-delimited title lists.

use std::collections::HashSet;
use std::path::Path;

use crate::durable::write_atomic;
use crate::store::Title;
use crate::Error;

/// Parse a title list: one title per line, trimmed, blank lines ignored.
pub fn parse_titles(contents: &str) -> Vec<Title> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Read a title list from disk.
///
/// # Errors
///
/// `TitleListMissing` if the file does not exist.
pub fn read_titles(path: &Path) -> Result<Vec<Title>, Error> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(parse_titles(&contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::TitleListMissing(path.to_path_buf())),
        Err(e) => Err(e.into()),
    }
}

/// Read an optional title list; a missing file yields an empty list.
pub fn read_titles_or_empty(path: &Path) -> Result<Vec<Title>, Error> {
    match read_titles(path) {
        Err(Error::TitleListMissing(_)) => Ok(Vec::new()),
        other => other,
    }
}

/// Write titles one per line, in the given order.
pub fn write_titles(path: &Path, titles: &[Title]) -> Result<(), Error> {
    let mut contents = String::with_capacity(titles.iter().map(|t| t.len() + 1).sum());
    for title in titles {
        contents.push_str(title);
        contents.push('\n');
    }
    write_atomic(path, contents.as_bytes())
}

/// Remove blacklisted titles, keeping order and dropping repeats.
pub fn subtract(titles: Vec<Title>, blacklist: &[Title]) -> Vec<Title> {
    let blocked: HashSet<&str> = blacklist.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    titles
        .into_iter()
        .filter(|t| !blocked.contains(t.as_str()))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_titles_skips_blank_lines() {
        let titles = parse_titles("Foo\n\n  Bar  \r\n\t\nBaz");
        assert_eq!(titles, vec!["Foo", "Bar", "Baz"]);
    }

    #[test]
    fn test_read_missing_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search_results.txt");
        assert!(matches!(read_titles(&path), Err(Error::TitleListMissing(p)) if p == path));
        assert!(read_titles_or_empty(&path).unwrap().is_empty());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search_results.txt");
        let titles = vec!["Zeta".to_string(), "Alpha/fr".to_string(), "Ünïcode".to_string()];
        write_titles(&path, &titles).unwrap();
        assert_eq!(read_titles(&path).unwrap(), titles);
    }

    #[test]
    fn test_subtract_blacklist() {
        let titles = vec!["A".to_string(), "B".to_string(), "A".to_string(), "C".to_string()];
        let kept = subtract(titles, &["B".to_string()]);
        assert_eq!(kept, vec!["A", "C"]);
    }
}
