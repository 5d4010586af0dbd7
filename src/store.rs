use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::formats::Book;

/// The data file as read from disk, kept byte-for-byte for the backup.
#[derive(Debug)]
pub struct Snapshot {
    pub raw: Vec<u8>,
    pub books: Vec<Book>,
}

/// Resolves `path` against the project root. Absolute paths are used as given.
pub fn resolve_path(root: &Path, path: &str) -> PathBuf {
    root.join(path)
}

pub fn read_snapshot(path: &Path) -> anyhow::Result<Snapshot> {
    let raw = std::fs::read(path).with_context(|| format!("read data file: {}", path.display()))?;
    let books: Vec<Book> = serde_json::from_slice(&raw)
        .with_context(|| format!("parse data file as book list: {}", path.display()))?;
    Ok(Snapshot { raw, books })
}

pub fn write_backup(path: &Path, raw: &[u8]) -> anyhow::Result<()> {
    create_parent_dir(path)?;
    std::fs::write(path, raw).with_context(|| format!("write backup: {}", path.display()))?;
    Ok(())
}

/// Replaces `path` with the pretty-printed book list.
///
/// The JSON is written to a temporary file next to `path` and renamed over it,
/// so readers never observe a half-written file.
pub fn write_books(path: &Path, books: &[Book]) -> anyhow::Result<()> {
    let parent = create_parent_dir(path)?;

    let mut json = serde_json::to_string_pretty(books).context("serialize books")?;
    json.push('\n');

    let mut tmp = tempfile::NamedTempFile::new_in(&parent)
        .with_context(|| format!("create temp file in: {}", parent.display()))?;
    tmp.write_all(json.as_bytes())
        .with_context(|| format!("write temp file for: {}", path.display()))?;
    tmp.flush()
        .with_context(|| format!("flush temp file for: {}", path.display()))?;
    if let Ok(existing) = std::fs::metadata(path) {
        tmp.as_file()
            .set_permissions(existing.permissions())
            .with_context(|| format!("copy permissions of: {}", path.display()))?;
    }
    tmp.persist(path)
        .with_context(|| format!("replace data file: {}", path.display()))?;

    Ok(())
}

fn create_parent_dir(path: &Path) -> anyhow::Result<PathBuf> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)
        .with_context(|| format!("create parent dir: {}", parent.display()))?;
    Ok(parent)
}
