//! Source tree enumeration.
//!
//! Every regular file under the root is collected with a `/`-separated path
//! relative to the base. Any path segment starting with `.` hides the file,
//! and hidden directories are pruned without being descended into. Symlinks
//! to files are collected; symlinked directories are never entered.

use devtools_core::{DevToolsError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// A file to add, keyed by its path inside the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub relative: String,
    pub absolute: PathBuf,
}

#[derive(Debug, Clone)]
pub struct FileCollector {
    root: PathBuf,
    relative_base: PathBuf,
    excluded: Vec<PathBuf>,
}

impl FileCollector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            relative_base: root.clone(),
            root,
            excluded: Vec::new(),
        }
    }

    pub fn with_relative_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.relative_base = base.into();
        self
    }

    /// Leave `path` out of the walk. Used for the archive being written,
    /// which may live inside the source tree.
    pub fn excluding(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded.push(path.into());
        self
    }

    /// Walk the tree in natural traversal order. Any unreadable entry fails
    /// the whole walk.
    pub fn collect(&self) -> Result<Vec<FileEntry>> {
        let mut entries = Vec::new();
        let mut outside_base = 0usize;

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !self.is_hidden_entry(entry));

        for result in walker {
            let entry = result.map_err(|e| {
                let path = e.path().unwrap_or(&self.root).to_path_buf();
                DevToolsError::archive_write(e.into(), path, "collect")
            })?;
            if !is_regular_file(&entry) {
                continue;
            }
            if self.excluded.iter().any(|excluded| excluded == entry.path()) {
                debug!(path = %entry.path().display(), "Skipping excluded file");
                continue;
            }

            let relative = match relative_to(entry.path(), &self.relative_base) {
                Some(relative) => relative,
                None => {
                    outside_base += 1;
                    match relative_to(entry.path(), &self.root) {
                        Some(relative) => relative,
                        None => continue,
                    }
                }
            };

            debug!(path = %relative, "Collected file");
            entries.push(FileEntry {
                relative,
                absolute: entry.into_path(),
            });
        }

        if outside_base > 0 {
            warn!(
                count = outside_base,
                base = %self.relative_base.display(),
                "Files outside the relative base were stored relative to the source root"
            );
        }
        Ok(entries)
    }

    fn is_hidden_entry(&self, entry: &DirEntry) -> bool {
        relative_to(entry.path(), &self.relative_base)
            .or_else(|| relative_to(entry.path(), &self.root))
            .is_some_and(|relative| is_hidden(&relative))
    }
}

/// Symlinks count when their target is a regular file
fn is_regular_file(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    file_type.is_file() || (file_type.is_symlink() && entry.path().is_file())
}

/// True when any `/`-separated segment begins with a dot
pub fn is_hidden(relative: &str) -> bool {
    relative.split('/').any(|segment| segment.starts_with('.'))
}

fn relative_to(path: &Path, base: &Path) -> Option<String> {
    let stripped = path.strip_prefix(base).ok()?;
    Some(
        stripped
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
    )
}
