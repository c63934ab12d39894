//! Directory scanning.
//!
//! Walks the source tree once and snapshots every regular file that passes the
//! filters. The result is sorted by full path so that planning and logging are
//! reproducible regardless of the order the OS lists directory entries in.

use crate::config::CompiledFilters;
use chrono::{DateTime, Local};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// A file discovered by the scan.
///
/// This is a snapshot; nothing here is re-checked until the file is moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Base name of the file, exactly as on disk.
    pub file_name: OsString,
    /// Base name decoded for matching and display; lossy for non-UTF-8 names.
    pub name: String,
    /// Lowercase extension without the dot, empty when there is none.
    pub extension: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: DateTime<Local>,
}

impl FileEntry {
    /// Builds an entry from a path and its metadata.
    pub fn from_metadata(path: PathBuf, metadata: &std::fs::Metadata) -> Self {
        let file_name = path.file_name().map(OsStr::to_os_string).unwrap_or_default();
        let name = file_name.to_string_lossy().to_string();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let modified = metadata
            .modified()
            .map(DateTime::<Local>::from)
            .unwrap_or_else(|_| Local::now());

        Self {
            path,
            file_name,
            name,
            extension,
            size: metadata.len(),
            modified,
        }
    }
}

/// Recursively collects the files under `source`.
///
/// Anything in `skip` (the destination tree, the audit log) is left out
/// entirely, as are hidden directories unless the filters enable hidden files.
/// Symlinks are not followed and are never organized.
///
/// # Errors
///
/// Fails only if `source` itself cannot be read. Unreadable entries deeper in
/// the tree are logged and skipped.
pub fn scan_directory(
    source: &Path,
    skip: &[PathBuf],
    filters: &CompiledFilters,
) -> Result<Vec<FileEntry>, walkdir::Error> {
    let walker = WalkDir::new(source)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_pruned(entry, skip, filters));

    let mut entries = Vec::new();
    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
        if !filters.should_include(relative) {
            tracing::debug!(path = %relative.display(), "excluded by filters");
            continue;
        }

        match entry.metadata() {
            Ok(metadata) => entries.push(FileEntry::from_metadata(entry.into_path(), &metadata)),
            Err(e) => tracing::warn!(
                path = %entry.path().display(),
                error = %e,
                "skipping file without metadata"
            ),
        }
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(source = %source.display(), files = entries.len(), "scan complete");
    Ok(entries)
}

fn is_pruned(entry: &DirEntry, skip: &[PathBuf], filters: &CompiledFilters) -> bool {
    if entry.depth() == 0 {
        return false;
    }

    if skip.iter().any(|skipped| entry.path() == skipped) {
        return true;
    }

    entry.file_type().is_dir()
        && !filters.hidden_files_enabled()
        && entry.file_name().to_string_lossy().starts_with('.')
}
