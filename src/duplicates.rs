//! Duplicate detection by file content.
//!
//! Files are grouped by size first; only files that share a size are read and
//! hashed. Empty files are never reported. Detection only reports, it never
//! changes what gets moved.

use crate::scan::FileEntry;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::hash::Hasher;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use twox_hash::XxHash64;

const CHUNK_SIZE: usize = 64 * 1024;

/// Files found to have identical content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    /// Size of each copy in bytes.
    pub size: u64,
    pub hash: u64,
    /// Paths as seen by the scan, in scan order.
    pub paths: Vec<PathBuf>,
}

impl DuplicateGroup {
    /// Number of copies beyond the first.
    pub fn redundant_count(&self) -> usize {
        self.paths.len().saturating_sub(1)
    }

    /// Bytes taken by the redundant copies.
    pub fn wasted_bytes(&self) -> u64 {
        self.size * self.redundant_count() as u64
    }
}

/// Groups the scanned files whose content is identical.
///
/// Groups are ordered by their first path. Files that cannot be read are
/// logged and left out.
pub fn find_duplicates(entries: &[FileEntry]) -> Vec<DuplicateGroup> {
    let mut by_size: HashMap<u64, Vec<&FileEntry>> = HashMap::new();
    for entry in entries.iter().filter(|entry| entry.size > 0) {
        by_size.entry(entry.size).or_default().push(entry);
    }

    let mut by_content: BTreeMap<(u64, u64), Vec<PathBuf>> = BTreeMap::new();
    for candidates in by_size.values().filter(|group| group.len() > 1) {
        for entry in candidates {
            match hash_file(&entry.path) {
                Ok(hash) => by_content
                    .entry((entry.size, hash))
                    .or_default()
                    .push(entry.path.clone()),
                Err(e) => tracing::warn!(
                    path = %entry.path.display(),
                    error = %e,
                    "could not hash file"
                ),
            }
        }
    }

    let mut groups: Vec<DuplicateGroup> = by_content
        .into_iter()
        .filter(|(_, paths)| paths.len() > 1)
        .map(|((size, hash), paths)| DuplicateGroup { size, hash, paths })
        .collect();
    groups.sort_by(|a, b| a.paths.cmp(&b.paths));

    tracing::debug!(groups = groups.len(), "duplicate detection complete");
    groups
}

fn hash_file(path: &Path) -> io::Result<u64> {
    let mut file = File::open(path)?;
    let mut hasher = XxHash64::with_seed(0);
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.write(&buffer[..read]);
    }
    Ok(hasher.finish())
}
