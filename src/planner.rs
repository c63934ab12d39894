//! Move planning.
//!
//! Turns scanned files into concrete source → destination moves before
//! anything on disk changes. Destination names are reserved as they are
//! handed out, so two files can never be planned onto the same path.

use crate::file_category::{Classifier, OTHER_LABEL};
use crate::scan::FileEntry;
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

/// A single planned move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    /// Where the file is now.
    pub source: PathBuf,
    /// Where the file will go, collision suffix already applied.
    pub destination: PathBuf,
    /// Category label the file was classified into.
    pub category: String,
}

/// Optional planning behaviour.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanOptions {
    /// Add a `YYYY-MM` folder (from the modification time) under each category.
    pub by_month: bool,
    /// Inspect file headers when the extension alone gives "Other".
    pub sniff: bool,
}

/// Lazy iterator over the moves for a list of files.
///
/// Entries are planned in the order given. Building a new planner from the
/// same inputs yields the same plans as long as the destination tree has not
/// changed in between.
pub struct Planner<'a> {
    entries: std::slice::Iter<'a, FileEntry>,
    classifier: &'a Classifier,
    destination_root: &'a Path,
    options: PlanOptions,
    claimed: HashSet<PathBuf>,
}

/// Plans moves for `entries` into category folders under `destination_root`.
///
/// # Examples
///
/// ```no_run
/// use sortbox::file_category::Classifier;
/// use sortbox::planner::{PlanOptions, plan};
/// use sortbox::scan::FileEntry;
/// use std::path::Path;
///
/// let entries: Vec<FileEntry> = Vec::new();
/// let classifier = Classifier::default();
/// let root = Path::new("/tmp/Organized");
/// for planned in plan(&entries, &classifier, root, PlanOptions::default()) {
///     println!("{} -> {}", planned.source.display(), planned.destination.display());
/// }
/// ```
pub fn plan<'a>(
    entries: &'a [FileEntry],
    classifier: &'a Classifier,
    destination_root: &'a Path,
    options: PlanOptions,
) -> Planner<'a> {
    Planner {
        entries: entries.iter(),
        classifier,
        destination_root,
        options,
        claimed: HashSet::new(),
    }
}

impl Planner<'_> {
    fn categorize(&self, entry: &FileEntry) -> String {
        let label = self.classifier.classify_file(&entry.name, &entry.extension);

        if self.options.sniff
            && label == OTHER_LABEL
            && let Some(category) = self.classifier.sniff(&entry.path)
        {
            tracing::debug!(
                file = %entry.name,
                category = category.label(),
                "classified by content"
            );
            return category.label().to_string();
        }

        label.to_string()
    }

    fn target_dir(&self, entry: &FileEntry, category: &str) -> PathBuf {
        let mut dir = self.destination_root.join(category);
        if self.options.by_month {
            dir.push(entry.modified.format("%Y-%m").to_string());
        }
        dir
    }

    /// Picks the first free name in `dir` and reserves it.
    fn claim(&mut self, dir: &Path, file_name: &OsStr) -> PathBuf {
        let mut candidate = dir.join(file_name);
        let mut counter = 1;
        while self.claimed.contains(&candidate) || fs::symlink_metadata(&candidate).is_ok() {
            candidate = dir.join(numbered_name(file_name, counter));
            counter += 1;
        }
        self.claimed.insert(candidate.clone());
        candidate
    }
}

impl Iterator for Planner<'_> {
    type Item = MovePlan;

    fn next(&mut self) -> Option<MovePlan> {
        loop {
            let entry = self.entries.next()?;
            let category = self.categorize(entry);
            let dir = self.target_dir(entry, &category);

            // Already sorted into place, e.g. when organizing a directory into itself.
            if entry.path.parent() == Some(dir.as_path()) {
                tracing::debug!(file = %entry.path.display(), "already in its category folder");
                continue;
            }

            let destination = self.claim(&dir, &entry.file_name);
            tracing::debug!(
                source = %entry.path.display(),
                destination = %destination.display(),
                category = %category,
                "planned move"
            );

            return Some(MovePlan {
                source: entry.path.clone(),
                destination,
                category,
            });
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.entries.size_hint().1)
    }
}

/// Inserts ` (n)` before the extension: `a.txt` becomes `a (1).txt`.
///
/// Works on the raw name, so names that are not valid UTF-8 keep their bytes.
fn numbered_name(file_name: &OsStr, n: usize) -> OsString {
    let path = Path::new(file_name);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => {
            let mut numbered = stem.to_os_string();
            numbered.push(format!(" ({n})."));
            numbered.push(ext);
            numbered
        }
        _ => {
            let mut numbered = file_name.to_os_string();
            numbered.push(format!(" ({n})"));
            numbered
        }
    }
}
