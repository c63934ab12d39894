/// Undo of previous runs, driven by the audit log.
///
/// Every `moved` record is reversed newest-first. Each restore is appended to
/// the same log as a `restored` record, so running undo again leaves already
/// restored files alone.
use crate::audit_log::{AuditLog, LogRecord, Outcome};
use crate::file_organizer::{OrganizeError, OrganizeResult};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Represents the result of an undo operation.
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Number of files successfully restored.
    pub restored_files: usize,
    /// Files that could not be restored, with the reason.
    pub failed_restores: Vec<(PathBuf, String)>,
    /// Files that were skipped (e.g., no longer at their destination).
    pub skipped_files: Vec<(PathBuf, String)>,
}

impl UndoReport {
    /// Returns the total number of moves processed.
    pub fn total_processed(&self) -> usize {
        self.restored_files + self.failed_restores.len() + self.skipped_files.len()
    }

    /// Returns true if every move was reverted.
    pub fn is_complete_success(&self) -> bool {
        self.failed_restores.is_empty() && self.skipped_files.is_empty()
    }

    /// `2` when some restore failed, `0` otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.failed_restores.is_empty() { 0 } else { 2 }
    }
}

/// Manages undo operations for file organization.
pub struct UndoManager;

impl UndoManager {
    /// Reverts the moves recorded in the audit log at `log_path`.
    ///
    /// # Edge Cases Handled
    ///
    /// * **File not found**: Skipped with a note that the file couldn't be found
    /// * **File name conflict**: The conflicting file is backed up with a timestamp suffix
    /// * **Missing source folder**: Recreated before the file is moved back
    /// * **Permission denied**: Recorded as a failure with the error reason
    ///
    /// # Errors
    ///
    /// Returns `OrganizeError::NotFound` when there is no audit log and
    /// `OrganizeError::AuditLog` when it cannot be parsed.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sortbox::undo::UndoManager;
    /// use std::path::Path;
    ///
    /// match UndoManager::undo(Path::new("/in/Organized/organizer.log")) {
    ///     Ok(report) => println!("Restored {} files", report.restored_files),
    ///     Err(e) => eprintln!("Undo failed: {}", e),
    /// }
    /// ```
    pub fn undo(log_path: &Path) -> OrganizeResult<UndoReport> {
        if !log_path.exists() {
            return Err(OrganizeError::NotFound {
                what: "audit log",
                path: log_path.to_path_buf(),
            });
        }

        let records = AuditLog::load(log_path)?;
        let mut already_restored: HashMap<(PathBuf, PathBuf), usize> = HashMap::new();
        for record in records.iter().filter(|r| r.outcome == Outcome::Restored) {
            *already_restored
                .entry((record.source.clone(), record.destination.clone()))
                .or_insert(0) += 1;
        }

        let mut audit = AuditLog::new(log_path.to_path_buf());
        let mut report = UndoReport::default();

        for record in records.iter().rev().filter(|r| r.outcome == Outcome::Moved) {
            let key = (record.source.clone(), record.destination.clone());
            if let Some(count) = already_restored.get_mut(&key)
                && *count > 0
            {
                *count -= 1;
                continue;
            }

            match Self::restore_file(record) {
                Ok(()) => {
                    tracing::info!(
                        from = %record.destination.display(),
                        to = %record.source.display(),
                        "restored"
                    );
                    report.restored_files += 1;
                    audit.record(LogRecord::restored(
                        record.source.clone(),
                        record.destination.clone(),
                    ));
                    if let Err(e) = audit.flush() {
                        tracing::warn!(error = %e, "could not append to audit log");
                    }
                }
                Err(RestoreError::Missing(path, reason)) => {
                    report.skipped_files.push((path, reason));
                }
                Err(RestoreError::Failed(path, reason)) => {
                    tracing::warn!(path = %path.display(), reason = %reason, "restore failed");
                    report.failed_restores.push((path, reason));
                }
            }
        }

        Ok(report)
    }

    /// Moves a single file from its recorded destination back to its source.
    fn restore_file(record: &LogRecord) -> Result<(), RestoreError> {
        if fs::symlink_metadata(&record.destination).is_err() {
            return Err(RestoreError::Missing(
                record.destination.clone(),
                "File not found at expected location".to_string(),
            ));
        }

        if fs::symlink_metadata(&record.source).is_ok() {
            let backup_path = Self::generate_backup_path(&record.source);
            fs::rename(&record.source, &backup_path).map_err(|e| {
                RestoreError::Failed(
                    record.source.clone(),
                    format!("Could not backup conflicting file: {}", e),
                )
            })?;
        }

        if let Some(parent) = record.source.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                RestoreError::Failed(
                    record.source.clone(),
                    format!("Could not recreate folder: {}", e),
                )
            })?;
        }

        fs::rename(&record.destination, &record.source).map_err(|e| {
            RestoreError::Failed(
                record.destination.clone(),
                format!("Failed to restore file: {}", e),
            )
        })
    }

    /// Generates a backup path for a file by appending a timestamp.
    ///
    /// Example: `file.txt` becomes `file.txt.bak.20251109-143052`
    fn generate_backup_path(original_path: &Path) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let filename = original_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());

        original_path.with_file_name(format!("{}.bak.{}", filename, timestamp))
    }
}

enum RestoreError {
    Missing(PathBuf, String),
    Failed(PathBuf, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_organizer::FileOrganizer;
    use crate::planner::MovePlan;
    use tempfile::TempDir;

    /// Moves `name` into `Organized/Documents` and logs it like a real run.
    fn organize_one(base: &Path, name: &str, log_path: &Path) -> MovePlan {
        let plan = MovePlan {
            source: base.join(name),
            destination: base.join("Organized/Documents").join(name),
            category: "Documents".to_string(),
        };
        let mut audit = AuditLog::new(log_path.to_path_buf());
        FileOrganizer::execute(vec![plan.clone()], false, &mut audit, |_| {});
        plan
    }

    #[test]
    fn test_undo_no_log() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let result = UndoManager::undo(&temp_dir.path().join("organizer.log"));
        assert!(matches!(result, Err(OrganizeError::NotFound { .. })));
    }

    #[test]
    fn test_undo_single_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let log_path = base.join("organizer.log");
        fs::write(base.join("test.txt"), "test content").unwrap();
        let plan = organize_one(base, "test.txt", &log_path);
        assert!(plan.destination.exists());

        let report = UndoManager::undo(&log_path).expect("Undo failed");

        assert_eq!(report.restored_files, 1);
        assert!(report.is_complete_success());
        assert!(plan.source.exists());
        assert!(!plan.destination.exists());

        let records = AuditLog::load(&log_path).unwrap();
        assert_eq!(records.last().unwrap().outcome, Outcome::Restored);
    }

    #[test]
    fn test_undo_twice_is_a_no_op() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let log_path = base.join("organizer.log");
        fs::write(base.join("test.txt"), "test content").unwrap();
        organize_one(base, "test.txt", &log_path);

        UndoManager::undo(&log_path).expect("Undo failed");
        let second = UndoManager::undo(&log_path).expect("Undo failed");

        assert_eq!(second.total_processed(), 0);
        assert!(base.join("test.txt").exists());
    }

    #[test]
    fn test_undo_with_file_name_conflict() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let log_path = base.join("organizer.log");
        fs::write(base.join("test.txt"), "original content").unwrap();
        organize_one(base, "test.txt", &log_path);
        fs::write(base.join("test.txt"), "new content").unwrap();

        let report = UndoManager::undo(&log_path).expect("Undo failed");

        assert_eq!(report.restored_files, 1);
        assert_eq!(
            fs::read_to_string(base.join("test.txt")).unwrap(),
            "original content"
        );
        let backups = fs::read_dir(base)
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().contains(".bak."))
            .count();
        assert_eq!(backups, 1);
    }

    #[test]
    fn test_undo_with_missing_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let log_path = base.join("organizer.log");
        fs::write(base.join("test.txt"), "x").unwrap();
        let plan = organize_one(base, "test.txt", &log_path);
        fs::remove_file(&plan.destination).unwrap();

        let report = UndoManager::undo(&log_path).expect("Undo failed");

        assert_eq!(report.restored_files, 0);
        assert_eq!(report.skipped_files.len(), 1);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_undo_recreates_source_folder() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let log_path = base.join("organizer.log");
        fs::create_dir_all(base.join("inbox")).unwrap();
        fs::write(base.join("inbox/test.txt"), "x").unwrap();
        let plan = organize_one(base, "inbox/test.txt", &log_path);
        fs::remove_dir(base.join("inbox")).unwrap();

        let report = UndoManager::undo(&log_path).expect("Undo failed");

        assert_eq!(report.restored_files, 1);
        assert!(plan.source.exists());
    }
}
