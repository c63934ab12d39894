/// Execution of planned moves, plus the error types of a run.
///
/// [`FileOrganizer::execute`] walks a plan in order and either moves each file
/// or, in dry-run mode, only records what it would have done. A failed move is
/// recorded and the run carries on with the next file.
use crate::audit_log::{AuditLog, AuditLogError, LogRecord, Outcome};
use crate::config::ConfigError;
use crate::output::OutputFormatter;
use crate::planner::MovePlan;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Reason recorded for every plan in a dry-run.
pub const DRY_RUN_REASON: &str = "dry-run";

/// Why a single file could not be moved.
///
/// These never abort a run; they end up as the reason of a `failed` record.
#[derive(Debug, Error)]
pub enum MoveError {
    /// The file disappeared between scan and move.
    #[error("source vanished")]
    SourceVanished,

    /// Something appeared at the destination after planning.
    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    /// Source and destination are on different filesystems.
    #[error("cross-device move not supported: {0}")]
    CrossDevice(#[source] io::Error),

    /// The category directory could not be created.
    #[error("could not create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The destination has no parent directory.
    #[error("invalid destination {}", .0.display())]
    InvalidDestination(PathBuf),

    /// Any other failure of the rename itself.
    #[error("{0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for MoveError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => MoveError::SourceVanished,
            io::ErrorKind::CrossesDevices => MoveError::CrossDevice(e),
            _ => MoveError::Io(e),
        }
    }
}

/// Fatal errors: the run stops before touching any file.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// Bad rules file or arguments.
    #[error("configuration error: {0}")]
    Config(ConfigError),

    /// A required path does not exist.
    #[error("{what} not found: {}", path.display())]
    NotFound { what: &'static str, path: PathBuf },

    /// The source directory could not be listed.
    #[error("could not scan {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// The audit log needed for undo is unreadable.
    #[error(transparent)]
    AuditLog(#[from] AuditLogError),
}

impl From<ConfigError> for OrganizeError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::RulesNotFound(path) => OrganizeError::NotFound {
                what: "rules file",
                path,
            },
            other => OrganizeError::Config(other),
        }
    }
}

impl OrganizeError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

/// Result type for a run.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Counts of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub moved: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Moved or planned files per category.
    pub by_category: BTreeMap<String, usize>,
}

impl RunSummary {
    /// Tallies the records of a run.
    pub fn from_records(records: &[LogRecord]) -> Self {
        let mut summary = Self::default();
        for record in records {
            match record.outcome {
                Outcome::Moved => summary.moved += 1,
                Outcome::Skipped => summary.skipped += 1,
                Outcome::Failed => summary.failed += 1,
                Outcome::Restored => continue,
            }
            if record.outcome != Outcome::Failed
                && let Some(category) = &record.category
            {
                *summary.by_category.entry(category.clone()).or_insert(0) += 1;
            }
        }
        summary
    }

    /// `2` when any file failed to move, `0` otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.failed > 0 { 2 } else { 0 }
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} moved, {} skipped, {} failed",
            self.moved, self.skipped, self.failed
        )
    }
}

/// Applies move plans to the filesystem.
pub struct FileOrganizer;

impl FileOrganizer {
    /// Moves one file to its planned destination.
    ///
    /// The destination directory is created if needed. The move itself is a
    /// single `rename`, so it is atomic within a filesystem and refused across
    /// filesystems. An existing file at the destination is never replaced.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sortbox::file_organizer::FileOrganizer;
    /// use sortbox::planner::MovePlan;
    /// use std::path::PathBuf;
    ///
    /// let plan = MovePlan {
    ///     source: PathBuf::from("/in/report.pdf"),
    ///     destination: PathBuf::from("/in/Organized/Documents/report.pdf"),
    ///     category: "Documents".to_string(),
    /// };
    /// match FileOrganizer::move_file(&plan) {
    ///     Ok(()) => println!("moved"),
    ///     Err(e) => eprintln!("failed: {}", e),
    /// }
    /// ```
    pub fn move_file(plan: &MovePlan) -> Result<(), MoveError> {
        if fs::symlink_metadata(&plan.source).is_err() {
            return Err(MoveError::SourceVanished);
        }

        let category_dir = plan
            .destination
            .parent()
            .ok_or_else(|| MoveError::InvalidDestination(plan.destination.clone()))?;
        fs::create_dir_all(category_dir).map_err(|source| MoveError::CreateDir {
            path: category_dir.to_path_buf(),
            source,
        })?;

        if fs::symlink_metadata(&plan.destination).is_ok() {
            return Err(MoveError::DestinationExists(plan.destination.clone()));
        }

        fs::rename(&plan.source, &plan.destination)?;
        Ok(())
    }

    /// Executes plans in order, recording one entry per plan.
    ///
    /// Each record is added to `audit` and flushed right away, so the log on
    /// disk only ever lists completed steps. A failing flush is reported once
    /// and does not stop the run. `on_record` sees every record as it is made.
    pub fn execute<I>(
        plans: I,
        dry_run: bool,
        audit: &mut AuditLog,
        mut on_record: impl FnMut(&LogRecord),
    ) -> Vec<LogRecord>
    where
        I: IntoIterator<Item = MovePlan>,
    {
        let mut records = Vec::new();
        let mut log_warned = false;

        for plan in plans {
            let record = if dry_run {
                LogRecord::skipped(&plan, DRY_RUN_REASON)
            } else {
                match Self::move_file(&plan) {
                    Ok(()) => {
                        tracing::info!(
                            source = %plan.source.display(),
                            destination = %plan.destination.display(),
                            "moved"
                        );
                        LogRecord::moved(&plan)
                    }
                    Err(e) => {
                        tracing::warn!(source = %plan.source.display(), error = %e, "move failed");
                        LogRecord::failed(&plan, e.to_string())
                    }
                }
            };

            on_record(&record);
            audit.record(record.clone());
            if let Err(e) = audit.flush() {
                tracing::warn!(error = %e, "could not write audit log");
                if !log_warned {
                    let location = audit
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default();
                    OutputFormatter::warning(&format!(
                        "Could not write audit log {}: {}",
                        location, e
                    ));
                    log_warned = true;
                }
            }
            records.push(record);
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn plan_for(base: &Path, name: &str, category: &str) -> MovePlan {
        MovePlan {
            source: base.join(name),
            destination: base.join("Organized").join(category).join(name),
            category: category.to_string(),
        }
    }

    #[test]
    fn test_move_file_creates_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("test.txt"), "test content").unwrap();
        let plan = plan_for(base, "test.txt", "Documents");

        FileOrganizer::move_file(&plan).expect("Failed to move file");

        assert!(base.join("Organized/Documents").is_dir());
        assert!(!plan.source.exists());
        assert_eq!(fs::read_to_string(&plan.destination).unwrap(), "test content");
    }

    #[test]
    fn test_move_file_source_vanished() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let plan = plan_for(temp_dir.path(), "gone.txt", "Documents");

        let result = FileOrganizer::move_file(&plan);

        assert!(matches!(result, Err(MoveError::SourceVanished)));
        assert_eq!(result.unwrap_err().to_string(), "source vanished");
    }

    #[test]
    fn test_move_file_never_overwrites() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("a.txt"), "new").unwrap();
        fs::create_dir_all(base.join("Organized/Documents")).unwrap();
        fs::write(base.join("Organized/Documents/a.txt"), "old").unwrap();
        let plan = plan_for(base, "a.txt", "Documents");

        let result = FileOrganizer::move_file(&plan);

        assert!(matches!(result, Err(MoveError::DestinationExists(_))));
        assert_eq!(fs::read_to_string(&plan.destination).unwrap(), "old");
        assert!(plan.source.exists());
    }

    #[test]
    fn test_move_file_blocked_category_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("a.txt"), "a").unwrap();
        fs::create_dir_all(base.join("Organized")).unwrap();
        fs::write(base.join("Organized/Documents"), "not a directory").unwrap();
        let plan = plan_for(base, "a.txt", "Documents");

        let result = FileOrganizer::move_file(&plan);

        assert!(matches!(result, Err(MoveError::CreateDir { .. })));
        assert!(plan.source.exists());
    }

    #[test]
    fn test_io_error_mapping() {
        let vanished = MoveError::from(io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(vanished, MoveError::SourceVanished));

        let cross = MoveError::from(io::Error::from(io::ErrorKind::CrossesDevices));
        assert!(matches!(cross, MoveError::CrossDevice(_)));

        let denied = MoveError::from(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(denied, MoveError::Io(_)));
    }

    #[test]
    fn test_execute_dry_run_touches_nothing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("a.txt"), "a").unwrap();
        let plans = vec![plan_for(base, "a.txt", "Documents")];
        let mut audit = AuditLog::in_memory();

        let records = FileOrganizer::execute(plans.clone(), true, &mut audit, |_| {});

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, Outcome::Skipped);
        assert_eq!(records[0].reason, DRY_RUN_REASON);
        assert_eq!(records[0].destination, plans[0].destination);
        assert!(base.join("a.txt").exists());
        assert!(!base.join("Organized").exists());
    }

    #[test]
    fn test_execute_continues_after_failure() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("b.txt"), "b").unwrap();
        let plans = vec![
            plan_for(base, "missing.txt", "Documents"),
            plan_for(base, "b.txt", "Documents"),
        ];
        let log_path = base.join("organizer.log");
        let mut audit = AuditLog::new(log_path.clone());
        let mut seen = 0;

        let records = FileOrganizer::execute(plans, false, &mut audit, |_| seen += 1);

        assert_eq!(seen, 2);
        assert_eq!(records[0].outcome, Outcome::Failed);
        assert!(!records[0].reason.is_empty());
        assert_eq!(records[0].destination, PathBuf::new());
        assert_eq!(records[1].outcome, Outcome::Moved);
        assert!(base.join("Organized/Documents/b.txt").exists());
        assert_eq!(AuditLog::load(&log_path).unwrap().len(), 2);
    }

    #[test]
    fn test_execute_survives_unwritable_audit_log() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("a.txt"), "a").unwrap();
        fs::write(base.join("b.txt"), "b").unwrap();
        fs::write(base.join("blocker"), "not a directory").unwrap();
        let plans = vec![
            plan_for(base, "a.txt", "Documents"),
            plan_for(base, "b.txt", "Documents"),
        ];
        let mut audit = AuditLog::new(base.join("blocker/logs/organizer.log"));

        let records = FileOrganizer::execute(plans, false, &mut audit, |_| {});

        assert!(records.iter().all(|r| r.outcome == Outcome::Moved));
        assert_eq!(RunSummary::from_records(&records).exit_code(), 0);
        assert_eq!(audit.pending(), 2);
        assert!(base.join("Organized/Documents/a.txt").exists());
        assert!(base.join("Organized/Documents/b.txt").exists());
    }

    #[test]
    fn test_summary_counts_and_exit_code() {
        let base = Path::new("/in");
        let a = plan_for(base, "a.txt", "Documents");
        let b = plan_for(base, "b.png", "Images");
        let records = vec![
            LogRecord::moved(&a),
            LogRecord::moved(&b),
            LogRecord::failed(&a, "disk full"),
        ];

        let summary = RunSummary::from_records(&records);

        assert_eq!(summary.moved, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.by_category.get("Documents"), Some(&1));
        assert_eq!(summary.to_string(), "2 moved, 0 skipped, 1 failed");
        assert_eq!(summary.exit_code(), 2);
        assert_eq!(RunSummary::default().exit_code(), 0);
    }

    #[test]
    fn test_missing_rules_file_maps_to_not_found() {
        let err = OrganizeError::from(ConfigError::RulesNotFound(PathBuf::from("r.toml")));
        assert!(matches!(err, OrganizeError::NotFound { .. }));
        assert_eq!(err.exit_code(), 1);
    }
}
