//! Command-line interface module for sortbox.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing
//! - Resolving the source, destination and audit log paths
//! - Organization orchestration (scan, plan, execute)
//! - Undo operation handling

use crate::audit_log::{AuditLog, LogRecord};
use crate::config::load_rules;
use crate::duplicates::{DuplicateGroup, find_duplicates};
use crate::file_organizer::{FileOrganizer, OrganizeError, OrganizeResult, RunSummary};
use crate::output::OutputFormatter;
use crate::planner::{MovePlan, PlanOptions, plan};
use crate::scan::scan_directory;
use crate::undo::UndoManager;
use clap::{ArgAction, Parser};
use std::fs;
use std::path::{Path, PathBuf};

/// Folder created under the source when no destination is given.
pub const DEFAULT_DESTINATION_DIR: &str = "Organized";

/// Audit log file name inside the destination when no log path is given.
pub const DEFAULT_LOG_FILE: &str = "organizer.log";

/// Sort the files of a directory into category folders.
#[derive(Debug, Clone, Parser)]
#[command(name = "sortbox", version)]
pub struct Cli {
    /// Directory to organize
    #[arg(long, value_name = "DIR")]
    pub source: PathBuf,

    /// Root for the category folders [default: <source>/Organized]
    #[arg(long, value_name = "DIR")]
    pub destination: Option<PathBuf>,

    /// TOML rules file mapping extensions or globs to categories
    #[arg(long, value_name = "PATH")]
    pub rules: Option<PathBuf>,

    /// Plan and report only; nothing on disk is changed
    #[arg(long)]
    pub dry_run: bool,

    /// Audit log file [default: <destination>/organizer.log]
    #[arg(long, value_name = "PATH")]
    pub log: Option<PathBuf>,

    /// Move every file recorded in the audit log back where it came from
    #[arg(long, conflicts_with_all = ["dry_run", "by_month", "sniff", "rules"])]
    pub undo: bool,

    /// Add a YYYY-MM folder (modification month) under each category
    #[arg(long)]
    pub by_month: bool,

    /// Look at file contents when the extension is not recognized
    #[arg(long)]
    pub sniff: bool,

    /// More diagnostic output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Which operation the arguments ask for.
    pub fn organize_command(&self) -> OrganizeCommand {
        if self.undo {
            OrganizeCommand::Undo
        } else {
            OrganizeCommand::Organize {
                dry_run: self.dry_run,
            }
        }
    }
}

/// Represents a CLI command to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganizeCommand {
    /// Organize files in a directory.
    Organize {
        /// If true, simulate the operation without making changes.
        dry_run: bool,
    },
    /// Undo the moves recorded in the audit log.
    Undo,
}

/// Inputs of a run, independent of how they were parsed.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    pub rules: Option<PathBuf>,
    pub log: Option<PathBuf>,
    pub dry_run: bool,
    pub by_month: bool,
    pub sniff: bool,
}

impl RunOptions {
    /// Options for organizing `source` with every default.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            by_month: self.by_month,
            sniff: self.sniff,
        }
    }
}

impl From<&Cli> for RunOptions {
    fn from(cli: &Cli) -> Self {
        Self {
            source: cli.source.clone(),
            destination: cli.destination.clone(),
            rules: cli.rules.clone(),
            log: cli.log.clone(),
            dry_run: cli.dry_run,
            by_month: cli.by_month,
            sniff: cli.sniff,
        }
    }
}

/// Absolute paths a run works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub log: PathBuf,
    /// The rules file, when one was given.
    pub rules: Option<PathBuf>,
}

impl ResolvedPaths {
    /// Resolves the source (which must be an existing directory) and derives the defaults.
    ///
    /// # Errors
    ///
    /// Returns `OrganizeError::NotFound` if the source directory does not exist.
    pub fn resolve(options: &RunOptions) -> OrganizeResult<Self> {
        let source = fs::canonicalize(&options.source)
            .ok()
            .filter(|path| path.is_dir())
            .ok_or_else(|| OrganizeError::NotFound {
                what: "source directory",
                path: options.source.clone(),
            })?;

        let destination = match &options.destination {
            Some(dir) => absolutize(dir),
            None => source.join(DEFAULT_DESTINATION_DIR),
        };
        let log = match &options.log {
            Some(file) => absolutize(file),
            None => destination.join(DEFAULT_LOG_FILE),
        };

        let rules = options.rules.as_deref().map(absolutize);

        Ok(Self {
            source,
            destination,
            log,
            rules,
        })
    }
}

/// Canonical form for existing paths, lexically absolute otherwise.
fn absolutize(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Everything a finished organize run produced.
#[derive(Debug)]
pub struct RunReport {
    pub paths: ResolvedPaths,
    /// One record per planned move, in plan order.
    pub records: Vec<LogRecord>,
    pub summary: RunSummary,
    /// Where the records were appended, if anywhere.
    pub log_path: Option<PathBuf>,
    /// Records that could not be written to the audit log.
    pub unlogged: usize,
    /// Groups of scanned files with identical content.
    pub duplicates: Vec<DuplicateGroup>,
}

impl RunReport {
    /// Process exit code for this run.
    pub fn exit_code(&self) -> u8 {
        self.summary.exit_code()
    }
}

/// Runs the parsed command line and returns the process exit code.
///
/// Fatal errors are printed here; per-file failures were already reported
/// while the run progressed.
pub fn run_cli(cli: &Cli) -> u8 {
    let options = RunOptions::from(cli);
    let result = match cli.organize_command() {
        OrganizeCommand::Organize { .. } => organize(&options).map(|report| {
            OutputFormatter::run_summary(&report.summary);
            OutputFormatter::duplicate_table(&report.duplicates);
            report.exit_code()
        }),
        OrganizeCommand::Undo => undo_organization(&options),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            OutputFormatter::error(&format!("Error: {}", e));
            e.exit_code()
        }
    }
}

/// Organizes the source directory into category folders.
///
/// This function:
/// 1. Loads the rules file (if any); a bad file stops the run here
/// 2. Resolves the source, destination and audit log paths
/// 3. Scans the source tree, skipping the destination, the log and the rules file
/// 4. Looks for files with identical content
/// 5. Plans every move, resolving name collisions
/// 6. Executes the plan (or only records it in dry-run mode)
///
/// In dry-run mode the audit log is only written when a log path was given
/// explicitly, so the default location under the destination is never created.
pub fn organize(options: &RunOptions) -> OrganizeResult<RunReport> {
    let rule_set = load_rules(options.rules.as_deref())?;
    let paths = ResolvedPaths::resolve(options)?;

    if options.dry_run {
        OutputFormatter::dry_run_notice(&format!(
            "Analyzing contents of: {}",
            paths.source.display()
        ));
    } else {
        OutputFormatter::info(&format!("Organizing contents of: {}", paths.source.display()));
    }

    let mut skip = vec![paths.destination.clone(), paths.log.clone()];
    skip.extend(paths.rules.clone());
    let entries = scan_directory(&paths.source, &skip, &rule_set.filters).map_err(|source| {
        OrganizeError::Scan {
            path: paths.source.clone(),
            source,
        }
    })?;

    let duplicates = find_duplicates(&entries);
    if !duplicates.is_empty() {
        let copies: usize = duplicates.iter().map(DuplicateGroup::redundant_count).sum();
        OutputFormatter::warning(&format!("Found {} duplicate file(s).", copies));
    }

    let plans: Vec<MovePlan> = plan(
        &entries,
        &rule_set.classifier,
        &paths.destination,
        options.plan_options(),
    )
    .collect();
    tracing::info!(files = entries.len(), planned = plans.len(), "plan ready");

    if plans.is_empty() {
        OutputFormatter::success("Nothing to organize.");
    }

    let mut audit = if options.dry_run && options.log.is_none() {
        AuditLog::in_memory()
    } else {
        AuditLog::new(paths.log.clone())
    };

    let progress = OutputFormatter::create_progress_bar(plans.len() as u64);
    let records = FileOrganizer::execute(plans, options.dry_run, &mut audit, |record| {
        progress.suspend(|| println!("{}", OutputFormatter::record_line(record)));
        progress.inc(1);
    });
    progress.finish_and_clear();

    if options.dry_run {
        OutputFormatter::dry_run_notice("No files were modified.");
    }

    let summary = RunSummary::from_records(&records);
    Ok(RunReport {
        paths,
        records,
        summary,
        log_path: audit.path().map(Path::to_path_buf),
        unlogged: audit.pending(),
        duplicates,
    })
}

/// Reverts the moves recorded in the run's audit log and returns the exit code.
pub fn undo_organization(options: &RunOptions) -> OrganizeResult<u8> {
    let paths = ResolvedPaths::resolve(options)?;
    OutputFormatter::info(&format!("Undoing moves recorded in: {}", paths.log.display()));

    let report = UndoManager::undo(&paths.log)?;
    OutputFormatter::success(&format!("Restored: {}", report.restored_files));

    if !report.skipped_files.is_empty() {
        OutputFormatter::warning(&format!("Skipped: {}", report.skipped_files.len()));
        for (path, reason) in &report.skipped_files {
            OutputFormatter::warning(&format!("  - {}: {}", path.display(), reason));
        }
    }

    if !report.failed_restores.is_empty() {
        OutputFormatter::error(&format!("Failed: {}", report.failed_restores.len()));
        for (path, reason) in &report.failed_restores {
            OutputFormatter::error(&format!("  - {}: {}", path.display(), reason));
        }
    }

    Ok(report.exit_code())
}
