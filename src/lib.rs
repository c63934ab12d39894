//! sortbox - sort a directory's files into category folders
//!
//! This library scans a directory tree, classifies every file by extension
//! (optionally overridden by a TOML rules file), plans collision-free moves
//! into per-category folders, executes them (or only reports them in dry-run
//! mode), reports files with identical content, and keeps an append-only
//! audit log that undo can replay.

pub mod audit_log;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod file_category;
pub mod file_organizer;
pub mod logging;
pub mod output;
pub mod planner;
pub mod scan;
pub mod undo;

pub use audit_log::{AuditLog, LogRecord, Outcome};
pub use config::{CompiledFilters, ConfigError, RuleSet, load_rules};
pub use duplicates::{DuplicateGroup, find_duplicates};
pub use file_category::{Category, Classifier};
pub use file_organizer::{FileOrganizer, MoveError, OrganizeError, RunSummary};
pub use planner::{MovePlan, PlanOptions, plan};
pub use scan::{FileEntry, scan_directory};
pub use undo::{UndoManager, UndoReport};

pub use cli::{Cli, OrganizeCommand, RunOptions, organize, run_cli};
