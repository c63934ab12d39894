//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output, including colored output,
//! progress tracking, and formatted tables.

use crate::audit_log::{LogRecord, Outcome};
use crate::duplicates::DuplicateGroup;
use crate::file_organizer::RunSummary;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Creates a progress bar for `total` moves.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sortbox::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_and_clear();
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        let pb = ProgressBar::new(total);
        pb.set_style(style);
        pb
    }

    /// Formats one record as a console line.
    pub fn record_line(record: &LogRecord) -> String {
        let source = record.source.display();
        match record.outcome {
            Outcome::Moved => format!(
                "{} {} → {}",
                "✓".green(),
                source,
                record.destination.display()
            ),
            Outcome::Skipped => format!(
                "{} {} → {}",
                "·".yellow(),
                source,
                record.destination.display()
            ),
            Outcome::Failed => format!("{} {}: {}", "✗".red(), source, record.reason),
            Outcome::Restored => format!(
                "{} {} ← {}",
                "↺".cyan(),
                source,
                record.destination.display()
            ),
        }
    }

    /// Prints a summary table with file counts by category.
    pub fn summary_table(category_counts: &BTreeMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let max_category_len = category_counts
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max(8); // At least "Category" width

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = max_category_len
        );
        println!("{}", "-".repeat(max_category_len + 10));

        for (category, count) in category_counts {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                plural(*count),
                width = max_category_len
            );
        }

        println!("{}", "-".repeat(max_category_len + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files),
            width = max_category_len
        );
    }

    /// Prints the per-category table and the final "N moved, M skipped, K failed" line.
    pub fn run_summary(summary: &RunSummary) {
        if !summary.by_category.is_empty() {
            let total: usize = summary.by_category.values().sum();
            Self::summary_table(&summary.by_category, total);
        }

        println!();
        let line = summary.to_string();
        if summary.failed > 0 {
            Self::warning(&line);
        } else {
            Self::success(&line);
        }
    }

    /// Prints the groups of identical files found by the scan, if any.
    pub fn duplicate_table(groups: &[DuplicateGroup]) {
        if groups.is_empty() {
            return;
        }

        Self::header("DUPLICATES");
        for group in groups.iter().take(MAX_DUPLICATE_GROUPS) {
            println!(
                "{} copies of {}",
                group.paths.len().to_string().yellow(),
                human_size(group.size)
            );
            for path in &group.paths {
                println!("  {}", path.display());
            }
        }
        if groups.len() > MAX_DUPLICATE_GROUPS {
            println!("... and {} more", groups.len() - MAX_DUPLICATE_GROUPS);
        }

        let wasted: u64 = groups.iter().map(DuplicateGroup::wasted_bytes).sum();
        println!("{} in redundant copies", human_size(wasted).as_str().bold());
    }
}

/// Groups listed before the table is cut short.
const MAX_DUPLICATE_GROUPS: usize = 10;

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

/// Formats a byte count with a binary unit, e.g. `1.5 KB`.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}
