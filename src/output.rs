//! Output formatting and styling module.
//!
//! Every line the CLI prints to the user goes through [`OutputFormatter`], so
//! colors, symbols and table layout can be changed in one place. Diagnostic
//! logging goes through `tracing` instead and is not affected by this module.

use crate::file_category::CategorySet;
use crate::record::MoveRecord;
use crate::restore::RestoreSummary;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - A progress bar for backups
/// - Summary tables for organize, restore and the category list
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use desktidy::output::OutputFormatter;
    /// OutputFormatter::success("Desktop organized");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark, to stderr.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for `total` archive entries.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use desktidy::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_with_message("Backup written");
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

    /// Prints a per-category count of the moves in `record`, in the order the
    /// categories were first used.
    pub fn summary_table(record: &MoveRecord) {
        let counts: Vec<(&str, usize)> = record
            .categories_created
            .iter()
            .map(|category| {
                let count = record
                    .files
                    .iter()
                    .filter(|entry| &entry.category == category)
                    .count();
                (category.as_str(), count)
            })
            .collect();

        Self::count_table("Category", &counts, record.len());
    }

    /// Prints what a restore did, including folders that were kept.
    pub fn restore_summary(summary: &RestoreSummary) {
        Self::header("RESTORE SUMMARY");
        println!(
            "{} restored, {} already gone, {} failed",
            summary.restored_count.to_string().green().bold(),
            summary.skipped,
            if summary.failed.is_empty() {
                "0".normal()
            } else {
                summary.failed.len().to_string().red().bold()
            }
        );

        for dir in &summary.removed_dirs {
            println!("  {} removed {}", "-".dimmed(), dir.display());
        }
        for retained in &summary.retained_dirs {
            let names: Vec<_> = retained
                .remaining
                .iter()
                .map(|name| name.to_string_lossy())
                .collect();
            println!(
                "  {} kept {} ({})",
                "⚠".yellow(),
                retained.path.display(),
                names.join(", ")
            );
        }
        for failure in &summary.failed {
            Self::error(&failure.to_string());
        }
    }

    /// Prints every category with its icon and extensions.
    pub fn categories_table(categories: &CategorySet) {
        Self::header("CATEGORIES");

        let width = categories
            .rules()
            .iter()
            .map(|rule| rule.label.chars().count())
            .max()
            .unwrap_or(0)
            .max(8);

        for rule in categories.rules() {
            let extensions = if rule.is_catch_all() {
                "(everything else)".dimmed().to_string()
            } else if rule.is_folder_rule() {
                "(folders)".dimmed().to_string()
            } else {
                rule.extensions.join(" ")
            };
            println!(
                "{} {:<width$} | {}",
                rule.icon,
                rule.label.bold(),
                extensions,
                width = width
            );
        }
    }

    fn count_table(title: &str, rows: &[(&str, usize)], total: usize) {
        Self::header("SUMMARY");

        let width = rows
            .iter()
            .map(|(name, _)| name.chars().count())
            .max()
            .unwrap_or(0)
            .max(title.len());

        println!("{:<width$} | {}", title.bold(), "Files".bold(), width = width);
        println!("{}", "-".repeat(width + 10));

        for (name, count) in rows {
            println!(
                "{:<width$} | {} {}",
                name,
                count.to_string().green(),
                plural(*count),
                width = width
            );
        }

        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total.to_string().green().bold(),
            plural(total),
            width = width
        );
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
