//! Output formatting and styling module.
//!
//! All user-facing CLI output goes through [`OutputFormatter`], so colors,
//! symbols and table layout live in one place. Diagnostics go to `tracing`
//! instead.

use crate::file_category::Category;
use crate::file_organizer::{FileOutcome, PassReport, PlannedMove};
use crate::preview::Preview;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::Path;

/// Manages all CLI output with consistent styling and formatting.
///
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress bars for passes
/// - Summary tables per category
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// ```no_run
    /// use filesorter::output::OutputFormatter;
    /// OutputFormatter::success("Directory organized");
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

    /// Progress bar sized to the number of files in a pass.
    ///
    /// ```no_run
    /// use filesorter::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.set_position(40);
    /// pb.finish_with_message("done");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|s| s.progress_chars("█▓░"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }

    /// One line for a file handled by the watcher.
    pub fn file_outcome(path: &Path, outcome: &FileOutcome) {
        let name = display_name(path);
        match outcome {
            FileOutcome::Moved(record) => Self::success(&format!(
                "{} → {}/",
                name,
                record.category.dir_name()
            )),
            FileOutcome::Quarantined(record) => Self::warning(&format!(
                "{} is a duplicate → {}",
                name,
                record.new_path.display()
            )),
            FileOutcome::Skipped(reason) => Self::info(&format!("{} skipped: {}", name, reason)),
            FileOutcome::Failed(reason) => Self::error(&format!("{}: {}", name, reason)),
            FileOutcome::Ignored => {}
        }
    }

    /// Details and totals of a finished pass.
    pub fn pass_report(report: &PassReport) {
        for (path, reason) in &report.skipped {
            Self::info(&format!("{} skipped: {}", display_name(path), reason));
        }
        for (path, reason) in &report.failed {
            Self::error(&format!("{}: {}", display_name(path), reason));
        }

        if report.total_moves() == 0 {
            Self::info("Nothing to organize.");
            return;
        }
        Self::summary_table(&report.category_counts(), report.total_moves());
    }

    /// What a dry run would do.
    pub fn plan(plan: &[PlannedMove]) {
        if plan.is_empty() {
            Self::dry_run_notice("No files found to organize.");
            return;
        }

        Self::dry_run_notice("Files would be organized as follows:");
        let mut counts: HashMap<String, usize> = HashMap::new();
        for planned in plan {
            match &planned.duplicate_of {
                Some(original) => println!(
                    " - {}  → {}/ (same content as {})",
                    display_name(&planned.source),
                    planned.category.dir_name(),
                    original.display()
                ),
                None => println!(
                    " - {}  → {}/",
                    display_name(&planned.source),
                    planned.category.dir_name()
                ),
            }
            *counts
                .entry(planned.category.dir_name().to_string())
                .or_insert(0) += 1;
        }
        Self::summary_table(&counts, plan.len());
        Self::dry_run_notice("No files were modified.");
    }

    pub fn preview(file: &Path, preview: &Preview) {
        match preview {
            Preview::Image(path) => {
                Self::success(&format!("Thumbnail written to {}", path.display()))
            }
            Preview::Text { excerpt, .. } => {
                Self::header(&display_name(file));
                Self::plain(excerpt);
            }
            Preview::Unavailable => Self::warning("Preview not available"),
        }
    }

    pub fn classification(file: &Path, category: &Category) {
        println!("{}", classification_line(file, category));
    }

    /// One custom rule, as listed by `filesorter rules`.
    pub fn rule(pattern: &str, label: &str) {
        println!("{}", rule_line(pattern, label));
    }

    pub fn extension_row(category: &Category, extensions: &[&str]) {
        println!("{}", extension_line(category, extensions));
    }

    /// Prints a table of file counts per category.
    ///
    /// ```no_run
    /// use filesorter::output::OutputFormatter;
    /// use std::collections::HashMap;
    ///
    /// let mut counts = HashMap::new();
    /// counts.insert("Documents".to_string(), 15);
    /// counts.insert("Duplicates".to_string(), 2);
    /// OutputFormatter::summary_table(&counts, 17);
    /// ```
    pub fn summary_table(category_counts: &HashMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let mut categories: Vec<_> = category_counts.iter().collect();
        categories.sort_by_key(|&(name, _)| name);

        let width = categories
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0)
            .max(8);

        println!("{:<width$} | {}", "Category".bold(), "Files".bold(), width = width);
        println!("{}", "-".repeat(width + 10));
        for (category, count) in &categories {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                plural(**count),
                width = width
            );
        }
        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files),
            width = width
        );
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}

fn classification_line(file: &Path, category: &Category) -> String {
    format!("{}  → {}/", file.display(), category.dir_name())
}

fn rule_line(pattern: &str, label: &str) -> String {
    format!("  \"{}\"  → {}/", pattern, label)
}

fn extension_line(category: &Category, extensions: &[&str]) -> String {
    format!("  {:<10} {}", category.dir_name(), extensions.join(" "))
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plural() {
        assert_eq!(plural(1), "file");
        assert_eq!(plural(0), "files");
        assert_eq!(plural(7), "files");
    }

    #[test]
    fn test_display_name_prefers_file_name() {
        assert_eq!(display_name(Path::new("/a/b/c.txt")), "c.txt");
        assert_eq!(display_name(Path::new("/")), "/");
    }

    #[test]
    fn test_listing_lines() {
        assert_eq!(
            classification_line(Path::new("in/a.pdf"), &Category::Documents),
            "in/a.pdf  → Documents/"
        );
        assert_eq!(rule_line("invoice", "Finance"), "  \"invoice\"  → Finance/");
        assert_eq!(
            extension_line(&Category::Archives, &["zip", "7z"]),
            "  Archives   zip 7z"
        );
    }

    #[test]
    fn test_progress_bar_length() {
        let pb = OutputFormatter::create_progress_bar(12);
        assert_eq!(pb.length(), Some(12));
    }
}
