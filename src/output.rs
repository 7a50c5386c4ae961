//! CLI output formatting.
//!
//! Directories are shown relative to the site root (`.` for the root itself),
//! with one indented line per page underneath.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! Scanned public: 3 pages in 2 directories
//! Bundle: favicon/favicon-data.json (4 tags)
//! 001/002 a (2 pages)
//!     about.html: updated
//!     index.html: unchanged
//! 002/002 a/sub (1 page)
//!     post.html: created
//! Injected 2 of 3 pages in 2 directories
//! ```
//!
//! ## Check
//!
//! ```text
//! Pages
//! 001 a (2 pages)
//!     about.html
//!     index.html
//! 002 a/sub (1 page)
//!     post.html
//!
//! Skipped
//!     .
//!     b
//!
//! 2 directories, 3 pages to inject
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::merge::MergeOutcome;
use crate::pipeline::{PipelineEvent, RunSummary};
use crate::scan::ScanResult;
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `path` relative to `root`, `.` for the root itself.
fn relative(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.display().to_string(),
        Err(_) => path.display().to_string(),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

fn outcome_label(outcome: MergeOutcome) -> &'static str {
    match outcome {
        MergeOutcome::Created => "created",
        MergeOutcome::Updated => "updated",
        MergeOutcome::Unchanged => "unchanged",
        MergeOutcome::NotNewer => "live copy is newer",
    }
}

// ============================================================================
// Build progress
// ============================================================================

/// Format a single pipeline event as display lines.
///
/// Skipped directories produce no lines; `check` lists them instead.
pub fn format_event(event: &PipelineEvent, site_root: &Path) -> Vec<String> {
    match event {
        PipelineEvent::WorkspaceCreated { .. } | PipelineEvent::DirectorySkipped { .. } => {
            Vec::new()
        }
        PipelineEvent::Scanned {
            site_root: scanned,
            page_dirs,
            pages,
        } => vec![format!(
            "Scanned {}: {} in {}",
            scanned.display(),
            plural(*pages, "page", "pages"),
            plural(*page_dirs, "directory", "directories")
        )],
        PipelineEvent::BundleGenerated { metadata, tags } => vec![format!(
            "Bundle: {} ({})",
            relative(metadata, site_root),
            plural(*tags, "tag", "tags")
        )],
        PipelineEvent::DirectoryMerged {
            index,
            total,
            report,
        } => {
            let mut lines = vec![format!(
                "{}/{} {} ({})",
                format_index(*index),
                format_index(*total),
                relative(&report.dir, site_root),
                plural(report.pages.len(), "page", "pages")
            )];
            for page in &report.pages {
                lines.push(format!(
                    "{}{}: {}",
                    indent(1),
                    file_name(&page.live),
                    outcome_label(page.outcome)
                ));
            }
            lines
        }
        PipelineEvent::DirectoryFailed { dir, error } => vec![
            format!("FAILED {}", relative(dir, site_root)),
            format!("{}{}", indent(1), error),
        ],
    }
}

/// Format the closing line of a successful build.
pub fn format_summary(summary: &RunSummary) -> Vec<String> {
    vec![format!(
        "Injected {} of {} in {}",
        summary.pages_written(),
        plural(summary.pages_total(), "page", "pages"),
        plural(summary.reports.len(), "directory", "directories")
    )]
}

pub fn print_summary(summary: &RunSummary) {
    for line in format_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format scan results: directories that would be injected, then skipped ones.
pub fn format_check_output(scan: &ScanResult, site_root: &Path) -> Vec<String> {
    let mut lines = vec!["Pages".to_string()];
    for (i, dir) in scan.page_dirs.iter().enumerate() {
        lines.push(format!(
            "{} {} ({})",
            format_index(i + 1),
            relative(&dir.dir, site_root),
            plural(dir.pages.len(), "page", "pages")
        ));
        for page in &dir.pages {
            lines.push(format!("{}{}", indent(1), file_name(page)));
        }
    }

    if !scan.empty_dirs.is_empty() {
        lines.push(String::new());
        lines.push("Skipped".to_string());
        for dir in &scan.empty_dirs {
            lines.push(format!("{}{}", indent(1), relative(dir, site_root)));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "{}, {} to inject",
        plural(scan.page_dirs.len(), "directory", "directories"),
        plural(scan.page_count(), "page", "pages")
    ));
    lines
}

pub fn print_check_output(scan: &ScanResult, site_root: &Path) {
    for line in format_check_output(scan, site_root) {
        println!("{}", line);
    }
}
