//! Human-readable sync output.
//!
//! Printing for manifests, reconciliation previews, and sync outcomes.
//! Commands switch to JSON output before reaching these functions.

use chrono::{DateTime, Local};
use colored::Colorize;

use crate::model::{ActionPlan, Direction, Manifest};
use crate::sync::types::{SkipReason, SyncOutcome, TransferReport};

/// Format a byte count for display.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Format Unix seconds as local time.
#[must_use]
pub fn format_timestamp(unix_seconds: f64) -> String {
    let secs = unix_seconds.floor() as i64;
    let nanos = ((unix_seconds - unix_seconds.floor()) * 1e9) as u32;
    DateTime::from_timestamp(secs, nanos).map_or_else(
        || format!("{unix_seconds}"),
        |t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

/// Print a manifest as a table.
pub fn print_manifest(manifest: &Manifest) {
    if manifest.is_empty() {
        println!("{}", "No syncable files.".dimmed());
        return;
    }

    println!("{}", "Local Manifest".bold().underline());
    println!();
    for record in manifest {
        let short = record.checksum.get(..12).unwrap_or(&record.checksum);
        println!(
            "  {:<28} {:>10}  {}  {}",
            record.name,
            format_size(record.size),
            format_timestamp(record.modified_at).dimmed(),
            short.dimmed()
        );
    }
    println!();
    println!(
        "  {}: {} files, {}",
        "Total".bold(),
        manifest.len(),
        format_size(manifest.total_size())
    );
}

/// Print what a reconciliation would do.
pub fn print_plan(plan: &ActionPlan) {
    if plan.is_empty() {
        println!("{}", "Already in sync.".green());
        return;
    }

    println!("{}", "Sync Plan".bold().underline());
    println!();
    for name in &plan.uploads {
        println!("  {} {name}", "↑ upload  ".green());
    }
    for name in &plan.downloads {
        println!("  {} {name}", "↓ download".blue());
    }
    for (name, direction) in &plan.conflicts {
        let arrow = match direction {
            Direction::Upload => "↑",
            Direction::Download => "↓",
        };
        println!("  {} {name} {}", format!("{arrow} conflict").yellow(), format!("({direction} wins)").dimmed());
    }
}

/// Print a transfer report.
pub fn print_report(report: &TransferReport) {
    if report == &TransferReport::default() {
        println!("{}", "Already in sync.".green());
        return;
    }

    for name in &report.uploaded {
        println!("  {} {name}", "↑".green());
    }
    for name in &report.downloaded {
        println!("  {} {name}", "↓".blue());
    }
    for failure in &report.failed {
        println!("  {} {}: {}", "✗".red(), failure.filename, failure.error);
    }
    println!();

    let summary = format!(
        "{} uploaded, {} downloaded, {} conflicts resolved",
        report.uploaded.len(),
        report.downloaded.len(),
        report.conflicts_resolved.len()
    );
    if report.is_success() {
        println!("{} {summary}", "✓".green());
    } else {
        println!("{} {summary}, {} failed", "!".yellow(), report.failed.len());
    }
}

/// Print the outcome of one orchestrated sync.
pub fn print_outcome(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Performed { report } => print_report(report),
        SyncOutcome::NotPerformed { reason: SkipReason::Failed(e) } => {
            println!("{} Sync failed: {e}", "✗".red());
        }
        SyncOutcome::NotPerformed { reason } => {
            println!("{} Sync skipped: {reason}", "-".dimmed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_format_timestamp_out_of_range() {
        assert_eq!(format_timestamp(f64::MAX), format!("{}", f64::MAX));
        assert!(!format_timestamp(1_700_000_000.0).is_empty());
    }
}
