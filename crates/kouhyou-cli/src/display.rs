//! Human-readable summaries for extraction, reconciliation, and audit runs.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use kouhyou_core::extract::{Extraction, SkipReason};
use kouhyou_timeline::audit::{AuditReport, FixOutcome, Issue};
use kouhyou_timeline::ReconcileOutcome;

/// Examples printed per issue group.
const MAX_EXAMPLES: usize = 5;
const RULE_WIDTH: usize = 60;

fn rule() {
    println!("{}", "-".repeat(RULE_WIDTH));
}

// ── extract ──

pub fn print_extraction(extraction: &Extraction, output: &Path) {
    println!("Bureaus:  {}", extraction.bureaus.len());
    println!("Records:  {}", extraction.records.len());
    println!("Skipped:  {}", extraction.skipped.len());

    let mut by_reason: BTreeMap<&str, usize> = BTreeMap::new();
    for skipped in &extraction.skipped {
        let label = match skipped.reason {
            SkipReason::NoBureau => "before any bureau header",
            SkipReason::TooFewCells(_) => "too few cells",
            SkipReason::HeaderRow => "column header row",
            SkipReason::EmptyCompany => "empty company name",
        };
        *by_reason.entry(label).or_default() += 1;
    }
    for (label, count) in by_reason {
        println!("  {:<26} {count}", label);
    }
    println!("Saved:    {}", output.display());
}

// ── diff ──

pub fn print_reconcile(outcome: &ReconcileOutcome, date: NaiveDate) {
    println!("Update date: {date}");
    println!("  Added:        {}", outcome.added);
    println!("  Removed:      {}", outcome.removed);
    println!("  Total active: {}", outcome.total_active);
    if !outcome.warnings.is_empty() {
        println!();
        println!("Warnings ({}):", outcome.warnings.len());
        for warning in &outcome.warnings {
            println!("  {warning}");
        }
    }
    if !outcome.duplicate_active.is_empty() {
        println!();
        println!("Keys with several active entries ({}):", outcome.duplicate_active.len());
        for key in outcome.duplicate_active.iter().take(MAX_EXAMPLES) {
            println!("  {key}");
        }
        print_more(outcome.duplicate_active.len());
    }
}

// ── audit ──

/// Issues grouped by `column:kind`, with the first few examples of each.
pub fn print_issues(issues: &[Issue]) {
    if issues.is_empty() {
        println!("No issues detected.");
        return;
    }
    println!("Detected issues: {}", issues.len());
    rule();

    let mut groups: BTreeMap<(&str, &str), Vec<&Issue>> = BTreeMap::new();
    for issue in issues {
        groups
            .entry((issue.column.name(), issue.kind.as_str()))
            .or_default()
            .push(issue);
    }
    for ((column, kind), items) in groups {
        println!();
        println!("{column}:{kind} [{}]: {}", items[0].severity, items.len());
        for issue in items.iter().take(MAX_EXAMPLES) {
            println!("  row {}: '{}'", issue.row, issue.value);
        }
        print_more(items.len());
    }
    println!();
}

pub fn print_fix_outcome<R>(outcome: &FixOutcome<R>) {
    println!("Fixing...");
    rule();
    for fix in &outcome.fixes {
        println!("  fixed: row {} {}: '{}' -> '{}'", fix.row, fix.column, fix.from, fix.to);
    }
    for deletion in &outcome.deleted {
        let kinds: Vec<&str> = deletion.kinds.iter().map(|k| k.as_str()).collect();
        println!("  deleted: row {} ({})", deletion.row, kinds.join(", "));
    }
    println!();
}

pub fn print_report(report: &AuditReport) {
    rule();
    println!(
        "Detected: {} ({} errors, {} warnings)",
        report.detected, report.detected_errors, report.detected_warnings
    );
    if report.fixed > 0 || report.deleted > 0 {
        println!("Fixed:    {}", report.fixed);
        println!("Deleted:  {}", report.deleted);
    }
    println!("Remaining warnings: {}", report.remaining_warnings);
    if report.is_clean() {
        println!("All ERROR-grade issues resolved.");
    } else {
        println!("{} ERROR-grade issues remain.", report.remaining_errors);
    }
}

fn print_more(total: usize) {
    if total > MAX_EXAMPLES {
        println!("  ... and {} more", total - MAX_EXAMPLES);
    }
}
