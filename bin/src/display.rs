//! Report and table rendering for the daybook CLI.

use daybook_lib::prelude::*;

/// Prints a run report summary plus the enumerated failures.
pub(crate) fn render_report(report: &RunReport) {
    println!(
        "Stored: {}  Already present: {}  Failed: {}  (of {} planned)",
        report.stored(),
        report.already_present(),
        report.failed(),
        report.planned
    );

    if let Some(reason) = &report.fatal {
        println!(
            "Run aborted: {reason} ({} units not attempted)",
            report.skipped()
        );
    } else if report.cancelled {
        println!(
            "Run cancelled: {} units not attempted",
            report.skipped()
        );
    }

    for (unit, failure) in report.failures() {
        println!(
            "  failed {unit}: {} ({} attempts)",
            failure.reason, failure.attempts
        );
    }
}

/// Prints monthly aggregates as a plain table, newest first.
pub(crate) fn render_aggregates(rows: &[MonthlyAggregate]) {
    println!(
        "{:<12} {:>5} {:>3} {:>16} {:>16}  {}",
        "ASSET", "YEAR", "MON", "MIN", "MAX", "UPDATED"
    );
    for row in rows {
        println!(
            "{:<12} {:>5} {:>3} {:>16.4} {:>16.4}  {}",
            row.asset_id,
            row.year,
            row.month,
            row.min_price,
            row.max_price,
            row.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
}
