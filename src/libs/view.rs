//! Console table rendering for the migration CLI.
//!
//! A namespace of static table-rendering functions kept separate from
//! business logic, covering a migration's phase progress and a
//! foreign-key resolution report.

use crate::core::fkr::report::{ReferenceStatus, RelationshipReport, ResolutionSummary};
use crate::core::mst::{MigrationTracker, PhaseStatus, PHASE_ORDER};
use prettytable::{format, row, Table};

pub struct View {}

impl View {
    /// Renders one row per migration phase: status, timestamps, and
    /// warning/error counts.
    pub fn phase_status(tracker: &MigrationTracker) {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row!["PHASE", "STATUS", "STARTED", "ENDED", "WARNINGS", "ERRORS"]);

        for phase in PHASE_ORDER {
            let record = tracker.phase(phase);
            table.add_row(row![
                phase,
                status_label(record.status),
                record.started_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string()),
                record.ended_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string()),
                record.warnings.len(),
                record.errors.len(),
            ]);
        }

        table.printstd();
        println!("status: {:?}  traffic on target: {}%", tracker.status(), tracker.current_traffic_percentage());
    }

    /// Renders a dry-run foreign-key resolution report: one row per
    /// table showing how many references fall into each classification,
    /// followed by the orphan-policy outcome counts.
    pub fn resolution_report(report: &RelationshipReport, summary: &ResolutionSummary) {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row!["TABLE", "RESOLVED", "NULL (ALLOWED)", "NULL (REQUIRED)", "DANGLING"]);

        let mut counts: std::collections::BTreeMap<_, (usize, usize, usize, usize)> = std::collections::BTreeMap::new();
        for finding in &report.findings {
            let entry = counts.entry(finding.table).or_default();
            match finding.status {
                ReferenceStatus::Resolved => entry.0 += 1,
                ReferenceStatus::NullAndAllowed => entry.1 += 1,
                ReferenceStatus::NullAndRequired => entry.2 += 1,
                ReferenceStatus::Dangling => entry.3 += 1,
            }
        }
        for (table_name, (resolved, null_ok, null_bad, dangling)) in counts {
            table.add_row(row![table_name, resolved, null_ok, null_bad, dangling]);
        }
        table.printstd();

        println!(
            "duplicates: {}  nulled: {}  removed: {}  placeholders created: {}  unsupported placeholders: {}",
            report.duplicates.len(),
            summary.nulled,
            summary.removed.len(),
            summary.placeholders_created.len(),
            summary.unsupported_placeholders.len(),
        );
    }
}

fn status_label(status: PhaseStatus) -> &'static str {
    match status {
        PhaseStatus::NotStarted => "not started",
        PhaseStatus::InProgress => "in progress",
        PhaseStatus::Completed => "completed",
        PhaseStatus::Failed => "failed",
    }
}
