//! Renders the final Markdown migration summary from a
//! `MigrationTracker`'s durable state: an aggregate status line, a
//! per-phase table, and a detail section listing the warnings and
//! errors any phase actually recorded.
//!
//! Plays the same thin-layer-between-durable-state-and-a-rendered-string
//! role as a formatter module, except the output here is a Markdown
//! document meant for a file rather than console output.

use crate::core::mst::{MigrationTracker, Phase, PhaseStatus, PHASE_ORDER};
use std::fmt::Write as _;

/// Builds the Markdown contents of `reports/summary.md` for the given
/// tracker. Pure and synchronous: the tracker already holds everything
/// needed, so there is nothing to fail on.
pub fn render_summary(tracker: &MigrationTracker) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# Migration Summary");
    let _ = writeln!(out);
    let _ = writeln!(out, "- **Status:** {:?}", tracker.status());
    let _ = writeln!(out, "- **Traffic on target:** {}%", tracker.current_traffic_percentage());
    let _ = writeln!(out);

    let _ = writeln!(out, "| Phase | Status | Started | Ended | Warnings | Errors |");
    let _ = writeln!(out, "|---|---|---|---|---|---|");
    for phase in PHASE_ORDER {
        let record = tracker.phase(phase);
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} |",
            phase,
            status_label(record.status),
            record.started_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string()),
            record.ended_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string()),
            record.warnings.len(),
            record.errors.len(),
        );
    }

    let phases_with_notes: Vec<Phase> = PHASE_ORDER
        .into_iter()
        .filter(|phase| {
            let record = tracker.phase(*phase);
            !record.warnings.is_empty() || !record.errors.is_empty()
        })
        .collect();

    if !phases_with_notes.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Details");
        for phase in phases_with_notes {
            let record = tracker.phase(phase);
            let _ = writeln!(out);
            let _ = writeln!(out, "### {phase}");
            for warning in &record.warnings {
                let _ = writeln!(out, "- warning: {warning}");
            }
            for error in &record.errors {
                let _ = writeln!(out, "- error ({:?}): {}", error.kind, error.message);
            }
        }
    }

    out
}

fn status_label(status: PhaseStatus) -> &'static str {
    match status {
        PhaseStatus::NotStarted => "not started",
        PhaseStatus::InProgress => "in progress",
        PhaseStatus::Completed => "completed",
        PhaseStatus::Failed => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mst::MigrationTracker;
    use tempfile::tempdir;

    #[tokio::test]
    async fn fresh_tracker_renders_every_phase_as_not_started() {
        let dir = tempdir().unwrap();
        let tracker = MigrationTracker::new(dir.path());
        let markdown = render_summary(&tracker);
        assert!(markdown.contains("# Migration Summary"));
        assert!(markdown.contains("not started"));
        assert!(!markdown.contains("## Details"));
    }

    #[tokio::test]
    async fn a_failed_phase_surfaces_its_error_in_the_details_section() {
        let dir = tempdir().unwrap();
        let mut tracker = MigrationTracker::new(dir.path());
        tracker.start(Phase::Preparation).await.unwrap();
        tracker
            .fail(
                Phase::Preparation,
                crate::core::error::TrackedError {
                    kind: crate::core::error::ErrorKind::Connectivity,
                    message: "backend unreachable".to_string(),
                },
            )
            .await
            .unwrap();

        let markdown = render_summary(&tracker);
        assert!(markdown.contains("## Details"));
        assert!(markdown.contains("backend unreachable"));
    }
}
