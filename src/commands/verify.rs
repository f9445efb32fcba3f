//! `verify`: a read-only check of a migration's current phase status,
//! for an operator polling an in-progress or completed run without
//! touching any state.

use crate::core::mst::{MigrationStatus, MigrationTracker};
use crate::libs::data_storage::WorkingDirectory;
use crate::libs::view::View;
use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Working directory holding the migration's durable state.
    #[arg(long, default_value = "./ironsync-run")]
    work_dir: PathBuf,
}

pub async fn cmd(args: VerifyArgs) -> Result<i32> {
    let working_dir = WorkingDirectory::new(&args.work_dir);
    if tokio::fs::metadata(working_dir.status_path()).await.is_err() {
        bail!("no migration status found at {}", working_dir.status_path().display());
    }

    let tracker = match MigrationTracker::load(working_dir.root()).await.context("loading migration status")? {
        crate::core::mst::LoadOutcome::Fresh(tracker) => tracker,
        crate::core::mst::LoadOutcome::Resumable(resumable) => resumable.resume(),
    };

    View::phase_status(&tracker);

    Ok(match tracker.status() {
        MigrationStatus::Completed => 0,
        MigrationStatus::RolledBack | MigrationStatus::Failed => 1,
        MigrationStatus::FailedAndUnrecoverable => 2,
        _ => 0,
    })
}
