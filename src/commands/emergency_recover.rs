//! `emergency-recover`: the unordered, unauthenticated-by-default
//! truncate-everything escape hatch, gated behind its own
//! confirmation prompt distinct from `rollback`'s.

use crate::core::dpa::memory::MemoryDataPlane;
use crate::core::rbm::emergency::EmergencyRecovery;
use crate::libs::data_storage::WorkingDirectory;
use anyhow::{bail, Result};
use clap::Args;
use dialoguer::Confirm;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Args)]
pub struct EmergencyRecoverArgs {
    /// Working directory; used only to seed the target plane from a
    /// prior snapshot, since this path bypasses the migration tracker
    /// entirely.
    #[arg(long, default_value = "./ironsync-run")]
    work_dir: PathBuf,

    /// Directory of `<table>.json` fixture files seeding the target
    /// plane.
    #[arg(long)]
    target_dir: Option<PathBuf>,

    /// Required: this command refuses to run without it, on top of the
    /// interactive confirmation.
    #[arg(long)]
    confirm: bool,
}

pub async fn cmd(args: EmergencyRecoverArgs) -> Result<i32> {
    if !args.confirm {
        bail!("emergency-recover requires --confirm");
    }

    let confirmed = Confirm::new()
        .with_prompt("this truncates every table on the target plane outside the ordered rollback sequence. Continue?")
        .default(false)
        .interact()
        .unwrap_or(false);
    if !confirmed {
        bail!("emergency recovery cancelled");
    }

    let working_dir = WorkingDirectory::new(&args.work_dir);
    let target = Arc::new(MemoryDataPlane::new());
    if let Some(dir) = &args.target_dir {
        crate::commands::fixtures::seed_from_dir(target.as_ref(), dir).await?;
    }
    let _ = working_dir;

    let report = EmergencyRecovery::run(target.as_ref(), true).await?;

    println!("truncated {} table(s)", report.truncated.len());
    for (table, error) in &report.failures {
        println!("  {table} failed: {}", error.message);
    }

    Ok(if report.is_success() { 0 } else { 2 })
}
