//! `rollback`: runs the ordered, resumable Rollback Manager sequence
//! against the target plane, distinct from the
//! unauthenticated `emergency-recover` escape hatch.

use crate::core::dpa::memory::MemoryDataPlane;
use crate::core::dpa::retry::{RetryPolicy, RetryingDataPlane};
use crate::core::ids::Table;
use crate::core::rbm::{Rbm, RollbackMode, RollbackRequest};
use crate::libs::config::MigrationConfig;
use crate::libs::data_storage::WorkingDirectory;
use anyhow::{bail, Result};
use chrono::Utc;
use clap::Args;
use dialoguer::Confirm;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Args)]
pub struct RollbackArgs {
    /// Working directory holding the migration's durable state.
    #[arg(long, default_value = "./ironsync-run")]
    work_dir: PathBuf,

    /// Directory of `<table>.json` fixture files seeding the target
    /// plane the rollback runs against.
    #[arg(long)]
    target_dir: Option<PathBuf>,

    /// `full`, `partial`, `data-only`, or `schema-only`.
    #[arg(long, default_value = "full")]
    mode: String,

    /// Table names to restrict a `partial` rollback to; ignored by
    /// every other mode.
    #[arg(long, value_delimiter = ',')]
    tables: Vec<String>,

    /// Skip the interactive confirmation prompt even when the loaded
    /// config asks for one.
    #[arg(long)]
    yes: bool,
}

pub async fn cmd(args: RollbackArgs) -> Result<i32> {
    let working_dir = WorkingDirectory::new(&args.work_dir);
    let config = MigrationConfig::load(&working_dir).await?;
    let mode = RollbackMode::from_str(&args.mode).map_err(anyhow::Error::msg)?;

    let tables = if args.tables.is_empty() {
        None
    } else {
        let parsed: Result<Vec<Table>, _> = args.tables.iter().map(|s| Table::from_str(s)).collect();
        Some(parsed.map_err(|err| anyhow::anyhow!(err.to_string()))?)
    };
    if mode == RollbackMode::Partial && tables.as_ref().map(|t| t.is_empty()).unwrap_or(true) {
        bail!("--mode partial requires at least one --tables entry");
    }

    if config.confirm_rollback && !args.yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("run a {mode} rollback against the target plane?"))
            .default(false)
            .interact()
            .unwrap_or(false);
        if !confirmed {
            bail!("rollback cancelled");
        }
    }

    let target = Arc::new(RetryingDataPlane::new(MemoryDataPlane::new(), RetryPolicy::default()));
    if let Some(dir) = &args.target_dir {
        crate::commands::fixtures::seed_from_dir(target.as_ref(), dir).await?;
    }

    let request = RollbackRequest {
        mode,
        tables,
        snapshot_first: config.create_backup_before_rollback,
    };
    let snapshot_dir = working_dir.pre_rollback_dir(Utc::now());
    let report = Rbm::run(target.as_ref(), &request, Some(&snapshot_dir)).await;

    for outcome in &report.outcomes {
        println!("{}: {:?} ({} row(s) deleted)", outcome.table, outcome.state, outcome.rows_deleted);
        if let Some(warning) = &outcome.warning {
            println!("  warning: {warning}");
        }
        if let Some(error) = &outcome.error {
            println!("  error: {}", error.message);
        }
    }

    Ok(if report.is_success() { 0 } else { 1 })
}
