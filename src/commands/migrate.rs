//! `migrate`: runs a migration end to end through the Phase Engine
//! against `MemoryDataPlane` source/target instances
//! optionally seeded from fixture directories.

use crate::commands::fixtures::seed_from_dir;
use crate::core::dpa::memory::MemoryDataPlane;
use crate::core::dpa::retry::{RetryPolicy, RetryingDataPlane};
use crate::core::mst::{LoadOutcome, MigrationTracker};
use crate::core::pe::{MigrationOutcome, PhaseEngine};
use crate::libs::config::{MigrationConfig, Strategy, TrafficSwitchingMode};
use crate::libs::data_storage::WorkingDirectory;
use crate::libs::view::View;
use anyhow::Result;
use clap::Args;
use dialoguer::Confirm;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Working directory for this migration's durable state.
    #[arg(long, default_value = "./ironsync-run")]
    work_dir: PathBuf,

    /// Directory of `<table>.json` fixture files seeding the source
    /// plane.
    #[arg(long)]
    source_dir: Option<PathBuf>,

    /// Directory of `<table>.json` fixture files seeding the target
    /// plane. Rarely needed; a fresh target plane starts empty.
    #[arg(long)]
    target_dir: Option<PathBuf>,

    /// Cutover strategy: `blue-green`, `rolling`, or `maintenance-window`.
    #[arg(long)]
    strategy: Option<String>,

    /// Traffic-switching mode: `immediate` or `progressive`.
    #[arg(long)]
    traffic_switching: Option<String>,

    /// How to handle a dangling reference: `warn`, `remove`, or `create`.
    #[arg(long)]
    orphan_policy: Option<String>,

    /// Skip incremental sync entirely after the initial bulk load.
    #[arg(long)]
    no_incremental_sync: bool,

    /// Resume a stale `in_progress` phase left by a crashed run instead
    /// of prompting interactively.
    #[arg(long)]
    resume: bool,
}

pub async fn cmd(args: MigrateArgs) -> Result<i32> {
    let working_dir = WorkingDirectory::new(&args.work_dir);
    working_dir.ensure_root().await?;

    let mut config = MigrationConfig::load(&working_dir).await?;
    if let Some(strategy) = &args.strategy {
        config.strategy = Strategy::from_str(strategy).map_err(anyhow::Error::msg)?;
    }
    if let Some(mode) = &args.traffic_switching {
        config.traffic_switching = TrafficSwitchingMode::from_str(mode).map_err(anyhow::Error::msg)?;
    }
    if let Some(policy) = &args.orphan_policy {
        config.orphan_policy = crate::core::fkr::policy::OrphanPolicy::from_str(policy).map_err(anyhow::Error::msg)?;
    }
    if args.no_incremental_sync {
        config.enable_incremental_sync = false;
    }
    if let Err(err) = config.validate() {
        return Err(err.into());
    }
    config.save(&working_dir).await?;

    let source = Arc::new(RetryingDataPlane::new(MemoryDataPlane::new(), RetryPolicy::default()));
    if let Some(dir) = &args.source_dir {
        seed_from_dir(source.as_ref(), dir).await?;
    }
    let target = Arc::new(RetryingDataPlane::new(MemoryDataPlane::new(), RetryPolicy::default()));
    if let Some(dir) = &args.target_dir {
        seed_from_dir(target.as_ref(), dir).await?;
    }

    let tracker = match MigrationTracker::load(working_dir.root()).await? {
        LoadOutcome::Fresh(tracker) => tracker,
        LoadOutcome::Resumable(resumable) => {
            let should_resume = args.resume
                || Confirm::new()
                    .with_prompt(format!("phase {} was left in_progress by a previous run. Resume it?", resumable.stale_phase()))
                    .default(false)
                    .interact()
                    .unwrap_or(false);
            if should_resume {
                resumable.resume()
            } else {
                resumable.fail_stale("operator declined to resume the stale phase").await?
            }
        }
    };

    let mut engine = PhaseEngine::new(source, target, tracker, config, CancellationToken::new());
    let outcome = engine.run(&working_dir).await;
    View::phase_status(engine.tracker());
    println!("summary written to {}", working_dir.summary_path().display());

    match outcome {
        Ok(MigrationOutcome::Completed) => Ok(0),
        Ok(MigrationOutcome::RolledBack) => Ok(1),
        Err(err) => Err(err.into()),
    }
}
