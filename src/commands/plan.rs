//! `plan`: a dry-run foreign-key resolution pass against the source
//! plane, with no writes and no `MigrationTracker` involved. Lets an
//! operator see what an orphan policy would do before committing to a
//! `migrate` run.

use crate::commands::fixtures::seed_from_dir;
use crate::core::dpa::memory::MemoryDataPlane;
use crate::core::fkr::Fkr;
use crate::libs::config::MigrationConfig;
use crate::libs::data_storage::WorkingDirectory;
use crate::libs::view::View;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Working directory that will hold this migration's state once
    /// `migrate` runs; `plan` only writes `config.json` into it.
    #[arg(long, default_value = "./ironsync-run")]
    work_dir: PathBuf,

    /// Directory of `<table>.json` fixture files seeding the source
    /// plane (same shape `Rbm` snapshots write). Omit to plan against
    /// an empty source.
    #[arg(long)]
    source_dir: Option<PathBuf>,

    /// How to handle a dangling reference: `warn`, `remove`, or `create`.
    #[arg(long, default_value = "warn")]
    orphan_policy: String,
}

pub async fn cmd(args: PlanArgs) -> Result<()> {
    let orphan_policy = crate::core::fkr::policy::OrphanPolicy::from_str(&args.orphan_policy).map_err(anyhow::Error::msg)?;

    let working_dir = WorkingDirectory::new(&args.work_dir);
    working_dir.ensure_root().await?;

    let mut config = MigrationConfig::load(&working_dir).await?;
    config.orphan_policy = orphan_policy;
    config.validate()?;
    config.save(&working_dir).await?;

    let source = MemoryDataPlane::new();
    if let Some(dir) = &args.source_dir {
        seed_from_dir(&source, dir).await?;
    }

    let dataset = Fkr::load_all(&source, config.batch_size).await?;
    let report = Fkr::analyze(&dataset);
    let (_resolved, summary) = Fkr::resolve(dataset, orphan_policy);

    View::resolution_report(&report, &summary);
    println!("config saved to {}", working_dir.config_path().display());

    Ok(())
}
