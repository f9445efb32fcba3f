//! Command-line interface for the migration control plane.
//!
//! Five subcommands cover the full migration lifecycle: a dry-run
//! foreign-key resolution pass, the end-to-end phased migration, a
//! read-only status check, the ordered rollback sequence, and the
//! unordered emergency escape hatch.
//!
//! ```bash
//! ironsync plan --source-dir ./fixtures/source
//! ironsync migrate --source-dir ./fixtures/source
//! ironsync verify
//! ironsync rollback --mode full
//! ironsync emergency-recover --confirm
//! ```

pub mod emergency_recover;
pub mod fixtures;
pub mod migrate;
pub mod plan;
pub mod rollback;
pub mod verify;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// The five subcommands this control plane exposes; CLI surface area
/// beyond them is out of scope.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Dry-run foreign-key resolution against the source plane
    #[command(about = "Preview foreign-key resolution without writing anything")]
    Plan(plan::PlanArgs),

    /// Run a migration end to end through the phase engine
    #[command(about = "Run a migration end to end")]
    Migrate(migrate::MigrateArgs),

    /// Check the status of an in-progress or completed migration
    #[command(about = "Show a migration's phase status")]
    Verify(verify::VerifyArgs),

    /// Restore the target plane to its pre-migration state
    #[command(about = "Roll back the target plane")]
    Rollback(rollback::RollbackArgs),

    /// Unordered truncate-everything escape hatch
    #[command(about = "Unordered emergency recovery, bypassing the ordered rollback sequence")]
    EmergencyRecover(emergency_recover::EmergencyRecoverArgs),
}

/// The main CLI structure that parses command-line arguments.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help(true))]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Parses command-line arguments, dispatches to the matching
    /// command, and returns the process exit code it produced: 0
    /// success, 1 failed or rolled back, 2 compound failure, 3 invalid
    /// configuration.
    pub async fn menu() -> Result<i32> {
        let cli = Self::parse();

        match cli.command {
            Commands::Plan(args) => plan::cmd(args).await.map(|()| 0),
            Commands::Migrate(args) => migrate::cmd(args).await,
            Commands::Verify(args) => verify::cmd(args).await,
            Commands::Rollback(args) => rollback::cmd(args).await,
            Commands::EmergencyRecover(args) => emergency_recover::cmd(args).await,
        }
    }
}
