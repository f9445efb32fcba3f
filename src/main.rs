//! Entry point for the `ironsync` migration control plane.

use ironsync::commands::Cli;
use ironsync::core::pe::PeError;
use ironsync::libs::config::ConfigError;
use std::env;

#[tokio::main]
async fn main() {
    if env::var("IRONSYNC_DEBUG").is_ok() || env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "ironsync=debug".into()))
            .init();
    }

    let code = match Cli::menu().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

/// Maps an unhandled command error to the process exit code: 3 for an
/// invalid configuration caught before anything ran, 2 for a compound
/// failure (migration and its emergency rollback both failed), 1 for
/// everything else.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<ConfigError>().is_some() {
        return 3;
    }
    if let Some(PeError::CompoundFailure { .. }) = err.downcast_ref::<PeError>() {
        return 2;
    }
    1
}
