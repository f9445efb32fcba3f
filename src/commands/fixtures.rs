//! Loads a `DataPlane`'s rows from a directory of `<table>.json` files —
//! the same shape `Rbm::snapshot_table` writes, so a prior rollback
//! snapshot or a hand-written fixture directory can seed a run without
//! a real backend wired up, against the `MemoryDataPlane` default.

use crate::core::dpa::{DataPlane, Record};
use crate::core::ids::{RecordId, Table, TABLE_ORDER};
use anyhow::{Context, Result};
use std::path::Path;

/// Reads `<dir>/<table>.json` for every table that has one and
/// `bulk_write`s its rows into `dpa`. Tables with no file present are
/// left empty, not an error.
pub async fn seed_from_dir(dpa: &dyn DataPlane, dir: &Path) -> Result<()> {
    for table in TABLE_ORDER {
        let path = dir.join(format!("{table}.json"));
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => return Err(err).with_context(|| format!("reading fixture file {}", path.display())),
        };
        let rows: Vec<(RecordId, Record)> = serde_json::from_slice(&bytes).with_context(|| format!("parsing fixture file {}", path.display()))?;
        if !rows.is_empty() {
            dpa.bulk_write(table, &rows).await.with_context(|| format!("seeding table {table}"))?;
        }
    }
    Ok(())
}
