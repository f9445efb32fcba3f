//! Rollback Manager (RBM): returns the target plane to a defined
//! pre-migration state.
//!
//! The per-table state machine mirrors the pending/running/stopped
//! phase-enum shape used elsewhere in the retrieved corpus for
//! tracking a unit of work through a fixed set of stages, specialized
//! here to `queued → snapshotting → deleting → verifying →
//! done|failed|skipped`.

pub mod emergency;

use crate::core::dpa::{DataPlane, DpaError};
use crate::core::error::{Classify, ErrorKind, TrackedError};
use crate::core::ids::{Table, TABLE_ORDER};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RollbackMode {
    Full,
    Partial,
    DataOnly,
    SchemaOnly,
}

impl std::str::FromStr for RollbackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(RollbackMode::Full),
            "partial" => Ok(RollbackMode::Partial),
            "data-only" => Ok(RollbackMode::DataOnly),
            "schema-only" => Ok(RollbackMode::SchemaOnly),
            other => Err(format!("unknown rollback mode: {other}")),
        }
    }
}

impl std::fmt::Display for RollbackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RollbackMode::Full => write!(f, "full"),
            RollbackMode::Partial => write!(f, "partial"),
            RollbackMode::DataOnly => write!(f, "data-only"),
            RollbackMode::SchemaOnly => write!(f, "schema-only"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackRequest {
    pub mode: RollbackMode,
    /// The table subset for `Partial`; ignored by every other mode,
    /// which always target every core table.
    pub tables: Option<Vec<Table>>,
    pub snapshot_first: bool,
}

impl RollbackRequest {
    pub fn full(snapshot_first: bool) -> Self {
        Self {
            mode: RollbackMode::Full,
            tables: None,
            snapshot_first,
        }
    }

    /// Rollback proceeds in reverse dependency order, so a child table
    /// is always emptied before the parent it references.
    fn target_tables(&self) -> Vec<Table> {
        match self.mode {
            RollbackMode::Partial => {
                let requested = self.tables.clone().unwrap_or_default();
                TABLE_ORDER.into_iter().rev().filter(|t| requested.contains(t)).collect()
            }
            _ => TABLE_ORDER.into_iter().rev().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableRollbackState {
    Queued,
    Snapshotting,
    Deleting,
    Verifying,
    Done,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRollbackOutcome {
    pub table: Table,
    pub state: TableRollbackState,
    pub rows_deleted: usize,
    pub error: Option<TrackedError>,
    pub warning: Option<String>,
}

/// Structured report handed to MST's per-phase result map and
/// rendered into the Markdown summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollbackReport {
    pub mode: Option<RollbackMode>,
    pub outcomes: Vec<TableRollbackOutcome>,
    /// Set once a `PermissionDenied`/`ConnectivityLost` failure cuts
    /// the run short; remaining tables are never attempted.
    pub aborted: bool,
}

impl RollbackReport {
    pub fn is_success(&self) -> bool {
        !self.aborted && self.outcomes.iter().all(|o| matches!(o.state, TableRollbackState::Done | TableRollbackState::Skipped))
    }
}

#[derive(Debug, Error)]
pub enum RbmError {
    #[error("reading {table} for snapshot failed: {source}")]
    SnapshotReadFailed { table: Table, #[source] source: DpaError },
    #[error("encoding snapshot for {table} failed: {source}")]
    SnapshotEncodeFailed { table: Table, #[source] source: serde_json::Error },
    #[error("writing snapshot file for {table} failed: {source}")]
    SnapshotWriteFailed { table: Table, #[source] source: std::io::Error },
}

impl Classify for RbmError {
    fn classify(&self) -> ErrorKind {
        match self {
            RbmError::SnapshotReadFailed { source, .. } => source.classify(),
            RbmError::SnapshotEncodeFailed { .. } | RbmError::SnapshotWriteFailed { .. } => ErrorKind::ConstraintViolation,
        }
    }
}

pub struct Rbm;

impl Rbm {
    /// Executes `request` against `dpa`, snapshotting first when
    /// asked. `snapshot_dir` is the caller's already-timestamped
    /// `pre-rollback-<ts>/` directory; passing `None` with
    /// `snapshot_first = true` is a caller error that simply skips
    /// snapshotting (the working-directory layer is responsible for
    /// always supplying a directory when the config asks for one).
    pub async fn run(dpa: &dyn DataPlane, request: &RollbackRequest, snapshot_dir: Option<&Path>) -> RollbackReport {
        let mut report = RollbackReport {
            mode: Some(request.mode),
            ..Default::default()
        };

        for table in request.target_tables() {
            if request.mode == RollbackMode::SchemaOnly {
                report.outcomes.push(TableRollbackOutcome {
                    table,
                    state: TableRollbackState::Skipped,
                    rows_deleted: 0,
                    error: None,
                    warning: Some(format!("schema-only rollback: {table} rows left in place, manual DDL required")),
                });
                continue;
            }

            let mut outcome = TableRollbackOutcome {
                table,
                state: TableRollbackState::Queued,
                rows_deleted: 0,
                error: None,
                warning: None,
            };

            if request.snapshot_first {
                outcome.state = TableRollbackState::Snapshotting;
                if let Some(dir) = snapshot_dir {
                    if let Err(err) = Self::snapshot_table(dpa, table, dir).await {
                        outcome.state = TableRollbackState::Failed;
                        outcome.error = Some(TrackedError::new(&err, err.to_string()));
                        report.outcomes.push(outcome);
                        continue;
                    }
                }
            }

            outcome.state = TableRollbackState::Deleting;
            match dpa.delete_all(table).await {
                Ok(deleted) => outcome.rows_deleted = deleted,
                Err(err) => {
                    let fatal = matches!(err, DpaError::PermissionDenied | DpaError::ConnectivityLost);
                    outcome.state = TableRollbackState::Failed;
                    outcome.error = Some(TrackedError::new(&err, err.to_string()));
                    report.outcomes.push(outcome);
                    if fatal {
                        report.aborted = true;
                        break;
                    }
                    continue;
                }
            }

            outcome.state = TableRollbackState::Verifying;
            match dpa.count(table).await {
                Ok(0) => outcome.state = TableRollbackState::Done,
                Ok(remaining) => {
                    outcome.state = TableRollbackState::Done;
                    outcome.warning = Some(format!("{remaining} row(s) remain in {table} after rollback"));
                }
                Err(err) => {
                    outcome.state = TableRollbackState::Failed;
                    outcome.error = Some(TrackedError::new(&err, err.to_string()));
                }
            }
            report.outcomes.push(outcome);
        }

        report
    }

    /// Snapshots every core table to `dir` without deleting anything —
    /// used by the Phase Engine's `preparation` phase, which needs a
    /// full pre-migration snapshot independent of any rollback.
    pub async fn snapshot_all(dpa: &dyn DataPlane, dir: &Path) -> Result<(), RbmError> {
        for table in TABLE_ORDER {
            Self::snapshot_table(dpa, table, dir).await?;
        }
        Ok(())
    }

    async fn snapshot_table(dpa: &dyn DataPlane, table: Table, dir: &Path) -> Result<(), RbmError> {
        let rows = dpa.read_all(table, 500).await.map_err(|source| RbmError::SnapshotReadFailed { table, source })?;
        tokio::fs::create_dir_all(dir).await.map_err(|source| RbmError::SnapshotWriteFailed { table, source })?;
        let json = serde_json::to_vec_pretty(&rows).map_err(|source| RbmError::SnapshotEncodeFailed { table, source })?;
        let path = dir.join(format!("{table}.json"));
        tokio::fs::write(&path, json).await.map_err(|source| RbmError::SnapshotWriteFailed { table, source })
    }
}
