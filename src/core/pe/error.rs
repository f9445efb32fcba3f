//! Phase Engine error taxonomy: wraps every component's error plus
//! the failure modes that only make sense at
//! the orchestration layer (count mismatches, maintenance-window
//! overrun, external-collaborator failures, compound failure).

use crate::core::dpa::DpaError;
use crate::core::error::{Classify, ErrorKind, TrackedError};
use crate::core::fkr::FkrError;
use crate::core::ids::Table;
use crate::core::mst::MstError;
use crate::core::rbm::RollbackReport;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeError {

    #[error(transparent)]
    Dpa(#[from] DpaError),
    #[error(transparent)]
    Fkr(#[from] FkrError),
    #[error(transparent)]
    Mst(#[from] MstError),
    #[error("{table} row count mismatch after write: read {read}, landed {written}")]
    WriteCountMismatch { table: Table, read: usize, written: usize },
    #[error("initial migration is estimated to exceed the {downtime_window_ms}ms maintenance window")]
    MaintenanceWindowExceeded { downtime_window_ms: u64 },
    #[error("readiness check '{0}' failed")]
    ReadinessCheckFailed(String),
    #[error("deployment step failed: {0}")]
    DeploymentFailed(String),
    #[error("acceptance check failed: {0}")]
    AcceptanceCheckFailed(String),
    #[error("incremental sync lag is non-zero at verification time ({0}ms)")]
    NonZeroSyncLag(u64),
    #[error("migration cancelled")]
    Cancelled,
    #[error("migration failed ({migration_error:?}) and the emergency rollback also failed")]
    CompoundFailure {
        migration_error: TrackedError,
        rollback_report: RollbackReport,
    },
}

impl Classify for PeError {
    fn classify(&self) -> ErrorKind {
        match self {
            PeError::Dpa(e) => e.classify(),
            PeError::Fkr(e) => e.classify(),
            PeError::Mst(e) => e.classify(),
            PeError::WriteCountMismatch { .. } => ErrorKind::ConstraintViolation,
            PeError::MaintenanceWindowExceeded { .. } => ErrorKind::InvalidPhaseTransition,
            PeError::ReadinessCheckFailed(_) => ErrorKind::ConstraintViolation,
            PeError::DeploymentFailed(_) => ErrorKind::ConstraintViolation,
            PeError::AcceptanceCheckFailed(_) => ErrorKind::ConstraintViolation,
            PeError::NonZeroSyncLag(_) => ErrorKind::ConstraintViolation,
            PeError::Cancelled => ErrorKind::Cancelled,
            PeError::CompoundFailure { .. } => ErrorKind::CompoundFailure,
        }
    }
}
