//! Emergency recovery: a deliberately separate, harder to reach code
//! path from the ordered `Rbm::run`.
//!
//! "Disable constraints, truncate all tables, re-enable constraints"
//! maps onto the DPA contract as an unordered `delete_all` sweep,
//! since constraint enable/disable is a backend implementation detail
//! this core never sees — implementing the backends themselves is out
//! of scope here.

use crate::core::dpa::DataPlane;
use crate::core::error::{Classify, ErrorKind, TrackedError};
use crate::core::ids::{Table, TABLE_ORDER};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmergencyRecoveryReport {
    pub truncated: Vec<Table>,
    pub failures: Vec<(Table, TrackedError)>,
}

impl EmergencyRecoveryReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum EmergencyRecoveryError {
    #[error("emergency recovery requires the explicit allow_emergency flag")]
    NotAuthorized,
}

impl Classify for EmergencyRecoveryError {
    fn classify(&self) -> ErrorKind {
        ErrorKind::PermissionDenied
    }
}

pub struct EmergencyRecovery;

impl EmergencyRecovery {
    /// Truncates every core table without the ordered, resumable
    /// bookkeeping `Rbm::run` provides. Reachable only when
    /// `allow_emergency` is explicitly `true` — never from the normal
    /// `rollback` CLI path without its own `--emergency` confirmation.
    pub async fn run(dpa: &dyn DataPlane, allow_emergency: bool) -> Result<EmergencyRecoveryReport, EmergencyRecoveryError> {
        if !allow_emergency {
            return Err(EmergencyRecoveryError::NotAuthorized);
        }

        let mut report = EmergencyRecoveryReport::default();
        for table in TABLE_ORDER {
            match dpa.delete_all(table).await {
                Ok(_) => report.truncated.push(table),
                Err(err) => report.failures.push((table, TrackedError::new(&err, err.to_string()))),
            }
        }
        Ok(report)
    }
}
