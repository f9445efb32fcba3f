//! Migration Status Tracker (MST): the single source of truth for
//! "where is the migration now".
//!
//! Durability follows the familiar plain `serde_json` config write,
//! hardened with a temp-file-plus-rename so a crash mid-write never
//! leaves a half-written status file — MST's durability contract is
//! stronger than a plain config file, since PE must be able to resume
//! from it after a crash.

pub mod state;

use crate::core::error::{Classify, ErrorKind, TrackedError};
pub use state::{MigrationStatus, Phase, PhaseRecord, PhaseStatus, PHASE_ORDER};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

const STATUS_FILE_NAME: &str = "status.json";

#[derive(Debug, Error)]
pub enum MstError {
    #[error("phase {phase} is {actual:?}, cannot {attempted}")]
    InvalidPhaseTransition {
        phase: Phase,
        attempted: &'static str,
        actual: PhaseStatus,
    },
    #[error("reading status file failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("writing status file failed: {0}")]
    Write(#[source] std::io::Error),
    #[error("status file is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),
    #[error("encoding status file failed: {0}")]
    Encode(#[source] serde_json::Error),
}

impl Classify for MstError {
    fn classify(&self) -> ErrorKind {
        match self {
            MstError::InvalidPhaseTransition { .. } => ErrorKind::InvalidPhaseTransition,
            MstError::Read(_) | MstError::Write(_) | MstError::Corrupt(_) | MstError::Encode(_) => ErrorKind::ConstraintViolation,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StatusFile {
    phases: BTreeMap<Phase, PhaseRecord>,
    current_traffic_percentage: u8,
    /// Terminal states MST cannot derive from phase records alone
    /// (`rolled_back`, `failed_and_unrecoverable`) — set explicitly by
    /// the Phase Engine once the rollback path resolves.
    status_override: Option<MigrationStatus>,
}

impl StatusFile {
    fn fresh() -> Self {
        let phases = PHASE_ORDER.iter().map(|p| (*p, PhaseRecord::default())).collect();
        Self {
            phases,
            current_traffic_percentage: 0,
            status_override: None,
        }
    }
}

/// Owns the on-disk checkpoint file for one migration run. PE holds
/// exactly one instance; no other component touches the file.
pub struct MigrationTracker {
    status_path: PathBuf,
    file: StatusFile,
}

/// Result of `MigrationTracker::load`: either the working directory
/// held no prior run, or it held one whose last phase was left
/// `in_progress` by a crash and the caller must explicitly decide its
/// fate before any further transition is accepted.
pub enum LoadOutcome {
    Fresh(MigrationTracker),
    Resumable(ResumableTracker),
}

/// A loaded tracker whose last phase was `in_progress`. The caller
/// must call `resume` or `fail_stale` before driving any further
/// transition.
pub struct ResumableTracker {
    tracker: MigrationTracker,
    stale_phase: Phase,
}

impl ResumableTracker {
    pub fn stale_phase(&self) -> Phase {
        self.stale_phase
    }

    /// Accepts the stale `in_progress` phase as still legitimately
    /// running (e.g. the orchestrator process restarted but the
    /// backend work is still safe to continue) and hands back the
    /// tracker unmodified.
    pub fn resume(self) -> MigrationTracker {
        self.tracker
    }

    /// Marks the stale phase `failed` with a synthetic error and
    /// persists the result, then hands back the tracker.
    pub async fn fail_stale(mut self, reason: impl Into<String>) -> Result<MigrationTracker, MstError> {
        let error = TrackedError {
            kind: ErrorKind::Cancelled,
            message: reason.into(),
        };
        self.tracker.fail(self.stale_phase, error).await?;
        Ok(self.tracker)
    }
}

impl MigrationTracker {
    /// Starts a brand-new tracker rooted at `working_dir`, with every
    /// phase `not_started`. Does not touch disk until the first
    /// transition.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            status_path: working_dir.into().join(STATUS_FILE_NAME),
            file: StatusFile::fresh(),
        }
    }

    /// Loads the durable status file from `working_dir`, or starts a
    /// fresh tracker if none exists yet.
    pub async fn load(working_dir: impl Into<PathBuf>) -> Result<LoadOutcome, MstError> {
        let working_dir = working_dir.into();
        let status_path = working_dir.join(STATUS_FILE_NAME);

        let bytes = match tokio::fs::read(&status_path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(LoadOutcome::Fresh(MigrationTracker {
                    status_path,
                    file: StatusFile::fresh(),
                }))
            }
            Err(err) => return Err(MstError::Read(err)),
        };
        let file: StatusFile = serde_json::from_slice(&bytes).map_err(MstError::Corrupt)?;
        let tracker = MigrationTracker { status_path, file };

        let stale = PHASE_ORDER.into_iter().find(|p| tracker.file.phases[p].status == PhaseStatus::InProgress);
        match stale {
            Some(stale_phase) => Ok(LoadOutcome::Resumable(ResumableTracker { tracker, stale_phase })),
            None => Ok(LoadOutcome::Fresh(tracker)),
        }
    }

    pub fn phase(&self, phase: Phase) -> &PhaseRecord {
        &self.file.phases[&phase]
    }

    pub fn status(&self) -> MigrationStatus {
        self.file.status_override.unwrap_or_else(|| MigrationStatus::derive(&self.file.phases))
    }

    pub fn current_traffic_percentage(&self) -> u8 {
        self.file.current_traffic_percentage
    }

    /// Requires `phase` to be `not_started`; rejects otherwise with
    /// `InvalidPhaseTransition`.
    pub async fn start(&mut self, phase: Phase) -> Result<(), MstError> {
        let record = self.file.phases.get_mut(&phase).expect("every phase has a record");
        if record.status != PhaseStatus::NotStarted {
            return Err(MstError::InvalidPhaseTransition {
                phase,
                attempted: "start",
                actual: record.status,
            });
        }
        record.status = PhaseStatus::InProgress;
        record.started_at = Some(chrono_now());
        tracing::info!(%phase, "phase started");
        self.save().await
    }

    /// Requires `phase` to be `in_progress`.
    pub async fn complete(&mut self, phase: Phase, result: JsonValue) -> Result<(), MstError> {
        let record = self.file.phases.get_mut(&phase).expect("every phase has a record");
        if record.status != PhaseStatus::InProgress {
            return Err(MstError::InvalidPhaseTransition {
                phase,
                attempted: "complete",
                actual: record.status,
            });
        }
        record.status = PhaseStatus::Completed;
        record.ended_at = Some(chrono_now());
        record.result = result;
        tracing::info!(%phase, "phase completed");
        self.save().await
    }

    /// Requires `phase` to be `in_progress`.
    pub async fn fail(&mut self, phase: Phase, error: TrackedError) -> Result<(), MstError> {
        let record = self.file.phases.get_mut(&phase).expect("every phase has a record");
        if record.status != PhaseStatus::InProgress {
            return Err(MstError::InvalidPhaseTransition {
                phase,
                attempted: "fail",
                actual: record.status,
            });
        }
        record.status = PhaseStatus::Failed;
        record.ended_at = Some(chrono_now());
        tracing::error!(%phase, error = %error.message, "phase failed");
        record.errors.push(error);
        self.save().await
    }

    pub async fn warn(&mut self, phase: Phase, warning: impl Into<String>) -> Result<(), MstError> {
        let warning = warning.into();
        tracing::warn!(%phase, %warning, "phase warning recorded");
        self.file.phases.get_mut(&phase).expect("every phase has a record").warnings.push(warning);
        self.save().await
    }

    pub async fn set_traffic_percentage(&mut self, percentage: u8) -> Result<(), MstError> {
        self.file.current_traffic_percentage = percentage.min(100);
        self.save().await
    }

    /// Sets one of the terminal statuses MST cannot derive on its own
    /// (`rolled_back` / `failed_and_unrecoverable`).
    pub async fn set_status_override(&mut self, status: MigrationStatus) -> Result<(), MstError> {
        self.file.status_override = Some(status);
        self.save().await
    }

    async fn save(&self) -> Result<(), MstError> {
        let json = serde_json::to_vec_pretty(&self.file).map_err(MstError::Corrupt)?;
        if let Some(parent) = self.status_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(MstError::Write)?;
        }
        let tmp_path = self.status_path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json).await.map_err(MstError::Write)?;
        tokio::fs::rename(&tmp_path, &self.status_path).await.map_err(MstError::Write)
    }
}

fn chrono_now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn legal_transitions_persist_and_reload() {
        let dir = tempdir().unwrap();
        let mut tracker = MigrationTracker::new(dir.path());

        tracker.start(Phase::Preparation).await.unwrap();
        tracker.complete(Phase::Preparation, serde_json::json!({"ok": true})).await.unwrap();
        assert_eq!(tracker.phase(Phase::Preparation).status, PhaseStatus::Completed);

        match MigrationTracker::load(dir.path()).await.unwrap() {
            LoadOutcome::Fresh(reloaded) => {
                assert_eq!(reloaded.phase(Phase::Preparation).status, PhaseStatus::Completed);
            }
            LoadOutcome::Resumable(_) => panic!("no phase left in_progress"),
        }
    }

    #[tokio::test]
    async fn starting_an_already_started_phase_is_rejected() {
        let dir = tempdir().unwrap();
        let mut tracker = MigrationTracker::new(dir.path());
        tracker.start(Phase::Preparation).await.unwrap();

        let err = tracker.start(Phase::Preparation).await.unwrap_err();
        assert!(matches!(err, MstError::InvalidPhaseTransition { attempted: "start", .. }));
    }

    #[tokio::test]
    async fn completing_a_not_started_phase_is_rejected() {
        let dir = tempdir().unwrap();
        let mut tracker = MigrationTracker::new(dir.path());
        let err = tracker.complete(Phase::Preparation, JsonValue::Null).await.unwrap_err();
        assert!(matches!(err, MstError::InvalidPhaseTransition { attempted: "complete", .. }));
    }

    #[tokio::test]
    async fn crash_mid_phase_surfaces_as_resumable() {
        let dir = tempdir().unwrap();
        let mut tracker = MigrationTracker::new(dir.path());
        tracker.start(Phase::Preparation).await.unwrap();
        drop(tracker);

        match MigrationTracker::load(dir.path()).await.unwrap() {
            LoadOutcome::Resumable(resumable) => {
                assert_eq!(resumable.stale_phase(), Phase::Preparation);
                let tracker = resumable.fail_stale("orchestrator restarted").await.unwrap();
                assert_eq!(tracker.phase(Phase::Preparation).status, PhaseStatus::Failed);
            }
            LoadOutcome::Fresh(_) => panic!("preparation was left in_progress"),
        }
    }

    #[tokio::test]
    async fn overall_status_derives_from_phase_records() {
        let dir = tempdir().unwrap();
        let mut tracker = MigrationTracker::new(dir.path());
        assert_eq!(tracker.status(), MigrationStatus::NotStarted);

        tracker.start(Phase::Preparation).await.unwrap();
        assert_eq!(tracker.status(), MigrationStatus::Preparing);

        tracker.complete(Phase::Preparation, JsonValue::Null).await.unwrap();
        tracker.start(Phase::InitialMigration).await.unwrap();
        assert_eq!(tracker.status(), MigrationStatus::Migrating);
    }
}
