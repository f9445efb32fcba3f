//! Phase and status types tracked by the Migration Status Tracker.

use crate::core::error::TrackedError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The fixed, ordered phase sequence the Phase Engine drives through.
/// MST itself only enforces per-phase transition legality;
/// whole-sequence ordering is the Phase Engine's contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Preparation,
    InitialMigration,
    IncrementalSync,
    DeploymentPrep,
    TrafficSwitching,
    Verification,
    Cleanup,
}

pub const PHASE_ORDER: [Phase; 7] = [
    Phase::Preparation,
    Phase::InitialMigration,
    Phase::IncrementalSync,
    Phase::DeploymentPrep,
    Phase::TrafficSwitching,
    Phase::Verification,
    Phase::Cleanup,
];

impl Phase {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Phase::Preparation => "preparation",
            Phase::InitialMigration => "initial_migration",
            Phase::IncrementalSync => "incremental_sync",
            Phase::DeploymentPrep => "deployment_prep",
            Phase::TrafficSwitching => "traffic_switching",
            Phase::Verification => "verification",
            Phase::Cleanup => "cleanup",
        }
    }

    /// The phase that immediately follows this one in the fixed
    /// sequence, or `None` for `Cleanup`.
    pub fn next(&self) -> Option<Phase> {
        let idx = PHASE_ORDER.iter().position(|p| p == self)?;
        PHASE_ORDER.get(idx + 1).copied()
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed,
}

/// Durable per-phase record: start/end timestamps, a free-form result
/// map, and every error/warning scoped to this phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub status: PhaseStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub result: JsonValue,
    pub errors: Vec<TrackedError>,
    pub warnings: Vec<String>,
}

impl Default for PhaseRecord {
    fn default() -> Self {
        Self {
            status: PhaseStatus::NotStarted,
            started_at: None,
            ended_at: None,
            result: JsonValue::Null,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Aggregate status exposed to the CLI and the Markdown summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    NotStarted,
    Preparing,
    Migrating,
    Switching,
    Completed,
    Failed,
    RolledBack,
    /// Both the migration and its rollback failed, on the
    /// emergency-rollback failure path; distinct from plain `Failed`
    /// so the CLI can return exit code 2 instead of 1.
    FailedAndUnrecoverable,
}

impl MigrationStatus {
    /// Derives the aggregate status from the phase each is currently
    /// known to occupy, given the per-phase records.
    pub fn derive(records: &std::collections::BTreeMap<Phase, PhaseRecord>) -> Self {
        use PhaseStatus::*;

        let status_of = |phase: Phase| records.get(&phase).map(|r| r.status).unwrap_or(NotStarted);

        if records.values().all(|r| r.status == NotStarted) {
            return MigrationStatus::NotStarted;
        }
        if records.values().any(|r| r.status == Failed) {
            return MigrationStatus::Failed;
        }
        if status_of(Phase::Cleanup) == Completed {
            return MigrationStatus::Completed;
        }
        if matches!(status_of(Phase::TrafficSwitching), InProgress | Completed) {
            return MigrationStatus::Switching;
        }
        if [Phase::InitialMigration, Phase::IncrementalSync, Phase::DeploymentPrep]
            .into_iter()
            .any(|p| status_of(p) != NotStarted)
        {
            return MigrationStatus::Migrating;
        }
        MigrationStatus::Preparing
    }
}
