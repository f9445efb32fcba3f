//! Report types produced by the Foreign-Key Resolver's analysis and
//! validation passes.

use crate::core::ids::{RecordId, Table};
use serde::{Deserialize, Serialize};

/// Classification of a single declared outbound reference on a record,
/// produced by `Fkr::analyze`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceStatus {
    Resolved,
    NullAndAllowed,
    NullAndRequired,
    Dangling,
}

/// One classified reference, identifying the owning record and field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceFinding {
    pub table: Table,
    pub record_id: RecordId,
    pub field: &'static str,
    pub status: ReferenceStatus,
}

/// A duplicate under a unique composite constraint: surfaced, never
/// silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateFinding {
    pub table: Table,
    pub key: String,
    pub record_ids: Vec<RecordId>,
}

/// Output of `Fkr::analyze`: a full classification of every declared
/// reference in the dataset, plus any composite-uniqueness duplicates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationshipReport {
    pub findings: Vec<ReferenceFinding>,
    pub duplicates: Vec<DuplicateFinding>,
}

impl RelationshipReport {
    pub fn dangling(&self) -> impl Iterator<Item = &ReferenceFinding> {
        self.findings.iter().filter(|f| f.status == ReferenceStatus::Dangling)
    }

    pub fn violation_count(&self) -> usize {
        self.dangling().count()
    }
}

/// A foreign key left unresolved after `Fkr::resolve` ran, detected by
/// the mandatory second pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionViolation {
    pub table: Table,
    pub record_id: RecordId,
    pub field: &'static str,
}

/// Output of `Fkr::validate`. Must be empty after `remove`/`create`
/// policies; a non-empty report after those policies indicates a bug
/// in the resolver, surfaced as `FkrError::ResolutionInvariantViolated`
/// rather than being silently accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub violations: Vec<ResolutionViolation>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Outcome of applying an orphan policy: what got dropped, nulled, or
/// synthesized, for the per-phase result map PE records in MST.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionSummary {
    pub nulled: usize,
    pub removed: Vec<(Table, RecordId)>,
    pub placeholders_created: Vec<(Table, RecordId)>,
    pub unsupported_placeholders: Vec<(Table, RecordId)>,
}
