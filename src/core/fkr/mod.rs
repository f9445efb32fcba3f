//! Foreign-Key Resolver (FKR): loads every table, classifies every
//! declared reference, and produces a dataset where every
//! non-nullable reference resolves.
//!
//! Shaped as discrete named steps rather than one opaque function —
//! `load_all`/`analyze`/`resolve`/`validate` are a sequence, each
//! independently testable and each returning a plain value rather
//! than mutating hidden state.

pub mod policy;
pub mod report;

use crate::core::dpa::{DataPlane, DpaError, Record};
use crate::core::error::{Classify, ErrorKind};
use crate::core::ids::{foreign_keys, supports_placeholder, RecordId, Table, TABLE_ORDER};
use policy::{placeholder_defaults, OrphanPolicy};
use report::{
    DuplicateFinding, ReferenceFinding, ReferenceStatus, RelationshipReport, ResolutionSummary, ResolutionViolation, ValidationReport,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

/// All records for all tables, keyed by table then primary key. Owned
/// exclusively by the resolver until resolution completes, then
/// handed to the phase engine by move.
pub type Dataset = HashMap<Table, HashMap<RecordId, Record>>;

#[derive(Debug, Error)]
pub enum FkrError {
    #[error("loading table {table} failed: {source}")]
    LoadFailed { table: Table, #[source] source: DpaError },
    #[error("placeholder synthesis is not supported for table {0}")]
    UnsupportedPlaceholder(Table),
    #[error("resolution invariant violated: {0} reference(s) still unresolved after applying the orphan policy")]
    ResolutionInvariantViolated(usize),
}

impl Classify for FkrError {
    fn classify(&self) -> ErrorKind {
        match self {
            FkrError::LoadFailed { source, .. } => source.classify(),
            FkrError::UnsupportedPlaceholder(_) => ErrorKind::ConstraintViolation,
            FkrError::ResolutionInvariantViolated(_) => ErrorKind::ResolutionInvariantViolated,
        }
    }
}

/// Reads a declared reference field as an optional id. The schema
/// guarantees the field exists on well-formed records; a missing field
/// is treated the same as an explicit null.
fn get_ref(record: &Record, field: &str) -> Option<RecordId> {
    match record.get(field) {
        Some(serde_json::Value::Null) | None => None,
        Some(value) => serde_json::from_value::<RecordId>(value.clone()).ok(),
    }
}

fn set_null(record: &mut Record, field: &str) {
    record.insert(field.to_string(), serde_json::Value::Null);
}

/// Composite-uniqueness constraints checked during analysis.
fn composite_key(table: Table, id: RecordId, record: &Record) -> Option<(Table, String)> {
    match table {
        Table::WorkoutLogExercises => {
            let wl = get_ref(record, "workout_log_id")?;
            let ex = get_ref(record, "exercise_id")?;
            Some((table, format!("{wl}:{ex}")))
        }
        Table::WorkoutLogs => {
            let program_id = get_ref(record, "program_id")?;
            let user_id = get_ref(record, "user_id")?;
            let week = record.get("week_index")?;
            let day = record.get("day_index")?;
            Some((table, format!("{user_id}:{program_id}:{week}:{day}")))
        }
        _ => {
            let _ = id;
            None
        }
    }
}

pub struct Fkr;

impl Fkr {
    /// Drains `bulk_read` for every table into an in-memory index.
    /// Missing tables yield empty mappings, not errors.
    /// Any DPA error during load is fatal to resolution — no partial
    /// dataset is ever returned.
    pub async fn load_all(dpa: &dyn DataPlane, batch_size: usize) -> Result<Dataset, FkrError> {
        let mut dataset = Dataset::new();
        for table in TABLE_ORDER {
            let exists = dpa.exists(table).await.map_err(|source| FkrError::LoadFailed { table, source })?;
            if !exists {
                dataset.insert(table, HashMap::new());
                continue;
            }
            let rows = dpa
                .read_all(table, batch_size)
                .await
                .map_err(|source| FkrError::LoadFailed { table, source })?;
            dataset.insert(table, rows.into_iter().collect());
        }
        Ok(dataset)
    }

    /// Classifies every declared reference and surfaces composite-key
    /// duplicates. Iterates tables in dependency order so child-table
    /// analysis observes parent placeholders synthesized earlier in
    /// the same pass.
    pub fn analyze(dataset: &Dataset) -> RelationshipReport {
        let mut report = RelationshipReport::default();
        let mut seen_keys: BTreeMap<(Table, String), Vec<RecordId>> = BTreeMap::new();

        for table in TABLE_ORDER {
            let Some(rows) = dataset.get(&table) else { continue };
            for (id, record) in rows {
                for fk in foreign_keys(table) {
                    let status = match get_ref(record, fk.field) {
                        None if fk.nullable => ReferenceStatus::NullAndAllowed,
                        None => ReferenceStatus::NullAndRequired,
                        Some(target_id) => {
                            let resolves = dataset.get(&fk.target).map(|t| t.contains_key(&target_id)).unwrap_or(false);
                            if resolves {
                                ReferenceStatus::Resolved
                            } else {
                                ReferenceStatus::Dangling
                            }
                        }
                    };
                    report.findings.push(ReferenceFinding {
                        table,
                        record_id: *id,
                        field: fk.field,
                        status,
                    });
                }
                if let Some(key) = composite_key(table, *id, record) {
                    seen_keys.entry(key).or_default().push(*id);
                }
            }
        }

        for ((table, key), ids) in seen_keys {
            if ids.len() > 1 {
                report.duplicates.push(DuplicateFinding { table, key, record_ids: ids });
            }
        }
        report
    }

    /// Applies `policy` to every offending record. `remove` drops
    /// records with a dangling required reference, cascades that
    /// removal through any record whose *nullable* reference pointed
    /// at the now-removed row (a removed parent orphans its children
    /// regardless of whether the child's reference field happens to
    /// be nullable), and only once that removal fixpoint settles does
    /// it null the references that were dangling from the start — a
    /// reference to something that was never in the dataset, as
    /// opposed to something removed this run, is still just nulled.
    /// Bounded by the number of tables, since the schema has no
    /// reference cycles.
    pub fn resolve(mut dataset: Dataset, policy: OrphanPolicy) -> (Dataset, ResolutionSummary) {
        let mut summary = ResolutionSummary::default();

        match policy {
            OrphanPolicy::Warn => {
                Self::null_broken_nullables(&mut dataset, &mut summary);
            }
            OrphanPolicy::Create => {
                // A synthesized placeholder can itself carry a required
                // reference (e.g. a placeholder program's `user_id`) that
                // doesn't yet resolve, so this repeats to a fixpoint the
                // same way `Remove` does, bounded by the table count since
                // the schema has no reference cycles.
                for _ in 0..TABLE_ORDER.len() {
                    Self::null_broken_nullables(&mut dataset, &mut summary);
                    let created_this_round = Self::create_placeholders(&mut dataset, &mut summary);
                    if created_this_round == 0 {
                        break;
                    }
                }
            }
            OrphanPolicy::Remove => {
                let mut removed_ids: HashSet<(Table, RecordId)> = HashSet::new();
                for _ in 0..TABLE_ORDER.len() {
                    let removed_required = Self::remove_broken_required(&mut dataset, &mut summary);
                    removed_ids.extend(summary.removed.iter().copied());
                    let removed_cascade = Self::cascade_remove_children_of_removed(&mut dataset, &mut summary, &removed_ids);
                    removed_ids.extend(summary.removed.iter().copied());
                    if removed_required == 0 && removed_cascade == 0 {
                        break;
                    }
                }
                Self::null_broken_nullables(&mut dataset, &mut summary);
            }
        }

        (dataset, summary)
    }

    /// Second pass: re-checks every FK. Must find zero violations if
    /// `policy` was `remove` or `create`.
    pub fn validate(dataset: &Dataset) -> ValidationReport {
        let report = Self::analyze(dataset);
        ValidationReport {
            violations: report
                .dangling()
                .map(|f| ResolutionViolation {
                    table: f.table,
                    record_id: f.record_id,
                    field: f.field,
                })
                .collect(),
        }
    }

    /// Convenience wrapper: resolves then validates, surfacing a bug
    /// in the resolver as `ResolutionInvariantViolated` rather than
    /// silently accepting leftover violations.
    pub fn resolve_and_validate(dataset: Dataset, policy: OrphanPolicy) -> Result<(Dataset, ResolutionSummary), FkrError> {
        let (resolved, summary) = Self::resolve(dataset, policy);
        if matches!(policy, OrphanPolicy::Remove | OrphanPolicy::Create) {
            let validation = Self::validate(&resolved);
            if !validation.is_clean() {
                return Err(FkrError::ResolutionInvariantViolated(validation.violations.len()));
            }
        }
        Ok((resolved, summary))
    }

    fn null_broken_nullables(dataset: &mut Dataset, summary: &mut ResolutionSummary) {
        for table in TABLE_ORDER {
            let hits: Vec<(RecordId, &'static str)> = {
                let Some(rows) = dataset.get(&table) else { continue };
                let mut hits = Vec::new();
                for (id, record) in rows {
                    for fk in foreign_keys(table) {
                        if !fk.nullable {
                            continue;
                        }
                        if let Some(target_id) = get_ref(record, fk.field) {
                            if !dataset_contains(dataset, fk.target, target_id) {
                                hits.push((*id, fk.field));
                            }
                        }
                    }
                }
                hits
            };
            let Some(rows) = dataset.get_mut(&table) else { continue };
            for (id, field) in hits {
                if let Some(record) = rows.get_mut(&id) {
                    set_null(record, field);
                    summary.nulled += 1;
                }
            }
        }
    }

    /// Returns the number of new placeholders synthesized this pass, so
    /// the caller can loop to a fixpoint for chains of missing parents.
    fn create_placeholders(dataset: &mut Dataset, summary: &mut ResolutionSummary) -> usize {
        let mut created = 0;
        for table in TABLE_ORDER {
            let hits: Vec<(RecordId, &'static str, Table, RecordId)> = {
                let Some(rows) = dataset.get(&table) else { continue };
                let mut hits = Vec::new();
                for (id, record) in rows {
                    for fk in foreign_keys(table) {
                        if fk.nullable {
                            continue;
                        }
                        if let Some(target_id) = get_ref(record, fk.field) {
                            let resolves = dataset.get(&fk.target).map(|t| t.contains_key(&target_id)).unwrap_or(false);
                            if !resolves {
                                hits.push((*id, fk.field, fk.target, target_id));
                            }
                        }
                    }
                }
                hits
            };
            for (_owning_id, _field, target_table, target_id) in hits {
                let already_present = dataset.get(&target_table).map(|t| t.contains_key(&target_id)).unwrap_or(false);
                if already_present {
                    continue;
                }
                if supports_placeholder(target_table) {
                    let placeholder = placeholder_defaults(target_table, target_id);
                    dataset.entry(target_table).or_default().insert(target_id, placeholder);
                    summary.placeholders_created.push((target_table, target_id));
                    created += 1;
                } else {
                    summary.unsupported_placeholders.push((target_table, target_id));
                }
            }
        }
        summary.placeholders_created.sort();
        summary.placeholders_created.dedup();
        summary.unsupported_placeholders.sort();
        summary.unsupported_placeholders.dedup();
        created
    }

    fn remove_broken_required(dataset: &mut Dataset, summary: &mut ResolutionSummary) -> usize {
        let mut to_remove: Vec<(Table, RecordId)> = Vec::new();
        for table in TABLE_ORDER {
            let Some(rows) = dataset.get(&table) else { continue };
            for (id, record) in rows {
                for fk in foreign_keys(table) {
                    if fk.nullable {
                        continue;
                    }
                    match get_ref(record, fk.field) {
                        None => to_remove.push((table, *id)),
                        Some(target_id) => {
                            let resolves = dataset.get(&fk.target).map(|t| t.contains_key(&target_id)).unwrap_or(false);
                            if !resolves {
                                to_remove.push((table, *id));
                            }
                        }
                    }
                }
            }
        }
        to_remove.sort();
        to_remove.dedup();
        for (table, id) in &to_remove {
            if dataset.get_mut(table).and_then(|t| t.remove(id)).is_some() {
                summary.removed.push((*table, *id));
            }
        }
        to_remove.len()
    }

    /// A removed row orphans any record whose reference field pointed
    /// at it, nullable or not: this catches the nullable case
    /// `remove_broken_required` doesn't, since a nullable dangling
    /// reference is normally left to `null_broken_nullables` rather
    /// than dropped. `removed_ids` distinguishes "parent removed this
    /// run" from "parent never existed", which stays nulled.
    fn cascade_remove_children_of_removed(dataset: &mut Dataset, summary: &mut ResolutionSummary, removed_ids: &HashSet<(Table, RecordId)>) -> usize {
        let mut to_remove: Vec<(Table, RecordId)> = Vec::new();
        for table in TABLE_ORDER {
            let Some(rows) = dataset.get(&table) else { continue };
            for (id, record) in rows {
                for fk in foreign_keys(table) {
                    if !fk.nullable {
                        continue;
                    }
                    if let Some(target_id) = get_ref(record, fk.field) {
                        if removed_ids.contains(&(fk.target, target_id)) {
                            to_remove.push((table, *id));
                        }
                    }
                }
            }
        }
        to_remove.sort();
        to_remove.dedup();
        for (table, id) in &to_remove {
            if dataset.get_mut(table).and_then(|t| t.remove(id)).is_some() {
                summary.removed.push((*table, *id));
            }
        }
        to_remove.len()
    }
}

fn dataset_contains(dataset: &Dataset, table: Table, id: RecordId) -> bool {
    dataset.get(&table).map(|t| t.contains_key(&id)).unwrap_or(false)
}
