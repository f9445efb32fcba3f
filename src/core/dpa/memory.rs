//! In-memory `DataPlane` used as the default source/target in `plan`
//! runs without a configured real backend, and as the workhorse of the
//! test suite. Follows the familiar pattern of a single struct
//! wrapping a lock-protected connection; here each table gets its own
//! lock-protected map instead of a single connection, since there is
//! no real storage engine to delegate to.

use super::{DataPlane, DpaError, Page, Record, WriteOutcome};
use crate::core::ids::{RecordId, Table, TABLE_ORDER};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// A fully in-process backend. Rows are kept sorted by primary key so
/// `bulk_read` pagination is deterministic.
#[derive(Default)]
pub struct MemoryDataPlane {
    tables: RwLock<BTreeMap<Table, BTreeMap<RecordId, Record>>>,
    traffic_percentage: RwLock<u8>,
}

impl MemoryDataPlane {
    pub fn new() -> Self {
        let mut tables = BTreeMap::new();
        for table in TABLE_ORDER {
            tables.insert(table, BTreeMap::new());
        }
        Self {
            tables: RwLock::new(tables),
            traffic_percentage: RwLock::new(0),
        }
    }

    /// Test/seed helper: inserts a row directly, bypassing upsert
    /// semantics checks. Used to build fixture datasets.
    pub fn seed(&self, table: Table, id: RecordId, record: Record) {
        self.tables.write().entry(table).or_default().insert(id, record);
    }

    /// Snapshot of every row in `table`, for assertions in tests.
    pub fn rows(&self, table: Table) -> Vec<(RecordId, Record)> {
        self.tables
            .read()
            .get(&table)
            .map(|rows| rows.iter().map(|(id, r)| (*id, r.clone())).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DataPlane for MemoryDataPlane {
    async fn bulk_read(&self, table: Table, cursor: Option<RecordId>, batch_size: usize) -> Result<Page, DpaError> {
        let tables = self.tables.read();
        let rows = tables.get(&table).ok_or(DpaError::TableNotFound(table))?;
        let mut page_rows = Vec::with_capacity(batch_size);
        let iter = match cursor {
            Some(after) => rows.range((std::ops::Bound::Excluded(after), std::ops::Bound::Unbounded)),
            None => rows.range(..),
        };
        for (id, record) in iter {
            if page_rows.len() == batch_size {
                break;
            }
            page_rows.push((*id, record.clone()));
        }
        let next_cursor = if page_rows.len() == batch_size { page_rows.last().map(|(id, _)| *id) } else { None };
        Ok(Page { rows: page_rows, next_cursor })
    }

    async fn bulk_write(&self, table: Table, rows: &[(RecordId, Record)]) -> Result<WriteOutcome, DpaError> {
        let mut tables = self.tables.write();
        let slot = tables.entry(table).or_default();
        for (id, record) in rows {
            slot.insert(*id, record.clone());
        }
        Ok(WriteOutcome { written: rows.len() })
    }

    async fn delete_all(&self, table: Table) -> Result<usize, DpaError> {
        let mut tables = self.tables.write();
        let slot = tables.get_mut(&table).ok_or(DpaError::TableNotFound(table))?;
        let before = slot.len();
        slot.retain(|id, _| id.is_nil());
        Ok(before - slot.len())
    }

    async fn count(&self, table: Table) -> Result<usize, DpaError> {
        Ok(self.tables.read().get(&table).map(|r| r.len()).unwrap_or(0))
    }

    async fn lookup(&self, table: Table, id: RecordId) -> Result<Option<Record>, DpaError> {
        Ok(self.tables.read().get(&table).and_then(|r| r.get(&id).cloned()))
    }

    async fn exists(&self, table: Table) -> Result<bool, DpaError> {
        Ok(self.tables.read().contains_key(&table))
    }

    async fn set_traffic_percentage(&self, percentage: u8) -> Result<(), DpaError> {
        *self.traffic_percentage.write() = percentage.min(100);
        Ok(())
    }

    async fn traffic_percentage(&self) -> Result<u8, DpaError> {
        Ok(*self.traffic_percentage.read())
    }
}
