//! Data Plane Adapter (DPA): the polymorphic interface every backend
//! implements, so the rest of the core never knows which backend it
//! is talking to.
//!
//! Modeled on how a thin HTTP client wraps request calls behind a
//! narrow set of methods used by every API integration — here that
//! narrow set is `bulk_read`/`bulk_write`/`delete_all`/`count`/
//! `lookup`/`exists`, plus `set_traffic_percentage` for the traffic
//! router contract, since every backend this engine talks to
//! is also the thing whose traffic share gets dialed up or down.

pub mod memory;
pub mod retry;

use crate::core::error::{Classify, ErrorKind};
use crate::core::ids::{RecordId, Table};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use thiserror::Error;

/// A single record as a flat field map. The core treats field values
/// opaquely except for the `RecordId`-typed foreign-key fields the FKR
/// inspects via `core::ids::foreign_keys`.
pub type Record = BTreeMap<String, JsonValue>;

/// Errors a `DataPlane` implementation may surface.
#[derive(Debug, Error, Clone)]
pub enum DpaError {
    #[error("table not found: {0}")]
    TableNotFound(Table),
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("connectivity lost")]
    ConnectivityLost,
    #[error("permission denied")]
    PermissionDenied,
    #[error("rate limited")]
    RateLimited,
    #[error("operation timed out")]
    TimedOut,
}

impl Classify for DpaError {
    fn classify(&self) -> ErrorKind {
        match self {
            DpaError::TableNotFound(_) => ErrorKind::ConstraintViolation,
            DpaError::ConstraintViolation(_) => ErrorKind::ConstraintViolation,
            DpaError::ConnectivityLost => ErrorKind::Connectivity,
            DpaError::PermissionDenied => ErrorKind::PermissionDenied,
            DpaError::RateLimited => ErrorKind::RateLimited,
            DpaError::TimedOut => ErrorKind::TimedOut,
        }
    }
}

/// One page of a bulk read, ordered by primary key and restartable
/// from `next_cursor`.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub rows: Vec<(RecordId, Record)>,
    /// `None` once the table has been fully drained.
    pub next_cursor: Option<RecordId>,
}

/// Outcome of a `bulk_write`: the count actually written, which must
/// equal the count submitted; a short write is never silent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub written: usize,
}

/// Polymorphic backend interface. Implementations must be
/// idempotent on primary key for `bulk_write` (upsert semantics); a
/// non-idempotent write is an implementation bug, not a caller error.
#[async_trait]
pub trait DataPlane: Send + Sync {
    /// Reads one fixed-size page ordered by primary key, starting
    /// after `cursor` (`None` means "from the beginning").
    async fn bulk_read(&self, table: Table, cursor: Option<RecordId>, batch_size: usize) -> Result<Page, DpaError>;

    /// Upserts `rows` into `table`. Idempotent: writing the same rows
    /// twice produces the same end state.
    async fn bulk_write(&self, table: Table, rows: &[(RecordId, Record)]) -> Result<WriteOutcome, DpaError>;

    /// Deletes every row in `table` whose primary key is not
    /// `RecordId::NIL`, which preserves reserved placeholder slots.
    /// Returns the number of rows actually deleted.
    async fn delete_all(&self, table: Table) -> Result<usize, DpaError>;

    /// Total row count for `table`.
    async fn count(&self, table: Table) -> Result<usize, DpaError>;

    /// Looks up a single row by primary key.
    async fn lookup(&self, table: Table, id: RecordId) -> Result<Option<Record>, DpaError>;

    /// Whether `table` exists at all on this backend.
    async fn exists(&self, table: Table) -> Result<bool, DpaError>;

    /// Sets the fraction of live traffic (0..=100) routed to this
    /// plane's application deployment. Monotonicity is not required —
    /// rollback sets it back to 0.
    async fn set_traffic_percentage(&self, percentage: u8) -> Result<(), DpaError>;

    /// Currently configured traffic percentage, for observability.
    async fn traffic_percentage(&self) -> Result<u8, DpaError>;

    /// Drains an entire table into memory by repeatedly calling
    /// `bulk_read`. Default implementation built on the required
    /// primitives; backends rarely need to override it.
    async fn read_all(&self, table: Table, batch_size: usize) -> Result<Vec<(RecordId, Record)>, DpaError> {
        let mut out = Vec::new();
        let mut cursor = None;
        loop {
            let page = self.bulk_read(table, cursor, batch_size).await?;
            let drained = page.rows.len();
            out.extend(page.rows);
            match page.next_cursor {
                Some(c) if drained > 0 => cursor = Some(c),
                _ => break,
            }
        }
        Ok(out)
    }
}
