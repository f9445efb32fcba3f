//! Integration tests driving the migration control plane end to end
//! against `MemoryDataPlane`, covering workflows that need more than
//! one component wired together.
//!
//! A `test_context::TestContext` sets up an isolated temporary
//! directory per test, and each test drives the library's public API
//! the way a real caller would rather than reaching into private
//! module internals.

use async_trait::async_trait;
use ironsync::core::dpa::memory::MemoryDataPlane;
use ironsync::core::dpa::retry::{RetryPolicy, RetryingDataPlane};
use ironsync::core::dpa::{DataPlane, DpaError, Page, Record, WriteOutcome};
use ironsync::core::fkr::policy::OrphanPolicy;
use ironsync::core::ids::{RecordId, Table, TABLE_ORDER};
use ironsync::core::mst::{LoadOutcome, MigrationStatus, MigrationTracker};
use ironsync::core::pe::{MigrationOutcome, PeError, PhaseEngine};
use ironsync::core::rbm::{Rbm, RollbackMode, RollbackRequest};
use ironsync::libs::config::{MigrationConfig, TrafficSwitchingMode};
use ironsync::libs::data_storage::WorkingDirectory;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use test_context::{test_context, TestContext};
use tokio_util::sync::CancellationToken;

struct MigrationTestContext {
    _temp_dir: TempDir,
    work_dir: WorkingDirectory,
}

impl TestContext for MigrationTestContext {
    fn setup() -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let work_dir = WorkingDirectory::new(temp_dir.path());
        MigrationTestContext {
            _temp_dir: temp_dir,
            work_dir,
        }
    }
}

fn fast_config() -> MigrationConfig {
    MigrationConfig {
        traffic_switching: TrafficSwitchingMode::Immediate,
        enable_incremental_sync: false,
        monitor_poll_interval_ms: 5,
        recovery_window_ms: 20,
        verification_stability_window_ms: 20,
        ..MigrationConfig::default()
    }
}

fn seed_basic_dataset(dpa: &MemoryDataPlane) -> (RecordId, RecordId, RecordId) {
    let user_id = RecordId::new();
    let program_id = RecordId::new();
    let log_id = RecordId::new();

    dpa.seed(Table::Users, user_id, Record::from_iter([("name".to_string(), json!("alice"))]));
    dpa.seed(
        Table::Programs,
        program_id,
        Record::from_iter([("user_id".to_string(), json!(user_id))]),
    );
    dpa.seed(
        Table::WorkoutLogs,
        log_id,
        Record::from_iter([("user_id".to_string(), json!(user_id)), ("program_id".to_string(), json!(program_id))]),
    );
    (user_id, program_id, log_id)
}

async fn fresh_tracker(work_dir: &WorkingDirectory) -> MigrationTracker {
    match MigrationTracker::load(work_dir.root()).await.unwrap() {
        LoadOutcome::Fresh(tracker) => tracker,
        LoadOutcome::Resumable(resumable) => resumable.fail_stale("test setup").await.unwrap(),
    }
}

/// A migration tracker only reloads cleanly across runs when the last
/// run left every phase `not_started` or the caller points at a fresh
/// working directory — a completed tracker's `Preparation` phase is
/// already `completed` and cannot legally be `start`ed again. Each
/// independent `migrate` invocation in these tests gets its own
/// working directory for exactly that reason, the same way an
/// operator would point a second run at a new `--work-dir`.
fn new_work_dir() -> (TempDir, WorkingDirectory) {
    let dir = tempfile::tempdir().unwrap();
    let wd = WorkingDirectory::new(dir.path());
    (dir, wd)
}

#[test_context(MigrationTestContext)]
#[tokio::test]
async fn migrating_twice_back_to_back_is_idempotent(ctx: &mut MigrationTestContext) {
    let source = Arc::new(MemoryDataPlane::new());
    seed_basic_dataset(&source);
    let target = Arc::new(MemoryDataPlane::new());

    let tracker = fresh_tracker(&ctx.work_dir).await;
    let mut first = PhaseEngine::new(source.clone(), target.clone(), tracker, fast_config(), CancellationToken::new());
    assert_eq!(first.run(&ctx.work_dir).await.unwrap(), MigrationOutcome::Completed);

    let first_counts: Vec<usize> = futures::future::join_all(TABLE_ORDER.map(|t| target.count(t))).await.into_iter().map(|r| r.unwrap()).collect();

    // Second, independent invocation against the same target plane;
    // bulk_write's upsert semantics must leave the same row counts.
    let (_second_dir, second_work_dir) = new_work_dir();
    let tracker = fresh_tracker(&second_work_dir).await;
    let mut second = PhaseEngine::new(source, target.clone(), tracker, fast_config(), CancellationToken::new());
    assert_eq!(second.run(&second_work_dir).await.unwrap(), MigrationOutcome::Completed);

    let second_counts: Vec<usize> = futures::future::join_all(TABLE_ORDER.map(|t| target.count(t))).await.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(first_counts, second_counts);
    assert_eq!(target.rows(Table::Users).len(), 1);
}

#[test_context(MigrationTestContext)]
#[tokio::test]
async fn full_rollback_then_remigrate_reproduces_the_original_dataset(ctx: &mut MigrationTestContext) {
    let source = Arc::new(MemoryDataPlane::new());
    seed_basic_dataset(&source);
    let target = Arc::new(MemoryDataPlane::new());

    let tracker = fresh_tracker(&ctx.work_dir).await;
    let mut engine = PhaseEngine::new(source.clone(), target.clone(), tracker, fast_config(), CancellationToken::new());
    assert_eq!(engine.run(&ctx.work_dir).await.unwrap(), MigrationOutcome::Completed);

    let before: Vec<usize> = futures::future::join_all(TABLE_ORDER.map(|t| target.count(t))).await.into_iter().map(|r| r.unwrap()).collect();
    assert!(before.iter().sum::<usize>() > 0);

    let report = Rbm::run(target.as_ref(), &RollbackRequest::full(false), None).await;
    assert!(report.is_success());
    for table in TABLE_ORDER {
        assert_eq!(target.count(table).await.unwrap(), 0);
    }

    let (_second_dir, second_work_dir) = new_work_dir();
    let tracker = fresh_tracker(&second_work_dir).await;
    let mut engine = PhaseEngine::new(source, target.clone(), tracker, fast_config(), CancellationToken::new());
    assert_eq!(engine.run(&second_work_dir).await.unwrap(), MigrationOutcome::Completed);

    let after: Vec<usize> = futures::future::join_all(TABLE_ORDER.map(|t| target.count(t))).await.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(before, after);
}

#[test_context(MigrationTestContext)]
#[tokio::test]
async fn schema_only_rollback_reports_success_without_deleting_rows(ctx: &mut MigrationTestContext) {
    let target = MemoryDataPlane::new();
    let (_u, _p, _l) = seed_basic_dataset(&target);
    let _ = &ctx.work_dir;

    let request = RollbackRequest {
        mode: RollbackMode::SchemaOnly,
        tables: None,
        snapshot_first: false,
    };
    let report = Rbm::run(&target, &request, None).await;

    assert!(report.is_success());
    assert!(report.outcomes.iter().all(|o| o.warning.is_some()));
    assert_eq!(target.rows(Table::Users).len(), 1);
    assert_eq!(target.rows(Table::Programs).len(), 1);
    assert_eq!(target.rows(Table::WorkoutLogs).len(), 1);
}

/// A `DataPlane` that fails every call against one configured table,
/// otherwise delegating to a real `MemoryDataPlane` — used to check
/// that `PermissionDenied` on the third table in dependency order
/// aborts the phase before any traffic moves.
struct FlakyDataPlane {
    inner: MemoryDataPlane,
    failing_table: Option<Table>,
}

impl FlakyDataPlane {
    fn new(failing_table: Option<Table>) -> Self {
        Self {
            inner: MemoryDataPlane::new(),
            failing_table,
        }
    }

    fn seed(&self, table: Table, id: RecordId, record: Record) {
        self.inner.seed(table, id, record);
    }
}

#[async_trait]
impl DataPlane for FlakyDataPlane {
    async fn bulk_read(&self, table: Table, cursor: Option<RecordId>, batch_size: usize) -> Result<Page, DpaError> {
        self.inner.bulk_read(table, cursor, batch_size).await
    }

    async fn bulk_write(&self, table: Table, rows: &[(RecordId, Record)]) -> Result<WriteOutcome, DpaError> {
        if Some(table) == self.failing_table {
            return Err(DpaError::PermissionDenied);
        }
        self.inner.bulk_write(table, rows).await
    }

    async fn delete_all(&self, table: Table) -> Result<usize, DpaError> {
        self.inner.delete_all(table).await
    }

    async fn count(&self, table: Table) -> Result<usize, DpaError> {
        self.inner.count(table).await
    }

    async fn lookup(&self, table: Table, id: RecordId) -> Result<Option<Record>, DpaError> {
        self.inner.lookup(table, id).await
    }

    async fn exists(&self, table: Table) -> Result<bool, DpaError> {
        self.inner.exists(table).await
    }

    async fn set_traffic_percentage(&self, percentage: u8) -> Result<(), DpaError> {
        self.inner.set_traffic_percentage(percentage).await
    }

    async fn traffic_percentage(&self) -> Result<u8, DpaError> {
        self.inner.traffic_percentage().await
    }
}

#[test_context(MigrationTestContext)]
#[tokio::test]
async fn permission_denied_on_third_table_fails_initial_migration_before_any_traffic_moves(ctx: &mut MigrationTestContext) {
    // dependency order: users, exercises, programs, ... — programs is
    // the third table, and the only one seeded here has rows.
    let source = Arc::new(FlakyDataPlane::new(None));
    let (user_id, _program_id, _log_id) = {
        let user_id = RecordId::new();
        source.seed(Table::Users, user_id, Record::from_iter([("name".to_string(), json!("alice"))]));
        let program_id = RecordId::new();
        source.seed(Table::Programs, program_id, Record::from_iter([("user_id".to_string(), json!(user_id))]));
        (user_id, program_id, RecordId::new())
    };
    let target = Arc::new(FlakyDataPlane::new(Some(Table::Programs)));

    let tracker = fresh_tracker(&ctx.work_dir).await;
    let mut engine = PhaseEngine::new(source, target.clone(), tracker, fast_config(), CancellationToken::new());

    let err = engine.run(&ctx.work_dir).await.unwrap_err();
    assert!(matches!(err, PeError::Dpa(DpaError::PermissionDenied)));
    assert_eq!(engine.tracker().status(), MigrationStatus::Failed);
    assert_eq!(target.traffic_percentage().await.unwrap(), 0);
    assert_eq!(target.inner.rows(Table::Users).len(), 1);
    assert_eq!(target.inner.rows(Table::Programs).len(), 0);
    let _ = user_id;
}

#[test_context(MigrationTestContext)]
#[tokio::test]
async fn create_policy_applied_to_an_already_consistent_dataset_produces_no_placeholders(ctx: &mut MigrationTestContext) {
    let source = Arc::new(MemoryDataPlane::new());
    seed_basic_dataset(&source);
    let target = Arc::new(MemoryDataPlane::new());

    let mut config = fast_config();
    config.orphan_policy = OrphanPolicy::Create;

    let tracker = fresh_tracker(&ctx.work_dir).await;
    let mut engine = PhaseEngine::new(source, target.clone(), tracker, config, CancellationToken::new());
    assert_eq!(engine.run(&ctx.work_dir).await.unwrap(), MigrationOutcome::Completed);

    // No phantom placeholder users beyond the one seeded record.
    assert_eq!(target.rows(Table::Users).len(), 1);
    assert!(target.rows(Table::Users).iter().all(|(_, r)| r.get("placeholder").is_none()));
}

/// A `DataPlane` that fails every call once with `ConnectivityLost`
/// before delegating to a real `MemoryDataPlane`, simulating a
/// transient blip rather than a genuine outage.
struct FlakyOnceDataPlane {
    inner: MemoryDataPlane,
    tripped: std::sync::atomic::AtomicBool,
}

impl FlakyOnceDataPlane {
    fn new() -> Self {
        Self {
            inner: MemoryDataPlane::new(),
            tripped: std::sync::atomic::AtomicBool::new(false),
        }
    }

    fn seed(&self, table: Table, id: RecordId, record: Record) {
        self.inner.seed(table, id, record);
    }

    fn trip_once(&self) -> Result<(), DpaError> {
        if self.tripped.swap(true, std::sync::atomic::Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DpaError::ConnectivityLost)
        }
    }
}

#[async_trait]
impl DataPlane for FlakyOnceDataPlane {
    async fn bulk_read(&self, table: Table, cursor: Option<RecordId>, batch_size: usize) -> Result<Page, DpaError> {
        self.trip_once()?;
        self.inner.bulk_read(table, cursor, batch_size).await
    }

    async fn bulk_write(&self, table: Table, rows: &[(RecordId, Record)]) -> Result<WriteOutcome, DpaError> {
        self.trip_once()?;
        self.inner.bulk_write(table, rows).await
    }

    async fn delete_all(&self, table: Table) -> Result<usize, DpaError> {
        self.inner.delete_all(table).await
    }

    async fn count(&self, table: Table) -> Result<usize, DpaError> {
        self.trip_once()?;
        self.inner.count(table).await
    }

    async fn lookup(&self, table: Table, id: RecordId) -> Result<Option<Record>, DpaError> {
        self.inner.lookup(table, id).await
    }

    async fn exists(&self, table: Table) -> Result<bool, DpaError> {
        self.inner.exists(table).await
    }

    async fn set_traffic_percentage(&self, percentage: u8) -> Result<(), DpaError> {
        self.inner.set_traffic_percentage(percentage).await
    }

    async fn traffic_percentage(&self) -> Result<u8, DpaError> {
        self.inner.traffic_percentage().await
    }
}

#[test_context(MigrationTestContext)]
#[tokio::test]
async fn transient_connectivity_loss_during_initial_migration_is_retried_not_fatal(ctx: &mut MigrationTestContext) {
    let source = Arc::new(RetryingDataPlane::new(FlakyOnceDataPlane::new(), RetryPolicy::default()));
    let user_id = RecordId::new();
    source.seed(Table::Users, user_id, Record::from_iter([("name".to_string(), json!("alice"))]));
    let target = Arc::new(RetryingDataPlane::new(FlakyOnceDataPlane::new(), RetryPolicy::default()));

    let tracker = fresh_tracker(&ctx.work_dir).await;
    let mut engine = PhaseEngine::new(source, target.clone(), tracker, fast_config(), CancellationToken::new());

    let outcome = engine.run(&ctx.work_dir).await.unwrap();
    assert_eq!(outcome, MigrationOutcome::Completed);
    assert_eq!(engine.tracker().status(), MigrationStatus::Completed);
    assert_eq!(target.count(Table::Users).await.unwrap(), 1);
}
