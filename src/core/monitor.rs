//! Real-Time Monitor: polls both data planes on a fixed interval and
//! publishes health samples the Phase Engine consults at well-defined
//! observation points.
//!
//! The monitor never mutates either data plane — it is read-only — and
//! runs as an independent `tokio` task from the start of `preparation`
//! to the end of `cleanup`. Samples are published over a
//! `tokio::sync::watch` channel rather than delivered through a
//! callback, favoring message passing over event-emitter control flow.

use crate::core::dpa::DataPlane;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Severity of the most recent observed error, for the `critical`
/// branch of `should_rollback`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Info,
    Warning,
    Critical,
}

/// One health sample, covering the four rollback-trigger signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    pub error_rate_pct: f64,
    pub response_time_ms: u64,
    pub data_consistency_pct: f64,
    pub last_error_severity: Option<ErrorSeverity>,
}

impl Default for HealthMetrics {
    fn default() -> Self {
        Self {
            error_rate_pct: 0.0,
            response_time_ms: 0,
            data_consistency_pct: 100.0,
            last_error_severity: None,
        }
    }
}

/// Thresholds carried as plain data so `should_rollback` stays a pure
/// function independent of `Config`.
#[derive(Debug, Clone, Copy)]
pub struct AutoRollbackThresholds {
    pub error_rate_pct: f64,
    pub response_time_ms: u64,
    pub consistency_pct: f64,
}

/// True if any of the four conditions holds. `response_time > 5000ms`
/// is a fixed constant, not configurable.
pub fn should_rollback(metrics: &HealthMetrics, thresholds: &AutoRollbackThresholds) -> bool {
    metrics.error_rate_pct > thresholds.error_rate_pct
        || metrics.response_time_ms > thresholds.response_time_ms
        || metrics.response_time_ms > 5000
        || metrics.data_consistency_pct < thresholds.consistency_pct
        || matches!(metrics.last_error_severity, Some(ErrorSeverity::Critical))
}

/// Produces one `HealthMetrics` sample per poll. The production
/// implementation compares source/target row counts for consistency
/// and times a round-trip DPA call for latency; tests substitute a
/// scripted source to drive deterministic scenarios.
#[async_trait::async_trait]
pub trait MetricsSource: Send + Sync {
    async fn sample(&self) -> HealthMetrics;
}

/// Compares `source`/`target` row counts across every core table to
/// derive `data_consistency_pct`, and times a `count` round-trip on
/// `target` for `response_time_ms`. Error rate and severity default to
/// healthy values — a real deployment layers its own error/latency
/// accounting on top via a different `MetricsSource`.
pub struct DataPlaneMetricsSource<D: DataPlane> {
    source: Arc<D>,
    target: Arc<D>,
}

impl<D: DataPlane> DataPlaneMetricsSource<D> {
    pub fn new(source: Arc<D>, target: Arc<D>) -> Self {
        Self { source, target }
    }
}

#[async_trait::async_trait]
impl<D: DataPlane> MetricsSource for DataPlaneMetricsSource<D> {
    async fn sample(&self) -> HealthMetrics {
        let started = std::time::Instant::now();
        let mut total_source = 0usize;
        let mut total_target = 0usize;
        let mut matched = 0usize;
        for table in crate::core::ids::TABLE_ORDER {
            let src = self.source.count(table).await.unwrap_or(0);
            let tgt = self.target.count(table).await.unwrap_or(0);
            total_source += src;
            total_target += tgt;
            if src == tgt {
                matched += 1;
            }
        }
        let response_time_ms = started.elapsed().as_millis() as u64;
        let data_consistency_pct = if total_source == 0 && total_target == 0 {
            100.0
        } else {
            (matched as f64 / crate::core::ids::TABLE_ORDER.len() as f64) * 100.0
        };
        HealthMetrics {
            error_rate_pct: 0.0,
            response_time_ms,
            data_consistency_pct,
            last_error_severity: None,
        }
    }
}

/// A scripted sequence of samples for tests: returns each entry in
/// order, then repeats the last entry forever.
pub struct ScriptedMetricsSource {
    samples: Vec<HealthMetrics>,
    cursor: AtomicU64,
}

impl ScriptedMetricsSource {
    pub fn new(samples: Vec<HealthMetrics>) -> Self {
        Self {
            samples,
            cursor: AtomicU64::new(0),
        }
    }
}

#[async_trait::async_trait]
impl MetricsSource for ScriptedMetricsSource {
    async fn sample(&self) -> HealthMetrics {
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst) as usize;
        let last = self.samples.len().saturating_sub(1);
        self.samples.get(idx.min(last)).copied().unwrap_or_default()
    }
}

/// The running monitor task plus the cancellation handle used to stop
/// it at the end of `cleanup`.
pub struct Monitor {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl Monitor {
    /// Spawns the polling loop and returns the handle plus a receiver
    /// that always holds the latest sample (seeded with the default,
    /// fully-healthy reading until the first poll completes).
    pub fn spawn(source: Arc<dyn MetricsSource>, poll_interval: Duration) -> (Self, watch::Receiver<HealthMetrics>) {
        let (tx, rx) = watch::channel(HealthMetrics::default());
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let sample = source.sample().await;
                        if tx.send(sample).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        (Self { handle, cancel }, rx)
    }

    /// Stops the polling loop and awaits its task. Since the monitor
    /// never mutates data, stopping is just cancellation — nothing to
    /// flush or reconcile.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

/// Waits up to `duration` for an unhealthy sample to arrive on
/// `metrics`, returning it as soon as `should_rollback` is true, or
/// `None` once the window elapses without one.
pub async fn observe_for(
    duration: Duration,
    metrics: &mut watch::Receiver<HealthMetrics>,
    thresholds: &AutoRollbackThresholds,
) -> Option<HealthMetrics> {
    let deadline = tokio::time::Instant::now() + duration;
    loop {
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return None;
        }
        let remaining = deadline - now;
        tokio::select! {
            _ = tokio::time::sleep(remaining) => return None,
            changed = metrics.changed() => {
                if changed.is_err() {
                    return None;
                }
                let sample = *metrics.borrow();
                if should_rollback(&sample, thresholds) {
                    return Some(sample);
                }
            }
        }
    }
}
