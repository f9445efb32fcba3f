//! Caller-side retry policy for transient `DpaError`s.
//!
//! The DPA contract is explicit that the adapter itself never
//! retries — retry is the caller's policy choice, the same way a
//! thin HTTP client wraps request calls with its own timeout/backoff
//! handling rather than asking the transport to retry transparently.

use super::{DataPlane, DpaError, Page, Record, WriteOutcome};
use crate::core::error::Classify;
use crate::core::ids::{RecordId, Table};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Bounded exponential backoff applied only to kinds the taxonomy
/// marks retryable (`Connectivity`, `TimedOut`, `RateLimited`).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts, base_delay }
    }

    /// Runs `op`, retrying on retryable `DpaError`s with exponential
    /// backoff up to `max_attempts`. Fatal and data-error kinds are
    /// returned immediately without retrying.
    pub async fn run<F, Fut, T>(&self, mut op: F) -> Result<T, DpaError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DpaError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.classify().is_retryable() && attempt + 1 < self.max_attempts => {
                    let delay = self.base_delay * 2u32.pow(attempt);
                    tracing::warn!(attempt, ?delay, error = %err, "retrying transient DPA error");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Wraps a `DataPlane` so every call goes through a `RetryPolicy`
/// before a transient error reaches the caller. Every PE/RBM/FKR
/// call site talks to a plane through this wrapper rather than to
/// the raw backend, so `ConnectivityLost`/`RateLimited`/`TimedOut`
/// are absorbed here instead of failing a phase outright.
pub struct RetryingDataPlane<D> {
    inner: D,
    policy: RetryPolicy,
}

impl<D> RetryingDataPlane<D> {
    pub fn new(inner: D, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<D: DataPlane> DataPlane for RetryingDataPlane<D> {
    async fn bulk_read(&self, table: Table, cursor: Option<RecordId>, batch_size: usize) -> Result<Page, DpaError> {
        self.policy.run(|| self.inner.bulk_read(table, cursor, batch_size)).await
    }

    async fn bulk_write(&self, table: Table, rows: &[(RecordId, Record)]) -> Result<WriteOutcome, DpaError> {
        self.policy.run(|| self.inner.bulk_write(table, rows)).await
    }

    async fn delete_all(&self, table: Table) -> Result<usize, DpaError> {
        self.policy.run(|| self.inner.delete_all(table)).await
    }

    async fn count(&self, table: Table) -> Result<usize, DpaError> {
        self.policy.run(|| self.inner.count(table)).await
    }

    async fn lookup(&self, table: Table, id: RecordId) -> Result<Option<Record>, DpaError> {
        self.policy.run(|| self.inner.lookup(table, id)).await
    }

    async fn exists(&self, table: Table) -> Result<bool, DpaError> {
        self.policy.run(|| self.inner.exists(table)).await
    }

    async fn set_traffic_percentage(&self, percentage: u8) -> Result<(), DpaError> {
        self.policy.run(|| self.inner.set_traffic_percentage(percentage)).await
    }

    async fn traffic_percentage(&self) -> Result<u8, DpaError> {
        self.policy.run(|| self.inner.traffic_percentage()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let result = policy
            .run(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(DpaError::ConnectivityLost)
                } else {
                    Ok(42)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn never_retries_fatal_errors() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let result: Result<(), DpaError> = policy
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DpaError::PermissionDenied)
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct FlakyCount {
        calls: AtomicU32,
    }

    #[async_trait]
    impl DataPlane for FlakyCount {
        async fn bulk_read(&self, _table: Table, _cursor: Option<RecordId>, _batch_size: usize) -> Result<Page, DpaError> {
            unimplemented!()
        }

        async fn bulk_write(&self, _table: Table, _rows: &[(RecordId, Record)]) -> Result<WriteOutcome, DpaError> {
            unimplemented!()
        }

        async fn delete_all(&self, _table: Table) -> Result<usize, DpaError> {
            unimplemented!()
        }

        async fn count(&self, _table: Table) -> Result<usize, DpaError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(DpaError::ConnectivityLost)
            } else {
                Ok(7)
            }
        }

        async fn lookup(&self, _table: Table, _id: RecordId) -> Result<Option<Record>, DpaError> {
            unimplemented!()
        }

        async fn exists(&self, _table: Table) -> Result<bool, DpaError> {
            unimplemented!()
        }

        async fn set_traffic_percentage(&self, _percentage: u8) -> Result<(), DpaError> {
            unimplemented!()
        }

        async fn traffic_percentage(&self) -> Result<u8, DpaError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn retrying_data_plane_absorbs_transient_errors() {
        let wrapped = RetryingDataPlane::new(FlakyCount { calls: AtomicU32::new(0) }, RetryPolicy::new(5, Duration::from_millis(1)));
        let count = wrapped.count(Table::Users).await.unwrap();
        assert_eq!(count, 7);
        assert_eq!(wrapped.inner.calls.load(Ordering::SeqCst), 3);
    }
}
