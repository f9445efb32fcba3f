//! Shared error taxonomy for every core component.
//!
//! Each component (DPA, FKR, RBM, MST, PE) defines its own `thiserror`
//! enum so call sites get precise `?`-propagation and messages, but
//! every one of those enums maps onto this shared [`ErrorKind`] via
//! [`Classify::classify`]. The phase engine's rollback-trigger and
//! exit-code logic both dispatch on `ErrorKind` rather than matching
//! every concrete error type, the same way a single version-check
//! function lets every caller consult one source of truth instead of
//! re-deriving state locally.

use serde::{Deserialize, Serialize};

/// The failure taxonomy shared across all core errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transient, retryable by the caller, never fatal alone.
    Connectivity,
    /// Fatal; aborts the current phase and prevents continuation.
    PermissionDenied,
    /// Data error; reported and counted, does not halt a phase unless
    /// it crosses a per-phase threshold.
    ConstraintViolation,
    /// Same retry semantics as `Connectivity`, but counts toward the
    /// rollback-trigger response-time metric.
    TimedOut,
    /// Retryable with backoff; never fatal alone.
    RateLimited,
    /// Indicates a caller bug; fatal, no retry.
    InvalidPhaseTransition,
    /// Fatal; indicates a bug in the foreign-key resolver.
    ResolutionInvariantViolated,
    /// Propagated upward; triggers orderly shutdown including rollback
    /// if traffic was moved.
    Cancelled,
    /// Migration failed and rollback also failed.
    CompoundFailure,
}

impl ErrorKind {
    /// Transient kinds may be retried by the caller's own policy; the
    /// DPA itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Connectivity | ErrorKind::TimedOut | ErrorKind::RateLimited)
    }

    /// Fatal kinds abort the current phase immediately.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorKind::PermissionDenied
                | ErrorKind::InvalidPhaseTransition
                | ErrorKind::ResolutionInvariantViolated
                | ErrorKind::CompoundFailure
        )
    }

    /// Whether a single occurrence of this kind should be treated as
    /// `critical` for the purposes of `should_rollback`.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            ErrorKind::PermissionDenied | ErrorKind::ResolutionInvariantViolated | ErrorKind::CompoundFailure
        )
    }
}

/// Implemented by every core error enum so the phase engine can
/// classify failures without matching on concrete error types.
pub trait Classify {
    fn classify(&self) -> ErrorKind;
}

/// A classified error captured in a [`crate::core::mst::PhaseRecord`],
/// durable enough to round-trip through the status file.
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct TrackedError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TrackedError {
    pub fn new(err: &impl Classify, message: impl Into<String>) -> Self {
        Self {
            kind: err.classify(),
            message: message.into(),
        }
    }
}
