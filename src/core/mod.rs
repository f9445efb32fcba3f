//! The migration control plane: Data Plane Adapter, Foreign-Key
//! Resolver, Rollback Manager, Migration Status Tracker, Real-Time
//! Monitor, and the Phase Engine that orchestrates them.
//!
//! Everything outside `core` (commands, configuration, reports) is a
//! thin collaborator; this module is the part of the repository that
//! cannot be swapped for a different backend without changing behavior.

pub mod dpa;
pub mod error;
pub mod fkr;
pub mod ids;
pub mod monitor;
pub mod mst;
pub mod pe;
pub mod rbm;
