//! # ironsync — fitness-tracker data migration control plane
//!
//! Moves the relational dataset behind a fitness-tracking app from one
//! managed backend to another without downtime: resolves foreign keys
//! across an 8-table schema, drives a phased migration with
//! progressive traffic switching, watches target health in real time,
//! and can roll the target plane back to its pre-migration state if
//! anything goes wrong.
//!
//! `core` is backend-agnostic: every component talks to a `DataPlane`
//! trait object, with an in-memory implementation standing in for a
//! real managed backend. `commands` wires `core` up to a CLI.

pub mod commands;
pub mod core;
pub mod libs;
