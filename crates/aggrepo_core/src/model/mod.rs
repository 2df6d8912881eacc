//! Persistence contracts implemented by domain types.
//!
//! # Responsibility
//! - Define how aggregates and child entities expose row state.
//! - Provide composable behavior values (persistence flag, version counter,
//!   event log, deleted-children list) for concrete domain types.
//!
//! # Invariants
//! - Contracts perform no I/O.
//! - Drain-style accessors return each item exactly once.

pub mod aggregate;
pub mod components;
pub mod entity;
pub mod state;
