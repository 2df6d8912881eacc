//! Repository layer: aggregate persistence over SQLite.
//!
//! # Responsibility
//! - Map aggregate graphs onto rows and back.
//! - Keep SQL details and the version guard inside the persistence boundary.
//!
//! # Invariants
//! - Repository APIs return typed errors (`NotFound`, `ConcurrentUpdate`, ...)
//!   rather than raw SQLite errors, except for store constraint violations.

pub mod aggregate_repo;
mod concurrency;
pub mod error;
pub mod registry;
mod sql;
