//! SQLite connection bootstrap and schema application entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the aggregate repository.
//! - Apply declared aggregate schemas in one transaction.
//!
//! # Invariants
//! - Returned connections carry the configured pragmas.
//! - Schema application is all-or-nothing.

use crate::schema::SchemaError;
use thiserror::Error;

mod open;

pub use open::{apply_schema, open_db, open_db_in_memory, open_db_with_config};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid schema: {0}")]
    Schema(#[from] SchemaError),
}
