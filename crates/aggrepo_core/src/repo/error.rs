//! Repository error taxonomy.
//!
//! # Invariants
//! - Every variant aborts the running transaction; nothing is retried here.
//! - Store-level constraint violations keep the native `rusqlite` error.

use crate::db::DbError;
use crate::model::state::StateError;
use rusqlite::ErrorCode;
use thiserror::Error;

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors surfaced by aggregate repository operations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// No row matched the aggregate identifier.
    #[error("could not find aggregate of type `{aggregate_type}` with id `{id}`")]
    NotFound {
        aggregate_type: &'static str,
        id: String,
    },
    /// Optimistic version check failed, or the row vanished before update.
    #[error(
        "a concurrent update occurred of an entity of type `{entity_type}` with identifier: {identifier}"
    )]
    ConcurrentUpdate {
        entity_type: &'static str,
        identifier: String,
    },
    /// Type was not registered as an aggregate, or its declaration is unusable.
    #[error("type `{type_name}` is not a usable aggregate: {reason}")]
    InvalidAggregateType {
        type_name: &'static str,
        reason: String,
    },
    /// Domain type broke the persistence contract.
    #[error("persistence contract violated: {0}")]
    ContractViolation(String),
    /// Store rejected a write (duplicate key, not-null, foreign key, ...).
    #[error("constraint violation: {0}")]
    ConstraintViolation(#[source] rusqlite::Error),
    /// Stored or produced state could not be interpreted.
    #[error("invalid state: {0}")]
    State(#[from] StateError),
    /// Stored data is unusable for bookkeeping (e.g. non-integer version).
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    #[error(transparent)]
    Db(#[from] DbError),
}

impl RepoError {
    pub(crate) fn concurrent_update(entity_type: &'static str, identifier: String) -> Self {
        Self::ConcurrentUpdate {
            entity_type,
            identifier,
        }
    }

    pub(crate) fn invalid_aggregate_type(type_name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidAggregateType {
            type_name,
            reason: reason.into(),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if value.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
            return Self::ConstraintViolation(value);
        }
        Self::Db(DbError::Sqlite(value))
    }
}
