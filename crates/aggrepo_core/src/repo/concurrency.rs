//! Optimistic concurrency guard.
//!
//! # Invariants
//! - The guard runs inside the same transaction as the write it protects.
//! - A write passes only when the stored version is strictly lower than the
//!   incoming (already incremented) version.
//! - A NULL or non-numeric stored version is `InvalidData`, never read as 0.

use crate::model::state::{value_kind, Identifier, State};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::sql;
use rusqlite::types::Value;
use rusqlite::Connection;

/// Version check for one entity update.
pub(crate) struct VersionGuard<'a> {
    pub(crate) version_column: &'a str,
    pub(crate) entity_type: &'static str,
    pub(crate) table: &'static str,
}

impl VersionGuard<'_> {
    /// Fails with `ConcurrentUpdate` when the stored row is at or beyond the
    /// incoming version, or when the row no longer exists.
    ///
    /// States without the version column pass untouched.
    pub(crate) fn check(
        &self,
        conn: &Connection,
        state: &State,
        identifier: &Identifier,
    ) -> RepoResult<()> {
        let Some(incoming) = state.get(self.version_column) else {
            return Ok(());
        };
        let incoming = version_number(self.table, self.version_column, incoming)?;

        let stored = match sql::fetch_column(conn, self.table, self.version_column, identifier)? {
            Some(value) => version_number(self.table, self.version_column, &value)?,
            None => return Err(self.conflict(identifier)),
        };

        if stored >= incoming {
            return Err(self.conflict(identifier));
        }
        Ok(())
    }

    pub(crate) fn conflict(&self, identifier: &Identifier) -> RepoError {
        RepoError::concurrent_update(self.entity_type, identifier.to_string())
    }
}

fn version_number(table: &str, column: &str, value: &Value) -> RepoResult<i64> {
    match value {
        Value::Integer(version) => Ok(*version),
        Value::Text(text) => text.trim().parse().map_err(|_| {
            RepoError::InvalidData(format!(
                "version `{text}` in {table}.{column} is not an integer"
            ))
        }),
        other => Err(RepoError::InvalidData(format!(
            "version in {table}.{column} holds {}, expected integer",
            value_kind(other)
        ))),
    }
}
