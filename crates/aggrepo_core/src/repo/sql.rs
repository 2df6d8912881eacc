//! Parameterized single-table statements built from column maps.
//!
//! # Invariants
//! - Table and column names are always quoted; values are always bound.
//! - An empty predicate is rejected: it would address every row.

use crate::model::state::{Identifier, State};
use crate::repo::error::{RepoError, RepoResult};
use crate::schema::quote_identifier;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};

pub(crate) fn insert_row(conn: &Connection, table: &str, state: &State) -> RepoResult<()> {
    if state.is_empty() {
        return Err(RepoError::ContractViolation(format!(
            "state written to `{table}` has no columns"
        )));
    }

    let columns = state
        .columns()
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=state.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({columns}) VALUES ({placeholders});",
        quote_identifier(table)
    );

    conn.execute(&sql, params_from_iter(state.values()))?;
    Ok(())
}

/// Updates the row selected by `identifier`; returns the number of rows hit.
pub(crate) fn update_row(
    conn: &Connection,
    table: &str,
    state: &State,
    identifier: &Identifier,
) -> RepoResult<usize> {
    if state.is_empty() {
        return Err(RepoError::ContractViolation(format!(
            "state written to `{table}` has no columns"
        )));
    }

    let assignments = state
        .columns()
        .enumerate()
        .map(|(index, column)| format!("{} = ?{}", quote_identifier(column), index + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE {} SET {assignments} WHERE {};",
        quote_identifier(table),
        where_clause(table, identifier, state.len() + 1)?
    );

    let changed = conn.execute(&sql, params_from_iter(state.values().chain(identifier.values())))?;
    Ok(changed)
}

/// Deletes the row selected by `identifier`. A missing row is not an error.
pub(crate) fn delete_row(conn: &Connection, table: &str, identifier: &Identifier) -> RepoResult<usize> {
    let sql = format!(
        "DELETE FROM {} WHERE {};",
        quote_identifier(table),
        where_clause(table, identifier, 1)?
    );
    let changed = conn.execute(&sql, params_from_iter(identifier.values()))?;
    Ok(changed)
}

/// Loads every row matching `predicate`, columns in table order.
pub(crate) fn fetch_all(conn: &Connection, table: &str, predicate: &Identifier) -> RepoResult<Vec<State>> {
    let sql = format!(
        "SELECT * FROM {} WHERE {};",
        quote_identifier(table),
        where_clause(table, predicate, 1)?
    );

    let mut stmt = conn.prepare(&sql)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let mut rows = stmt.query(params_from_iter(predicate.values()))?;

    let mut states = Vec::new();
    while let Some(row) = rows.next()? {
        let mut state = State::new();
        for (index, column) in columns.iter().enumerate() {
            state.insert(column.as_str(), row.get::<_, Value>(index)?);
        }
        states.push(state);
    }

    Ok(states)
}

/// Reads one column of the row selected by `identifier`, if the row exists.
pub(crate) fn fetch_column(
    conn: &Connection,
    table: &str,
    column: &str,
    identifier: &Identifier,
) -> RepoResult<Option<Value>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {};",
        quote_identifier(column),
        quote_identifier(table),
        where_clause(table, identifier, 1)?
    );

    let value = conn
        .query_row(&sql, params_from_iter(identifier.values()), |row| {
            row.get::<_, Value>(0)
        })
        .optional()?;
    Ok(value)
}

fn where_clause(table: &str, predicate: &Identifier, first_index: usize) -> RepoResult<String> {
    if predicate.is_empty() {
        return Err(RepoError::ContractViolation(format!(
            "empty identifier for table `{table}` would address every row"
        )));
    }

    Ok(predicate
        .columns()
        .enumerate()
        .map(|(offset, column)| format!("{} = ?{}", quote_identifier(column), first_index + offset))
        .collect::<Vec<_>>()
        .join(" AND "))
}
