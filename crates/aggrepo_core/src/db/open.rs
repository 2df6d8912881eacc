//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas from `StoreConfig`.
//! - Apply aggregate table schemas atomically.
//!
//! # Invariants
//! - Returned connections have `foreign_keys` and `busy_timeout` applied.
//! - `apply_schema` creates every table or none.

use super::DbResult;
use crate::config::StoreConfig;
use crate::schema::Schema;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::Instant;

/// Opens a SQLite database file with default configuration.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_db_with_config(path, &StoreConfig::default())
}

/// Opens a SQLite database file and applies the configured pragmas.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db_with_config(path: impl AsRef<Path>, config: &StoreConfig) -> DbResult<Connection> {
    open_with("file", config, || Connection::open(path))
}

/// Opens an in-memory SQLite database with default configuration.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with("memory", &StoreConfig::default(), Connection::open_in_memory)
}

/// Executes the `CREATE TABLE` statements of `schema` in one transaction.
///
/// Existing tables are left untouched; nothing is diffed or altered.
pub fn apply_schema(conn: &mut Connection, schema: &Schema) -> DbResult<()> {
    let started_at = Instant::now();
    let statements = schema.create_statements()?;

    let tx = conn.transaction()?;
    for statement in &statements {
        tx.execute_batch(statement)?;
    }
    tx.commit()?;

    info!(
        "event=schema_apply module=db status=ok tables={} duration_ms={}",
        statements.len(),
        started_at.elapsed().as_millis()
    );
    Ok(())
}

fn open_with(
    mode: &str,
    config: &StoreConfig,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let conn = match open() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match configure_connection(&conn, config) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_configure_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err.into())
        }
    }
}

fn configure_connection(conn: &Connection, config: &StoreConfig) -> rusqlite::Result<()> {
    let foreign_keys = if config.foreign_keys { "ON" } else { "OFF" };
    conn.execute_batch(&format!("PRAGMA foreign_keys = {foreign_keys};"))?;
    conn.busy_timeout(config.busy_timeout())?;
    Ok(())
}
