//! Store configuration.
//!
//! # Responsibility
//! - Hold connection pragmas and repository write settings in one value that
//!   applications can deserialize from their own config files.
//!
//! # Invariants
//! - Every field has a default; a partial document is a valid config.

use crate::model::aggregate::VERSION_COLUMN;
use rusqlite::TransactionBehavior;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Lock acquisition mode for repository write transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteLockMode {
    /// Lock on first write statement.
    Deferred,
    /// Take the write lock at `BEGIN`, so the version read and the write are
    /// serialized against other writers.
    Immediate,
    Exclusive,
}

impl Default for WriteLockMode {
    fn default() -> Self {
        Self::Immediate
    }
}

impl From<WriteLockMode> for TransactionBehavior {
    fn from(value: WriteLockMode) -> Self {
        match value {
            WriteLockMode::Deferred => TransactionBehavior::Deferred,
            WriteLockMode::Immediate => TransactionBehavior::Immediate,
            WriteLockMode::Exclusive => TransactionBehavior::Exclusive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How long a connection waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Enables `PRAGMA foreign_keys`.
    pub foreign_keys: bool,
    /// Column whose presence in `state()` enables the version check.
    pub version_column: String,
    pub write_lock: WriteLockMode,
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            foreign_keys: true,
            version_column: VERSION_COLUMN.to_string(),
            write_lock: WriteLockMode::default(),
        }
    }
}
