//! Column-state snapshots exchanged between entities and storage.
//!
//! # Responsibility
//! - Represent exactly one row as an insertion-ordered column map.
//! - Provide typed accessors used by `from_state` reconstruction code.
//!
//! # Invariants
//! - Column order is the order in which columns were inserted.
//! - Dates are stored as `YYYY-MM-DD` text.

use chrono::NaiveDate;
use indexmap::IndexMap;
use rusqlite::types::Value;
use std::fmt::{Display, Formatter};
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Column map that uniquely selects one row (or, for query predicates, all
/// rows belonging to one aggregate).
pub type Identifier = State;

/// Errors raised while reading typed values out of a [`State`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateError {
    #[error("state has no column `{0}`")]
    MissingColumn(String),
    #[error("column `{column}` holds {found}, expected {expected}")]
    UnexpectedType {
        column: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("column `{column}` holds an invalid value: {reason}")]
    InvalidValue { column: String, reason: String },
}

/// Ordered mapping from column name to scalar value, one row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    columns: IndexMap<String, Value>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`State::insert`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn with_text(self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(column, Value::Text(value.into()))
    }

    pub fn with_integer(self, column: impl Into<String>, value: i64) -> Self {
        self.with(column, Value::Integer(value))
    }

    pub fn with_real(self, column: impl Into<String>, value: f64) -> Self {
        self.with(column, Value::Real(value))
    }

    pub fn with_date(self, column: impl Into<String>, value: NaiveDate) -> Self {
        self.with(column, Value::Text(value.format(DATE_FORMAT).to_string()))
    }

    pub fn with_null(self, column: impl Into<String>) -> Self {
        self.with(column, Value::Null)
    }

    /// Sets one column, replacing an earlier value in place.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.insert(column.into(), value.into());
    }

    /// Copies every column of `other` over this state.
    pub fn merge(&mut self, other: State) {
        for (column, value) in other.columns {
            self.columns.insert(column, value);
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.columns.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(|(column, value)| (column.as_str(), value))
    }

    pub fn text(&self, column: &str) -> Result<&str, StateError> {
        match self.require(column)? {
            Value::Text(value) => Ok(value.as_str()),
            other => Err(unexpected(column, "text", other)),
        }
    }

    pub fn optional_text(&self, column: &str) -> Result<Option<&str>, StateError> {
        match self.require(column)? {
            Value::Null => Ok(None),
            Value::Text(value) => Ok(Some(value.as_str())),
            other => Err(unexpected(column, "text or null", other)),
        }
    }

    /// Reads an integer column. Numeric text is accepted, since some stores
    /// hand integers back as strings.
    pub fn integer(&self, column: &str) -> Result<i64, StateError> {
        match self.require(column)? {
            Value::Integer(value) => Ok(*value),
            Value::Text(value) => value.trim().parse().map_err(|_| StateError::InvalidValue {
                column: column.to_string(),
                reason: format!("`{value}` is not an integer"),
            }),
            other => Err(unexpected(column, "integer", other)),
        }
    }

    pub fn real(&self, column: &str) -> Result<f64, StateError> {
        match self.require(column)? {
            Value::Real(value) => Ok(*value),
            Value::Integer(value) => Ok(*value as f64),
            other => Err(unexpected(column, "real", other)),
        }
    }

    pub fn date(&self, column: &str) -> Result<NaiveDate, StateError> {
        let text = self.text(column)?;
        NaiveDate::parse_from_str(text, DATE_FORMAT).map_err(|err| StateError::InvalidValue {
            column: column.to_string(),
            reason: format!("`{text}` is not a {DATE_FORMAT} date: {err}"),
        })
    }

    fn require(&self, column: &str) -> Result<&Value, StateError> {
        self.columns
            .get(column)
            .ok_or_else(|| StateError::MissingColumn(column.to_string()))
    }
}

impl FromIterator<(String, Value)> for State {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for State {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

/// Renders `column = value` pairs, e.g. `order_id = 'O1', company_id = 5`.
impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (index, (column, value)) in self.columns.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{column} = ")?;
            match value {
                Value::Null => f.write_str("NULL")?,
                Value::Integer(value) => write!(f, "{value}")?,
                Value::Real(value) => write!(f, "{value}")?,
                Value::Text(value) => write!(f, "'{}'", value.replace('\'', "\\'"))?,
                Value::Blob(bytes) => write!(f, "<{} bytes>", bytes.len())?,
            }
        }
        Ok(())
    }
}

/// Short name of a value's storage class, for diagnostics.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Integer(_) => "integer",
        Value::Real(_) => "real",
        Value::Text(_) => "text",
        Value::Blob(_) => "blob",
    }
}

fn unexpected(column: &str, expected: &'static str, found: &Value) -> StateError {
    StateError::UnexpectedType {
        column: column.to_string(),
        expected,
        found: value_kind(found),
    }
}
