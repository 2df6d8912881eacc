//! Table declarations for aggregate types.
//!
//! # Responsibility
//! - Let aggregate types declare the tables they and their children use.
//! - Render declarations as SQLite `CREATE TABLE` statements.
//!
//! # Invariants
//! - Table names are unique within one `Schema`.
//! - Key and index columns must be declared columns of the same table.
//! - Only creation is supported; existing tables are never altered.

mod provider;

pub use provider::AggregateSchemaProvider;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("table or column name cannot be empty")]
    EmptyName,
    #[error("table `{0}` is declared more than once")]
    DuplicateTable(String),
    #[error("table `{0}` declares no columns")]
    EmptyTable(String),
    #[error("column `{column}` is declared more than once in table `{table}`")]
    DuplicateColumn { table: String, column: String },
    #[error("table `{table}` references undeclared column `{column}`")]
    UnknownColumn { table: String, column: String },
}

/// Implemented by aggregate types that declare their own tables.
pub trait SpecifiesSchema {
    fn specify_schema(schema: &mut Schema) -> Result<(), SchemaError>;
}

/// Column storage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    /// `YYYY-MM-DD` text.
    Date,
    Blob,
}

impl ColumnType {
    fn sql(self) -> &'static str {
        match self {
            Self::Text | Self::Date => "TEXT",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Blob => "BLOB",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    name: String,
    columns: Vec<ColumnDefinition>,
    primary_key: Vec<String>,
    unique_indexes: Vec<Vec<String>>,
}

impl TableDefinition {
    fn new(name: String) -> Self {
        Self {
            name,
            columns: Vec::new(),
            primary_key: Vec::new(),
            unique_indexes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn add_column(&mut self, name: &str, column_type: ColumnType) -> &mut Self {
        self.push_column(name, column_type, false)
    }

    pub fn add_nullable_column(&mut self, name: &str, column_type: ColumnType) -> &mut Self {
        self.push_column(name, column_type, true)
    }

    pub fn set_primary_key(&mut self, columns: &[&str]) -> &mut Self {
        self.primary_key = columns.iter().map(|column| column.to_string()).collect();
        self
    }

    pub fn add_unique_index(&mut self, columns: &[&str]) -> &mut Self {
        self.unique_indexes
            .push(columns.iter().map(|column| column.to_string()).collect());
        self
    }

    fn push_column(&mut self, name: &str, column_type: ColumnType, nullable: bool) -> &mut Self {
        self.columns.push(ColumnDefinition {
            name: name.to_string(),
            column_type,
            nullable,
        });
        self
    }

    fn validate(&self) -> Result<(), SchemaError> {
        if self.columns.is_empty() {
            return Err(SchemaError::EmptyTable(self.name.clone()));
        }

        for (index, column) in self.columns.iter().enumerate() {
            if column.name.trim().is_empty() {
                return Err(SchemaError::EmptyName);
            }
            if self.columns[..index]
                .iter()
                .any(|earlier| earlier.name == column.name)
            {
                return Err(SchemaError::DuplicateColumn {
                    table: self.name.clone(),
                    column: column.name.clone(),
                });
            }
        }

        let referenced = self
            .primary_key
            .iter()
            .chain(self.unique_indexes.iter().flatten());
        for column in referenced {
            if !self.columns.iter().any(|declared| &declared.name == column) {
                return Err(SchemaError::UnknownColumn {
                    table: self.name.clone(),
                    column: column.clone(),
                });
            }
        }

        Ok(())
    }

    fn create_statement(&self) -> String {
        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|column| {
                let null = if column.nullable { "" } else { " NOT NULL" };
                format!(
                    "{} {}{null}",
                    quote_identifier(&column.name),
                    column.column_type.sql()
                )
            })
            .collect();

        if !self.primary_key.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", quote_list(&self.primary_key)));
        }
        for index in &self.unique_indexes {
            parts.push(format!("UNIQUE ({})", quote_list(index)));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
            quote_identifier(&self.name),
            parts.join(",\n    ")
        )
    }
}

/// Collection of table declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    tables: Vec<TableDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a new table and returns it for column declarations.
    pub fn create_table(&mut self, name: &str) -> Result<&mut TableDefinition, SchemaError> {
        if name.trim().is_empty() {
            return Err(SchemaError::EmptyName);
        }
        if self.has_table(name) {
            return Err(SchemaError::DuplicateTable(name.to_string()));
        }

        self.tables.push(TableDefinition::new(name.to_string()));
        let index = self.tables.len() - 1;
        Ok(&mut self.tables[index])
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.iter().any(|table| table.name == name)
    }

    pub fn table(&self, name: &str) -> Option<&TableDefinition> {
        self.tables.iter().find(|table| table.name == name)
    }

    pub fn tables(&self) -> &[TableDefinition] {
        &self.tables
    }

    /// Validates every table and renders one statement per table, in
    /// declaration order.
    pub fn create_statements(&self) -> Result<Vec<String>, SchemaError> {
        self.tables
            .iter()
            .map(|table| {
                table.validate()?;
                Ok(table.create_statement())
            })
            .collect()
    }
}

/// Quotes an SQL identifier, doubling embedded quotes.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|column| quote_identifier(column))
        .collect::<Vec<_>>()
        .join(", ")
}
