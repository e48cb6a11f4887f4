//! Table schemas and column handles.
//!
//! A `Column` is the handle the predicate builders hang off; a `TableSchema`
//! owns the columns of one table and resolves them by name.

use std::fmt;

use crate::types::{Value, ValueType};

/// A handle to one column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    /// The table this column belongs to.
    pub table: String,
    /// The column name.
    pub name: String,
    /// The declared value type.
    pub value_type: ValueType,
    /// Whether the column accepts `Value::Null`.
    pub nullable: bool,
}

impl Column {
    /// Check a value against the column definition.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match value {
            Value::Null => self.nullable,
            other => other.value_type() == self.value_type,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.name)
    }
}

/// Resolves column names against one table.
///
/// This is the only schema capability the predicate compiler needs.
pub trait ColumnResolver {
    /// The name of the table columns are resolved against.
    fn table_name(&self) -> &str;

    /// Look up a column by name.
    fn column(&self, name: &str) -> Option<Column>;
}

/// The schema of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    columns: Vec<Column>,
}

impl TableSchema {
    /// Start a schema for the named table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Add a non-nullable column.
    #[must_use]
    pub fn with_column(self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.push_column(name.into(), value_type, false)
    }

    /// Add a nullable column.
    #[must_use]
    pub fn with_nullable_column(self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.push_column(name.into(), value_type, true)
    }

    fn push_column(mut self, name: String, value_type: ValueType, nullable: bool) -> Self {
        // Redefining a column replaces the earlier definition.
        self.columns.retain(|c| c.name != name);
        self.columns.push(Column {
            table: self.name.clone(),
            name,
            value_type,
            nullable,
        });
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Borrowing lookup used by the engine.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

impl ColumnResolver for TableSchema {
    fn table_name(&self) -> &str {
        &self.name
    }

    fn column(&self, name: &str) -> Option<Column> {
        self.get(name).cloned()
    }
}
