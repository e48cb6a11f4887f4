//! The capability surface the query layer consumes from a storage engine.
//!
//! Query tokens only ever need two things from an engine: "given a query,
//! return the matching rows" and "given a query, notify me when its rows
//! change". Any engine that provides both can back a `QueryToken`.

use futures::future::BoxFuture;

use super::feed::ChangeFeed;
use super::select::SelectQuery;
use crate::types::{Row, ValueType};

/// A storage engine that can execute and observe select queries.
pub trait StorageEngine: Send + Sync {
    /// Execute the query and return the projected rows.
    fn fetch(&self, query: &SelectQuery) -> BoxFuture<'static, Result<Vec<Row>, EngineError>>;

    /// Register a change listener scoped to the query.
    ///
    /// The listener is registered when this returns; dropping the feed
    /// deregisters it.
    fn observe(&self, query: &SelectQuery) -> Result<ChangeFeed, EngineError>;
}

/// Errors reported by a storage engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The table does not exist.
    UnknownTable(String),
    /// A table with this name already exists.
    DuplicateTable(String),
    /// A row references a column the table does not define.
    UnknownColumn { table: String, column: String },
    /// A value does not match the column's declared type.
    TypeMismatch {
        column: String,
        expected: ValueType,
        found: ValueType,
    },
    /// Null was written to a non-nullable column.
    NotNullable { column: String },
    /// The engine's lock was poisoned by a panicking writer.
    LockPoisoned,
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownTable(table) => write!(f, "table {table} cannot be found"),
            Self::DuplicateTable(table) => write!(f, "table {table} already exists"),
            Self::UnknownColumn { table, column } => {
                write!(f, "column {column} is not defined in table {table}")
            }
            Self::TypeMismatch {
                column,
                expected,
                found,
            } => write!(f, "column {column} expects {expected}, got {found}"),
            Self::NotNullable { column } => write!(f, "column {column} is not nullable"),
            Self::LockPoisoned => write!(f, "storage lock poisoned"),
        }
    }
}

impl std::error::Error for EngineError {}
