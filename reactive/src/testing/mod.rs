//! Shared fixtures for unit and end-to-end tests.

// Fixture setup failures are test bugs.
#![allow(clippy::expect_used)]

use std::sync::{Arc, Once};

use crate::storage::{Database, TableSchema};
use crate::types::{Row, ValueType};

/// Table used by the predicate fixtures.
pub const PREDICATE_TABLE: &str = "TestPredicateProvider";
/// Table used by the query token fixtures.
pub const TOKEN_TABLE: &str = "TestSelectMetadata";
/// Number of rows in each fixture table.
pub const FIXTURE_ROWS: i32 = 1000;

static TRACING: Once = Once::new();

/// Install a `tracing` subscriber for test output, once per process.
///
/// Honours `RUST_LOG`, defaulting to `reactive=debug`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "reactive=debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Schema of the predicate fixture table.
pub fn predicate_schema() -> TableSchema {
    TableSchema::new(PREDICATE_TABLE)
        .with_column("_id", ValueType::String)
        .with_column("name", ValueType::String)
        .with_column("time1", ValueType::Number)
        .with_column("time2", ValueType::Number)
        .with_nullable_column("nullable", ValueType::Boolean)
}

/// Row `i` of the predicate fixture.
///
/// `time2` counts down from `FIXTURE_ROWS`; `nullable` is null from row 300 on.
pub fn predicate_row(i: i32) -> Row {
    Row::new()
        .with("_id", format!("_id:{i}"))
        .with("name", format!("name:{i}"))
        .with("time1", i)
        .with("time2", FIXTURE_ROWS - i)
        .with("nullable", if i >= 300 { None } else { Some(false) })
}

/// A database holding the predicate fixture table.
pub fn predicate_database() -> Arc<Database> {
    init_tracing();
    let db = Database::new();
    db.create_table(predicate_schema())
        .expect("create fixture table");
    db.insert(PREDICATE_TABLE, (0..FIXTURE_ROWS).map(predicate_row).collect())
        .expect("insert fixture rows");
    Arc::new(db)
}

/// Schema of the query token fixture table.
pub fn token_schema() -> TableSchema {
    TableSchema::new(TOKEN_TABLE)
        .with_column("_id", ValueType::String)
        .with_column("name", ValueType::String)
        .with_column("time", ValueType::Number)
}

/// A database holding the query token fixture table.
pub fn token_database() -> Arc<Database> {
    init_tracing();
    let db = Database::new();
    db.create_table(token_schema()).expect("create fixture table");
    db.insert(
        TOKEN_TABLE,
        (0..FIXTURE_ROWS)
            .map(|i| {
                Row::new()
                    .with("_id", format!("_id:{i}"))
                    .with("name", format!("name:{i}"))
                    .with("time", i)
            })
            .collect(),
    )
    .expect("insert fixture rows");
    Arc::new(db)
}
