//! End-to-end tests for one-shot token snapshots.

use crate::e2e_tests::helpers::{desc, folded_token, name_of};
use crate::query::PredicateCompiler;
use crate::storage::{Order, SelectQuery};
use crate::testing::{FIXTURE_ROWS, TOKEN_TABLE, token_database, token_schema};
use crate::token::{QueryToken, TokenError};

#[tokio::test]
async fn test_values_are_folded() {
    let db = token_database();
    let token = folded_token(db, 50, FIXTURE_ROWS, "true");

    let values = token.snapshot().await.expect("snapshot");
    assert_eq!(values.len(), 950);
    assert!(values.iter().all(|v| v.get("folded").as_str() == Some("true")));
}

#[tokio::test]
async fn test_reconsume_throws() {
    let db = token_database();
    let token = folded_token(db, 50, FIXTURE_ROWS, "true");

    token.snapshot().await.expect("first snapshot");
    assert_eq!(token.snapshot().await, Err(TokenError::Consumed));
    assert_eq!(
        token.stream().map(|_| ()).expect_err("stream after snapshot"),
        TokenError::Consumed
    );
}

#[tokio::test]
async fn test_stream_then_snapshot_throws() {
    let db = token_database();
    let token = folded_token(db, 50, FIXTURE_ROWS, "true");

    let _stream = token.stream().expect("stream");
    assert!(token.is_consumed());
    assert_eq!(token.snapshot().await, Err(TokenError::Consumed));
}

#[tokio::test]
async fn test_snapshot_of_compiled_description() {
    let db = token_database();
    let description = desc()
        .entry("time", desc().entry("$between", [10, 19]))
        .entry("$not", desc().entry("name", "name:12"));
    let predicate =
        PredicateCompiler::compile(&description, &token_schema()).expect("compiles");
    let query = SelectQuery::from(TOKEN_TABLE)
        .filter(predicate)
        .order_by("time", Order::Descending)
        .limit(3);

    let token = QueryToken::with_transform(db, query, |rows| {
        rows.iter().map(|row| name_of(row).to_string()).collect()
    });
    assert_eq!(
        token.snapshot().await.expect("snapshot"),
        vec!["name:19", "name:18", "name:17"]
    );
}

#[tokio::test]
async fn test_projection_limits_columns() {
    let db = token_database();
    let token = QueryToken::new(db, SelectQuery::from(TOKEN_TABLE).columns(["_id"]).skip(998));
    let rows = token.snapshot().await.expect("snapshot");
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.len() == 1 && row.contains("_id")));
}

#[tokio::test]
async fn test_unknown_projected_column_is_an_engine_error() {
    let db = token_database();
    let token = QueryToken::new(db, SelectQuery::from(TOKEN_TABLE).columns(["missing"]));
    assert!(matches!(token.snapshot().await, Err(TokenError::Engine(_))));
}
