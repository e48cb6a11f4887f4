//! End-to-end tests for combining tokens of the same shape.

use crate::e2e_tests::helpers::{folded_token, name_of, next_rows, rename};
use crate::storage::SelectQuery;
use crate::testing::{TOKEN_TABLE, token_database};
use crate::token::{QueryToken, TokenError};
use crate::types::Row;

/// Four tokens over `[0, 50)`, `[50, 100)`, `[100, 150)` and `[150, 200)`,
/// combined as `(1 + 2) + (3, 4)`.
fn combined(db: &std::sync::Arc<crate::storage::Database>) -> QueryToken<Row> {
    let first = folded_token(db.clone(), 0, 50, "true1");
    let second = folded_token(db.clone(), 50, 100, "true2");
    let first_and_second = first.combine(&[&second]).expect("same shape");

    let third = folded_token(db.clone(), 100, 150, "true3");
    let fourth = folded_token(db.clone(), 150, 200, "true3");
    first_and_second
        .combine(&[&third, &fourth])
        .expect("same shape")
}

#[tokio::test]
async fn test_combined_snapshot_holds_all_results() {
    let db = token_database();
    let dist = combined(&db);
    assert_eq!(dist.constituent_count(), 4);

    let rows = dist.snapshot().await.expect("snapshot");
    assert_eq!(rows.len(), 200);
    let times: Vec<f64> = rows.iter().filter_map(|r| r.get("time").as_number()).collect();
    let expected: Vec<f64> = (0..200).map(f64::from).collect();
    assert_eq!(times, expected);
    assert_eq!(rows[49].get("folded").as_str(), Some("true1"));
    assert_eq!(rows[50].get("folded").as_str(), Some("true2"));
    assert_eq!(rows[199].get("folded").as_str(), Some("true3"));
}

#[tokio::test]
async fn test_combined_stream_keeps_indices_stable() {
    let db = token_database();
    let stream = combined(&db).stream().expect("stream");
    let mut changes = stream.subscribe().expect("subscribe");
    assert_eq!(next_rows(&mut changes).await.len(), 200);
    assert_eq!(db.listener_count(), 4);

    rename(&db, "_id:15", "test update name 1");
    let rows = next_rows(&mut changes).await;
    assert_eq!(name_of(&rows[15]), "test update name 1");

    rename(&db, "_id:55", "test update name 2");
    let rows = next_rows(&mut changes).await;
    assert_eq!(name_of(&rows[55]), "test update name 2");
    assert_eq!(name_of(&rows[15]), "test update name 1");

    rename(&db, "_id:125", "test update name 3");
    let rows = next_rows(&mut changes).await;
    assert_eq!(rows.len(), 200);
    assert_eq!(name_of(&rows[125]), "test update name 3");
}

#[test]
fn test_combine_with_different_projection_throws() {
    let db = token_database();
    let dist = combined(&db);
    let different = QueryToken::new(db, SelectQuery::from(TOKEN_TABLE).columns(["_id"]));

    let error = dist.combine(&[&different]).expect_err("different shape");
    let TokenError::Incompatible { expected, found } = &error else {
        panic!("expected an incompatible-shape error, got {error}");
    };
    assert_eq!(expected, dist.shape());
    assert_eq!(found, different.shape());
}

#[test]
fn test_combine_with_different_table_throws() {
    let db = token_database();
    let dist = combined(&db);
    let other = QueryToken::new(db, SelectQuery::from("Other"));
    assert!(matches!(
        dist.combine(&[&other]),
        Err(TokenError::Incompatible { .. })
    ));
}

#[tokio::test]
async fn test_combining_consumed_tokens_yields_fresh_token() {
    let db = token_database();
    let first = folded_token(db.clone(), 0, 2, "a");
    let second = folded_token(db, 2, 4, "b");
    first.snapshot().await.expect("snapshot");

    let both = first.combine(&[&second]).expect("same shape");
    assert!(!both.is_consumed());
    assert_eq!(both.snapshot().await.expect("snapshot").len(), 4);
    assert!(!second.is_consumed());
}
