//! End-to-end tests for live token streams.

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::e2e_tests::helpers::{assert_quiet, folded_token, name_of, next_rows, rename};
use crate::storage::{ColumnResolver, Database, Order, SelectQuery};
use crate::testing::{FIXTURE_ROWS, TOKEN_TABLE, token_database, token_schema};
use crate::token::QueryToken;
use crate::types::Row;

#[tokio::test]
async fn test_observe_change() {
    let db = token_database();
    let stream = folded_token(db.clone(), 50, FIXTURE_ROWS, "true")
        .stream()
        .expect("stream");
    let mut changes = stream.subscribe().expect("subscribe");

    let initial = next_rows(&mut changes).await;
    assert_eq!(initial.len(), 950);

    rename(&db, "_id:50", "test name change");
    let rows = next_rows(&mut changes).await;
    assert_eq!(name_of(&rows[0]), "test name change");
    assert_eq!(rows[0].get("folded").as_str(), Some("true"));
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let db = token_database();
    let stream = folded_token(db.clone(), 50, FIXTURE_ROWS, "true")
        .stream()
        .expect("stream");
    let mut leaving = stream.subscribe().expect("subscribe");
    let mut staying = stream.subscribe().expect("subscribe");
    next_rows(&mut leaving).await;
    next_rows(&mut staying).await;

    leaving.unsubscribe();
    assert_eq!(stream.observer_count(), 1);
    assert!(stream.is_running());

    rename(&db, "_id:50", "test name change");
    let rows = next_rows(&mut staying).await;
    assert_eq!(name_of(&rows[0]), "test name change");
}

#[tokio::test]
async fn test_last_observer_releases_listeners() {
    let db = token_database();
    let stream = folded_token(db.clone(), 50, FIXTURE_ROWS, "true")
        .stream()
        .expect("stream");
    assert_eq!(db.listener_count(), 0);

    let mut changes = stream.subscribe().expect("subscribe");
    assert_eq!(db.listener_count(), 1);
    next_rows(&mut changes).await;

    drop(changes);
    assert!(!stream.is_running());
    assert_eq!(db.listener_count(), 0);
}

#[tokio::test]
async fn test_resubscribe_restarts_engine_subscription() {
    let db = token_database();
    let stream = folded_token(db.clone(), 50, FIXTURE_ROWS, "true")
        .stream()
        .expect("stream");

    let mut first = stream.subscribe().expect("subscribe");
    next_rows(&mut first).await;
    drop(first);
    assert_eq!(db.listener_count(), 0);

    // Changed while nobody was watching.
    rename(&db, "_id:50", "renamed while idle");

    let mut second = stream.subscribe().expect("subscribe");
    assert!(stream.is_running());
    assert_eq!(db.listener_count(), 1);
    let rows = next_rows(&mut second).await;
    assert_eq!(name_of(&rows[0]), "renamed while idle");
}

#[tokio::test]
async fn test_late_observer_gets_latest_value_first() {
    let db = token_database();
    let stream = folded_token(db.clone(), 50, FIXTURE_ROWS, "true")
        .stream()
        .expect("stream");
    let mut early = stream.subscribe().expect("subscribe");
    next_rows(&mut early).await;

    rename(&db, "_id:50", "first");
    next_rows(&mut early).await;

    let mut late = stream.clone().subscribe().expect("subscribe");
    assert_eq!(stream.observer_count(), 2);
    assert_eq!(name_of(&next_rows(&mut late).await[0]), "first");

    rename(&db, "_id:50", "second");
    assert_eq!(name_of(&next_rows(&mut early).await[0]), "second");
    assert_eq!(name_of(&next_rows(&mut late).await[0]), "second");
}

#[tokio::test]
async fn test_irrelevant_changes_do_not_emit() {
    let db = token_database();
    let stream = folded_token(db.clone(), 50, FIXTURE_ROWS, "true")
        .stream()
        .expect("stream");
    let mut changes = stream.subscribe().expect("subscribe");
    next_rows(&mut changes).await;

    // Outside the filter.
    rename(&db, "_id:10", "not watched");
    assert_quiet(&mut changes).await;

    // Inside the filter, but not projected.
    let ids = QueryToken::new(db.clone(), SelectQuery::from(TOKEN_TABLE).columns(["_id", "time"]))
        .stream()
        .expect("stream");
    let mut id_changes = ids.subscribe().expect("subscribe");
    next_rows(&mut id_changes).await;
    rename(&db, "_id:60", "renamed");
    assert_eq!(name_of(&next_rows(&mut changes).await[10]), "renamed");
    assert_quiet(&mut id_changes).await;
}

#[tokio::test]
async fn test_inserts_and_deletes_emit() {
    let db = token_database();
    let stream = folded_token(db.clone(), 50, FIXTURE_ROWS + 10, "true")
        .stream()
        .expect("stream");
    let mut changes = stream.subscribe().expect("subscribe");
    assert_eq!(next_rows(&mut changes).await.len(), 950);

    db.insert(
        TOKEN_TABLE,
        vec![
            Row::new()
                .with("_id", "_id:extra")
                .with("name", "extra")
                .with("time", FIXTURE_ROWS),
        ],
    )
    .expect("insert");
    assert_eq!(next_rows(&mut changes).await.len(), 951);

    let time = token_schema().column("time").expect("time column");
    db.delete(TOKEN_TABLE, Some(&time.gte(900))).expect("delete");
    assert_eq!(next_rows(&mut changes).await.len(), 850);
}

#[tokio::test]
async fn test_lagging_feed_still_converges() {
    let db = Arc::new(Database::with_config(&StoreConfig {
        change_channel_capacity: 1,
    }));
    db.create_table(token_schema()).expect("create table");
    db.insert(
        TOKEN_TABLE,
        vec![Row::new().with("_id", "_id:0").with("name", "name:0").with("time", 0)],
    )
    .expect("insert");

    let stream = QueryToken::new(db.clone(), SelectQuery::from(TOKEN_TABLE))
        .stream()
        .expect("stream");
    let mut changes = stream.subscribe().expect("subscribe");
    next_rows(&mut changes).await;

    for i in 1..=5 {
        rename(&db, "_id:0", &format!("rename {i}"));
    }

    loop {
        let rows = next_rows(&mut changes).await;
        if name_of(&rows[0]) == "rename 5" {
            break;
        }
    }
}

#[tokio::test]
async fn test_sort_key_change_reorders_stream() {
    let db = token_database();
    let query = SelectQuery::from(TOKEN_TABLE)
        .columns(["_id"])
        .order_by("time", Order::Ascending);
    let stream = QueryToken::new(db.clone(), query.clone())
        .stream()
        .expect("stream");
    let mut changes = stream.subscribe().expect("subscribe");
    let initial = next_rows(&mut changes).await;
    assert_eq!(initial[0].get("_id").as_str(), Some("_id:0"));

    let schema = token_schema();
    let last = schema.column("_id").expect("_id column").eq("_id:999");
    db.update(TOKEN_TABLE, &Row::new().with("time", -1), Some(&last))
        .expect("update");

    let rows = next_rows(&mut changes).await;
    assert_eq!(rows[0].get("_id").as_str(), Some("_id:999"));
    assert_eq!(rows, db.select(&query).expect("select"));
}
