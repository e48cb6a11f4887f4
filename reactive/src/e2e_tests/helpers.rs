//! Common helpers for end-to-end tests.

#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::{self, BoxFuture};
use futures::{FutureExt, StreamExt};

use crate::query::{PredicateCompiler, PredicateDescription};
use crate::storage::{
    ChangeFeed, ColumnResolver, Database, EngineError, Predicate, SelectQuery, StorageEngine,
};
use crate::testing::{PREDICATE_TABLE, TOKEN_TABLE, predicate_schema, token_schema};
use crate::token::{QueryToken, Subscription, TokenError};
use crate::types::Row;

/// How long a test waits for an expected emission.
const EMISSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Shorthand for an empty description.
pub fn desc() -> PredicateDescription {
    PredicateDescription::new()
}

/// Compile a description against the predicate fixture and select with it.
pub fn select_predicate_rows(db: &Database, description: &PredicateDescription) -> Vec<Row> {
    let predicate =
        PredicateCompiler::compile(description, &predicate_schema()).expect("description compiles");
    db.select(&SelectQuery::from(PREDICATE_TABLE).filter(predicate))
        .expect("select succeeds")
}

/// The numeric value of `column` in each row.
pub fn numbers(rows: &[Row], column: &str) -> Vec<f64> {
    rows.iter()
        .map(|row| row.get(column).as_number().expect("numeric column"))
        .collect()
}

/// A query on the token fixture table with `time` in `[low, high)`.
pub fn time_range(low: i32, high: i32) -> SelectQuery {
    let time = token_schema().column("time").expect("time column");
    SelectQuery::from(TOKEN_TABLE).where_(Predicate::and(vec![
        time.gte(low),
        time.lt(high),
    ]))
}

/// A token over `time_range` whose transform tags every row with `folded`.
pub fn folded_token(engine: Arc<dyn StorageEngine>, low: i32, high: i32, tag: &str) -> QueryToken<Row> {
    let tag = tag.to_string();
    QueryToken::with_transform(engine, time_range(low, high), move |rows| {
        rows.into_iter()
            .map(|row| row.with("folded", tag.as_str()))
            .collect()
    })
}

/// Rename the token fixture row with the given `_id`.
pub fn rename(db: &Database, id: &str, name: &str) {
    let target = token_schema().column("_id").expect("_id column").eq(id);
    let updated = db
        .update(TOKEN_TABLE, &Row::new().with("name", name), Some(&target))
        .expect("update succeeds");
    assert_eq!(updated, 1);
}

/// Wait for the next emission, failing the test if none arrives in time.
pub async fn next_emission<T>(
    subscription: &mut Subscription<T>,
) -> Option<Result<Vec<T>, TokenError>> {
    tokio::time::timeout(EMISSION_TIMEOUT, subscription.next())
        .await
        .expect("emission arrives in time")
}

/// Wait for the next emission and unwrap its rows.
pub async fn next_rows<T>(subscription: &mut Subscription<T>) -> Vec<T> {
    next_emission(subscription)
        .await
        .expect("stream still open")
        .expect("emission is not an error")
}

/// Assert that nothing is emitted for a short while.
pub async fn assert_quiet<T: std::fmt::Debug>(subscription: &mut Subscription<T>) {
    let waited = tokio::time::timeout(Duration::from_millis(50), subscription.next()).await;
    assert!(waited.is_err(), "unexpected emission: {waited:?}");
}

/// The `name` column of a row.
pub fn name_of(row: &Row) -> &str {
    row.get("name").as_str().expect("name is a string")
}

/// A storage engine whose fetches can be made to fail on demand.
pub struct FlakyEngine {
    inner: Arc<Database>,
    failing: AtomicBool,
}

impl FlakyEngine {
    pub fn new(inner: Arc<Database>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failing: AtomicBool::new(false),
        })
    }

    /// Make every later fetch fail.
    pub fn fail_fetches(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

impl StorageEngine for FlakyEngine {
    fn fetch(&self, query: &SelectQuery) -> BoxFuture<'static, Result<Vec<Row>, EngineError>> {
        if self.failing.load(Ordering::SeqCst) {
            return future::ready(Err(EngineError::LockPoisoned)).boxed();
        }
        self.inner.fetch(query)
    }

    fn observe(&self, query: &SelectQuery) -> Result<ChangeFeed, EngineError> {
        self.inner.observe(query)
    }
}
