//! Consume-once query tokens.
//!
//! A `QueryToken` is a recipe for a result set: one or more constituents,
//! each pairing a `SelectQuery` with the engine that runs it and a transform
//! from rows to the caller's element type. A token is inert until a terminal
//! operation (`snapshot` or `stream`) consumes it; a consumed token rejects
//! every further terminal call.
//!
//! # Invariants
//!
//! - A token transitions `inert → consumed` at most once, atomically.
//! - All constituents share one shape (table and projection).
//! - Results concatenate constituent outputs in constituent order.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future;

use super::error::{TokenError, TransformError};
use super::stream::QueryStream;
use crate::storage::{QueryShape, SelectQuery, StorageEngine};
use crate::types::Row;

type TransformFn<T> = dyn Fn(Vec<Row>) -> Result<Vec<T>, TransformError> + Send + Sync;

/// One query inside a token, with its engine and transform.
pub(crate) struct Constituent<T> {
    engine: Arc<dyn StorageEngine>,
    query: SelectQuery,
    transform: Arc<TransformFn<T>>,
}

impl<T> Constituent<T> {
    pub(crate) fn query(&self) -> &SelectQuery {
        &self.query
    }

    pub(crate) fn engine(&self) -> &dyn StorageEngine {
        self.engine.as_ref()
    }

    /// Fetch the query's rows and transform them.
    pub(crate) async fn evaluate(&self) -> Result<Vec<T>, TokenError> {
        let rows = self.engine.fetch(&self.query).await?;
        Ok((self.transform)(rows)?)
    }
}

/// A consume-once handle on one or more queries of the same shape.
pub struct QueryToken<T> {
    constituents: Vec<Arc<Constituent<T>>>,
    shape: QueryShape,
    consumed: AtomicBool,
}

impl QueryToken<Row> {
    /// A token that yields the query's rows unchanged.
    #[must_use]
    pub fn new(engine: Arc<dyn StorageEngine>, query: SelectQuery) -> Self {
        Self::try_with_transform(engine, query, Ok)
    }
}

impl<T: Send + Sync + 'static> QueryToken<T> {
    /// A token that maps the query's rows through `transform`.
    #[must_use]
    pub fn with_transform(
        engine: Arc<dyn StorageEngine>,
        query: SelectQuery,
        transform: impl Fn(Vec<Row>) -> Vec<T> + Send + Sync + 'static,
    ) -> Self {
        Self::try_with_transform(engine, query, move |rows| Ok(transform(rows)))
    }

    /// A token whose transform may fail.
    #[must_use]
    pub fn try_with_transform(
        engine: Arc<dyn StorageEngine>,
        query: SelectQuery,
        transform: impl Fn(Vec<Row>) -> Result<Vec<T>, TransformError> + Send + Sync + 'static,
    ) -> Self {
        let shape = query.shape().clone();
        Self {
            constituents: vec![Arc::new(Constituent {
                engine,
                query,
                transform: Arc::new(transform),
            })],
            shape,
            consumed: AtomicBool::new(false),
        }
    }

    /// The shape shared by every constituent.
    #[must_use]
    pub const fn shape(&self) -> &QueryShape {
        &self.shape
    }

    #[must_use]
    pub fn constituent_count(&self) -> usize {
        self.constituents.len()
    }

    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.consumed.load(Ordering::Acquire)
    }

    /// Combine this token with others of the same shape.
    ///
    /// The result holds this token's constituents followed by each operand's
    /// constituents, in argument order. Nesting flattens, so
    /// `a.combine(&[&b.combine(&[&c])?])` and `a.combine(&[&b, &c])` produce
    /// the same constituent list. The result is a fresh, inert token; the
    /// operands are not consumed.
    pub fn combine(&self, others: &[&Self]) -> Result<Self, TokenError> {
        let mut constituents = self.constituents.clone();
        for other in others {
            if other.shape != self.shape {
                return Err(TokenError::Incompatible {
                    expected: self.shape.clone(),
                    found: other.shape.clone(),
                });
            }
            constituents.extend(other.constituents.iter().cloned());
        }
        Ok(Self {
            constituents,
            shape: self.shape.clone(),
            consumed: AtomicBool::new(false),
        })
    }

    /// Fetch the current result once.
    ///
    /// The token is consumed when this is called, not when the returned
    /// future is first polled. Constituents are fetched concurrently and
    /// their outputs concatenated in order.
    pub fn snapshot(&self) -> impl Future<Output = Result<Vec<T>, TokenError>> + Send + 'static {
        let consumed = self.consume("snapshot");
        let constituents = self.constituents.clone();
        async move {
            consumed?;
            let parts =
                future::try_join_all(constituents.iter().map(|c| c.evaluate())).await?;
            Ok(parts.into_iter().flatten().collect())
        }
    }

    /// Mark the token consumed, failing if it already was.
    fn consume(&self, operation: &str) -> Result<(), TokenError> {
        if self.consumed.swap(true, Ordering::AcqRel) {
            return Err(TokenError::Consumed);
        }
        tracing::debug!("query token for '{}' consumed by {operation}", self.shape);
        Ok(())
    }
}

impl<T: Clone + Send + Sync + 'static> QueryToken<T> {
    /// Turn the token into a shareable, lazily-started stream of results.
    ///
    /// Nothing is registered with the engine until the first
    /// [`QueryStream::subscribe`].
    pub fn stream(&self) -> Result<QueryStream<T>, TokenError> {
        self.consume("stream")?;
        Ok(QueryStream::new(self.shape.clone(), self.constituents.clone()))
    }
}

impl<T> std::fmt::Debug for QueryToken<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryToken")
            .field("shape", &self.shape)
            .field("constituents", &self.constituents.len())
            .field("consumed", &self.consumed.load(Ordering::Acquire))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ColumnResolver, Database, Order, TableSchema};
    use crate::types::ValueType;

    fn database() -> Arc<Database> {
        let db = Database::new();
        db.create_table(
            TableSchema::new("Task")
                .with_column("_id", ValueType::String)
                .with_column("time", ValueType::Number),
        )
        .expect("create table");
        db.insert(
            "Task",
            (0..10)
                .map(|i| Row::new().with("_id", format!("task:{i}")).with("time", i))
                .collect(),
        )
        .expect("insert");
        Arc::new(db)
    }

    fn time_between(db: &Database, low: i32, high: i32) -> SelectQuery {
        let time = db.schema("Task").expect("schema").column("time").expect("time");
        SelectQuery::from("Task").where_(time.between(low, high))
    }

    #[tokio::test]
    async fn test_snapshot_consumes_token() {
        let db = database();
        let token = QueryToken::new(db.clone(), time_between(&db, 2, 4));
        assert!(!token.is_consumed());

        let rows = token.snapshot().await.expect("snapshot");
        assert_eq!(rows.len(), 3);
        assert!(token.is_consumed());

        assert_eq!(token.snapshot().await, Err(TokenError::Consumed));
        assert!(matches!(token.stream(), Err(TokenError::Consumed)));
    }

    #[tokio::test]
    async fn test_snapshot_consumes_before_polling() {
        let db = database();
        let token = QueryToken::new(db.clone(), time_between(&db, 0, 1));
        let pending = token.snapshot();
        assert!(token.is_consumed());
        assert_eq!(pending.await.expect("snapshot").len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_honours_order_and_paging() {
        let db = database();
        let query = SelectQuery::from("Task")
            .order_by("time", Order::Descending)
            .skip(1)
            .limit(2);
        let token = QueryToken::with_transform(db.clone(), query, |rows| {
            rows.iter()
                .filter_map(|r| r.get("time").as_number())
                .collect::<Vec<_>>()
        });
        assert_eq!(token.snapshot().await.expect("snapshot"), vec![8.0, 7.0]);
    }

    #[tokio::test]
    async fn test_transform_failure_surfaces() {
        let db = database();
        let token: QueryToken<Row> = QueryToken::try_with_transform(
            db.clone(),
            time_between(&db, 0, 3),
            |_| Err(TransformError::new("boom")),
        );
        assert_eq!(
            token.snapshot().await,
            Err(TokenError::Transform(TransformError::new("boom")))
        );
    }

    #[tokio::test]
    async fn test_unknown_table_surfaces_engine_error() {
        let db = database();
        let token = QueryToken::new(db, SelectQuery::from("Missing"));
        assert!(matches!(
            token.snapshot().await,
            Err(TokenError::Engine(crate::storage::EngineError::UnknownTable(table))) if table == "Missing"
        ));
    }

    #[tokio::test]
    async fn test_combine_concatenates_in_order_without_consuming() {
        let db = database();
        let low = QueryToken::new(db.clone(), time_between(&db, 0, 1));
        let high = QueryToken::new(db.clone(), time_between(&db, 8, 9));

        let combined = high.combine(&[&low]).expect("same shape");
        assert_eq!(combined.constituent_count(), 2);
        assert!(!low.is_consumed());
        assert!(!high.is_consumed());

        let ids: Vec<String> = combined
            .snapshot()
            .await
            .expect("snapshot")
            .iter()
            .filter_map(|r| r.get("_id").as_str().map(str::to_string))
            .collect();
        assert_eq!(ids, vec!["task:8", "task:9", "task:0", "task:1"]);

        // Operands stay usable.
        assert_eq!(low.snapshot().await.expect("snapshot").len(), 2);
    }

    #[test]
    fn test_combine_rejects_different_projection() {
        let db = database();
        let all = QueryToken::new(db.clone(), SelectQuery::from("Task"));
        let ids = QueryToken::new(db, SelectQuery::from("Task").columns(["_id"]));
        let error = all.combine(&[&ids]).expect_err("different shape");
        assert!(matches!(error, TokenError::Incompatible { .. }));
    }

    #[test]
    fn test_combine_flattens() {
        let db = database();
        let token = || QueryToken::new(db.clone(), SelectQuery::from("Task"));
        let (a, b, c) = (token(), token(), token());
        let nested = a.combine(&[&b.combine(&[&c]).expect("bc")]).expect("a(bc)");
        let flat = a.combine(&[&b, &c]).expect("abc");
        assert_eq!(nested.constituent_count(), 3);
        assert_eq!(flat.constituent_count(), 3);
        for (x, y) in nested.constituents.iter().zip(&flat.constituents) {
            assert!(Arc::ptr_eq(x, y));
        }
    }
}
