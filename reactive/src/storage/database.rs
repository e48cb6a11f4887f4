//! In-memory reference storage engine.
//!
//! `Database` keeps every table in memory and implements `StorageEngine`.
//! Each mutating call broadcasts one `ChangeNotification` to every
//! registered `ChangeFeed`. There is no persistence.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::broadcast;

use super::engine::{EngineError, StorageEngine};
use super::feed::ChangeFeed;
use super::predicate::Predicate;
use super::schema::TableSchema;
use super::select::{Projection, SelectQuery};
use crate::config::StoreConfig;
use crate::types::{ChangeNotification, ChangeRecord, Row, Value};

struct Table {
    schema: TableSchema,
    rows: Vec<Row>,
}

/// An in-memory database.
///
/// # Invariants
///
/// - Every stored row has a value (possibly null) for every schema column
/// - Non-nullable columns never hold null
/// - Notifications are sent while the write lock is held, so feeds observe
///   them in mutation order
pub struct Database {
    tables: RwLock<HashMap<String, Table>>,
    changes: broadcast::Sender<Arc<ChangeNotification>>,
}

impl Database {
    /// Create an empty database with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&StoreConfig::default())
    }

    /// Create an empty database.
    #[must_use]
    pub fn with_config(config: &StoreConfig) -> Self {
        let (changes, _) = broadcast::channel(config.change_channel_capacity);
        Self {
            tables: RwLock::new(HashMap::new()),
            changes,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Table>>, EngineError> {
        self.tables.read().map_err(|_| EngineError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Table>>, EngineError> {
        self.tables.write().map_err(|_| EngineError::LockPoisoned)
    }

    /// Define a new table.
    pub fn create_table(&self, schema: TableSchema) -> Result<(), EngineError> {
        let mut tables = self.write()?;
        if tables.contains_key(schema.name()) {
            return Err(EngineError::DuplicateTable(schema.name().to_owned()));
        }
        tracing::info!(
            "Created table '{}' with {} columns",
            schema.name(),
            schema.columns().len()
        );
        tables.insert(
            schema.name().to_owned(),
            Table {
                schema,
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    /// Get a copy of a table's schema.
    pub fn schema(&self, table: &str) -> Result<TableSchema, EngineError> {
        let tables = self.read()?;
        tables
            .get(table)
            .map(|t| t.schema.clone())
            .ok_or_else(|| EngineError::UnknownTable(table.to_owned()))
    }

    /// Insert rows. Missing nullable columns are stored as null.
    ///
    /// The batch is validated as a whole; on error nothing is inserted.
    pub fn insert(&self, table: &str, rows: Vec<Row>) -> Result<usize, EngineError> {
        let mut tables = self.write()?;
        let target = tables
            .get_mut(table)
            .ok_or_else(|| EngineError::UnknownTable(table.to_owned()))?;

        let rows = rows
            .into_iter()
            .map(|row| normalize_row(&target.schema, row))
            .collect::<Result<Vec<_>, _>>()?;

        let count = rows.len();
        let changes = rows.iter().cloned().map(ChangeRecord::insert).collect();
        target.rows.extend(rows);
        self.notify(table, changes);
        Ok(count)
    }

    /// Overwrite the columns present in `assignments` on every row that
    /// matches `predicate` (all rows when `None`).
    ///
    /// Returns the number of matched rows. Only rows whose values actually
    /// changed are broadcast.
    pub fn update(
        &self,
        table: &str,
        assignments: &Row,
        predicate: Option<&Predicate>,
    ) -> Result<usize, EngineError> {
        let mut tables = self.write()?;
        let target = tables
            .get_mut(table)
            .ok_or_else(|| EngineError::UnknownTable(table.to_owned()))?;

        for (column, value) in assignments.iter() {
            check_value(&target.schema, column, value)?;
        }

        let mut matched = 0;
        let mut changes = Vec::new();
        for row in &mut target.rows {
            if predicate.is_some_and(|p| !p.eval(row)) {
                continue;
            }
            matched += 1;
            let before = row.clone();
            for (column, value) in assignments.iter() {
                row.set(column.as_str(), value.clone());
            }
            if *row != before {
                changes.push(ChangeRecord::update(before, row.clone()));
            }
        }

        self.notify(table, changes);
        Ok(matched)
    }

    /// Remove every row that matches `predicate` (all rows when `None`).
    pub fn delete(&self, table: &str, predicate: Option<&Predicate>) -> Result<usize, EngineError> {
        let mut tables = self.write()?;
        let target = tables
            .get_mut(table)
            .ok_or_else(|| EngineError::UnknownTable(table.to_owned()))?;

        let (removed, kept): (Vec<Row>, Vec<Row>) = std::mem::take(&mut target.rows)
            .into_iter()
            .partition(|row| predicate.is_none_or(|p| p.eval(row)));
        target.rows = kept;

        let count = removed.len();
        self.notify(table, removed.into_iter().map(ChangeRecord::delete).collect());
        Ok(count)
    }

    /// Execute a query synchronously.
    pub fn select(&self, query: &SelectQuery) -> Result<Vec<Row>, EngineError> {
        let tables = self.read()?;
        let table = tables
            .get(query.table())
            .ok_or_else(|| EngineError::UnknownTable(query.table().to_owned()))?;

        if let Projection::Columns(columns) = &query.shape().projection {
            if let Some(missing) = columns.iter().find(|c| table.schema.get(c).is_none()) {
                return Err(EngineError::UnknownColumn {
                    table: query.table().to_owned(),
                    column: missing.clone(),
                });
            }
        }

        Ok(query.apply(&table.rows))
    }

    /// Number of change feeds currently registered.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.changes.receiver_count()
    }

    fn notify(&self, table: &str, changes: Vec<ChangeRecord>) {
        if changes.is_empty() {
            return;
        }
        tracing::debug!("table '{}': broadcasting {} changes", table, changes.len());
        // Sending fails only when nobody listens, which is not an error.
        let _ = self.changes.send(Arc::new(ChangeNotification {
            table: table.to_owned(),
            changes,
        }));
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine for Database {
    fn fetch(&self, query: &SelectQuery) -> BoxFuture<'static, Result<Vec<Row>, EngineError>> {
        futures::future::ready(self.select(query)).boxed()
    }

    fn observe(&self, query: &SelectQuery) -> Result<ChangeFeed, EngineError> {
        let tables = self.read()?;
        if !tables.contains_key(query.table()) {
            return Err(EngineError::UnknownTable(query.table().to_owned()));
        }
        Ok(ChangeFeed::new(query.clone(), self.changes.subscribe()))
    }
}

fn check_value(schema: &TableSchema, column: &str, value: &Value) -> Result<(), EngineError> {
    let definition = schema.get(column).ok_or_else(|| EngineError::UnknownColumn {
        table: schema.name().to_owned(),
        column: column.to_owned(),
    })?;
    if value.is_null() && !definition.nullable {
        return Err(EngineError::NotNullable {
            column: column.to_owned(),
        });
    }
    if !definition.accepts(value) {
        return Err(EngineError::TypeMismatch {
            column: column.to_owned(),
            expected: definition.value_type,
            found: value.value_type(),
        });
    }
    Ok(())
}

fn normalize_row(schema: &TableSchema, row: Row) -> Result<Row, EngineError> {
    for (column, value) in row.iter() {
        check_value(schema, column, value)?;
    }
    let mut normalized = row;
    for column in schema.columns() {
        if !normalized.contains(&column.name) {
            if !column.nullable {
                return Err(EngineError::NotNullable {
                    column: column.name.clone(),
                });
            }
            normalized.set(column.name.as_str(), Value::Null);
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::ColumnResolver;
    use crate::types::{ChangeType, ValueType};

    fn database() -> Database {
        let db = Database::new();
        db.create_table(
            TableSchema::new("Task")
                .with_column("_id", ValueType::String)
                .with_column("time", ValueType::Number)
                .with_nullable_column("done", ValueType::Boolean),
        )
        .expect("create table");
        db
    }

    fn task(id: i32) -> Row {
        Row::new().with("_id", format!("_id:{id}")).with("time", id)
    }

    #[test]
    fn test_insert_fills_nullable_columns() {
        let db = database();
        assert_eq!(db.insert("Task", vec![task(1)]), Ok(1));
        let rows = db.select(&SelectQuery::from("Task")).expect("select");
        assert_eq!(rows.len(), 1);
        assert!(rows[0].contains("done"));
        assert!(rows[0].get("done").is_null());
    }

    #[test]
    fn test_insert_validates_rows() {
        let db = database();
        assert_eq!(
            db.insert("Nope", vec![task(1)]),
            Err(EngineError::UnknownTable("Nope".to_string()))
        );
        assert!(matches!(
            db.insert("Task", vec![task(1).with("extra", 1)]),
            Err(EngineError::UnknownColumn { .. })
        ));
        assert!(matches!(
            db.insert("Task", vec![task(1).with("time", "late")]),
            Err(EngineError::TypeMismatch { .. })
        ));
        assert!(matches!(
            db.insert("Task", vec![Row::new().with("_id", "x")]),
            Err(EngineError::NotNullable { .. })
        ));
        // Failed batches insert nothing.
        assert!(db.select(&SelectQuery::from("Task")).expect("select").is_empty());
    }

    #[test]
    fn test_duplicate_table() {
        let db = database();
        assert_eq!(
            db.create_table(TableSchema::new("Task")),
            Err(EngineError::DuplicateTable("Task".to_string()))
        );
    }

    #[test]
    fn test_update_and_delete() {
        let db = database();
        db.insert("Task", (0..10).map(task).collect()).expect("insert");
        let time = db.schema("Task").expect("schema").column("time").expect("time");

        let updated = db
            .update("Task", &Row::new().with("done", true), Some(&time.lt(3)))
            .expect("update");
        assert_eq!(updated, 3);

        let done = db.schema("Task").expect("schema").column("done").expect("done");
        let rows = db
            .select(&SelectQuery::from("Task").where_(done.eq(true)))
            .expect("select");
        assert_eq!(rows.len(), 3);

        assert_eq!(db.delete("Task", Some(&time.gte(5))), Ok(5));
        assert_eq!(db.select(&SelectQuery::from("Task")).expect("select").len(), 5);
    }

    #[test]
    fn test_select_rejects_unknown_projection() {
        let db = database();
        assert!(matches!(
            db.select(&SelectQuery::from("Task").columns(["nope"])),
            Err(EngineError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_mutations_broadcast_notifications() {
        let db = database();
        let mut rx = db.changes.subscribe();

        db.insert("Task", vec![task(1)]).expect("insert");
        db.update("Task", &Row::new().with("time", 2), None).expect("update");
        db.delete("Task", None).expect("delete");
        // No matching rows: nothing is broadcast.
        db.delete("Task", None).expect("delete");

        let kinds: Vec<ChangeType> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|n| n.changes[0].change_type)
            .collect();
        assert_eq!(
            kinds,
            vec![ChangeType::Insert, ChangeType::Update, ChangeType::Delete]
        );
    }

    #[test]
    fn test_unchanged_rows_are_not_broadcast() {
        let db = database();
        db.insert("Task", vec![task(1), task(2)]).expect("insert");
        let id = db.schema("Task").expect("schema").column("_id").expect("_id");
        let mut rx = db.changes.subscribe();

        // Matches rows but changes none of them.
        assert_eq!(db.update("Task", &Row::new(), None), Ok(2));
        assert_eq!(
            db.update("Task", &Row::new().with("time", 1), Some(&id.eq("_id:1"))),
            Ok(1)
        );
        assert!(rx.try_recv().is_err());

        // Only the row that changed is reported.
        assert_eq!(db.update("Task", &Row::new().with("time", 2), None), Ok(2));
        let notification = rx.try_recv().expect("one notification");
        assert_eq!(notification.changes.len(), 1);
        assert_eq!(
            notification.changes[0].after.as_ref().map(|r| r.get("_id").clone()),
            Some(Value::string("_id:1"))
        );
    }

    #[tokio::test]
    async fn test_storage_engine_fetch_and_observe() {
        let db = database();
        db.insert("Task", vec![task(1), task(2)]).expect("insert");

        let query = SelectQuery::from("Task").columns(["time"]);
        let rows = db.fetch(&query).await.expect("fetch");
        assert_eq!(rows, vec![Row::new().with("time", 1), Row::new().with("time", 2)]);

        let feed = db.observe(&query).expect("observe");
        assert_eq!(db.listener_count(), 1);
        drop(feed);
        assert_eq!(db.listener_count(), 0);

        assert!(matches!(
            db.observe(&SelectQuery::from("Nope")),
            Err(EngineError::UnknownTable(_))
        ));
    }
}
