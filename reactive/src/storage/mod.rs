//! In-memory storage engine and the capability surface the query layer uses.
//!
//! # Usage
//!
//! ```
//! use reactive::storage::{ColumnResolver, Database, SelectQuery, TableSchema};
//! use reactive::types::{Row, ValueType};
//!
//! let db = Database::new();
//! db.create_table(
//!     TableSchema::new("Task")
//!         .with_column("_id", ValueType::String)
//!         .with_column("time", ValueType::Number),
//! )?;
//! db.insert("Task", vec![Row::new().with("_id", "a").with("time", 3)])?;
//!
//! let time = db.schema("Task")?.column("time").expect("time is defined");
//! let rows = db.select(&SelectQuery::from("Task").where_(time.gt(1)))?;
//! assert_eq!(rows.len(), 1);
//! # Ok::<(), reactive::storage::EngineError>(())
//! ```

mod database;
mod engine;
mod feed;
mod predicate;
mod schema;
mod select;

pub use database::Database;
pub use engine::{EngineError, StorageEngine};
pub use feed::{ChangeFeed, FeedClosed, ListenerHandle};
pub use predicate::{CompareOp, Predicate};
pub use schema::{Column, ColumnResolver, TableSchema};
pub use select::{Order, Projection, QueryShape, SelectQuery};
