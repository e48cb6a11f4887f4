//! Query tokens: consume-once handles on query results.
//!
//! A token is built from one query, optionally combined with other tokens
//! of the same shape, and then consumed exactly once, either as a one-shot
//! [`QueryToken::snapshot`] or as a live [`QueryToken::stream`].
//!
//! ```
//! use std::sync::Arc;
//!
//! use futures::StreamExt;
//! use reactive::storage::{Database, SelectQuery, TableSchema};
//! use reactive::token::QueryToken;
//! use reactive::types::{Row, ValueType};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Arc::new(Database::new());
//! db.create_table(TableSchema::new("Task").with_column("time", ValueType::Number))?;
//!
//! let stream = QueryToken::new(db.clone(), SelectQuery::from("Task")).stream()?;
//! let mut observer = stream.subscribe()?;
//! assert_eq!(observer.next().await, Some(Ok(Vec::new())));
//!
//! db.insert("Task", vec![Row::new().with("time", 1)])?;
//! assert_eq!(observer.next().await.map(|r| r.map(|rows| rows.len())), Some(Ok(1)));
//! # Ok(())
//! # }
//! ```

mod error;
mod query_token;
mod stream;

pub use error::{RecomputeError, TokenError, TransformError};
pub use query_token::QueryToken;
pub use stream::{QueryStream, Subscription};
