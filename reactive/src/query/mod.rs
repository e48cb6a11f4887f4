//! Predicate descriptions and their compilation to engine predicates.
//!
//! ```
//! use reactive::query::{PredicateCompiler, PredicateDescription};
//! use reactive::storage::TableSchema;
//! use reactive::types::ValueType;
//!
//! let schema = TableSchema::new("Task").with_column("time", ValueType::Number);
//! let description = PredicateDescription::new()
//!     .entry("time", PredicateDescription::new().entry("$between", [1, 20]));
//! let predicate = PredicateCompiler::compile(&description, &schema)?;
//! assert_eq!(predicate.map(|p| p.to_string()).as_deref(), Some("Task.time BETWEEN 1 AND 20"));
//! # Ok::<(), reactive::query::CompileError>(())
//! ```

pub mod ast;
mod compiler;
mod description;
mod error;

pub use compiler::PredicateCompiler;
pub use description::{DescriptionValue, PredicateDescription, ValueLiteral};
pub use error::CompileError;
