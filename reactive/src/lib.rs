// Life of a query:
// 1. A predicate description is built in code or decoded from JSON
// 2. The compiler normalizes it and resolves its columns against a table
// 3. The compiled predicate filters a select query
// 4. The query is wrapped in a query token, optionally combined with others
// 5. The token is consumed once:
//     - as a snapshot: fetch, transform, concatenate
//     - as a stream: fetch, then recompute on every relevant change
//
// System components:
//  - In-memory storage engine with a change broadcast
//  - Predicate compiler
//  - Query tokens and their stream hubs

pub mod config;
pub mod query;
pub mod storage;
pub mod token;
pub mod types;

#[cfg(test)]
mod testing;

mod e2e_tests;

pub use query::{CompileError, PredicateCompiler, PredicateDescription};
pub use token::{QueryStream, QueryToken, Subscription, TokenError};
