//! End-to-end tests from predicate descriptions to streamed results.
//!
//! Each test file covers a specific scenario against the in-memory engine
//! and the shared fixture tables.

#![cfg(test)]

mod helpers;

mod test_predicate_errors;
mod test_predicate_json;
mod test_predicate_operators;
mod test_predicate_oracle;
mod test_token_combine;
mod test_token_snapshot;
mod test_token_stream;
mod test_token_stream_failure;
