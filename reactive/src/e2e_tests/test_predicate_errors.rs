//! End-to-end tests for descriptions that must fail to compile.

use regex::Regex;

use crate::e2e_tests::helpers::desc;
use crate::query::{CompileError, PredicateCompiler, PredicateDescription};
use crate::testing::predicate_schema;

fn compile_error(description: &PredicateDescription) -> CompileError {
    PredicateCompiler::compile(description, &predicate_schema())
        .expect_err("description should not compile")
}

#[test]
fn test_invalid_key_throws() {
    let error = compile_error(&desc().entry("nonExist", "whatever"));
    assert_eq!(
        error.to_string(),
        "Column was not defined in table, nonExist in TestPredicateProvider"
    );
}

#[test]
fn test_unknown_column_nested_in_combinator() {
    let error = compile_error(
        &desc().entry("$or", desc().entry("time1", 1).entry("missing", desc().entry("$lt", 1))),
    );
    assert_eq!(
        error,
        CompileError::UnknownColumn {
            column: "missing".to_string(),
            table: "TestPredicateProvider".to_string(),
        }
    );
}

#[test]
fn test_operator_at_top_level_is_a_column_lookup() {
    let error = compile_error(&desc().entry("$lt", 5));
    assert!(matches!(error, CompileError::UnknownColumn { column, .. } if column == "$lt"));
}

#[test]
fn test_unknown_operator() {
    let error = compile_error(&desc().entry("time1", desc().entry("$regex", "x")));
    assert_eq!(error.to_string(), "unknown operator $regex on column time1");
}

#[test]
fn test_between_needs_two_numbers() {
    let error = compile_error(&desc().entry("time1", desc().entry("$between", [1, 2, 3])));
    assert_eq!(error.to_string(), "$between expects two numbers, got array");
}

#[test]
fn test_pattern_without_operator() {
    let pattern = Regex::new("name").expect("valid pattern");
    let error = compile_error(&desc().entry("name", pattern));
    assert_eq!(error.to_string(), "pattern value for column name needs an operator");
}

#[test]
fn test_first_error_wins() {
    let error = compile_error(
        &desc()
            .entry("time1", desc().entry("$in", 4))
            .entry("missing", 1),
    );
    assert!(matches!(error, CompileError::InvalidOperand { key, .. } if key == "$in"));
}
