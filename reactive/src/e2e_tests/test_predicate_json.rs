//! End-to-end tests for descriptions decoded from JSON.

use crate::e2e_tests::helpers::{desc, numbers, select_predicate_rows};
use crate::query::{PredicateCompiler, PredicateDescription};
use crate::testing::{predicate_database, predicate_schema};

fn parse(json: &str) -> PredicateDescription {
    serde_json::from_str(json).expect("valid description")
}

#[test]
fn test_json_matches_builder() {
    let db = predicate_database();
    let from_json = parse(
        r#"{
            "time1": {"$or": {"$gte": 950, "$lt": 50}},
            "time2": {"$and": {"$gte": 500, "$lt": 1000}},
            "name": {"$match": ":(\\d{0,1}1$)"}
        }"#,
    );
    let built = desc()
        .entry("time1", desc().entry("$or", desc().entry("$gte", 950).entry("$lt", 50)))
        .entry("time2", desc().entry("$and", desc().entry("$gte", 500).entry("$lt", 1000)))
        .entry(
            "name",
            desc().entry("$match", regex::Regex::new(r":(\d{0,1}1$)").expect("valid pattern")),
        );

    let json_rows = select_predicate_rows(&db, &from_json);
    assert_eq!(json_rows, select_predicate_rows(&db, &built));
    assert_eq!(json_rows.len(), 5);

    let compiled = |d: &PredicateDescription| {
        PredicateCompiler::compile(d, &predicate_schema())
            .expect("compiles")
            .map(|p| p.to_string())
    };
    assert_eq!(compiled(&from_json), compiled(&built));
}

#[test]
fn test_json_literals_and_arrays() {
    let db = predicate_database();
    let rows = select_predicate_rows(
        &db,
        &parse(r#"{"time1": {"$in": [10, 20, 30, 10000]}, "nullable": false}"#),
    );
    assert_eq!(numbers(&rows, "time1"), vec![10.0, 20.0, 30.0]);
}

#[test]
fn test_json_not_uses_document_order() {
    let db = predicate_database();
    // Keys are out of alphabetical order; only the first child is negated.
    let rows = select_predicate_rows(&db, &parse(r#"{"$not": {"time2": 1000, "time1": 5}}"#));
    assert_eq!(rows.len(), 999);
    assert!(!numbers(&rows, "time1").contains(&0.0));
}

#[test]
fn test_json_string_literal() {
    let db = predicate_database();
    let rows = select_predicate_rows(&db, &parse(r#"{"_id": "_id:42"}"#));
    assert_eq!(numbers(&rows, "time1"), vec![42.0]);
}

#[test]
fn test_json_invalid_pattern_is_a_decode_error() {
    let result = serde_json::from_str::<PredicateDescription>(r#"{"name": {"$notMatch": "[a-"}}"#);
    assert!(result.is_err());
}
