//! Randomized check of the compiler against a direct interpreter.
//!
//! Descriptions are generated from a fixed seed, compiled, and evaluated on
//! every fixture row. A small interpreter that walks the description itself
//! provides the expected answer.

use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;

use crate::query::{DescriptionValue, PredicateCompiler, PredicateDescription, ValueLiteral};
use crate::testing::{FIXTURE_ROWS, predicate_row, predicate_schema};
use crate::types::{Row, Value};

const SEED: u64 = 0x5eed_cafe;
const DESCRIPTIONS: usize = 200;
const MAX_DEPTH: u32 = 3;

const NUMBER_COLUMNS: [&str; 2] = ["time1", "time2"];
const TEXT_COLUMNS: [&str; 2] = ["_id", "name"];
const PATTERNS: [&str; 4] = [r":(\d{0,1}1$)", r"^name:9", r"7", r":\d\d$"];

fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
    items[rng.random_range(0..items.len())]
}

fn random_column(rng: &mut StdRng) -> &'static str {
    match rng.random_range(0..5) {
        0 | 1 => pick(rng, &NUMBER_COLUMNS),
        2 | 3 => pick(rng, &TEXT_COLUMNS),
        _ => "nullable",
    }
}

fn random_literal(rng: &mut StdRng, column: &str) -> ValueLiteral {
    match column {
        "time1" | "time2" => ValueLiteral::Number(f64::from(rng.random_range(0..FIXTURE_ROWS + 5))),
        "_id" | "name" => ValueLiteral::Text(format!("{column}:{}", rng.random_range(0..FIXTURE_ROWS))),
        _ => ValueLiteral::Boolean(rng.random_bool(0.5)),
    }
}

fn random_operator(rng: &mut StdRng, column: &str) -> (String, DescriptionValue) {
    let comparisons = ["$eq", "$ne", "$lt", "$lte", "$gt", "$gte"];
    let key = match (column, rng.random_range(0..10)) {
        (_, 0) => "$isNull",
        (_, 1) => "$in",
        ("time1" | "time2", 2) => "$between",
        ("_id" | "name", 2 | 3) => {
            if rng.random_bool(0.5) {
                "$match"
            } else {
                "$notMatch"
            }
        }
        _ => pick(rng, &comparisons),
    };

    let value = match key {
        "$isNull" => DescriptionValue::from(rng.random_bool(0.5)),
        "$in" => {
            let len = rng.random_range(1..5);
            DescriptionValue::Array((0..len).map(|_| random_literal(rng, column)).collect())
        }
        "$between" => {
            let low = rng.random_range(0..FIXTURE_ROWS);
            let high = rng.random_range(low..=FIXTURE_ROWS);
            DescriptionValue::from([low, high])
        }
        "$match" | "$notMatch" => {
            DescriptionValue::Pattern(Regex::new(pick(rng, &PATTERNS)).expect("valid pattern"))
        }
        _ => DescriptionValue::Literal(random_literal(rng, column)),
    };
    (key.to_string(), value)
}

fn random_entry(rng: &mut StdRng, depth: u32, context: Option<&'static str>) -> (String, DescriptionValue) {
    if depth > 0 && rng.random_range(0..4) == 0 {
        let key = pick(rng, &["$and", "$or", "$not"]);
        return (
            key.to_string(),
            DescriptionValue::Nested(random_description(rng, depth - 1, context)),
        );
    }
    if let Some(column) = context {
        return random_operator(rng, column);
    }
    let column = random_column(rng);
    if depth > 0 && rng.random_bool(0.6) {
        (
            column.to_string(),
            DescriptionValue::Nested(random_description(rng, depth - 1, Some(column))),
        )
    } else {
        (column.to_string(), DescriptionValue::Literal(random_literal(rng, column)))
    }
}

/// A non-empty description; every nested body is non-empty too.
fn random_description(rng: &mut StdRng, depth: u32, context: Option<&'static str>) -> PredicateDescription {
    let len = rng.random_range(1..=3);
    (0..len).map(|_| random_entry(rng, depth, context)).collect()
}

/// Evaluate a description directly against a row.
fn interpret(description: &PredicateDescription, row: &Row) -> bool {
    truths(description, row, None).into_iter().all(|t| t)
}

/// The truth value of each predicate a description contributes.
///
/// Entries under a column scope are spliced into the enclosing list, so
/// `{$or: {time1: {$lt: 1, $gt: 5}}}` has two disjuncts.
fn truths(description: &PredicateDescription, row: &Row, context: Option<&str>) -> Vec<bool> {
    let mut out = Vec::new();
    for (key, value) in description.entries() {
        match key.as_str() {
            "$and" => out.push(truths(nested(value), row, context).into_iter().all(|t| t)),
            "$or" => out.push(truths(nested(value), row, context).into_iter().any(|t| t)),
            "$not" => out.extend(truths(nested(value), row, context).first().map(|t| !t)),
            operator if operator.starts_with('$') && context.is_some() => {
                let cell = row.get(context.unwrap_or_default());
                out.push(interpret_operator(operator, value, cell));
            }
            column => match value {
                DescriptionValue::Nested(description) => {
                    out.extend(truths(description, row, Some(column)));
                }
                DescriptionValue::Literal(literal) => out.push(
                    row.get(context.unwrap_or(column))
                        .matches(&Value::from(literal.clone())),
                ),
                other => panic!("generator produced a bare {}", other.kind()),
            },
        }
    }
    out
}

fn nested(value: &DescriptionValue) -> &PredicateDescription {
    match value {
        DescriptionValue::Nested(description) => description,
        other => panic!("generator produced a {} combinator body", other.kind()),
    }
}

fn interpret_operator(operator: &str, value: &DescriptionValue, cell: &Value) -> bool {
    let ordering = |literal: &ValueLiteral| cell.compare(&Value::from(literal.clone()));
    match (operator, value) {
        ("$eq", DescriptionValue::Literal(l)) => ordering(l) == Some(Ordering::Equal),
        ("$ne", DescriptionValue::Literal(l)) => ordering(l) != Some(Ordering::Equal),
        ("$lt", DescriptionValue::Literal(l)) => ordering(l) == Some(Ordering::Less),
        ("$lte", DescriptionValue::Literal(l)) => {
            matches!(ordering(l), Some(Ordering::Less | Ordering::Equal))
        }
        ("$gt", DescriptionValue::Literal(l)) => ordering(l) == Some(Ordering::Greater),
        ("$gte", DescriptionValue::Literal(l)) => {
            matches!(ordering(l), Some(Ordering::Greater | Ordering::Equal))
        }
        ("$between", DescriptionValue::Array(bounds)) => {
            matches!(ordering(&bounds[0]), Some(Ordering::Greater | Ordering::Equal))
                && matches!(ordering(&bounds[1]), Some(Ordering::Less | Ordering::Equal))
        }
        ("$in", DescriptionValue::Array(items)) => {
            items.iter().any(|l| ordering(l) == Some(Ordering::Equal))
        }
        ("$match", DescriptionValue::Pattern(p)) => cell.as_str().is_some_and(|s| p.is_match(s)),
        ("$notMatch", DescriptionValue::Pattern(p)) => {
            !cell.as_str().is_some_and(|s| p.is_match(s))
        }
        ("$isNull", DescriptionValue::Literal(ValueLiteral::Boolean(flag))) => {
            cell.is_null() == *flag
        }
        (op, other) => panic!("generator produced {op} with a {}", other.kind()),
    }
}

#[test]
fn test_compiler_agrees_with_interpreter() {
    let mut rng = StdRng::seed_from_u64(SEED);
    let schema = predicate_schema();
    let rows: Vec<Row> = (0..FIXTURE_ROWS).map(predicate_row).collect();
    let mut non_trivial = 0;

    for case in 0..DESCRIPTIONS {
        let description = random_description(&mut rng, MAX_DEPTH, None);
        let predicate = PredicateCompiler::compile(&description, &schema)
            .unwrap_or_else(|e| panic!("case {case}: {e} for {description:?}"))
            .unwrap_or_else(|| panic!("case {case}: non-empty description compiled to nothing"));

        let mut selected = 0;
        for row in &rows {
            let expected = interpret(&description, row);
            assert_eq!(
                predicate.eval(row),
                expected,
                "case {case}: {predicate} disagrees on {row} for {description:?}"
            );
            selected += usize::from(expected);
        }
        if selected > 0 && selected < rows.len() {
            non_trivial += 1;
        }
    }

    // Guard against a generator that only produces all-or-nothing filters.
    assert!(non_trivial > DESCRIPTIONS / 20, "only {non_trivial} selective cases");
}
