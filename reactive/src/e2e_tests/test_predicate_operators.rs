//! End-to-end tests for every predicate operator and combinator against the
//! 1000-row predicate fixture.

use regex::Regex;

use crate::e2e_tests::helpers::{desc, numbers, select_predicate_rows};
use crate::testing::{FIXTURE_ROWS, predicate_database};

fn name_pattern() -> Regex {
    Regex::new(r":(\d{0,1}1$)").expect("valid pattern")
}

#[test]
fn test_literal_value() {
    let db = predicate_database();
    let rows = select_predicate_rows(&db, &desc().entry("time1", 20));
    assert_eq!(numbers(&rows, "time1"), vec![20.0]);
}

#[test]
fn test_ne() {
    let db = predicate_database();
    let rows = select_predicate_rows(&db, &desc().entry("time1", desc().entry("$ne", 20)));
    assert_eq!(rows.len(), 999);
    assert!(numbers(&rows, "time1").iter().all(|t| *t != 20.0));
}

#[test]
fn test_lt_and_lte() {
    let db = predicate_database();
    let lt = select_predicate_rows(&db, &desc().entry("time1", desc().entry("$lt", 20)));
    let lte = select_predicate_rows(&db, &desc().entry("time1", desc().entry("$lte", 19)));
    assert_eq!(lt.len(), 20);
    assert_eq!(lt, lte);
    assert!(numbers(&lt, "time1").iter().all(|t| *t < 20.0));
}

#[test]
fn test_gt_and_gte() {
    let db = predicate_database();
    let gt = select_predicate_rows(&db, &desc().entry("time2", desc().entry("$gt", 20)));
    let gte = select_predicate_rows(&db, &desc().entry("time2", desc().entry("$gte", 21)));
    assert_eq!(gt.len(), 980);
    assert_eq!(gt, gte);
    assert!(numbers(&gt, "time2").iter().all(|t| *t > 20.0));
}

#[test]
fn test_match_and_not_match_partition_rows() {
    let db = predicate_database();
    let matched =
        select_predicate_rows(&db, &desc().entry("name", desc().entry("$match", name_pattern())));
    let unmatched = select_predicate_rows(
        &db,
        &desc().entry("name", desc().entry("$notMatch", name_pattern())),
    );

    assert_eq!(matched.len(), 10);
    assert_eq!(unmatched.len(), 990);
    assert_eq!(
        numbers(&matched, "time1"),
        vec![1.0, 11.0, 21.0, 31.0, 41.0, 51.0, 61.0, 71.0, 81.0, 91.0]
    );
}

#[test]
fn test_between_is_inclusive() {
    let db = predicate_database();
    let rows = select_predicate_rows(&db, &desc().entry("time1", desc().entry("$between", [1, 20])));
    let times = numbers(&rows, "time1");
    assert_eq!(times.len(), 20);
    assert!(times.iter().all(|t| *t > 0.0 && *t <= 20.0));
}

#[test]
fn test_in() {
    let db = predicate_database();
    let rows = select_predicate_rows(
        &db,
        &desc().entry("time1", desc().entry("$in", [10, 20, 30, 10000])),
    );
    assert_eq!(numbers(&rows, "time1"), vec![10.0, 20.0, 30.0]);
}

#[test]
fn test_is_null() {
    let db = predicate_database();
    let null = select_predicate_rows(&db, &desc().entry("nullable", desc().entry("$isNull", true)));
    let not_null =
        select_predicate_rows(&db, &desc().entry("nullable", desc().entry("$isNull", false)));
    assert_eq!(null.len(), 700);
    assert!(null.iter().all(|row| row.get("nullable").is_null()));
    assert_eq!(not_null.len(), 300);
}

#[test]
fn test_not() {
    let db = predicate_database();
    let rows = select_predicate_rows(&db, &desc().entry("$not", desc().entry("time1", 0)));
    assert_eq!(rows.len(), 999);
}

#[test]
fn test_and_in_column_scope() {
    let db = predicate_database();
    let rows = select_predicate_rows(
        &db,
        &desc().entry("time1", desc().entry("$and", desc().entry("$lt", 200).entry("$gte", 50))),
    );
    let times = numbers(&rows, "time1");
    assert_eq!(times.len(), 150);
    assert!(times.iter().all(|t| (50.0..200.0).contains(t)));
}

#[test]
fn test_or_in_column_scope() {
    let db = predicate_database();
    let rows = select_predicate_rows(
        &db,
        &desc().entry(
            "time1",
            desc().entry("$or", desc().entry("$gte", FIXTURE_ROWS - 50).entry("$lt", 50)),
        ),
    );
    let times = numbers(&rows, "time1");
    assert_eq!(times.len(), 100);
    assert!(times.iter().all(|t| *t >= 950.0 || *t < 50.0));
}

#[test]
fn test_complex_description() {
    let db = predicate_database();
    let description = desc()
        .entry(
            "time1",
            desc().entry("$or", desc().entry("$gte", FIXTURE_ROWS - 50).entry("$lt", 50)),
        )
        .entry(
            "time2",
            desc().entry(
                "$and",
                desc().entry("$gte", FIXTURE_ROWS / 2).entry("$lt", FIXTURE_ROWS),
            ),
        )
        .entry("name", desc().entry("$match", name_pattern()));

    let rows = select_predicate_rows(&db, &description);
    assert_eq!(numbers(&rows, "time1"), vec![1.0, 11.0, 21.0, 31.0, 41.0]);
}

#[test]
fn test_empty_description_selects_everything() {
    let db = predicate_database();
    let rows = select_predicate_rows(&db, &desc());
    assert_eq!(rows.len(), 1000);
}

#[test]
fn test_not_negates_only_first_child() {
    let db = predicate_database();
    let rows = select_predicate_rows(
        &db,
        &desc().entry("$not", desc().entry("time1", 0).entry("time1", 1)),
    );
    // time1 = 1 is ignored, so only row 0 is excluded.
    assert_eq!(rows.len(), 999);
    assert!(!numbers(&rows, "time1").contains(&0.0));
}

#[test]
fn test_combinators_nest_across_columns() {
    let db = predicate_database();
    let rows = select_predicate_rows(
        &db,
        &desc().entry(
            "$or",
            desc()
                .entry("time1", desc().entry("$lt", 3))
                .entry("$and", desc().entry("time2", desc().entry("$lte", 2)).entry("nullable", desc().entry("$isNull", true))),
        ),
    );
    // time1 < 3 gives rows 0..3; time2 <= 2 gives rows 998 and 999, both null.
    assert_eq!(numbers(&rows, "time1"), vec![0.0, 1.0, 2.0, 998.0, 999.0]);
}
