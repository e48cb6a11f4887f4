//! End-to-end tests for streams whose recompute fails.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::e2e_tests::helpers::{
    FlakyEngine, folded_token, name_of, next_emission, next_rows, rename, time_range,
};
use crate::testing::{FIXTURE_ROWS, token_database};
use crate::token::{QueryToken, RecomputeError, TokenError, TransformError};

#[tokio::test]
async fn test_fetch_error_is_surfaced_and_terminal() {
    let db = token_database();
    let engine = FlakyEngine::new(db.clone());
    let stream = folded_token(engine.clone(), 50, FIXTURE_ROWS, "true")
        .stream()
        .expect("stream");

    let mut changes = stream.subscribe().expect("subscribe");
    next_rows(&mut changes).await;
    rename(&db, "_id:50", "test name change");
    assert_eq!(name_of(&next_rows(&mut changes).await[0]), "test name change");

    engine.fail_fetches();
    rename(&db, "_id:50", "test name changetest name change");

    let expected = TokenError::Recompute(RecomputeError {
        constituent: 0,
        message: "storage engine error: storage lock poisoned".to_string(),
    });
    assert_eq!(next_emission(&mut changes).await, Some(Err(expected.clone())));
    assert_eq!(next_emission(&mut changes).await, None);

    assert!(!stream.is_running());
    assert_eq!(stream.subscribe().map(|_| ()), Err(expected));
}

#[tokio::test]
async fn test_failure_reports_failing_constituent() {
    let db = token_database();
    let unhappy = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&unhappy);

    let healthy = folded_token(db.clone(), 0, 50, "ok");
    let fragile = QueryToken::try_with_transform(db.clone(), time_range(50, 100), move |rows| {
        if flag.load(Ordering::SeqCst) {
            Err(TransformError::new("not happy"))
        } else {
            Ok(rows)
        }
    });
    let stream = healthy
        .combine(&[&fragile])
        .expect("same shape")
        .stream()
        .expect("stream");

    let mut first = stream.subscribe().expect("subscribe");
    let mut second = stream.subscribe().expect("subscribe");
    next_rows(&mut first).await;
    next_rows(&mut second).await;

    unhappy.store(true, Ordering::SeqCst);
    rename(&db, "_id:75", "boom");

    for observer in [&mut first, &mut second] {
        let Some(Err(TokenError::Recompute(error))) = next_emission(observer).await else {
            panic!("expected a recompute error");
        };
        assert_eq!(error.constituent, 1);
        assert_eq!(error.message, "transform failed: not happy");
        assert_eq!(next_emission(observer).await, None);
    }
}

#[tokio::test]
async fn test_initial_fetch_failure_is_terminal() {
    let db = token_database();
    let engine = FlakyEngine::new(db);
    engine.fail_fetches();

    let stream = folded_token(engine, 0, 10, "x").stream().expect("stream");
    let mut changes = stream.subscribe().expect("subscribe");
    assert!(matches!(
        next_emission(&mut changes).await,
        Some(Err(TokenError::Recompute(RecomputeError { constituent: 0, .. })))
    ));
    assert_eq!(next_emission(&mut changes).await, None);
}

#[tokio::test]
async fn test_failure_does_not_affect_other_streams() {
    let db = token_database();
    let engine = FlakyEngine::new(db.clone());

    let failing = folded_token(engine.clone(), 50, FIXTURE_ROWS, "flaky")
        .stream()
        .expect("stream");
    let steady = folded_token(db.clone(), 50, FIXTURE_ROWS, "steady")
        .stream()
        .expect("stream");

    let mut failing_changes = failing.subscribe().expect("subscribe");
    let mut steady_changes = steady.subscribe().expect("subscribe");
    next_rows(&mut failing_changes).await;
    next_rows(&mut steady_changes).await;

    engine.fail_fetches();
    rename(&db, "_id:50", "after failure");

    assert!(matches!(
        next_emission(&mut failing_changes).await,
        Some(Err(TokenError::Recompute(_)))
    ));
    assert_eq!(
        name_of(&next_rows(&mut steady_changes).await[0]),
        "after failure"
    );
}
