use std::future::Future;

use super::{make_record, TestResult};
use crate::record::Mode;
use crate::{HistoryStore, StorageError};

pub(super) async fn run_append_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "append",
            "record_assigns_increasing_ids",
            record_assigns_increasing_ids(factory).await,
        ),
        TestResult::from_result(
            "append",
            "duplicate_key_is_rejected",
            duplicate_key_is_rejected(factory).await,
        ),
        TestResult::from_result(
            "append",
            "rerun_record_is_accepted",
            rerun_record_is_accepted(factory).await,
        ),
        TestResult::from_result(
            "append",
            "modes_are_independent_keys",
            modes_are_independent_keys(factory).await,
        ),
        TestResult::from_result(
            "append",
            "rejected_record_is_not_stored",
            rejected_record_is_not_stored(factory).await,
        ),
    ]
}

async fn record_assigns_increasing_ids<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut incoming = make_record("a", "c1", Mode::Apply);
    incoming.id = 99;
    let first = s.record(incoming).await.map_err(|e| e.to_string())?;
    let second = s
        .record(make_record("b", "c1", Mode::Apply))
        .await
        .map_err(|e| e.to_string())?;
    if second.id <= first.id {
        return Err(format!("ids not increasing: {} then {}", first.id, second.id));
    }
    Ok(())
}

async fn duplicate_key_is_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.record(make_record("a", "c1", Mode::Apply))
        .await
        .map_err(|e| e.to_string())?;
    match s.record(make_record("a", "c1", Mode::Apply)).await {
        Err(StorageError::Duplicate {
            identity,
            checksum,
            mode,
        }) => {
            if identity != "a" || checksum != "c1" || mode != Mode::Apply {
                return Err(format!(
                    "duplicate error has wrong fields: {}/{}/{}",
                    identity, checksum, mode
                ));
            }
            Ok(())
        }
        Err(other) => Err(format!("expected Duplicate, got {}", other)),
        Ok(_) => Err("duplicate record was accepted".to_string()),
    }
}

async fn rerun_record_is_accepted<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.record(make_record("a", "c1", Mode::Apply))
        .await
        .map_err(|e| e.to_string())?;
    let mut again = make_record("a", "c1", Mode::Apply);
    again.rerun = true;
    s.record(again).await.map_err(|e| e.to_string())?;
    let listed = s.list("a", 10).await.map_err(|e| e.to_string())?;
    if listed.len() != 2 || !listed[0].rerun {
        return Err(format!("expected rerun record first, got {:?}", listed));
    }
    Ok(())
}

async fn modes_are_independent_keys<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.record(make_record("a", "c1", Mode::DryRun))
        .await
        .map_err(|e| e.to_string())?;
    s.record(make_record("a", "c1", Mode::Apply))
        .await
        .map_err(|e| format!("apply after dry-run rejected: {}", e))?;
    Ok(())
}

async fn rejected_record_is_not_stored<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.record(make_record("a", "c1", Mode::Apply))
        .await
        .map_err(|e| e.to_string())?;
    let _ = s.record(make_record("a", "c1", Mode::Apply)).await;
    let listed = s.list("a", 10).await.map_err(|e| e.to_string())?;
    if listed.len() != 1 {
        return Err(format!("expected 1 record, found {}", listed.len()));
    }
    Ok(())
}
