use std::future::Future;

use super::{make_record, TestResult};
use crate::record::{Mode, Status};
use crate::HistoryStore;

pub(super) async fn run_query_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "query",
            "lookup_on_empty_store_is_none",
            lookup_on_empty_store_is_none(factory).await,
        ),
        TestResult::from_result(
            "query",
            "lookup_ignores_dry_runs",
            lookup_ignores_dry_runs(factory).await,
        ),
        TestResult::from_result(
            "query",
            "lookup_returns_latest_apply",
            lookup_returns_latest_apply(factory).await,
        ),
        TestResult::from_result(
            "query",
            "list_is_newest_first_and_limited",
            list_is_newest_first_and_limited(factory).await,
        ),
        TestResult::from_result(
            "query",
            "list_is_scoped_to_identity",
            list_is_scoped_to_identity(factory).await,
        ),
        TestResult::from_result(
            "query",
            "last_run_spans_modes_and_checksums",
            last_run_spans_modes_and_checksums(factory).await,
        ),
    ]
}

async fn lookup_on_empty_store_is_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    if s.lookup("a", "c1").await.map_err(|e| e.to_string())?.is_some() {
        return Err("empty store returned a record".to_string());
    }
    if s.last_run("a").await.map_err(|e| e.to_string())?.is_some() {
        return Err("empty store returned a last run".to_string());
    }
    Ok(())
}

async fn lookup_ignores_dry_runs<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.record(make_record("a", "c1", Mode::DryRun))
        .await
        .map_err(|e| e.to_string())?;
    if s.lookup("a", "c1").await.map_err(|e| e.to_string())?.is_some() {
        return Err("lookup returned a dry-run record".to_string());
    }
    let dry = s
        .latest("a", "c1", Mode::DryRun)
        .await
        .map_err(|e| e.to_string())?;
    if dry.is_none() {
        return Err("latest(DryRun) missed the dry-run record".to_string());
    }
    Ok(())
}

async fn lookup_returns_latest_apply<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut failed = make_record("a", "c1", Mode::Apply);
    failed.summary.status = Status::Failed;
    s.record(failed).await.map_err(|e| e.to_string())?;
    let mut rerun = make_record("a", "c1", Mode::Apply);
    rerun.rerun = true;
    let stored = s.record(rerun).await.map_err(|e| e.to_string())?;
    s.record(make_record("a", "c2", Mode::Apply))
        .await
        .map_err(|e| e.to_string())?;

    let found = s
        .lookup("a", "c1")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("lookup found nothing")?;
    if found.id != stored.id || found.summary.status != Status::Success {
        return Err(format!("expected record {}, got {:?}", stored.id, found));
    }
    Ok(())
}

async fn list_is_newest_first_and_limited<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for checksum in ["c1", "c2", "c3"] {
        s.record(make_record("a", checksum, Mode::Apply))
            .await
            .map_err(|e| e.to_string())?;
    }
    let listed = s.list("a", 2).await.map_err(|e| e.to_string())?;
    let checksums: Vec<&str> = listed.iter().map(|r| r.checksum.as_str()).collect();
    if checksums != ["c3", "c2"] {
        return Err(format!("expected [c3, c2], got {:?}", checksums));
    }
    Ok(())
}

async fn list_is_scoped_to_identity<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.record(make_record("a", "c1", Mode::Apply))
        .await
        .map_err(|e| e.to_string())?;
    s.record(make_record("b", "c1", Mode::Apply))
        .await
        .map_err(|e| e.to_string())?;
    let listed = s.list("a", 10).await.map_err(|e| e.to_string())?;
    if listed.len() != 1 || listed[0].identity != "a" {
        return Err(format!("expected only 'a' records, got {:?}", listed));
    }
    Ok(())
}

async fn last_run_spans_modes_and_checksums<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.record(make_record("a", "c1", Mode::Apply))
        .await
        .map_err(|e| e.to_string())?;
    s.record(make_record("a", "c2", Mode::DryRun))
        .await
        .map_err(|e| e.to_string())?;
    let last = s
        .last_run("a")
        .await
        .map_err(|e| e.to_string())?
        .ok_or("last_run found nothing")?;
    if last.checksum != "c2" || last.mode != Mode::DryRun {
        return Err(format!("expected c2 dry-run, got {:?}", last));
    }
    Ok(())
}
