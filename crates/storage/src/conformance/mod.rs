//! Conformance test suite for `HistoryStore` implementations.
//!
//! Backend-agnostic checks any history backend can run:
//!
//! - **Append**: id assignment, duplicate rejection, the rerun exemption
//! - **Query**: `latest`/`lookup` selection, newest-first listing, limits,
//!   `last_run`
//!
//! # Usage
//!
//! ```ignore
//! use warden_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn my_store_conformance() {
//!     let report = run_conformance_suite(|| async { MyStore::new() }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod append;
mod query;

use std::fmt;
use std::future::Future;

use crate::record::{HistoryRecord, Mode, ReportSummary, Status};
use crate::HistoryStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub category: String,
    pub name: String,
    pub passed: bool,
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        let (passed, message) = match result {
            Ok(()) => (true, None),
            Err(msg) => (false, Some(msg)),
        };
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed,
            message,
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in self.results.iter().filter(|r| !r.passed) {
            writeln!(
                f,
                "  FAIL [{}/{}]: {}",
                r.category,
                r.name,
                r.message.as_deref().unwrap_or("(no message)")
            )?;
        }
        Ok(())
    }
}

/// Run the full conformance suite. `factory` is called once per test and
/// must return a fresh, empty store.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();
    results.extend(append::run_append_tests(&factory).await);
    results.extend(query::run_query_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();
    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

/// A successful record with fixed metadata, for tests.
pub fn make_record(identity: &str, checksum: &str, mode: Mode) -> HistoryRecord {
    HistoryRecord {
        id: 0,
        identity: identity.to_string(),
        checksum: checksum.to_string(),
        mode,
        summary: ReportSummary {
            status: Status::Success,
            applied: 1,
            skipped: 0,
            failed: 0,
            not_attempted: 0,
            cancelled: false,
        },
        principal: "admin".to_string(),
        rerun: false,
        recorded_at: "2026-01-01T00:00:00Z".to_string(),
    }
}
