use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{HistoryRecord, Mode};

/// Durable log of script executions.
///
/// `record` is append-only: nothing is ever updated or removed. A store
/// never holds two records with the same (identity, checksum, mode) unless
/// the later one has `rerun` set; attempting it is
/// `StorageError::Duplicate`.
///
/// Queries return records newest first.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append a record, returning it with its assigned id.
    async fn record(&self, record: HistoryRecord) -> Result<HistoryRecord, StorageError>;

    /// Latest record for exactly this (identity, checksum, mode).
    async fn latest(
        &self,
        identity: &str,
        checksum: &str,
        mode: Mode,
    ) -> Result<Option<HistoryRecord>, StorageError>;

    /// Up to `limit` records for `identity`, newest first.
    async fn list(&self, identity: &str, limit: usize) -> Result<Vec<HistoryRecord>, StorageError>;

    /// Latest apply-mode record for this script version.
    async fn lookup(
        &self,
        identity: &str,
        checksum: &str,
    ) -> Result<Option<HistoryRecord>, StorageError> {
        self.latest(identity, checksum, Mode::Apply).await
    }

    /// Latest record for `identity` in any mode and version.
    async fn last_run(&self, identity: &str) -> Result<Option<HistoryRecord>, StorageError> {
        Ok(self.list(identity, 1).await?.into_iter().next())
    }
}

/// Shared append rule for backends that keep their records in a `Vec`.
pub(crate) fn check_append(
    existing: &[HistoryRecord],
    record: &HistoryRecord,
) -> Result<(), StorageError> {
    if !record.rerun && existing.iter().any(|r| r.same_key(record)) {
        return Err(StorageError::Duplicate {
            identity: record.identity.clone(),
            checksum: record.checksum.clone(),
            mode: record.mode,
        });
    }
    Ok(())
}

pub(crate) fn newest_first<'a>(
    records: &'a [HistoryRecord],
    identity: &'a str,
) -> impl Iterator<Item = &'a HistoryRecord> + 'a {
    records.iter().rev().filter(move |r| r.identity == identity)
}
