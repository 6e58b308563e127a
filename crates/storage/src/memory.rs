use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::record::{HistoryRecord, Mode};
use crate::traits::{check_append, newest_first, HistoryStore};

/// Process-local history, for tests and one-shot runs.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    records: Mutex<Vec<HistoryRecord>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn record(&self, mut record: HistoryRecord) -> Result<HistoryRecord, StorageError> {
        let mut records = self.records.lock().await;
        check_append(&records, &record)?;
        record.id = records.len() as u64 + 1;
        records.push(record.clone());
        Ok(record)
    }

    async fn latest(
        &self,
        identity: &str,
        checksum: &str,
        mode: Mode,
    ) -> Result<Option<HistoryRecord>, StorageError> {
        let records = self.records.lock().await;
        let found = newest_first(&records, identity)
            .find(|r| r.checksum == checksum && r.mode == mode)
            .cloned();
        Ok(found)
    }

    async fn list(&self, identity: &str, limit: usize) -> Result<Vec<HistoryRecord>, StorageError> {
        let records = self.records.lock().await;
        Ok(newest_first(&records, identity).take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::run_conformance_suite;

    #[tokio::test]
    async fn in_memory_conformance() {
        let report = run_conformance_suite(|| async { InMemoryHistoryStore::new() }).await;
        assert!(report.failed == 0, "{report}");
        assert!(report.total > 0);
    }
}
