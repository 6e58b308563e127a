//! JSON Lines history file: one record per line, appended, never rewritten.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::record::{HistoryRecord, Mode};
use crate::traits::{check_append, newest_first, HistoryStore};

/// File-backed history. Existing lines are loaded on open and kept in memory
/// for queries; each `record` appends one line and syncs it before the
/// in-memory copy is updated.
///
/// Every append ends in a newline, so an unterminated last line can only be
/// an interrupted write. It is ignored on open and cut off before the next
/// append.
pub struct JsonlHistoryStore {
    path: PathBuf,
    state: Mutex<State>,
}

struct State {
    records: Vec<HistoryRecord>,
    /// Byte length of the complete lines, when an interrupted write left
    /// bytes beyond them.
    torn_at: Option<u64>,
}

impl JsonlHistoryStore {
    /// Open `path`, creating nothing until the first append. A missing file
    /// is an empty history.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let (records, torn_at) = match std::fs::read_to_string(&path) {
            Ok(text) => {
                let complete = text.rfind('\n').map_or(0, |i| i + 1);
                let torn_at = (complete < text.len()).then_some(complete as u64);
                if torn_at.is_some() {
                    tracing::warn!(
                        path = %path.display(),
                        bytes = text.len() - complete,
                        "ignoring unterminated last line of history file"
                    );
                }
                (parse_lines(&path, &text[..complete])?, torn_at)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (Vec::new(), None),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), records = records.len(), "opened history file");
        Ok(Self {
            path,
            state: Mutex::new(State { records, torn_at }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_lines(path: &Path, text: &str) -> Result<Vec<HistoryRecord>, StorageError> {
    let mut records = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).map_err(|e| StorageError::Corrupt {
            path: path.display().to_string(),
            line: idx + 1,
            message: e.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Append `line` and sync it. If the write does not complete the file is
/// cut back to its previous length.
async fn append_line(file: &mut tokio::fs::File, line: &[u8]) -> Result<(), StorageError> {
    let before = file.metadata().await?.len();
    let written = async {
        file.write_all(line).await?;
        file.sync_data().await
    }
    .await;
    if let Err(e) = written {
        if let Err(undo) = file.set_len(before).await {
            tracing::warn!(error = %undo, "could not roll back partial history line");
        }
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl HistoryStore for JsonlHistoryStore {
    async fn record(&self, mut record: HistoryRecord) -> Result<HistoryRecord, StorageError> {
        let mut state = self.state.lock().await;
        check_append(&state.records, &record)?;
        record.id = state.records.iter().map(|r| r.id).max().unwrap_or(0) + 1;

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        if let Some(len) = state.torn_at {
            file.set_len(len).await?;
            state.torn_at = None;
        }
        append_line(&mut file, line.as_bytes()).await?;

        state.records.push(record.clone());
        Ok(record)
    }

    async fn latest(
        &self,
        identity: &str,
        checksum: &str,
        mode: Mode,
    ) -> Result<Option<HistoryRecord>, StorageError> {
        let state = self.state.lock().await;
        let found = newest_first(&state.records, identity)
            .find(|r| r.checksum == checksum && r.mode == mode)
            .cloned();
        Ok(found)
    }

    async fn list(&self, identity: &str, limit: usize) -> Result<Vec<HistoryRecord>, StorageError> {
        let state = self.state.lock().await;
        Ok(newest_first(&state.records, identity)
            .take(limit)
            .cloned()
            .collect())
    }
}
