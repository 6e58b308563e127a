use crate::record::Mode;

/// All errors that can be returned by a HistoryStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A record for this (identity, checksum, mode) already exists and the
    /// new one is not marked `rerun`.
    #[error("history already holds a {mode} record for {identity}@{checksum}")]
    Duplicate {
        identity: String,
        checksum: String,
        mode: Mode,
    },

    #[error("history I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("history serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing file holds a line that is not a history record.
    #[error("corrupt history file {path} at line {line}: {message}")]
    Corrupt {
        path: String,
        line: usize,
        message: String,
    },

    /// A backend-specific storage error.
    #[error("history backend error: {0}")]
    Backend(String),
}
