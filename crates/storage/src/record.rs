use serde::{Deserialize, Serialize};
use std::fmt;

/// How a script was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    DryRun,
    Apply,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::DryRun => write!(f, "dry-run"),
            Mode::Apply => write!(f, "apply"),
        }
    }
}

/// Overall result of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    PartialFailure,
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Success => write!(f, "success"),
            Status::PartialFailure => write!(f, "partial failure"),
            Status::Failed => write!(f, "failed"),
        }
    }
}

/// Per-outcome counts of an execution report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub status: Status,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub not_attempted: usize,
    #[serde(default)]
    pub cancelled: bool,
}

/// One executed invocation. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Assigned by the store on `record`; any incoming value is replaced.
    pub id: u64,
    pub identity: String,
    /// Bundle checksum of the root script and everything it included.
    pub checksum: String,
    pub mode: Mode,
    pub summary: ReportSummary,
    pub principal: String,
    pub rerun: bool,
    /// RFC 3339 timestamp string.
    pub recorded_at: String,
}

impl HistoryRecord {
    /// Same (identity, checksum, mode) key.
    pub fn same_key(&self, other: &HistoryRecord) -> bool {
        self.identity == other.identity && self.checksum == other.checksum && self.mode == other.mode
    }
}
