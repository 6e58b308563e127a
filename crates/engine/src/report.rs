use serde::{Deserialize, Serialize};
use std::fmt;

use warden_core::CompiledAction;
use warden_storage::{Mode, ReportSummary, Status};

/// Why an action failed. Part of the report, not a Rust error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", content = "detail", rename_all = "snake_case")]
pub enum FailureCause {
    Rejected(String),
    NotFound(String),
    /// The repository call did not answer within the call timeout.
    Timeout { after_ms: u64 },
    CheckFailed(String),
    Conflict(String),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Rejected(msg) => write!(f, "rejected: {}", msg),
            FailureCause::NotFound(what) => write!(f, "not found: {}", what),
            FailureCause::Timeout { after_ms } => write!(f, "timed out after {}ms", after_ms),
            FailureCause::CheckFailed(msg) => write!(f, "check failed: {}", msg),
            FailureCause::Conflict(msg) => write!(f, "conflict: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    Applied(String),
    Skipped(String),
    Failed(FailureCause),
    NotAttempted,
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Applied(detail) => write!(f, "applied ({})", detail),
            Outcome::Skipped(reason) => write!(f, "skipped ({})", reason),
            Outcome::Failed(cause) => write!(f, "FAILED ({})", cause),
            Outcome::NotAttempted => write!(f, "not attempted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub action: CompiledAction,
    pub outcome: Outcome,
}

/// Result of one execution. Holds exactly one entry per compiled action, in
/// action-list order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub script: String,
    pub checksum: String,
    pub mode: Mode,
    pub status: Status,
    pub cancelled: bool,
    /// RFC 3339 timestamp strings.
    pub started_at: String,
    pub finished_at: String,
    pub entries: Vec<ReportEntry>,
}

impl ExecutionReport {
    /// Success when nothing failed and the run was not cancelled. Failed
    /// when the first failure had no applied or skipped entry before it.
    /// PartialFailure otherwise.
    pub fn derive_status(entries: &[ReportEntry], cancelled: bool) -> Status {
        match entries.iter().position(|e| e.outcome.is_failed()) {
            Some(first) => {
                let progressed = entries[..first]
                    .iter()
                    .any(|e| matches!(e.outcome, Outcome::Applied(_) | Outcome::Skipped(_)));
                if progressed {
                    Status::PartialFailure
                } else {
                    Status::Failed
                }
            }
            None if cancelled => Status::PartialFailure,
            None => Status::Success,
        }
    }

    pub fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            status: self.status,
            applied: self.count(|o| matches!(o, Outcome::Applied(_))),
            skipped: self.count(|o| matches!(o, Outcome::Skipped(_))),
            failed: self.count(Outcome::is_failed),
            not_attempted: self.count(|o| matches!(o, Outcome::NotAttempted)),
            cancelled: self.cancelled,
        }
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &Outcome> {
        self.entries.iter().map(|e| &e.outcome)
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let Ok(summary) = serde_json::to_value(self.summary()) {
            value["summary"] = summary;
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{Action, Provenance};

    fn entry(outcome: Outcome) -> ReportEntry {
        ReportEntry {
            action: CompiledAction {
                action: Action::Delete { path: "/x".into() },
                origin: Provenance {
                    file: "t".into(),
                    line: 1,
                    column: 1,
                },
            },
            outcome,
        }
    }

    fn failed() -> Outcome {
        Outcome::Failed(FailureCause::Rejected("no".into()))
    }

    #[test]
    fn status_rules() {
        use ExecutionReport as R;
        assert_eq!(R::derive_status(&[], false), Status::Success);
        assert_eq!(
            R::derive_status(&[entry(Outcome::Skipped("s".into()))], false),
            Status::Success
        );
        assert_eq!(
            R::derive_status(&[entry(failed()), entry(Outcome::NotAttempted)], false),
            Status::Failed
        );
        assert_eq!(
            R::derive_status(&[entry(Outcome::Applied("a".into())), entry(failed())], false),
            Status::PartialFailure
        );
        assert_eq!(
            R::derive_status(&[entry(Outcome::NotAttempted)], true),
            Status::PartialFailure
        );
    }

    #[test]
    fn outcome_json_shape() {
        let json = serde_json::to_value(entry(Outcome::Failed(FailureCause::Timeout {
            after_ms: 50,
        })))
        .unwrap();
        assert_eq!(json["outcome"]["outcome"], "failed");
        assert_eq!(json["outcome"]["detail"]["cause"], "timeout");
        assert_eq!(json["outcome"]["detail"]["detail"]["after_ms"], 50);
        let json = serde_json::to_value(Outcome::NotAttempted).unwrap();
        assert_eq!(json, serde_json::json!({"outcome": "not_attempted"}));
    }
}
