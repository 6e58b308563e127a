//! Run orchestration: load, compile, consult history, execute, record.

use std::time::Duration;

use tracing::{info, warn};
use warden_core::{compile_script, CompileError, ResolveOptions, ScriptCache, ScriptLoader};
use warden_storage::{HistoryRecord, HistoryStore, Mode, Status, StorageError};

use crate::execute::{execute, CancelToken, ExecuteOptions, DEFAULT_CALL_TIMEOUT};
use crate::report::ExecutionReport;
use crate::repository::{Repository, RepositoryError};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub resolve: ResolveOptions,
    pub call_timeout: Duration,
    /// Who triggered the run; stored on the history record.
    pub principal: String,
    /// Execute even when an identical script version already succeeded.
    pub rerun: bool,
    pub cancel: CancelToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            resolve: ResolveOptions::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            principal: "anonymous".to_string(),
            rerun: false,
            cancel: CancelToken::new(),
        }
    }
}

/// Whether the history record of an executed run was written.
#[derive(Debug)]
pub enum AuditStatus {
    Recorded(HistoryRecord),
    /// Execution happened but its record could not be stored.
    WriteFailed(StorageError),
}

#[derive(Debug)]
pub enum RunOutcome {
    Executed {
        report: ExecutionReport,
        audit: AuditStatus,
    },
    /// This exact script version already applied successfully; nothing ran.
    Unchanged { previous: HistoryRecord },
}

/// A run that left no durable change and no history record.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The script never reached execution.
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("history lookup failed: {0}")]
    History(#[source] StorageError),

    /// The apply ran but its changes could not be made durable, so it is
    /// not recorded and a later apply runs again.
    #[error("cannot commit repository state: {0}")]
    Commit(#[source] RepositoryError),
}

impl RunError {
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            RunError::Compile(e) => e.to_json_value(),
            RunError::History(e) => serde_json::json!({
                "kind":    "history",
                "message": e.to_string(),
            }),
            RunError::Commit(e) => serde_json::json!({
                "kind":    "commit",
                "message": e.to_string(),
            }),
        }
    }
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Compile `identifier` and execute it in `mode`, recording the run.
///
/// In apply mode a script version whose latest apply succeeded is not run
/// again unless `options.rerun` is set. An apply is committed to the
/// repository before it is recorded.
pub async fn compile_and_run<L: ScriptLoader>(
    identifier: &str,
    mode: Mode,
    options: &RunOptions,
    cache: &ScriptCache<L>,
    repo: &dyn Repository,
    history: &dyn HistoryStore,
) -> Result<RunOutcome, RunError> {
    let actions = compile_script(identifier, cache, options.resolve)?;
    info!(
        script = %actions.script,
        checksum = %actions.checksum,
        actions = actions.len(),
        "compiled script"
    );

    if mode == Mode::Apply && !options.rerun {
        if let Some(previous) = history
            .lookup(&actions.script, &actions.checksum)
            .await
            .map_err(RunError::History)?
        {
            if previous.summary.status == Status::Success {
                info!(script = %actions.script, record = previous.id, "unchanged since last successful apply");
                return Ok(RunOutcome::Unchanged { previous });
            }
        }
    }

    // A repeat of an already recorded (identity, checksum, mode) must be
    // stored as a rerun.
    let repeated = history
        .latest(&actions.script, &actions.checksum, mode)
        .await
        .map_err(RunError::History)?
        .is_some();

    let report = execute(
        &actions,
        repo,
        ExecuteOptions {
            mode,
            call_timeout: options.call_timeout,
            cancel: options.cancel.clone(),
        },
    )
    .await;

    if mode == Mode::Apply {
        let committed = match tokio::time::timeout(options.call_timeout, repo.commit()).await {
            Ok(result) => result,
            Err(_) => Err(RepositoryError::Rejected(format!(
                "commit timed out after {}ms",
                options.call_timeout.as_millis()
            ))),
        };
        if let Err(e) = committed {
            warn!(script = %actions.script, error = %e, "repository commit failed; run not recorded");
            return Err(RunError::Commit(e));
        }
    }

    let record = HistoryRecord {
        id: 0,
        identity: actions.script.clone(),
        checksum: actions.checksum.clone(),
        mode,
        summary: report.summary(),
        principal: options.principal.clone(),
        rerun: options.rerun || repeated,
        recorded_at: now_rfc3339(),
    };
    let audit = match history.record(record).await {
        Ok(stored) => AuditStatus::Recorded(stored),
        Err(e) => {
            warn!(script = %actions.script, error = %e, "failed to write history record");
            AuditStatus::WriteFailed(e)
        }
    };
    Ok(RunOutcome::Executed { report, audit })
}
