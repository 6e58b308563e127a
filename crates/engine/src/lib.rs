//! warden-engine: executes compiled Warden action lists.
//!
//! - [`execute()`] -- run an [`ActionList`](warden_core::ActionList) against a
//!   [`Repository`], producing an [`ExecutionReport`]
//! - [`compile_and_run()`] -- load, compile, consult history, execute, record
//! - [`InMemoryRepository`] -- JSON-serializable repository used by the CLI
//!   state file and by tests

pub mod execute;
pub mod report;
pub mod repository;
pub mod run;

pub use execute::{execute, CancelToken, ExecuteOptions, DEFAULT_CALL_TIMEOUT};
pub use report::{ExecutionReport, FailureCause, Outcome, ReportEntry};
pub use repository::{
    InMemoryRepository, Node, PrincipalInfo, Repository, RepositoryError, RepositoryState,
};
pub use run::{compile_and_run, AuditStatus, RunError, RunOptions, RunOutcome};
pub use warden_storage::{Mode, Status};
