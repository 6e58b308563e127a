//! Sequential execution of an action list against a [`Repository`].
//!
//! Actions run strictly in order. Apply mode stops at the first failure and
//! marks the rest `NotAttempted`; dry-run never mutates and never stops
//! early. Every repository call is bounded by the call timeout.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use warden_core::path::{is_within, parent, rebase};
use warden_core::{Action, ActionList, KeptPermission, PermissionEntry, PrincipalKind};
use warden_storage::Mode;

use crate::report::{ExecutionReport, FailureCause, Outcome, ReportEntry};
use crate::repository::{Repository, RepositoryError};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Cooperative cancellation flag, checked before each action. Clones share
/// the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    pub mode: Mode,
    pub call_timeout: Duration,
    pub cancel: CancelToken,
}

impl ExecuteOptions {
    pub fn new(mode: Mode) -> Self {
        ExecuteOptions {
            mode,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            cancel: CancelToken::new(),
        }
    }
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}

fn cause(err: RepositoryError) -> FailureCause {
    match err {
        RepositoryError::NotFound(what) => FailureCause::NotFound(what),
        RepositoryError::Conflict(msg) => FailureCause::Conflict(msg),
        RepositoryError::Rejected(msg) => FailureCause::Rejected(msg),
    }
}

/// Report a missing backing node under the path the script named.
fn relabel(cause: FailureCause, real: &str, path: &str) -> FailureCause {
    match cause {
        FailureCause::NotFound(what) if what == real => FailureCause::NotFound(path.to_string()),
        other => other,
    }
}

fn privileges(entry: &PermissionEntry) -> String {
    entry.privileges.iter().cloned().collect::<Vec<_>>().join(", ")
}

/// Per-run executor state.
struct Executor<'a> {
    repo: &'a dyn Repository,
    mode: Mode,
    timeout: Duration,
    /// Principals a dry run has already reported as "would create", so that
    /// later actions referring to them are classified as if they existed.
    planned: HashMap<String, PrincipalKind>,
    /// Node creations and removals a dry run has reported. `Some(origin)`
    /// means the subtree would exist with the content now at `origin`;
    /// `None` means it would be gone.
    planned_nodes: BTreeMap<String, Option<String>>,
}

impl<'a> Executor<'a> {
    fn dry(&self) -> bool {
        self.mode == Mode::DryRun
    }

    async fn call<T>(
        &self,
        fut: impl Future<Output = Result<T, RepositoryError>>,
    ) -> Result<T, FailureCause> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(cause),
            Err(_) => Err(FailureCause::Timeout {
                after_ms: self.timeout.as_millis() as u64,
            }),
        }
    }

    /// Kind of `id`, counting principals a dry run plans to create.
    async fn principal_kind(&self, id: &str) -> Result<Option<PrincipalKind>, FailureCause> {
        if let Some(p) = self.call(self.repo.principal(id)).await? {
            return Ok(Some(p.kind));
        }
        Ok(self.planned.get(id).copied())
    }

    /// The existing node that `path` stands for once earlier dry-run
    /// changes are taken into account, or `None` if it would be removed.
    fn backing(&self, path: &str) -> Option<String> {
        let mut current = Some(path);
        while let Some(p) = current {
            if let Some(planned) = self.planned_nodes.get(p) {
                return planned.as_ref().map(|origin| rebase(path, p, origin));
            }
            current = parent(p);
        }
        Some(path.to_string())
    }

    fn plan_node(&mut self, path: &str, origin: Option<String>) {
        self.planned_nodes.retain(|k, _| !is_within(k, path));
        self.planned_nodes.insert(path.to_string(), origin);
    }

    async fn node_exists(&self, path: &str) -> Result<bool, FailureCause> {
        match self.backing(path) {
            Some(real) => self.call(self.repo.node_exists(&real)).await,
            None => Ok(false),
        }
    }

    async fn property(&self, path: &str, key: &str) -> Result<Option<String>, FailureCause> {
        let real = self
            .backing(path)
            .ok_or_else(|| FailureCause::NotFound(path.to_string()))?;
        self.call(self.repo.property(&real, key))
            .await
            .map_err(|c| relabel(c, &real, path))
    }

    async fn read_permissions(&self, path: &str) -> Result<Vec<PermissionEntry>, FailureCause> {
        let real = self
            .backing(path)
            .ok_or_else(|| FailureCause::NotFound(path.to_string()))?;
        self.call(self.repo.read_permissions(&real))
            .await
            .map_err(|c| relabel(c, &real, path))
    }

    /// Nodes at or beneath `root`, as the script would see them.
    async fn descendants(&self, root: &str) -> Result<Vec<String>, FailureCause> {
        if self.planned_nodes.is_empty() {
            return self.call(self.repo.descendants(root)).await;
        }
        let mut sources: Vec<(String, String)> = Vec::new();
        if let Some(real) = self.backing(root) {
            sources.push((root.to_string(), real));
        }
        for (key, origin) in &self.planned_nodes {
            if let (true, Some(origin)) = (is_within(key, root), origin) {
                sources.push((key.clone(), origin.clone()));
            }
        }
        let mut found = BTreeSet::new();
        for (at, real) in &sources {
            for p in self.call(self.repo.descendants(real)).await? {
                let seen = rebase(&p, real, at);
                if self.backing(&seen).as_deref() == Some(p.as_str()) {
                    found.insert(seen);
                }
            }
        }
        Ok(found.into_iter().collect())
    }

    /// Dry-run check that a copy or move destination has a parent.
    async fn require_parent(&self, to: &str) -> Result<(), FailureCause> {
        let Some(p) = parent(to) else {
            return Ok(());
        };
        if self.node_exists(p).await? {
            Ok(())
        } else {
            Err(FailureCause::NotFound(p.to_string()))
        }
    }

    async fn run(&mut self, action: &Action) -> Result<Outcome, FailureCause> {
        match action {
            Action::EnsureUser { id, path } => {
                self.ensure(PrincipalKind::User, id, path.as_deref()).await
            }
            Action::EnsureGroup { id, path } => {
                self.ensure(PrincipalKind::Group, id, path.as_deref()).await
            }
            Action::AddMember { group, member } => self.add_member(group, member).await,
            Action::RemoveMember { group, member } => {
                let present = self
                    .call(self.repo.principal(group))
                    .await?
                    .is_some_and(|g| g.members.contains(member));
                if !present {
                    return Ok(Outcome::Skipped(format!(
                        "'{}' is not a member of '{}'",
                        member, group
                    )));
                }
                if self.dry() {
                    return Ok(Outcome::Applied(format!(
                        "would remove '{}' from '{}'",
                        member, group
                    )));
                }
                self.call(self.repo.remove_member(group, member)).await?;
                Ok(Outcome::Applied(format!("removed '{}' from '{}'", member, group)))
            }
            Action::SetPermission { path, entry } => self.set_permission(path, entry).await,
            Action::SetProperty { path, key, value } => {
                let current = self.property(path, key).await?;
                if current.as_deref() == Some(value.as_str()) {
                    return Ok(Outcome::Skipped(format!("'{}' already set", key)));
                }
                if self.dry() {
                    return Ok(Outcome::Applied(format!("would set '{}' = '{}'", key, value)));
                }
                self.call(self.repo.set_property(path, key, value)).await?;
                Ok(Outcome::Applied(format!("set '{}' = '{}'", key, value)))
            }
            Action::Copy { from, to } => {
                if self.node_exists(to).await? {
                    return Ok(Outcome::Skipped(format!("'{}' already exists", to)));
                }
                if !self.node_exists(from).await? {
                    return Err(FailureCause::NotFound(from.clone()));
                }
                if self.dry() {
                    self.require_parent(to).await?;
                    let origin = self.backing(from);
                    self.plan_node(to, origin);
                    return Ok(Outcome::Applied(format!("would copy '{}' to '{}'", from, to)));
                }
                self.call(self.repo.copy(from, to)).await?;
                Ok(Outcome::Applied(format!("copied '{}' to '{}'", from, to)))
            }
            Action::Move { from, to } => {
                let source = self.node_exists(from).await?;
                let dest = self.node_exists(to).await?;
                match (source, dest) {
                    (false, true) => Ok(Outcome::Skipped(format!("already moved to '{}'", to))),
                    (false, false) => Err(FailureCause::NotFound(from.clone())),
                    (true, true) => Err(FailureCause::Conflict(format!(
                        "destination '{}' already exists",
                        to
                    ))),
                    (true, false) if self.dry() => {
                        self.require_parent(to).await?;
                        let origin = self.backing(from);
                        self.plan_node(to, origin);
                        self.plan_node(from, None);
                        Ok(Outcome::Applied(format!("would move '{}' to '{}'", from, to)))
                    }
                    (true, false) => {
                        self.call(self.repo.move_node(from, to)).await?;
                        Ok(Outcome::Applied(format!("moved '{}' to '{}'", from, to)))
                    }
                }
            }
            Action::Delete { path } => {
                if !self.node_exists(path).await? {
                    return Ok(Outcome::Skipped(format!("'{}' does not exist", path)));
                }
                if self.dry() {
                    self.plan_node(path, None);
                    return Ok(Outcome::Applied(format!("would delete '{}'", path)));
                }
                self.call(self.repo.delete(path)).await?;
                Ok(Outcome::Applied(format!("deleted '{}'", path)))
            }
            Action::Purge {
                path,
                principal,
                keep,
            } => self.purge(path, principal.as_deref(), keep).await,
            Action::CheckExists { id, principal_kind } => {
                let found = self.principal_kind(id).await?;
                match (found, principal_kind) {
                    (None, _) => Err(FailureCause::CheckFailed(format!("'{}' does not exist", id))),
                    (Some(kind), Some(wanted)) if kind != *wanted => Err(FailureCause::CheckFailed(
                        format!("'{}' is a {}, not a {}", id, kind, wanted),
                    )),
                    _ => Ok(Outcome::Skipped("check passed".to_string())),
                }
            }
            Action::CheckNotExists { id } => match self.principal_kind(id).await? {
                Some(kind) => Err(FailureCause::CheckFailed(format!("{} '{}' exists", kind, id))),
                None => Ok(Outcome::Skipped("check passed".to_string())),
            },
            Action::CheckPermission { path, entry } => {
                let acl = self.read_permissions(path).await?;
                if acl.iter().any(|e| e.covers(entry)) {
                    Ok(Outcome::Skipped("check passed".to_string()))
                } else {
                    Err(FailureCause::CheckFailed(format!(
                        "'{}' lacks {} {} on '{}'",
                        entry.principal,
                        entry.effect,
                        privileges(entry),
                        path
                    )))
                }
            }
        }
    }

    async fn ensure(
        &mut self,
        kind: PrincipalKind,
        id: &str,
        path: Option<&str>,
    ) -> Result<Outcome, FailureCause> {
        match self.principal_kind(id).await? {
            Some(existing) if existing == kind => {
                Ok(Outcome::Skipped(format!("{} '{}' exists", kind, id)))
            }
            Some(existing) => Err(FailureCause::Conflict(format!(
                "'{}' already exists as a {}",
                id, existing
            ))),
            None if self.dry() => {
                self.planned.insert(id.to_string(), kind);
                Ok(Outcome::Applied(format!("would create {} '{}'", kind, id)))
            }
            None => {
                self.call(self.repo.ensure_principal(kind, id, path)).await?;
                Ok(Outcome::Applied(format!("created {} '{}'", kind, id)))
            }
        }
    }

    async fn add_member(&mut self, group: &str, member: &str) -> Result<Outcome, FailureCause> {
        match self.call(self.repo.principal(group)).await? {
            Some(g) if g.members.contains(member) => {
                return Ok(Outcome::Skipped(format!(
                    "'{}' is already a member of '{}'",
                    member, group
                )))
            }
            Some(g) if g.kind != PrincipalKind::Group => {
                return Err(FailureCause::Conflict(format!("'{}' is not a group", group)))
            }
            Some(_) => {}
            None if self.dry() && self.planned.get(group) == Some(&PrincipalKind::Group) => {}
            None => return Err(FailureCause::NotFound(group.to_string())),
        }
        if self.principal_kind(member).await?.is_none() {
            return Err(FailureCause::NotFound(member.to_string()));
        }
        if self.dry() {
            return Ok(Outcome::Applied(format!(
                "would add '{}' to '{}'",
                member, group
            )));
        }
        self.call(self.repo.add_member(group, member)).await?;
        Ok(Outcome::Applied(format!("added '{}' to '{}'", member, group)))
    }

    async fn set_permission(
        &mut self,
        path: &str,
        entry: &PermissionEntry,
    ) -> Result<Outcome, FailureCause> {
        let acl = self.read_permissions(path).await?;
        let label = format!("{} {} for '{}'", entry.effect, privileges(entry), entry.principal);
        if acl.iter().any(|e| e.covers(entry)) {
            return Ok(Outcome::Skipped(format!("{} already in place", label)));
        }
        if self.dry() {
            return Ok(Outcome::Applied(format!("would {}", label)));
        }
        self.call(self.repo.set_permission(path, entry)).await?;
        Ok(Outcome::Applied(label))
    }

    /// Revoke every privilege under `root` that `keep` does not cover.
    async fn purge(
        &mut self,
        root: &str,
        principal: Option<&str>,
        keep: &[KeptPermission],
    ) -> Result<Outcome, FailureCause> {
        let mut revocations: Vec<(String, PermissionEntry)> = Vec::new();
        for node in self.descendants(root).await? {
            for current in self.read_permissions(&node).await? {
                if principal.is_some_and(|p| p != current.principal) {
                    continue;
                }
                let kept: BTreeSet<&String> = keep
                    .iter()
                    .filter(|k| k.path == node && k.entry.same_target(&current))
                    .flat_map(|k| k.entry.privileges.iter())
                    .collect();
                let uncovered: BTreeSet<String> = current
                    .privileges
                    .iter()
                    .filter(|p| !kept.contains(p))
                    .cloned()
                    .collect();
                if !uncovered.is_empty() {
                    revocations.push((
                        node.clone(),
                        PermissionEntry {
                            privileges: uncovered,
                            ..current
                        },
                    ));
                }
            }
        }

        if revocations.is_empty() {
            return Ok(Outcome::Skipped("nothing to revoke".to_string()));
        }
        if self.dry() {
            return Ok(Outcome::Applied(format!(
                "would revoke {} entr{} under '{}'",
                revocations.len(),
                if revocations.len() == 1 { "y" } else { "ies" },
                root
            )));
        }
        self.call(self.repo.revoke_permissions(&revocations)).await?;
        Ok(Outcome::Applied(format!(
            "revoked {} entr{} under '{}'",
            revocations.len(),
            if revocations.len() == 1 { "y" } else { "ies" },
            root
        )))
    }
}

/// Execute `actions` in order and report an outcome for every one of them.
pub async fn execute(
    actions: &ActionList,
    repo: &dyn Repository,
    options: ExecuteOptions,
) -> ExecutionReport {
    let started_at = now_rfc3339();
    info!(
        script = %actions.script,
        mode = %options.mode,
        actions = actions.len(),
        "executing action list"
    );

    let mut executor = Executor {
        repo,
        mode: options.mode,
        timeout: options.call_timeout,
        planned: HashMap::new(),
        planned_nodes: BTreeMap::new(),
    };
    let mut entries = Vec::with_capacity(actions.len());
    let mut halted = false;
    let mut cancelled = false;

    for (index, compiled) in actions.actions.iter().enumerate() {
        if !halted && options.cancel.is_cancelled() {
            info!(script = %actions.script, index, "execution cancelled");
            cancelled = true;
            halted = true;
        }
        let outcome = if halted {
            Outcome::NotAttempted
        } else {
            match executor.run(&compiled.action).await {
                Ok(outcome) => outcome,
                Err(cause) => Outcome::Failed(cause),
            }
        };
        debug!(
            index,
            action = %compiled.action.describe(),
            line = compiled.origin.line,
            outcome = %outcome,
            "action finished"
        );
        if outcome.is_failed() && options.mode == Mode::Apply {
            halted = true;
        }
        entries.push(ReportEntry {
            action: compiled.clone(),
            outcome,
        });
    }

    let status = ExecutionReport::derive_status(&entries, cancelled);
    let report = ExecutionReport {
        script: actions.script.clone(),
        checksum: actions.checksum.clone(),
        mode: options.mode,
        status,
        cancelled,
        started_at,
        finished_at: now_rfc3339(),
        entries,
    };
    info!(script = %report.script, status = %report.status, "execution finished");
    report
}
