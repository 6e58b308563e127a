//! The repository seam and an in-memory implementation.
//!
//! [`Repository`] is the only way the engine touches the backing store.
//! Every method is a single round trip, so the engine can bound each one
//! with its call timeout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use warden_core::path::{is_within, parent, rebase};
use warden_core::{PermissionEntry, PrincipalKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// A node or principal the call depends on does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The call would contradict existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The repository refused the call.
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Read view of a user or group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalInfo {
    pub id: String,
    pub kind: PrincipalKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Member ids; always empty for users.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub members: BTreeSet<String>,
}

#[async_trait]
pub trait Repository: Send + Sync {
    async fn principal(&self, id: &str) -> Result<Option<PrincipalInfo>, RepositoryError>;

    /// Create the principal if absent. An existing principal of the other
    /// kind is a `Conflict`.
    async fn ensure_principal(
        &self,
        kind: PrincipalKind,
        id: &str,
        path: Option<&str>,
    ) -> Result<(), RepositoryError>;

    async fn add_member(&self, group: &str, member: &str) -> Result<(), RepositoryError>;

    async fn remove_member(&self, group: &str, member: &str) -> Result<(), RepositoryError>;

    /// Entries on the node at `path`, in stored order.
    async fn read_permissions(&self, path: &str) -> Result<Vec<PermissionEntry>, RepositoryError>;

    /// Merge `entry` into the entry with the same principal, effect and
    /// restrictions, or append it.
    async fn set_permission(&self, path: &str, entry: &PermissionEntry)
        -> Result<(), RepositoryError>;

    /// Apply a batch of `(path, entry)` revocations as one change: either
    /// every revocation lands or none does. Each removes `entry`'s
    /// privileges from the matching entry on `path`; an entry left with no
    /// privileges is dropped.
    async fn revoke_permissions(
        &self,
        revocations: &[(String, PermissionEntry)],
    ) -> Result<(), RepositoryError>;

    async fn revoke_permission(
        &self,
        path: &str,
        entry: &PermissionEntry,
    ) -> Result<(), RepositoryError> {
        self.revoke_permissions(&[(path.to_string(), entry.clone())])
            .await
    }

    /// Existing nodes at or beneath `path`, sorted.
    async fn descendants(&self, path: &str) -> Result<Vec<String>, RepositoryError>;

    async fn node_exists(&self, path: &str) -> Result<bool, RepositoryError>;

    async fn property(&self, path: &str, key: &str) -> Result<Option<String>, RepositoryError>;

    async fn set_property(&self, path: &str, key: &str, value: &str)
        -> Result<(), RepositoryError>;

    /// Copy the subtree at `from` to `to`. The parent of `to` must exist.
    async fn copy(&self, from: &str, to: &str) -> Result<(), RepositoryError>;

    async fn move_node(&self, from: &str, to: &str) -> Result<(), RepositoryError>;

    /// Remove the subtree at `path`.
    async fn delete(&self, path: &str) -> Result<(), RepositoryError>;

    /// Make the changes of an apply run durable. Called once after
    /// execution and before the run is recorded in history.
    async fn commit(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acl: Vec<PermissionEntry>,
}

/// Serializable contents of an [`InMemoryRepository`]. Node keys are
/// absolute paths; the root `/` always exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryState {
    #[serde(default)]
    pub principals: BTreeMap<String, PrincipalInfo>,
    #[serde(default)]
    pub nodes: BTreeMap<String, Node>,
}

impl Default for RepositoryState {
    fn default() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::default());
        RepositoryState {
            principals: BTreeMap::new(),
            nodes,
        }
    }
}

impl RepositoryState {
    /// Insert `path` and any missing ancestors.
    pub fn add_node(&mut self, path: &str) {
        let mut current = Some(path);
        while let Some(p) = current {
            self.nodes.entry(p.to_string()).or_default();
            current = parent(p);
        }
    }

    fn subtree(&self, root: &str) -> Vec<String> {
        self.nodes
            .keys()
            .filter(|p| is_within(p, root))
            .cloned()
            .collect()
    }

    fn node_mut(&mut self, path: &str) -> Result<&mut Node, RepositoryError> {
        self.nodes
            .get_mut(path)
            .ok_or_else(|| RepositoryError::NotFound(path.to_string()))
    }

    fn require_parent(&self, path: &str) -> Result<(), RepositoryError> {
        match parent(path) {
            Some(p) if !self.nodes.contains_key(p) => Err(RepositoryError::NotFound(p.to_string())),
            _ => Ok(()),
        }
    }

    fn transfer(&mut self, from: &str, to: &str, keep_source: bool) -> Result<(), RepositoryError> {
        if !self.nodes.contains_key(from) {
            return Err(RepositoryError::NotFound(from.to_string()));
        }
        if self.nodes.contains_key(to) {
            return Err(RepositoryError::Conflict(format!("'{}' already exists", to)));
        }
        self.require_parent(to)?;
        let moved: Vec<(String, Node)> = self
            .subtree(from)
            .into_iter()
            .filter_map(|p| self.nodes.get(&p).map(|n| (p.clone(), n.clone())))
            .collect();
        if !keep_source {
            for (p, _) in &moved {
                self.nodes.remove(p);
            }
        }
        for (p, node) in moved {
            self.nodes.insert(rebase(&p, from, to), node);
        }
        Ok(())
    }
}

/// Repository held in process memory. Counts mutating calls so tests can
/// assert that nothing was changed. When opened with [`load`], `commit`
/// writes the state back to that file.
///
/// [`load`]: InMemoryRepository::load
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: Mutex<RepositoryState>,
    mutations: AtomicUsize,
    state_file: Option<PathBuf>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: RepositoryState) -> Self {
        let mut state = state;
        state.add_node("/");
        InMemoryRepository {
            state: Mutex::new(state),
            mutations: AtomicUsize::new(0),
            state_file: None,
        }
    }

    /// Builder: add a node (and its ancestors).
    pub fn with_node(self, path: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.add_node(path);
        }
        self
    }

    /// Load a state file. A missing file is an empty repository.
    /// Open the state file at `path`; a missing file is an empty tree.
    /// `commit` saves back to the same file.
    pub fn load(path: &Path) -> Result<Self, RepositoryError> {
        let mut repo = match std::fs::read_to_string(path) {
            Ok(text) => {
                let state: RepositoryState = serde_json::from_str(&text).map_err(|e| {
                    RepositoryError::Rejected(format!("invalid state file {}: {}", path.display(), e))
                })?;
                Self::from_state(state)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::new(),
            Err(e) => {
                return Err(RepositoryError::Rejected(format!(
                    "cannot read state file {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        repo.state_file = Some(path.to_path_buf());
        Ok(repo)
    }

    /// Write the state to `path`, creating missing parent directories.
    pub fn save(&self, path: &Path) -> Result<(), RepositoryError> {
        let text = serde_json::to_string_pretty(&self.snapshot()?)
            .map_err(|e| RepositoryError::Rejected(e.to_string()))?;
        let written = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir),
            _ => Ok(()),
        }
        .and_then(|_| std::fs::write(path, text + "\n"));
        written.map_err(|e| {
            RepositoryError::Rejected(format!("cannot write state file {}: {}", path.display(), e))
        })
    }

    pub fn snapshot(&self) -> Result<RepositoryState, RepositoryError> {
        Ok(self.lock()?.clone())
    }

    /// Number of successful mutating calls so far.
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, RepositoryState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Rejected("repository state lock poisoned".to_string()))
    }

    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut RepositoryState) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut state = self.lock()?;
        let value = f(&mut state)?;
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }
}

fn group_mut<'a>(
    state: &'a mut RepositoryState,
    group: &str,
) -> Result<&'a mut PrincipalInfo, RepositoryError> {
    match state.principals.get_mut(group) {
        Some(p) if p.kind == PrincipalKind::Group => Ok(p),
        Some(_) => Err(RepositoryError::Conflict(format!("'{}' is a user, not a group", group))),
        None => Err(RepositoryError::NotFound(group.to_string())),
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn principal(&self, id: &str) -> Result<Option<PrincipalInfo>, RepositoryError> {
        Ok(self.lock()?.principals.get(id).cloned())
    }

    async fn ensure_principal(
        &self,
        kind: PrincipalKind,
        id: &str,
        path: Option<&str>,
    ) -> Result<(), RepositoryError> {
        self.mutate(|state| {
            if let Some(existing) = state.principals.get(id) {
                if existing.kind != kind {
                    return Err(RepositoryError::Conflict(format!(
                        "'{}' already exists as a {}",
                        id, existing.kind
                    )));
                }
                return Ok(());
            }
            state.principals.insert(
                id.to_string(),
                PrincipalInfo {
                    id: id.to_string(),
                    kind,
                    path: path.map(str::to_string),
                    members: BTreeSet::new(),
                },
            );
            Ok(())
        })
    }

    async fn add_member(&self, group: &str, member: &str) -> Result<(), RepositoryError> {
        self.mutate(|state| {
            if !state.principals.contains_key(member) {
                return Err(RepositoryError::NotFound(member.to_string()));
            }
            group_mut(state, group)?.members.insert(member.to_string());
            Ok(())
        })
    }

    async fn remove_member(&self, group: &str, member: &str) -> Result<(), RepositoryError> {
        self.mutate(|state| {
            group_mut(state, group)?.members.remove(member);
            Ok(())
        })
    }

    async fn read_permissions(&self, path: &str) -> Result<Vec<PermissionEntry>, RepositoryError> {
        self.lock()?
            .nodes
            .get(path)
            .map(|n| n.acl.clone())
            .ok_or_else(|| RepositoryError::NotFound(path.to_string()))
    }

    async fn set_permission(
        &self,
        path: &str,
        entry: &PermissionEntry,
    ) -> Result<(), RepositoryError> {
        self.mutate(|state| {
            let node = state.node_mut(path)?;
            match node.acl.iter_mut().find(|e| e.same_target(entry)) {
                Some(existing) => existing.privileges.extend(entry.privileges.iter().cloned()),
                None => node.acl.push(entry.clone()),
            }
            Ok(())
        })
    }

    async fn revoke_permissions(
        &self,
        revocations: &[(String, PermissionEntry)],
    ) -> Result<(), RepositoryError> {
        self.mutate(|state| {
            // Nothing changes unless every target node exists.
            if let Some((missing, _)) = revocations
                .iter()
                .find(|(path, _)| !state.nodes.contains_key(path))
            {
                return Err(RepositoryError::NotFound(missing.clone()));
            }
            for (path, entry) in revocations {
                let node = state.node_mut(path)?;
                for existing in node.acl.iter_mut().filter(|e| e.same_target(entry)) {
                    existing.privileges.retain(|p| !entry.privileges.contains(p));
                }
                node.acl.retain(|e| !e.privileges.is_empty());
            }
            Ok(())
        })
    }

    async fn descendants(&self, path: &str) -> Result<Vec<String>, RepositoryError> {
        Ok(self.lock()?.subtree(path))
    }

    async fn node_exists(&self, path: &str) -> Result<bool, RepositoryError> {
        Ok(self.lock()?.nodes.contains_key(path))
    }

    async fn property(&self, path: &str, key: &str) -> Result<Option<String>, RepositoryError> {
        self.lock()?
            .nodes
            .get(path)
            .map(|n| n.properties.get(key).cloned())
            .ok_or_else(|| RepositoryError::NotFound(path.to_string()))
    }

    async fn set_property(
        &self,
        path: &str,
        key: &str,
        value: &str,
    ) -> Result<(), RepositoryError> {
        self.mutate(|state| {
            state
                .node_mut(path)?
                .properties
                .insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    async fn copy(&self, from: &str, to: &str) -> Result<(), RepositoryError> {
        self.mutate(|state| state.transfer(from, to, true))
    }

    async fn move_node(&self, from: &str, to: &str) -> Result<(), RepositoryError> {
        self.mutate(|state| state.transfer(from, to, false))
    }

    async fn commit(&self) -> Result<(), RepositoryError> {
        match &self.state_file {
            Some(path) => self.save(path),
            None => Ok(()),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), RepositoryError> {
        if path == "/" {
            return Err(RepositoryError::Rejected("the root cannot be deleted".to_string()));
        }
        self.mutate(|state| {
            let doomed = state.subtree(path);
            if doomed.is_empty() {
                return Err(RepositoryError::NotFound(path.to_string()));
            }
            for p in doomed {
                state.nodes.remove(&p);
            }
            Ok(())
        })
    }
}
