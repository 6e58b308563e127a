//! Primitive, idempotent repository actions produced by the compiler.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{Effect, PrincipalKind, Provenance};
use crate::resolve::ScriptSource;

/// One access-control entry: a principal, an effect, a privilege set and the
/// restrictions that scope it. Sets and maps are ordered, so equal entries
/// always serialize identically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PermissionEntry {
    pub principal: String,
    pub effect: Effect,
    pub privileges: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub restrictions: BTreeMap<String, String>,
}

impl PermissionEntry {
    /// Same principal, effect and restriction set; privileges may differ.
    pub fn same_target(&self, other: &PermissionEntry) -> bool {
        self.principal == other.principal
            && self.effect == other.effect
            && self.restrictions == other.restrictions
    }

    /// True if `self` targets the same slot and holds every privilege of
    /// `wanted`.
    pub fn covers(&self, wanted: &PermissionEntry) -> bool {
        self.same_target(wanted) && wanted.privileges.is_subset(&self.privileges)
    }
}

/// A permission the script declares at a given path. Purge keeps these.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeptPermission {
    pub path: String,
    pub entry: PermissionEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    EnsureUser {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    EnsureGroup {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    AddMember {
        group: String,
        member: String,
    },
    RemoveMember {
        group: String,
        member: String,
    },
    SetPermission {
        path: String,
        entry: PermissionEntry,
    },
    SetProperty {
        path: String,
        key: String,
        value: String,
    },
    Copy {
        from: String,
        to: String,
    },
    Move {
        from: String,
        to: String,
    },
    Delete {
        path: String,
    },
    /// Two-phase: the current entries under `path` are read at execution
    /// time and every privilege not covered by `keep` is revoked.
    Purge {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        principal: Option<String>,
        keep: Vec<KeptPermission>,
    },
    /// `check` statements verify and never mutate.
    CheckExists {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        principal_kind: Option<PrincipalKind>,
    },
    CheckNotExists {
        id: String,
    },
    CheckPermission {
        path: String,
        entry: PermissionEntry,
    },
}

impl Action {
    /// Short label for logs and text reports.
    pub fn describe(&self) -> String {
        match self {
            Action::EnsureUser { id, .. } => format!("ensure user '{}'", id),
            Action::EnsureGroup { id, .. } => format!("ensure group '{}'", id),
            Action::AddMember { group, member } => {
                format!("add '{}' to group '{}'", member, group)
            }
            Action::RemoveMember { group, member } => {
                format!("remove '{}' from group '{}'", member, group)
            }
            Action::SetPermission { path, entry } => format!(
                "{} {} on '{}' for '{}'",
                entry.effect,
                join(&entry.privileges),
                path,
                entry.principal
            ),
            Action::SetProperty { path, key, value } => {
                format!("set '{}' = '{}' on '{}'", key, value, path)
            }
            Action::Copy { from, to } => format!("copy '{}' to '{}'", from, to),
            Action::Move { from, to } => format!("move '{}' to '{}'", from, to),
            Action::Delete { path } => format!("delete '{}'", path),
            Action::Purge {
                path, principal, ..
            } => match principal {
                Some(p) => format!("purge '{}' for '{}'", path, p),
                None => format!("purge '{}'", path),
            },
            Action::CheckExists { id, .. } => format!("check '{}' exists", id),
            Action::CheckNotExists { id } => format!("check '{}' does not exist", id),
            Action::CheckPermission { path, entry } => format!(
                "check {} {} on '{}' for '{}'",
                entry.effect,
                join(&entry.privileges),
                path,
                entry.principal
            ),
        }
    }

    /// True for actions that can change repository state.
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Action::CheckExists { .. }
                | Action::CheckNotExists { .. }
                | Action::CheckPermission { .. }
        )
    }
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().cloned().collect::<Vec<_>>().join(", ")
}

/// An action and the statement it was lowered from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledAction {
    #[serde(flatten)]
    pub action: Action,
    pub origin: Provenance,
}

/// Compiler output. Serializes to a stable JSON form: recompiling the same
/// text always yields byte-identical JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionList {
    pub script: String,
    pub checksum: String,
    pub sources: Vec<ScriptSource>,
    pub actions: Vec<CompiledAction>,
}

impl ActionList {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter().map(|a| &a.action)
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
