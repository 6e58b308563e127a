//! Statement tree produced by the parser.
//!
//! Statements are a closed enumeration: adding a kind means touching every
//! exhaustive `match` in the validator, resolver and compiler.

use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────
// Provenance
// ──────────────────────────────────────────────

/// Where a statement came from: script identity plus the position of its
/// opening keyword.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provenance {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

// ──────────────────────────────────────────────
// Shared vocabulary
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    User,
    Group,
}

impl std::fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrincipalKind::User => write!(f, "user"),
            PrincipalKind::Group => write!(f, "group"),
        }
    }
}

/// Whether a permission entry grants or denies its privileges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effect::Allow => write!(f, "allow"),
            Effect::Deny => write!(f, "deny"),
        }
    }
}

// ──────────────────────────────────────────────
// Statements
// ──────────────────────────────────────────────

/// Verification statements (`check ...`). They never mutate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawCheck {
    Exists {
        id: String,
        kind: Option<PrincipalKind>,
    },
    NotExists {
        id: String,
    },
    Permission {
        effect: Effect,
        privileges: Vec<String>,
        path: String,
        principal: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    CreateUser {
        id: String,
        path: Option<String>,
        prov: Provenance,
    },
    CreateGroup {
        id: String,
        path: Option<String>,
        prov: Provenance,
    },
    AddToGroup {
        member: String,
        group: String,
        prov: Provenance,
    },
    RemoveFromGroup {
        member: String,
        group: String,
        prov: Provenance,
    },
    /// `allow` / `deny`. Privileges and restrictions are kept in source
    /// order here; canonical ordering happens in the compiler.
    Permission {
        effect: Effect,
        privileges: Vec<String>,
        path: String,
        principal: String,
        restrictions: Vec<(String, String)>,
        prov: Provenance,
    },
    SetProperty {
        path: String,
        key: String,
        value: String,
        prov: Provenance,
    },
    Copy {
        from: String,
        to: String,
        prov: Provenance,
    },
    Move {
        from: String,
        to: String,
        prov: Provenance,
    },
    Delete {
        path: String,
        prov: Provenance,
    },
    Purge {
        path: String,
        principal: Option<String>,
        prov: Provenance,
    },
    Include {
        target: String,
        prov: Provenance,
    },
    Define {
        flag: String,
        value: bool,
        prov: Provenance,
    },
    If {
        flag: String,
        negated: bool,
        then_branch: Vec<Statement>,
        else_branch: Vec<Statement>,
        prov: Provenance,
    },
    Check {
        check: RawCheck,
        prov: Provenance,
    },
}

impl Statement {
    pub fn prov(&self) -> &Provenance {
        match self {
            Statement::CreateUser { prov, .. }
            | Statement::CreateGroup { prov, .. }
            | Statement::AddToGroup { prov, .. }
            | Statement::RemoveFromGroup { prov, .. }
            | Statement::Permission { prov, .. }
            | Statement::SetProperty { prov, .. }
            | Statement::Copy { prov, .. }
            | Statement::Move { prov, .. }
            | Statement::Delete { prov, .. }
            | Statement::Purge { prov, .. }
            | Statement::Include { prov, .. }
            | Statement::Define { prov, .. }
            | Statement::If { prov, .. }
            | Statement::Check { prov, .. } => prov,
        }
    }

    /// Statement kind as written in diagnostics.
    pub fn keyword(&self) -> &'static str {
        match self {
            Statement::CreateUser { .. } => "create user",
            Statement::CreateGroup { .. } => "create group",
            Statement::AddToGroup { .. } => "add",
            Statement::RemoveFromGroup { .. } => "remove",
            Statement::Permission {
                effect: Effect::Allow,
                ..
            } => "allow",
            Statement::Permission {
                effect: Effect::Deny,
                ..
            } => "deny",
            Statement::SetProperty { .. } => "set",
            Statement::Copy { .. } => "copy",
            Statement::Move { .. } => "move",
            Statement::Delete { .. } => "delete",
            Statement::Purge { .. } => "purge",
            Statement::Include { .. } => "include",
            Statement::Define { .. } => "define",
            Statement::If { .. } => "if",
            Statement::Check { .. } => "check",
        }
    }
}
