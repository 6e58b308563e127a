//! Lowering of the flat statement list to primitive actions.
//!
//! Total and deterministic: validation already excluded every input the
//! compiler could reject. Canonical rule for permissions: one
//! `SetPermission` per statement, privileges merged into a sorted,
//! deduplicated set and restrictions into a sorted map.

use std::collections::{BTreeMap, BTreeSet};

use crate::action::{Action, ActionList, CompiledAction, KeptPermission, PermissionEntry};
use crate::ast::{Effect, RawCheck, Statement};
use crate::path::is_within;
use crate::resolve::Resolved;

fn entry(
    principal: &str,
    effect: Effect,
    privileges: &[String],
    restrictions: &[(String, String)],
) -> PermissionEntry {
    PermissionEntry {
        principal: principal.to_owned(),
        effect,
        privileges: privileges.iter().cloned().collect::<BTreeSet<_>>(),
        restrictions: restrictions.iter().cloned().collect::<BTreeMap<_, _>>(),
    }
}

/// Every permission the script declares on `root` or beneath it, optionally
/// restricted to one principal. Sorted and deduplicated.
fn kept_permissions(
    statements: &[Statement],
    root: &str,
    principal: Option<&str>,
) -> Vec<KeptPermission> {
    let mut kept: BTreeSet<KeptPermission> = BTreeSet::new();
    for stmt in statements {
        if let Statement::Permission {
            effect,
            privileges,
            path,
            principal: p,
            restrictions,
            ..
        } = stmt
        {
            if !is_within(path, root) {
                continue;
            }
            if principal.is_some_and(|wanted| wanted != p) {
                continue;
            }
            kept.insert(KeptPermission {
                path: path.clone(),
                entry: entry(p, *effect, privileges, restrictions),
            });
        }
    }
    kept.into_iter().collect()
}

fn lower(stmt: &Statement, all: &[Statement]) -> Option<Action> {
    let action = match stmt {
        Statement::CreateUser { id, path, .. } => Action::EnsureUser {
            id: id.clone(),
            path: path.clone(),
        },
        Statement::CreateGroup { id, path, .. } => Action::EnsureGroup {
            id: id.clone(),
            path: path.clone(),
        },
        Statement::AddToGroup { member, group, .. } => Action::AddMember {
            group: group.clone(),
            member: member.clone(),
        },
        Statement::RemoveFromGroup { member, group, .. } => Action::RemoveMember {
            group: group.clone(),
            member: member.clone(),
        },
        Statement::Permission {
            effect,
            privileges,
            path,
            principal,
            restrictions,
            ..
        } => Action::SetPermission {
            path: path.clone(),
            entry: entry(principal, *effect, privileges, restrictions),
        },
        Statement::SetProperty {
            path, key, value, ..
        } => Action::SetProperty {
            path: path.clone(),
            key: key.clone(),
            value: value.clone(),
        },
        Statement::Copy { from, to, .. } => Action::Copy {
            from: from.clone(),
            to: to.clone(),
        },
        Statement::Move { from, to, .. } => Action::Move {
            from: from.clone(),
            to: to.clone(),
        },
        Statement::Delete { path, .. } => Action::Delete { path: path.clone() },
        Statement::Purge {
            path, principal, ..
        } => Action::Purge {
            path: path.clone(),
            principal: principal.clone(),
            keep: kept_permissions(all, path, principal.as_deref()),
        },
        Statement::Check { check, .. } => match check {
            RawCheck::Exists { id, kind } => Action::CheckExists {
                id: id.clone(),
                principal_kind: *kind,
            },
            RawCheck::NotExists { id } => Action::CheckNotExists { id: id.clone() },
            RawCheck::Permission {
                effect,
                privileges,
                path,
                principal,
            } => Action::CheckPermission {
                path: path.clone(),
                entry: entry(principal, *effect, privileges, &[]),
            },
        },
        // Erased by the resolver.
        Statement::Include { .. } | Statement::Define { .. } | Statement::If { .. } => {
            return None
        }
    };
    Some(action)
}

/// Lower a resolved statement list into its action list.
pub fn compile(resolved: &Resolved) -> ActionList {
    let actions = resolved
        .statements
        .iter()
        .filter_map(|stmt| {
            lower(stmt, &resolved.statements).map(|action| CompiledAction {
                action,
                origin: stmt.prov().clone(),
            })
        })
        .collect();
    ActionList {
        script: resolved.identity.clone(),
        checksum: resolved.bundle_checksum(),
        sources: resolved.sources.clone(),
        actions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile_source;

    #[test]
    fn scenario_compiles_to_group_then_permission() {
        let list = compile_source(
            "s",
            r#"create group "editors"; allow jcr:read on "/content" for "editors";"#,
        )
        .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(
            list.actions[0].action,
            Action::EnsureGroup {
                id: "editors".into(),
                path: None
            }
        );
        match &list.actions[1].action {
            Action::SetPermission { path, entry } => {
                assert_eq!(path, "/content");
                assert_eq!(entry.principal, "editors");
                assert_eq!(entry.effect, Effect::Allow);
                assert_eq!(entry.privileges.iter().collect::<Vec<_>>(), vec!["jcr:read"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn equal_checksums_compile_to_equal_action_lists() {
        let cr = compile_source("t", "# note\rdelete \"/x\";").unwrap();
        let lf = compile_source("t", "# note\ndelete \"/x\";").unwrap();
        assert_eq!(cr.checksum, lf.checksum);
        assert_eq!(cr.len(), 1);
        assert_eq!(cr.actions, lf.actions);
    }

    #[test]
    fn privileges_are_merged_sorted_and_deduplicated() {
        let a = compile_source(
            "s",
            r#"allow jcr:write, jcr:read, jcr:write on "/c" for "g" with b = "2", a = "1";"#,
        )
        .unwrap();
        let b = compile_source(
            "s",
            r#"allow jcr:read, jcr:write on "/c" for "g" with a = "1", b = "2";"#,
        )
        .unwrap();
        assert_eq!(a.actions[0].action, b.actions[0].action);
        match &a.actions[0].action {
            Action::SetPermission { entry, .. } => {
                assert_eq!(
                    entry.privileges.iter().cloned().collect::<Vec<_>>(),
                    vec!["jcr:read".to_string(), "jcr:write".to_string()]
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn purge_keeps_declared_permissions_beneath_its_path() {
        let list = compile_source(
            "s",
            r#"
            purge "/content" for "editors";
            allow jcr:read on "/content" for "editors";
            allow jcr:write on "/content/site" for "editors";
            allow jcr:read on "/content" for "others";
            allow jcr:read on "/apps" for "editors";
            "#,
        )
        .unwrap();
        match &list.actions[0].action {
            Action::Purge { keep, principal, .. } => {
                assert_eq!(principal.as_deref(), Some("editors"));
                let paths: Vec<&str> = keep.iter().map(|k| k.path.as_str()).collect();
                assert_eq!(paths, vec!["/content", "/content/site"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn checks_lower_to_check_actions() {
        let list = compile_source(
            "s",
            r#"check exists "g" as group; check not exists "x"; check deny jcr:all on "/" for "g";"#,
        )
        .unwrap();
        assert!(list.iter().all(|a| !a.is_mutating()));
        assert!(matches!(list.actions[2].action, Action::CheckPermission { .. }));
    }

    #[test]
    fn json_form_is_stable() {
        let src = r#"
            create user "jdoe" at "/home/users/j";
            allow jcr:read on "/content" for "jdoe";
            purge "/content";
        "#;
        let first = serde_json::to_string(&compile_source("s", src).unwrap()).unwrap();
        let second = serde_json::to_string(&compile_source("s", src).unwrap()).unwrap();
        assert_eq!(first, second);
        let parsed: ActionList = serde_json::from_str(&first).unwrap();
        assert_eq!(parsed, compile_source("s", src).unwrap());
        assert!(first.contains(r#""kind":"ensure_user""#));
    }
}
