//! Semantic validation.
//!
//! Checks every statement against the rules for its kind and collects all
//! problems in a single pass. Pure: no repository or loader access.

use std::collections::HashSet;

use crate::ast::{Provenance, RawCheck, Statement};
use crate::error::SemanticError;
use crate::path::{is_within, path_problem};
use crate::source::Script;

/// A script whose statements passed validation. Only [`validate`] builds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedScript {
    identity: String,
    checksum: String,
    statements: Vec<Statement>,
}

impl ValidatedScript {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }
}

struct Collector {
    errors: Vec<SemanticError>,
}

impl Collector {
    fn push(&mut self, prov: &Provenance, message: impl Into<String>) {
        self.errors.push(SemanticError {
            file: prov.file.clone(),
            line: prov.line,
            column: prov.column,
            message: message.into(),
        });
    }

    fn path(&mut self, prov: &Provenance, what: &str, path: &str) {
        if let Some(problem) = path_problem(path) {
            self.push(prov, format!("{}: {}", what, problem));
        }
    }

    fn id(&mut self, prov: &Provenance, what: &str, id: &str) {
        if id.is_empty() {
            self.push(prov, format!("{} must not be empty", what));
        } else if let Some(c) = id
            .chars()
            .find(|c| c.is_whitespace() || c.is_control() || *c == '/')
        {
            self.push(
                prov,
                format!("{} '{}' contains illegal character {:?}", what, id, c),
            );
        }
    }

    fn privileges(&mut self, prov: &Provenance, privileges: &[String]) {
        if privileges.is_empty() {
            self.push(prov, "privilege set must not be empty");
        }
        for p in privileges {
            if p.trim().is_empty() {
                self.push(prov, "privilege name must not be empty");
            }
        }
    }

    fn transfer(&mut self, prov: &Provenance, kw: &str, from: &str, to: &str) {
        self.path(prov, &format!("{} source", kw), from);
        self.path(prov, &format!("{} destination", kw), to);
        if from == to {
            self.push(prov, format!("{} source and destination are the same", kw));
        } else if is_within(to, from) {
            self.push(
                prov,
                format!("{} destination '{}' lies inside source '{}'", kw, to, from),
            );
        }
    }
}

fn check_statements(stmts: &[Statement], c: &mut Collector) {
    for stmt in stmts {
        match stmt {
            Statement::CreateUser { id, path, prov } | Statement::CreateGroup { id, path, prov } => {
                c.id(prov, "principal id", id);
                if let Some(path) = path {
                    c.path(prov, "principal path", path);
                }
            }
            Statement::AddToGroup {
                member,
                group,
                prov,
            }
            | Statement::RemoveFromGroup {
                member,
                group,
                prov,
            } => {
                c.id(prov, "member id", member);
                c.id(prov, "group id", group);
                if member == group {
                    c.push(prov, format!("group '{}' cannot be a member of itself", group));
                }
            }
            Statement::Permission {
                privileges,
                path,
                principal,
                restrictions,
                prov,
                ..
            } => {
                c.privileges(prov, privileges);
                c.path(prov, "permission path", path);
                c.id(prov, "principal id", principal);
                let mut seen = HashSet::new();
                for (key, value) in restrictions {
                    if key.is_empty() {
                        c.push(prov, "restriction name must not be empty");
                    } else if !seen.insert(key.as_str()) {
                        c.push(prov, format!("duplicate restriction '{}'", key));
                    }
                    if value.is_empty() {
                        c.push(prov, format!("restriction '{}' has an empty value", key));
                    }
                }
            }
            Statement::SetProperty {
                path, key, prov, ..
            } => {
                c.path(prov, "property path", path);
                if key.is_empty() {
                    c.push(prov, "property name must not be empty");
                } else if key.contains('/') {
                    c.push(prov, format!("property name '{}' must not contain '/'", key));
                }
            }
            Statement::Copy { from, to, prov } => c.transfer(prov, "copy", from, to),
            Statement::Move { from, to, prov } => c.transfer(prov, "move", from, to),
            Statement::Delete { path, prov } => {
                c.path(prov, "delete path", path);
                if path == "/" {
                    c.push(prov, "the repository root cannot be deleted");
                }
            }
            Statement::Purge {
                path,
                principal,
                prov,
            } => {
                c.path(prov, "purge path", path);
                if let Some(principal) = principal {
                    c.id(prov, "principal id", principal);
                }
            }
            Statement::Include { target, prov } => {
                if target.trim().is_empty() {
                    c.push(prov, "include target must not be empty");
                } else if target.chars().any(|ch| ch.is_whitespace() || ch.is_control()) {
                    c.push(
                        prov,
                        format!("include target '{}' must not contain whitespace", target),
                    );
                }
            }
            Statement::Define { flag, prov, .. } => {
                if flag.is_empty() {
                    c.push(prov, "flag name must not be empty");
                }
            }
            Statement::If {
                then_branch,
                else_branch,
                ..
            } => {
                check_statements(then_branch, c);
                check_statements(else_branch, c);
            }
            Statement::Check { check, prov } => match check {
                RawCheck::Exists { id, .. } | RawCheck::NotExists { id } => {
                    c.id(prov, "principal id", id);
                }
                RawCheck::Permission {
                    privileges,
                    path,
                    principal,
                    ..
                } => {
                    c.privileges(prov, privileges);
                    c.path(prov, "permission path", path);
                    c.id(prov, "principal id", principal);
                }
            },
        }
    }
}

/// Validate a parsed script. Returns every error found, not just the first.
pub fn validate(
    script: &Script,
    statements: Vec<Statement>,
) -> Result<ValidatedScript, Vec<SemanticError>> {
    let mut collector = Collector { errors: Vec::new() };
    check_statements(&statements, &mut collector);
    if collector.errors.is_empty() {
        Ok(ValidatedScript {
            identity: script.identity().to_owned(),
            checksum: script.checksum().to_owned(),
            statements,
        })
    } else {
        Err(collector.errors)
    }
}
