use super::{parse, parse_source};
use crate::lexer::{lex, Token};
use crate::ast::{Effect, PrincipalKind, RawCheck, Statement};

fn parse_ok(src: &str) -> Vec<Statement> {
    parse_source(src, "test.warden").unwrap_or_else(|e| panic!("parse failed: {}", e))
}

#[test]
fn scenario_script_parses_into_two_statements() {
    let stmts = parse_ok(r#"create group "editors"; allow jcr:read on "/content" for "editors";"#);
    assert_eq!(stmts.len(), 2);
    assert!(matches!(&stmts[0], Statement::CreateGroup { id, path: None, .. } if id == "editors"));
    match &stmts[1] {
        Statement::Permission {
            effect,
            privileges,
            path,
            principal,
            restrictions,
            prov,
        } => {
            assert_eq!(*effect, Effect::Allow);
            assert_eq!(privileges, &vec!["jcr:read".to_string()]);
            assert_eq!(path, "/content");
            assert_eq!(principal, "editors");
            assert!(restrictions.is_empty());
            assert_eq!((prov.line, prov.column), (1, 25));
        }
        other => panic!("expected permission, got {:?}", other),
    }
}

#[test]
fn keywords_are_case_insensitive() {
    let stmts = parse_ok(r#"CREATE USER "jdoe" AT "/home/users/j"; Delete "/tmp";"#);
    assert!(
        matches!(&stmts[0], Statement::CreateUser { id, path: Some(p), .. } if id == "jdoe" && p == "/home/users/j")
    );
    assert!(matches!(&stmts[1], Statement::Delete { .. }));
}

#[test]
fn permission_with_multiple_privileges_and_restrictions() {
    let stmts = parse_ok(
        r#"deny jcr:write, jcr:removeNode on "/content/site" for "authors" with rep:glob = "*/jcr:content*", "rep:itemNames" = "title";"#,
    );
    match &stmts[0] {
        Statement::Permission {
            effect,
            privileges,
            restrictions,
            ..
        } => {
            assert_eq!(*effect, Effect::Deny);
            assert_eq!(privileges, &vec!["jcr:write".to_string(), "jcr:removeNode".to_string()]);
            assert_eq!(
                restrictions,
                &vec![
                    ("rep:glob".to_string(), "*/jcr:content*".to_string()),
                    ("rep:itemNames".to_string(), "title".to_string()),
                ]
            );
        }
        other => panic!("expected permission, got {:?}", other),
    }
}

#[test]
fn structural_statements() {
    let stmts = parse_ok(
        r#"
        set "jcr:title" = "Home" on "/content/home";
        copy "/content/a" to "/content/b";
        move "/content/c" to "/archive/c";
        purge "/content" for "editors";
        purge "/apps";
        add "jdoe" to "editors";
        remove "jdoe" from "reviewers";
        include "common/groups";
        "#,
    );
    let keywords: Vec<&str> = stmts.iter().map(|s| s.keyword()).collect();
    assert_eq!(
        keywords,
        vec!["set", "copy", "move", "purge", "purge", "add", "remove", "include"]
    );
    assert!(matches!(&stmts[4], Statement::Purge { principal: None, .. }));
}

#[test]
fn conditionals_nest_and_chain() {
    let stmts = parse_ok(
        r#"
        define author = true;
        if author {
            create group "authors";
        } else if not publish {
            create group "other";
        } else {
        }
        "#,
    );
    assert_eq!(stmts.len(), 2);
    match &stmts[1] {
        Statement::If {
            flag,
            negated,
            then_branch,
            else_branch,
            ..
        } => {
            assert_eq!(flag, "author");
            assert!(!negated);
            assert_eq!(then_branch.len(), 1);
            assert_eq!(else_branch.len(), 1);
            assert!(matches!(
                &else_branch[0],
                Statement::If { negated: true, else_branch, .. } if else_branch.is_empty()
            ));
        }
        other => panic!("expected if, got {:?}", other),
    }
}

#[test]
fn check_statements() {
    let stmts = parse_ok(
        r#"
        check exists "editors" as group;
        check not exists "legacy";
        check allow jcr:read on "/content" for "editors";
        "#,
    );
    assert!(matches!(
        &stmts[0],
        Statement::Check { check: RawCheck::Exists { kind: Some(PrincipalKind::Group), .. }, .. }
    ));
    assert!(matches!(&stmts[1], Statement::Check { check: RawCheck::NotExists { .. }, .. }));
    assert!(matches!(
        &stmts[2],
        Statement::Check { check: RawCheck::Permission { effect: Effect::Allow, .. }, .. }
    ));
}

#[test]
fn unknown_keyword_is_reported_with_position() {
    let err = parse_source("create group \"g\";\n  grant x on \"/a\";", "s.warden").unwrap_err();
    assert_eq!(err.message, "unknown keyword 'grant'");
    assert_eq!((err.file.as_str(), err.line, err.column), ("s.warden", 2, 3));
}

#[test]
fn missing_semicolon_is_reported() {
    let err = parse_source("delete \"/a\"\ndelete \"/b\";", "t").unwrap_err();
    assert!(err.message.starts_with("expected ';'"), "{}", err.message);
    assert_eq!(err.line, 2);
}

#[test]
fn wrong_token_in_statement_position() {
    let err = parse_source("\"/content\";", "t").unwrap_err();
    assert_eq!(err.message, "expected statement keyword, got string \"/content\"");
}

#[test]
fn unterminated_block_points_at_opening_brace() {
    let err = parse_source("define f = true;\nif f {\n delete \"/a\";", "t").unwrap_err();
    assert_eq!(err.message, "unterminated block: missing '}'");
    assert_eq!((err.line, err.column), (2, 6));
}

#[test]
fn stray_closing_brace_is_rejected() {
    let err = parse_source("}", "t").unwrap_err();
    assert!(err.message.contains("without matching"));
}

#[test]
fn empty_privilege_list_is_a_parse_error() {
    let err = parse_source("allow on \"/a\" for \"g\";", "t").unwrap_err();
    assert_eq!(err.message, "expected privilege name, got 'on'");
}

#[test]
fn define_requires_boolean_literal() {
    let err = parse_source("define f = yes;", "t").unwrap_err();
    assert_eq!(err.message, "expected 'true' or 'false', got 'yes'");
}

#[test]
fn token_streams_without_eof_do_not_panic() {
    assert!(parse(&[], "t").unwrap().is_empty());

    let mut tokens = lex(r#"delete "/x""#, "t").unwrap();
    assert_eq!(tokens.pop().map(|t| t.token), Some(Token::Eof));
    let err = parse(&tokens, "t").unwrap_err();
    assert!(err.message.contains("';'"), "{}", err.message);
}
