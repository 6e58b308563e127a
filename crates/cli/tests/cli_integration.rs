//! CLI integration tests for every subcommand.
//!
//! Uses `assert_cmd` to spawn the `warden` binary and verify exit codes,
//! stdout content, and stderr content. Each test that writes state works in
//! its own temporary directory.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Locate the workspace root by walking up from CARGO_MANIFEST_DIR.
fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

/// `warden` rooted at `dir`, with logging env cleared.
fn warden_in(dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("warden");
    cmd.current_dir(dir)
        .env_remove("WARDEN_LOG")
        .env_remove("RUST_LOG");
    cmd
}

/// `warden` reading scripts from the shared fixtures directory.
fn warden_fixtures() -> Command {
    let mut cmd = warden_in(&workspace_root());
    cmd.args(["--scripts-dir", "fixtures"]);
    cmd
}

/// A workspace with a `scripts/` directory, a `warden.toml`, and a state
/// file that already holds `/content`.
fn project(scripts: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("scripts")).unwrap();
    for (name, text) in scripts {
        let file = dir.path().join("scripts").join(format!("{}.warden", name));
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(file, text).unwrap();
    }
    fs::write(
        dir.path().join("warden.toml"),
        "scripts_dir = \"scripts\"\nstate_file = \"state.json\"\nhistory_file = \"history.jsonl\"\nprincipal = \"ops\"\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("state.json"),
        r#"{"principals": {}, "nodes": {"/": {}, "/content": {}}}"#,
    )
    .unwrap();
    dir
}

const EDITORS: &str = r#"create group "editors"; allow jcr:read on "/content" for "editors";"#;

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    warden_fixtures()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Declarative access-control provisioning scripts",
        ));
}

#[test]
fn version_exits_0() {
    warden_fixtures()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("warden"));
}

// ──────────────────────────────────────────────
// 2. check / compile
// ──────────────────────────────────────────────

#[test]
fn check_valid_fixture_prints_checksum() {
    warden_fixtures()
        .args(["check", "editors"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("ok editors "))
        .stdout(predicate::str::contains("2 actions from 1 script"));
}

#[test]
fn check_json_lists_sources() {
    let output = warden_fixtures()
        .args(["--output", "json", "check", "site"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["valid"], true);
    assert_eq!(json["sources"][1]["identity"], "common/groups");
}

#[test]
fn compile_prints_action_list_json() {
    let output = warden_fixtures()
        .args(["compile", "editors"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["actions"][0]["kind"], "ensure_group");
    assert_eq!(json["actions"][1]["entry"]["privileges"][0], "jcr:read");
}

#[test]
fn compile_is_deterministic() {
    let a = warden_fixtures().args(["compile", "site"]).output().unwrap();
    let b = warden_fixtures().args(["compile", "site"]).output().unwrap();
    assert_eq!(a.stdout, b.stdout);
}

#[test]
fn parse_error_exits_1_with_position() {
    let dir = project(&[("bad", "create group \"g\"\ndelete \"/x\";")]);
    warden_in(dir.path())
        .args(["check", "bad"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("bad:2:1:"));
}

#[test]
fn semantic_errors_are_all_reported() {
    let dir = project(&[("bad", "delete \"relative\";\ndelete \"/\";\n")]);
    warden_in(dir.path())
        .args(["check", "bad"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("bad:1:"))
        .stderr(predicate::str::contains("bad:2:"));
}

#[test]
fn include_cycle_exits_1() {
    warden_fixtures()
        .args(["check", "cycle_a"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("include cycle detected"));
}

#[test]
fn json_error_output() {
    let output = warden_fixtures()
        .args(["--output", "json", "check", "cycle_a"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(json["kind"], "resolution");
    assert_eq!(json["chain"][0], "cycle_a");
}

#[test]
fn missing_script_exits_1() {
    warden_fixtures()
        .args(["check", "does_not_exist"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

// ──────────────────────────────────────────────
// 3. dry-run / apply / history
// ──────────────────────────────────────────────

#[test]
fn dry_run_leaves_state_untouched() {
    let dir = project(&[("editors", EDITORS)]);
    let before = fs::read_to_string(dir.path().join("state.json")).unwrap();
    warden_in(dir.path())
        .args(["dry-run", "editors"])
        .assert()
        .success()
        .stdout(predicate::str::contains("would create group 'editors'"));
    let after = fs::read_to_string(dir.path().join("state.json")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn apply_then_unchanged_then_rerun() {
    let dir = project(&[("editors", EDITORS)]);

    warden_in(dir.path())
        .args(["apply", "editors"])
        .assert()
        .success()
        .stdout(predicate::str::contains("status: success (2 applied"));

    let state: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("state.json")).unwrap()).unwrap();
    assert_eq!(state["principals"]["editors"]["kind"], "group");

    warden_in(dir.path())
        .args(["apply", "editors"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unchanged since record #1"));

    warden_in(dir.path())
        .args(["apply", "editors", "--rerun"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 skipped"));

    warden_in(dir.path())
        .args(["history", "editors"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#2"))
        .stdout(predicate::str::contains("(rerun)"))
        .stdout(predicate::str::contains("ops"));
}

#[test]
fn failed_apply_exits_2_and_is_recorded() {
    let dir = project(&[(
        "broken",
        r#"create group "g"; set "k" = "v" on "/missing"; create group "h";"#,
    )]);
    warden_in(dir.path())
        .args(["apply", "broken"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("not found: /missing"))
        .stdout(predicate::str::contains("not attempted"));

    let output = warden_in(dir.path())
        .args(["--output", "json", "history", "broken"])
        .output()
        .unwrap();
    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(records[0]["summary"]["status"], "partial_failure");
    assert_eq!(records[0]["summary"]["not_attempted"], 1);
}

#[test]
fn apply_json_output_carries_report_and_audit() {
    let dir = project(&[("editors", EDITORS)]);
    let output = warden_in(dir.path())
        .args(["--output", "json", "apply", "editors"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["report"]["status"], "success");
    assert_eq!(json["report"]["summary"]["applied"], 2);
    assert_eq!(json["audit"]["recorded"], 1);
}

#[test]
fn editing_an_include_reapplies_the_includer() {
    let dir = project(&[
        ("main", r#"include "groups"; allow jcr:read on "/content" for "a";"#),
        ("groups", r#"create group "a";"#),
    ]);
    warden_in(dir.path()).args(["apply", "main"]).assert().success();

    fs::write(
        dir.path().join("scripts/groups.warden"),
        r#"create group "a"; create group "b";"#,
    )
    .unwrap();
    warden_in(dir.path())
        .args(["apply", "main"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 applied, 2 skipped"));
}

#[test]
fn include_depth_comes_from_config() {
    let dir = project(&[
        ("a", r#"include "b";"#),
        ("b", r#"include "c";"#),
        ("c", r#"create group "deep";"#),
    ]);
    let config = dir.path().join("warden.toml");
    let mut text = fs::read_to_string(&config).unwrap();
    text.push_str("max_include_depth = 1\n");
    fs::write(&config, text).unwrap();

    warden_in(dir.path())
        .args(["check", "a"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("include depth limit 1 exceeded"));
    warden_in(dir.path())
        .args(["check", "b"])
        .assert()
        .success();
}

#[cfg(target_os = "linux")]
#[test]
fn unsaved_apply_is_not_recorded() {
    let dir = project(&[("editors", EDITORS)]);

    // Reading under /proc reports a missing file; creating the directory fails.
    warden_in(dir.path())
        .args(["--state-file", "/proc/warden_missing/state.json", "apply", "editors"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot write state file"));

    warden_in(dir.path())
        .args(["history", "editors"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no recorded executions of editors"));

    warden_in(dir.path())
        .args(["apply", "editors"])
        .assert()
        .success()
        .stdout(predicate::str::contains("status: success (2 applied"));
    assert!(dir.path().join("state.json").exists());
}

#[test]
fn history_of_unknown_script_is_empty() {
    let dir = project(&[]);
    warden_in(dir.path())
        .args(["history", "nothing"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no recorded executions of nothing"));
}

#[test]
fn explicit_missing_config_exits_1() {
    let dir = project(&[]);
    warden_in(dir.path())
        .args(["--config", "absent.toml", "check", "x"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("absent.toml"));
}
