//! Validates the compiled action list of every fixture script against the
//! interchange schema at schema/actions.schema.json.

use std::path::{Path, PathBuf};

use warden_core::{compile_script, FileSystemLoader, ResolveOptions, ScriptCache};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn validator() -> jsonschema::Validator {
    let schema_path = workspace_root().join("schema/actions.schema.json");
    let schema_src = std::fs::read_to_string(&schema_path)
        .unwrap_or_else(|e| panic!("Failed to read schema at {}: {}", schema_path.display(), e));
    let schema_value: serde_json::Value = serde_json::from_str(&schema_src).unwrap();
    jsonschema::validator_for(&schema_value)
        .unwrap_or_else(|e| panic!("Failed to compile schema: {}", e))
}

fn fixture_scripts(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|e| e == "warden"))
        .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .filter(|name| !name.starts_with("cycle_"))
        .collect();
    names.sort();
    names
}

#[test]
fn compiled_fixtures_conform_to_schema() {
    let validator = validator();
    let fixtures = workspace_root().join("fixtures");
    let cache = ScriptCache::new(FileSystemLoader::new(&fixtures));

    let mut tested = 0usize;
    let mut failures = Vec::new();
    for name in fixture_scripts(&fixtures) {
        let list = compile_script(&name, &cache, ResolveOptions::default())
            .unwrap_or_else(|e| panic!("{} failed to compile: {}", name, e));
        let instance = list.to_json_value();
        if let Err(error) = validator.validate(&instance) {
            failures.push(format!("{}: {}", name, error));
        }
        tested += 1;
    }

    assert!(tested > 0, "No fixture scripts found -- check paths");
    assert!(
        failures.is_empty(),
        "Schema validation failed for {} of {} scripts:\n{}",
        failures.len(),
        tested,
        failures.join("\n")
    );
}

#[test]
fn schema_rejects_unknown_action_kind() {
    let validator = validator();
    let instance = serde_json::json!({
        "script": "x",
        "checksum": "0".repeat(64),
        "sources": [{ "identity": "x", "checksum": "0".repeat(64) }],
        "actions": [{ "kind": "format_disk", "origin": { "file": "x", "line": 1, "column": 1 } }]
    });
    assert!(validator.validate(&instance).is_err());
}

#[test]
fn site_fixture_expands_include_and_conditional() {
    let fixtures = workspace_root().join("fixtures");
    let cache = ScriptCache::new(FileSystemLoader::new(&fixtures));
    let list = compile_script("site", &cache, ResolveOptions::default()).unwrap();

    assert_eq!(list.sources.len(), 2);
    assert_eq!(list.sources[1].identity, "common/groups");
    let kinds: Vec<&str> = list
        .actions
        .iter()
        .map(|a| match &a.action {
            warden_core::Action::EnsureUser { .. } => "ensure_user",
            warden_core::Action::EnsureGroup { .. } => "ensure_group",
            warden_core::Action::AddMember { .. } => "add_member",
            warden_core::Action::SetPermission { .. } => "set_permission",
            warden_core::Action::SetProperty { .. } => "set_property",
            warden_core::Action::Purge { .. } => "purge",
            warden_core::Action::CheckExists { .. } => "check_exists",
            warden_core::Action::CheckPermission { .. } => "check_permission",
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            "ensure_group",
            "ensure_group",
            "ensure_user",
            "add_member",
            "set_permission",
            "set_permission",
            "set_property",
            "set_permission",
            "purge",
            "check_exists",
            "check_permission",
        ]
    );
}

#[test]
fn cyclic_fixtures_fail_resolution() {
    let fixtures = workspace_root().join("fixtures");
    let cache = ScriptCache::new(FileSystemLoader::new(&fixtures));
    let err = compile_script("cycle_a", &cache, ResolveOptions::default()).unwrap_err();
    match err {
        warden_core::CompileError::Resolution(warden_core::ResolutionError::Cycle(chain)) => {
            assert_eq!(chain, vec!["cycle_a", "cycle_b", "cycle_a"]);
        }
        other => panic!("expected cycle, got {}", other),
    }
}
