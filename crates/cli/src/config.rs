//! `warden.toml` loading.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use warden_core::resolve::DEFAULT_MAX_DEPTH;

pub(crate) const DEFAULT_CONFIG_FILE: &str = "warden.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Config {
    /// Root directory script identifiers resolve against.
    pub scripts_dir: PathBuf,
    /// JSON file holding the repository state.
    pub state_file: PathBuf,
    /// JSON Lines execution history.
    pub history_file: PathBuf,
    pub max_include_depth: usize,
    pub call_timeout_ms: u64,
    /// Recorded as the triggering principal on history records.
    pub principal: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scripts_dir: PathBuf::from("scripts"),
            state_file: PathBuf::from(".warden/state.json"),
            history_file: PathBuf::from(".warden/history.jsonl"),
            max_include_depth: DEFAULT_MAX_DEPTH,
            call_timeout_ms: 30_000,
            principal: std::env::var("USER").unwrap_or_else(|_| "anonymous".to_string()),
        }
    }
}

impl Config {
    /// Read `path`, or `warden.toml` in the working directory when `path` is
    /// `None`. Only an explicitly named file is required to exist.
    pub fn load(path: Option<&Path>) -> Result<Config, String> {
        let (file, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        let text = match std::fs::read_to_string(&file) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                return Ok(Config::default())
            }
            Err(e) => return Err(format!("error reading config '{}': {}", file.display(), e)),
        };
        toml::from_str(&text).map_err(|e| format!("invalid config '{}': {}", file.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            scripts_dir = "provisioning"
            call_timeout_ms = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.scripts_dir, PathBuf::from("provisioning"));
        assert_eq!(config.call_timeout_ms, 500);
        assert_eq!(config.max_include_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<Config>("colour = \"blue\"").is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.contains("nope.toml"));
    }
}
