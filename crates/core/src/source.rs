//! Script values and the loader seam.
//!
//! A [`Script`] is immutable once built: its checksum is computed from the
//! normalized text at construction. [`ScriptLoader`] abstracts where script
//! text comes from, so the compiler works the same against a directory of
//! `.warden` files ([`FileSystemLoader`]) or a map ([`InMemoryLoader`]).

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// File extension appended to identifiers that do not carry one.
pub const SCRIPT_EXTENSION: &str = "warden";

/// Canonical text form used for checksumming: LF line endings, no trailing
/// whitespace on any line, no trailing blank lines, one final newline.
pub fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<&str> = unified.lines().map(str::trim_end).collect();
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Lowercase hex SHA-256 of the normalized text.
pub fn checksum(text: &str) -> String {
    format!("{:x}", Sha256::digest(normalize(text).as_bytes()))
}

/// A script holds its normalized text, so the text that is parsed is
/// exactly the text that was checksummed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    identity: String,
    source: String,
    checksum: String,
}

impl Script {
    pub fn new(identity: impl Into<String>, source: impl AsRef<str>) -> Self {
        let source = normalize(source.as_ref());
        let checksum = format!("{:x}", Sha256::digest(source.as_bytes()));
        Script {
            identity: identity.into(),
            source,
            checksum,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("script '{identifier}' not found")]
    NotFound { identifier: String },

    #[error("script identifier '{identifier}' escapes the scripts root")]
    EscapesRoot { identifier: String },

    #[error("cannot read script '{identifier}': {source}")]
    Io {
        identifier: String,
        #[source]
        source: std::io::Error,
    },
}

/// Supplies scripts by identifier, both for the top-level invocation and for
/// `include` targets.
pub trait ScriptLoader: Send + Sync {
    fn load(&self, identifier: &str) -> Result<Script, LoadError>;
}

/// Reduce an identifier to its canonical identity: relative, `/`-separated,
/// `.` and `..` resolved, extension stripped. `None` if it climbs above the
/// root.
pub fn canonical_identity(identifier: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in identifier.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    let last = segments.pop()?;
    let suffix = format!(".{}", SCRIPT_EXTENSION);
    let stem = last.strip_suffix(suffix.as_str()).unwrap_or(last);
    if stem.is_empty() {
        return None;
    }
    segments.push(stem);
    Some(segments.join("/"))
}

/// Loads `<root>/<identity>.warden`. Resolved files must stay inside the
/// root directory, symlinks included.
pub struct FileSystemLoader {
    root: PathBuf,
}

impl FileSystemLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileSystemLoader { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_for(&self, identity: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", identity, SCRIPT_EXTENSION))
    }
}

impl ScriptLoader for FileSystemLoader {
    fn load(&self, identifier: &str) -> Result<Script, LoadError> {
        let identity = canonical_identity(identifier).ok_or_else(|| LoadError::EscapesRoot {
            identifier: identifier.to_owned(),
        })?;
        let file = self.file_for(&identity);
        let canon = match file.canonicalize() {
            Ok(p) => p,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LoadError::NotFound {
                    identifier: identifier.to_owned(),
                })
            }
            Err(source) => {
                return Err(LoadError::Io {
                    identifier: identifier.to_owned(),
                    source,
                })
            }
        };
        let root = self.root.canonicalize().map_err(|source| LoadError::Io {
            identifier: identifier.to_owned(),
            source,
        })?;
        if !canon.starts_with(&root) {
            return Err(LoadError::EscapesRoot {
                identifier: identifier.to_owned(),
            });
        }
        let text = std::fs::read_to_string(&canon).map_err(|source| LoadError::Io {
            identifier: identifier.to_owned(),
            source,
        })?;
        Ok(Script::new(identity, text))
    }
}

/// Map-backed loader for tests and embedding.
#[derive(Default)]
pub struct InMemoryLoader {
    scripts: HashMap<String, String>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a script. The identifier is canonicalized the same way
    /// lookups are, so `"a"` and `"./a.warden"` name the same script.
    pub fn with(mut self, identifier: &str, text: &str) -> Self {
        self.insert(identifier, text);
        self
    }

    pub fn insert(&mut self, identifier: &str, text: &str) {
        let identity = canonical_identity(identifier).unwrap_or_else(|| identifier.to_owned());
        self.scripts.insert(identity, text.to_owned());
    }
}

impl ScriptLoader for InMemoryLoader {
    fn load(&self, identifier: &str) -> Result<Script, LoadError> {
        let identity = canonical_identity(identifier).ok_or_else(|| LoadError::EscapesRoot {
            identifier: identifier.to_owned(),
        })?;
        self.scripts
            .get(&identity)
            .map(|text| Script::new(identity.clone(), text.clone()))
            .ok_or_else(|| LoadError::NotFound {
                identifier: identifier.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_ignores_line_endings_and_trailing_space() {
        let a = "create group \"g\";  \r\ndelete \"/x\";\r\n\r\n\r\n";
        let b = "create group \"g\";\ndelete \"/x\";";
        assert_eq!(normalize(a), normalize(b));
        assert_eq!(checksum(a), checksum(b));
    }

    #[test]
    fn script_keeps_the_checksummed_text() {
        let script = Script::new("t", "# note\rdelete \"/x\";  \r\n");
        assert_eq!(script.source(), "# note\ndelete \"/x\";\n");
        assert_eq!(script.checksum(), checksum("# note\ndelete \"/x\";"));
    }

    #[test]
    fn checksum_changes_with_content() {
        assert_ne!(checksum("delete \"/a\";"), checksum("delete \"/b\";"));
        assert_eq!(checksum("x").len(), 64);
    }

    #[test]
    fn canonical_identity_forms() {
        assert_eq!(canonical_identity("groups").as_deref(), Some("groups"));
        assert_eq!(canonical_identity("./a/b.warden").as_deref(), Some("a/b"));
        assert_eq!(canonical_identity("/a/x/../b").as_deref(), Some("a/b"));
        assert_eq!(canonical_identity("../outside"), None);
        assert_eq!(canonical_identity(""), None);
    }

    #[test]
    fn in_memory_loader_resolves_aliases() {
        let loader = InMemoryLoader::new().with("common/groups.warden", "create group \"g\";");
        let script = loader.load("common/groups").unwrap();
        assert_eq!(script.identity(), "common/groups");
        assert_eq!(script.checksum(), checksum("create group \"g\";"));
        assert!(matches!(
            loader.load("missing"),
            Err(LoadError::NotFound { .. })
        ));
    }

    #[test]
    fn file_system_loader_reads_under_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("common")).unwrap();
        std::fs::write(dir.path().join("common/base.warden"), "delete \"/tmp\";\n").unwrap();
        let loader = FileSystemLoader::new(dir.path());

        let script = loader.load("common/base.warden").unwrap();
        assert_eq!(script.identity(), "common/base");
        assert_eq!(script.source(), "delete \"/tmp\";\n");

        assert!(matches!(loader.load("nope"), Err(LoadError::NotFound { .. })));
        assert!(matches!(
            loader.load("../etc/passwd"),
            Err(LoadError::EscapesRoot { .. })
        ));
    }
}
