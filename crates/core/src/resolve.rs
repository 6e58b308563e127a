//! Include and conditional expansion, cycle detection, depth limiting.
//!
//! Produces one flat statement sequence with include boundaries erased. The
//! compiler downstream never sees `include`, `define` or `if`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::ast::Statement;
use crate::error::{ParseError, ResolutionError, SemanticError};
use crate::parser;
use crate::source::{LoadError, Script, ScriptLoader};
use crate::validate::{validate, ValidatedScript};

/// Maximum include nesting depth. The root script is depth 0.
pub const DEFAULT_MAX_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    pub max_depth: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        ResolveOptions {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Why a script's text was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    Parse(ParseError),
    Semantic(Vec<SemanticError>),
}

/// Why an include target could not be produced.
#[derive(Debug)]
pub enum IncludeFailure {
    NotFound,
    Invalid(ResolutionError),
    Other(String),
}

/// Maps an include identifier to that script's validated form.
pub trait IncludeLoader {
    fn load_validated(&self, identifier: &str) -> Result<Arc<ValidatedScript>, IncludeFailure>;
}

/// Parsed-and-validated script cache keyed by (identity, checksum).
///
/// The underlying [`ScriptLoader`] is asked for text on every lookup; only
/// parsing and validation are skipped on a hit, so an edited script is never
/// served stale. Owned by the caller and safe to share across threads.
pub struct ScriptCache<L> {
    loader: L,
    entries: Mutex<HashMap<(String, String), Arc<ValidatedScript>>>,
}

impl<L: ScriptLoader> ScriptCache<L> {
    pub fn new(loader: L) -> Self {
        ScriptCache {
            loader,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Number of cached scripts.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<L: ScriptLoader> ScriptCache<L> {
    /// Parse and validate `script`, or return the cached result for its
    /// (identity, checksum).
    pub fn validated(&self, script: &Script) -> Result<Arc<ValidatedScript>, ScriptError> {
        let key = (script.identity().to_owned(), script.checksum().to_owned());
        if let Ok(entries) = self.entries.lock() {
            if let Some(hit) = entries.get(&key) {
                return Ok(Arc::clone(hit));
            }
        }
        let statements =
            parser::parse_source(script.source(), script.identity()).map_err(ScriptError::Parse)?;
        let validated = Arc::new(validate(script, statements).map_err(ScriptError::Semantic)?);
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, Arc::clone(&validated));
        }
        Ok(validated)
    }
}

impl<L: ScriptLoader> IncludeLoader for ScriptCache<L> {
    fn load_validated(&self, identifier: &str) -> Result<Arc<ValidatedScript>, IncludeFailure> {
        let script = self.loader.load(identifier).map_err(|e| match e {
            LoadError::NotFound { .. } => IncludeFailure::NotFound,
            other => IncludeFailure::Other(other.to_string()),
        })?;
        self.validated(&script).map_err(|e| {
            let identifier = identifier.to_owned();
            IncludeFailure::Invalid(match e {
                ScriptError::Parse(error) => ResolutionError::IncludeParse { identifier, error },
                ScriptError::Semantic(errors) => {
                    ResolutionError::IncludeInvalid { identifier, errors }
                }
            })
        })
    }
}

/// One script that contributed to a resolved sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSource {
    pub identity: String,
    pub checksum: String,
}

/// Output of [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub identity: String,
    /// Flat, ordered statements. Never contains `Include`, `Define` or `If`.
    pub statements: Vec<Statement>,
    /// Root first, then each included script in first-visit order.
    pub sources: Vec<ScriptSource>,
}

impl Resolved {
    /// SHA-256 over every contributing `(identity, checksum)` pair, so an
    /// edit to any included script changes the key of its includers.
    pub fn bundle_checksum(&self) -> String {
        bundle_checksum(&self.sources)
    }
}

pub fn bundle_checksum(sources: &[ScriptSource]) -> String {
    let mut hasher = Sha256::new();
    for s in sources {
        hasher.update(s.identity.as_bytes());
        hasher.update([0u8]);
        hasher.update(s.checksum.as_bytes());
        hasher.update([b'\n']);
    }
    format!("{:x}", hasher.finalize())
}

struct Resolver<'a> {
    loader: &'a dyn IncludeLoader,
    max_depth: usize,
    stack: Vec<String>,
    // Parallel set for O(1) cycle lookups; `stack` keeps order for reporting.
    stack_set: HashSet<String>,
    flags: HashMap<String, bool>,
    visited: HashSet<String>,
    sources: Vec<ScriptSource>,
    out: Vec<Statement>,
}

impl<'a> Resolver<'a> {
    fn expand(&mut self, script: &ValidatedScript) -> Result<(), ResolutionError> {
        let identity = script.identity().to_owned();
        if self.stack_set.contains(&identity) {
            let start = self
                .stack
                .iter()
                .position(|s| *s == identity)
                .unwrap_or(0);
            let mut chain: Vec<String> = self.stack[start..].to_vec();
            chain.push(identity);
            return Err(ResolutionError::Cycle(chain));
        }
        if self.stack.len() > self.max_depth {
            let mut chain = self.stack.clone();
            chain.push(identity);
            return Err(ResolutionError::DepthExceeded {
                limit: self.max_depth,
                chain,
            });
        }

        if self.visited.insert(identity.clone()) {
            self.sources.push(ScriptSource {
                identity: identity.clone(),
                checksum: script.checksum().to_owned(),
            });
        }

        self.stack.push(identity.clone());
        self.stack_set.insert(identity.clone());
        self.walk(script.statements())?;
        self.stack.pop();
        self.stack_set.remove(&identity);
        Ok(())
    }

    fn walk(&mut self, statements: &[Statement]) -> Result<(), ResolutionError> {
        for stmt in statements {
            match stmt {
                Statement::Include { target, prov } => {
                    let included = self.loader.load_validated(target).map_err(|f| match f {
                        IncludeFailure::NotFound => ResolutionError::MissingInclude {
                            identifier: target.clone(),
                            from: prov.file.clone(),
                            line: prov.line,
                        },
                        IncludeFailure::Invalid(e) => e,
                        IncludeFailure::Other(message) => ResolutionError::Load {
                            identifier: target.clone(),
                            message,
                        },
                    })?;
                    self.expand(&included)?;
                }
                Statement::Define { flag, value, .. } => {
                    self.flags.insert(flag.clone(), *value);
                }
                Statement::If {
                    flag,
                    negated,
                    then_branch,
                    else_branch,
                    prov,
                } => {
                    let value =
                        *self
                            .flags
                            .get(flag)
                            .ok_or_else(|| ResolutionError::UndefinedFlag {
                                flag: flag.clone(),
                                file: prov.file.clone(),
                                line: prov.line,
                            })?;
                    if value != *negated {
                        self.walk(then_branch)?;
                    } else {
                        self.walk(else_branch)?;
                    }
                }
                other => self.out.push(other.clone()),
            }
        }
        Ok(())
    }
}

/// Expand includes and conditionals of `root` into a flat statement list.
pub fn resolve(
    root: &ValidatedScript,
    loader: &dyn IncludeLoader,
    options: ResolveOptions,
) -> Result<Resolved, ResolutionError> {
    let mut resolver = Resolver {
        loader,
        max_depth: options.max_depth,
        stack: Vec::new(),
        stack_set: HashSet::new(),
        flags: HashMap::new(),
        visited: HashSet::new(),
        sources: Vec::new(),
        out: Vec::new(),
    };
    resolver.expand(root)?;
    Ok(Resolved {
        identity: root.identity().to_owned(),
        statements: resolver.out,
        sources: resolver.sources,
    })
}
