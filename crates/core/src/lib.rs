#![allow(clippy::result_large_err)]
//! warden-core: script front end for Warden provisioning scripts.
//!
//! Turns `.warden` source text into a deterministic [`ActionList`]:
//! lex, parse, validate, resolve includes and conditionals, compile.
//!
//! # Public API
//!
//! - [`compile_script()`] -- load a root script through a [`ScriptCache`]
//!   and run the whole pipeline
//! - [`compile_source()`] -- same, for a single in-memory text
//! - [`parse()`], [`validate()`], [`resolve()`], [`compile()`] -- the
//!   individual stages
//! - [`ScriptLoader`] with [`FileSystemLoader`] and [`InMemoryLoader`]

pub mod action;
pub mod ast;
pub mod compile;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod path;
pub mod resolve;
pub mod source;
pub mod validate;

use std::sync::Arc;

pub use action::{Action, ActionList, CompiledAction, KeptPermission, PermissionEntry};
pub use ast::{Effect, PrincipalKind, Provenance, RawCheck, Statement};
pub use compile::compile;
pub use error::{CompileError, ParseError, ResolutionError, SemanticError};
pub use parser::parse_source as parse;
pub use resolve::{
    resolve, IncludeLoader, ResolveOptions, Resolved, ScriptCache, ScriptError, ScriptSource,
};
pub use source::{FileSystemLoader, InMemoryLoader, LoadError, Script, ScriptLoader};
pub use validate::{validate, ValidatedScript};

/// Load `identifier` through `cache`, then parse, validate, resolve and
/// compile it.
pub fn compile_script<L: ScriptLoader>(
    identifier: &str,
    cache: &ScriptCache<L>,
    options: ResolveOptions,
) -> Result<ActionList, CompileError> {
    let script = cache.loader().load(identifier)?;
    compile_loaded(&script, cache, options)
}

/// Pipeline for an already loaded root script. Includes go through `cache`.
pub fn compile_loaded<L: ScriptLoader>(
    script: &Script,
    cache: &ScriptCache<L>,
    options: ResolveOptions,
) -> Result<ActionList, CompileError> {
    let root: Arc<ValidatedScript> = cache.validated(script).map_err(|e| match e {
        ScriptError::Parse(e) => CompileError::Parse(e),
        ScriptError::Semantic(errors) => CompileError::Semantic(errors),
    })?;
    let resolved = resolve(&root, cache, options)?;
    Ok(compile(&resolved))
}

/// Compile a standalone text. Any `include` reports a missing script.
pub fn compile_source(identity: &str, text: &str) -> Result<ActionList, CompileError> {
    let cache = ScriptCache::new(InMemoryLoader::new());
    compile_loaded(&Script::new(identity, text), &cache, ResolveOptions::default())
}
