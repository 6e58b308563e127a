use serde::{Deserialize, Serialize};

/// Malformed script text. Carries the position of the offending token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[error("{file}:{line}:{column}: {message}")]
pub struct ParseError {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl ParseError {
    pub fn new(file: &str, line: u32, column: u32, message: impl Into<String>) -> Self {
        ParseError {
            file: file.to_owned(),
            line,
            column,
            message: message.into(),
        }
    }

    /// Serialize to the JSON shape used by `warden --output json`.
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "column":  self.column,
            "file":    self.file,
            "kind":    "parse",
            "line":    self.line,
            "message": self.message,
        })
    }
}

/// A well-formed statement that is not valid for its kind.
///
/// Validation collects every problem it finds, so these travel in a `Vec`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[error("{file}:{line}:{column}: {message}")]
pub struct SemanticError {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl SemanticError {
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "column":  self.column,
            "file":    self.file,
            "kind":    "semantic",
            "line":    self.line,
            "message": self.message,
        })
    }
}

/// Failure while expanding includes and conditionals into a flat list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// An identity reappeared on the active include stack. The chain runs
    /// from its first occurrence through the repeat, e.g. `["A", "B", "A"]`.
    #[error("include cycle detected: {}", .0.join(" \u{2192} "))]
    Cycle(Vec<String>),

    #[error("include depth limit {limit} exceeded: {}", .chain.join(" \u{2192} "))]
    DepthExceeded { limit: usize, chain: Vec<String> },

    #[error("{from}:{line}: included script '{identifier}' not found")]
    MissingInclude {
        identifier: String,
        from: String,
        line: u32,
    },

    #[error("included script '{identifier}' failed to parse: {error}")]
    IncludeParse {
        identifier: String,
        error: ParseError,
    },

    #[error("included script '{identifier}' has {} semantic error(s)", .errors.len())]
    IncludeInvalid {
        identifier: String,
        errors: Vec<SemanticError>,
    },

    #[error("{file}:{line}: flag '{flag}' is used before it is defined")]
    UndefinedFlag { flag: String, file: String, line: u32 },

    #[error("cannot load included script '{identifier}': {message}")]
    Load { identifier: String, message: String },
}

impl ResolutionError {
    pub fn to_json_value(&self) -> serde_json::Value {
        let mut value = serde_json::json!({
            "kind":    "resolution",
            "message": self.to_string(),
        });
        match self {
            ResolutionError::Cycle(chain) | ResolutionError::DepthExceeded { chain, .. } => {
                value["chain"] = serde_json::json!(chain);
            }
            ResolutionError::IncludeInvalid { errors, .. } => {
                value["errors"] = errors.iter().map(SemanticError::to_json_value).collect();
            }
            _ => {}
        }
        value
    }
}

/// Anything that stops a script from reaching an action list.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Load(#[from] crate::source::LoadError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{} semantic error(s), first: {}", .0.len(), .0.first().map(|e| e.to_string()).unwrap_or_default())]
    Semantic(Vec<SemanticError>),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

impl CompileError {
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            CompileError::Load(e) => serde_json::json!({
                "kind":    "load",
                "message": e.to_string(),
            }),
            CompileError::Parse(e) => e.to_json_value(),
            CompileError::Semantic(errors) => serde_json::json!({
                "kind":   "semantic",
                "errors": errors.iter().map(SemanticError::to_json_value).collect::<Vec<_>>(),
            }),
            CompileError::Resolution(e) => e.to_json_value(),
        }
    }
}
