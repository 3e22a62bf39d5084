//! Error types for compiling and evaluating paths.

use std::fmt;
use thiserror::Error;

use crate::path::Path;

/// Malformed path text. `offset` is the 0-based character index into the
/// path source; the rendered message reports the 1-based column.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct SyntaxError {
    pub message: String,
    pub offset: usize,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "syntax error at column {}: {}", self.column(), self.message)
    }
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }

    pub fn column(&self) -> usize {
        self.offset + 1
    }
}

/// A filter predicate that is well-formed but refers to something the
/// compiler does not know.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("unknown function '{name}' at column {}", .offset + 1)]
    UnknownFunction { name: String, offset: usize },
    #[error("unknown operator '{symbol}' at column {}", .offset + 1)]
    UnknownOperator { symbol: String, offset: usize },
    #[error("unknown constant '{name}' at column {}", .offset + 1)]
    UnknownConstant { name: String, offset: usize },
    #[error("invalid regex '{pattern}' at column {}: {reason}", .offset + 1)]
    InvalidRegex {
        pattern: String,
        reason: String,
        offset: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("attribute '{name}' doesn't exist at {path}")]
    MissingAttribute { name: String, path: Path },
    #[error("index {index} out of bounds for length {len} at {path}")]
    IndexOutOfBounds { index: i64, len: usize, path: Path },
    #[error("cannot iterate {type_name} at {path}")]
    NotIterable { type_name: &'static str, path: Path },
    #[error("invalid key {key} for {type_name} at {path}")]
    InvalidKey {
        key: String,
        type_name: &'static str,
        path: Path,
    },
    #[error("maximum depth of {limit} exceeded")]
    DepthLimit { limit: usize },
    #[error("more than {limit} intermediate results")]
    SizeLimit { limit: usize },
    #[error("{0}")]
    Operation(String),
}

impl EvalError {
    /// Resource limit errors abort evaluation even inside fan-out.
    pub fn is_limit(&self) -> bool {
        matches!(self, EvalError::DepthLimit { .. } | EvalError::SizeLimit { .. })
    }
}

/// A number that cannot cross the boundary between [`Value`](crate::Value)
/// and another representation without losing its value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("{0} has no decimal representation")]
    NonFinite(String),
    #[error("cannot render value as JSON: {0}")]
    Render(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl Error {
    /// Character offset into the path source, for compile-time errors.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Error::Syntax(e) => Some(e.offset),
            Error::Compile(
                CompileError::UnknownFunction { offset, .. }
                | CompileError::UnknownOperator { offset, .. }
                | CompileError::UnknownConstant { offset, .. }
                | CompileError::InvalidRegex { offset, .. },
            ) => Some(*offset),
            Error::Eval(_) => None,
        }
    }
}
