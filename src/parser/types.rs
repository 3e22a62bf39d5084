//! Parser Types and Constants
//!
//! The compiled form of a path: steps, union keys and filter programs.

use regex_lite::Regex;
use bigdecimal::BigDecimal;
use std::fmt;

use crate::evaluator::operations::{BinaryOp, Function};

// Parser limits to prevent hangs and resource exhaustion
pub const MAX_INPUT_SIZE: usize = 1_048_576; // 1 MiB of path source
pub const MAX_FILTER_DEPTH: usize = 64; // filters within sub-paths within filters

/// One entry of a `[a,b,...]` union, in written order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnionKey {
    Name(String),
    Index(i64),
}

impl fmt::Display for UnionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnionKey::Name(name) => write!(f, "'{}'", name),
            UnionKey::Index(index) => write!(f, "{}", index),
        }
    }
}

/// A compiled path instruction.
#[derive(Debug, Clone)]
pub enum Step {
    ChildByName(String),
    Wildcard,
    RecursiveDescent,
    IndexSel(i64),
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        step: Option<i64>,
    },
    Union(Vec<UnionKey>),
    Filter(FilterExpr),
}

impl Step {
    /// Steps after which a missing child is no longer an error.
    pub fn fans_out(&self) -> bool {
        matches!(
            self,
            Step::Wildcard | Step::RecursiveDescent | Step::Slice { .. } | Step::Union(_) | Step::Filter(_)
        )
    }
}

/// Where an embedded sub-path starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathScope {
    /// `$`: the root of the whole evaluation.
    Root,
    /// `@`: the element currently being tested.
    Current,
}

/// One postfix instruction of a filter program.
#[derive(Debug, Clone)]
pub enum Instruction {
    Number(BigDecimal),
    Str(String),
    Bool(bool),
    /// A string literal used as the right operand of `=~`, compiled ahead.
    Pattern(Regex),
    Path { scope: PathScope, path: CompiledPath },
    Binary(BinaryOp),
    Call(Function),
}

/// A filter predicate flattened to postfix order.
#[derive(Debug, Clone)]
pub struct FilterExpr {
    pub source: String,
    pub program: Vec<Instruction>,
}

/// An immutable, reusable compiled path.
#[derive(Debug, Clone)]
pub struct CompiledPath {
    source: String,
    steps: Vec<Step>,
}

impl CompiledPath {
    pub(crate) fn new(source: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            source: source.into(),
            steps,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

impl fmt::Display for CompiledPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}
