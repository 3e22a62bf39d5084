//! Evaluation of compiled paths against a value tree.

pub mod filter;
pub mod operations;
pub mod steps;
pub mod working_set;

use tracing::debug;

use crate::error::EvalError;
use crate::options::EvalOptions;
use crate::parser::types::CompiledPath;
use crate::path::Path;
use crate::search::QueryResult;
use crate::value::Value;

pub use steps::{normalize_index, slice_indices};

/// Evaluate `path` against `root` with the default limits.
pub fn evaluate(path: &CompiledPath, root: &Value) -> Result<QueryResult, EvalError> {
    evaluate_with(path, root, &EvalOptions::default())
}

pub fn evaluate_with(path: &CompiledPath, root: &Value, options: &EvalOptions) -> Result<QueryResult, EvalError> {
    let nodes = steps::evaluate_steps(path.steps(), root, root, options)?;
    debug!(path = path.source(), results = nodes.len(), "evaluated path");
    Ok(nodes
        .into_iter()
        .map(|node| (node.value.into_owned(), node.path))
        .collect())
}

/// Every location in `root` that a match of `path` occupies. A filtered list
/// contributes the locations of its elements rather than the container's.
pub(crate) fn matched_locations(path: &CompiledPath, root: &Value) -> Result<Vec<Path>, EvalError> {
    let nodes = steps::evaluate_steps(path.steps(), root, root, &EvalOptions::default())?;
    Ok(nodes.iter().flat_map(|node| node.locations()).collect())
}

impl CompiledPath {
    pub fn evaluate(&self, root: &Value) -> Result<QueryResult, EvalError> {
        evaluate(self, root)
    }

    pub fn evaluate_with(&self, root: &Value, options: &EvalOptions) -> Result<QueryResult, EvalError> {
        evaluate_with(self, root, options)
    }
}
