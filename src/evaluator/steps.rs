//! Applies compiled steps to a working set, one step at a time.

use tracing::trace;

use crate::error::EvalError;
use crate::evaluator::filter::keeps;
use crate::evaluator::working_set::{descendants, Node, WorkingSet};
use crate::options::EvalOptions;
use crate::parser::types::{FilterExpr, Step, UnionKey};
use crate::path::PathStep;
use crate::value::Value;

/// Resolve a possibly negative index against `len`.
pub fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let resolved = if index < 0 { index + len as i64 } else { index };
    if resolved >= 0 && (resolved as usize) < len {
        Some(resolved as usize)
    } else {
        None
    }
}

/// The indices selected by `[start:end:step]` on a container of `len`.
///
/// Bounds are clamped into `[0, len]`. A negative step walks the same
/// half-open range from the top down.
pub fn slice_indices(len: usize, start: Option<i64>, end: Option<i64>, step: i64) -> Vec<usize> {
    let n = len as i64;
    let clamp = |v: i64| if v < 0 { (v + n).max(0) } else { v.min(n) };
    let lo = start.map_or(0, clamp);
    let hi = end.map_or(n, clamp);
    if lo >= hi || step == 0 {
        return Vec::new();
    }
    if step > 0 {
        (lo..hi).step_by(step as usize).map(|i| i as usize).collect()
    } else {
        (lo..hi)
            .rev()
            .step_by(step.unsigned_abs() as usize)
            .map(|i| i as usize)
            .collect()
    }
}

/// Run `steps` starting from `start`. `root` is what `$` means inside
/// filters, which differs from `start` for `@`-rooted sub-paths.
pub fn evaluate_steps<'a>(
    steps: &[Step],
    start: &'a Value,
    root: &Value,
    options: &EvalOptions,
) -> Result<WorkingSet<'a>, EvalError> {
    let mut working = vec![Node::start(start)];
    // Once any step fans out, a failing candidate is dropped instead of
    // failing the whole evaluation.
    let mut fanned = false;
    for step in steps {
        let mut next = Vec::new();
        for node in working {
            match apply_step(step, node, root, options) {
                Ok(produced) => {
                    for node in &produced {
                        node.check_depth(options)?;
                    }
                    next.extend(produced);
                }
                Err(e) if fanned && !e.is_limit() => trace!(error = %e, "dropped candidate"),
                Err(e) => return Err(e),
            }
            if next.len() > options.max_results {
                return Err(EvalError::SizeLimit {
                    limit: options.max_results,
                });
            }
        }
        working = next;
        fanned = fanned || step.fans_out();
    }
    Ok(working)
}

fn apply_step<'a>(
    step: &Step,
    node: Node<'a>,
    root: &Value,
    options: &EvalOptions,
) -> Result<WorkingSet<'a>, EvalError> {
    match step {
        Step::ChildByName(name) => child_by_name(&node, name).map(|child| vec![child]),
        // a primitive has no children, so this selects nothing even in direct context
        Step::Wildcard => Ok(node.children()),
        Step::RecursiveDescent => descendants(node, options),
        Step::IndexSel(index) => index_sel(&node, *index).map(|child| vec![child]),
        Step::Slice { start, end, step } => slice(&node, *start, *end, step.unwrap_or(1)),
        Step::Union(keys) => union(&node, keys),
        Step::Filter(expr) => filter(node, expr, root, options),
    }
}

fn not_iterable(node: &Node) -> EvalError {
    EvalError::NotIterable {
        type_name: node.value.type_name(),
        path: node.path.clone(),
    }
}

fn invalid_key(node: &Node, key: String) -> EvalError {
    EvalError::InvalidKey {
        key,
        type_name: node.value.type_name(),
        path: node.path.clone(),
    }
}

fn child_by_name<'a>(node: &Node<'a>, name: &str) -> Result<Node<'a>, EvalError> {
    if node.value.is_indexed() {
        return Err(invalid_key(node, format!("'{}'", name)));
    }
    if !node.value.is_keyed() {
        return Err(not_iterable(node));
    }
    node.child(PathStep::Attr(name.to_string()))
        .ok_or_else(|| EvalError::MissingAttribute {
            name: name.to_string(),
            path: node.path.clone(),
        })
}

fn index_sel<'a>(node: &Node<'a>, index: i64) -> Result<Node<'a>, EvalError> {
    let len = match node.value.as_indexed() {
        Some(items) => items.len(),
        None if node.value.is_keyed() => return Err(invalid_key(node, index.to_string())),
        None => return Err(not_iterable(node)),
    };
    normalize_index(index, len)
        .and_then(|i| node.child(PathStep::Index(i)))
        .ok_or_else(|| EvalError::IndexOutOfBounds {
            index,
            len,
            path: node.path.clone(),
        })
}

fn slice<'a>(node: &Node<'a>, start: Option<i64>, end: Option<i64>, step: i64) -> Result<WorkingSet<'a>, EvalError> {
    let len = match node.value.as_indexed() {
        Some(items) => items.len(),
        None if node.value.is_keyed() => return Err(invalid_key(node, "slice".to_string())),
        None => return Err(not_iterable(node)),
    };
    Ok(slice_indices(len, start, end, step)
        .into_iter()
        .filter_map(|i| node.child(PathStep::Index(i)))
        .collect())
}

/// Keys in written order. Absent names, out-of-range indices and numeric keys
/// on a keyed container contribute nothing; a name on an indexed container
/// is an error.
fn union<'a>(node: &Node<'a>, keys: &[UnionKey]) -> Result<WorkingSet<'a>, EvalError> {
    if !node.value.is_container() {
        return Err(not_iterable(node));
    }
    let mut out = Vec::new();
    for key in keys {
        let step = match (key, node.value.as_indexed()) {
            (UnionKey::Name(name), None) => Some(PathStep::Attr(name.clone())),
            (UnionKey::Index(index), Some(items)) => normalize_index(*index, items.len()).map(PathStep::Index),
            (UnionKey::Index(_), None) => None,
            (key, _) => return Err(invalid_key(node, key.to_string())),
        };
        if let Some(child) = step.and_then(|step| node.child(step)) {
            out.push(child);
        }
    }
    Ok(out)
}

/// Keep the elements of an indexed container that satisfy `expr`, as one
/// new list located at the container's path.
fn filter<'a>(node: Node<'a>, expr: &FilterExpr, root: &Value, options: &EvalOptions) -> Result<WorkingSet<'a>, EvalError> {
    if !node.value.is_indexed() {
        return Err(not_iterable(&node));
    }
    let mut kept = Vec::new();
    let mut origins = Vec::new();
    for element in node.children() {
        match keeps(expr, &element.value, root, options) {
            Ok(true) => {
                origins.push(element.path);
                kept.push(element.value.into_owned());
            }
            Ok(false) => {}
            Err(e) if e.is_limit() => return Err(e),
            Err(e) => trace!(error = %e, filter = %expr.source, "element excluded"),
        }
    }
    if kept.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![Node::filtered(kept, node.path, origins)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::path_parser::parse_path;

    fn doc() -> Value {
        Value::from_serde_json(serde_json::json!({
            "A": ["string", 23.3, 3, true, false, null],
            "B": "value",
            "O": {"x": 1, "y": 2}
        })).unwrap()
    }

    fn run(root: &Value, source: &str) -> Result<Vec<(String, Value)>, EvalError> {
        let path = parse_path(source).unwrap();
        let nodes = evaluate_steps(path.steps(), root, root, &EvalOptions::default())?;
        Ok(nodes
            .into_iter()
            .map(|n| (n.path.to_string(), n.value.into_owned()))
            .collect())
    }

    fn paths(root: &Value, source: &str) -> Vec<String> {
        run(root, source).unwrap().into_iter().map(|(p, _)| p).collect()
    }

    #[test]
    fn test_normalize_index() {
        assert_eq!(normalize_index(0, 3), Some(0));
        assert_eq!(normalize_index(-1, 3), Some(2));
        assert_eq!(normalize_index(3, 3), None);
        assert_eq!(normalize_index(-4, 3), None);
    }

    #[test]
    fn test_slice_indices() {
        assert_eq!(slice_indices(6, Some(1), Some(4), 1), vec![1, 2, 3]);
        assert_eq!(slice_indices(6, None, None, 2), vec![0, 2, 4]);
        assert_eq!(slice_indices(6, Some(-2), None, 1), vec![4, 5]);
        assert_eq!(slice_indices(6, None, None, -1), vec![5, 4, 3, 2, 1, 0]);
        assert_eq!(slice_indices(6, Some(1), Some(5), -2), vec![4, 2]);
        assert_eq!(slice_indices(6, Some(-100), Some(100), 1), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(slice_indices(6, Some(4), Some(2), 1), Vec::<usize>::new());
        assert_eq!(slice_indices(0, None, None, 1), Vec::<usize>::new());
    }

    #[test]
    fn test_child_and_index() {
        let root = doc();
        assert_eq!(paths(&root, "$.A[0]"), vec!["$.A[0]"]);
        assert_eq!(paths(&root, "$.A[-1]"), vec!["$.A[5]"]);
        assert_eq!(paths(&root, "$['B']"), vec!["$.B"]);
    }

    #[test]
    fn test_direct_errors() {
        let root = doc();
        assert!(matches!(run(&root, "$.ZZZ"), Err(EvalError::MissingAttribute { .. })));
        assert!(matches!(run(&root, "$.A[6]"), Err(EvalError::IndexOutOfBounds { index: 6, len: 6, .. })));
        assert!(matches!(run(&root, "$.A.x"), Err(EvalError::InvalidKey { .. })));
        assert!(matches!(run(&root, "$.O[0]"), Err(EvalError::InvalidKey { .. })));
        assert!(matches!(run(&root, "$.B[0]"), Err(EvalError::NotIterable { .. })));
        assert!(matches!(run(&root, "$.B.x"), Err(EvalError::NotIterable { .. })));
        assert!(matches!(run(&root, "$.B[?(@ == 1)]"), Err(EvalError::NotIterable { .. })));
    }

    #[test]
    fn test_fan_out_drops_failures() {
        let root = doc();
        assert!(run(&root, "$.*.ZZZ").unwrap().is_empty());
        assert!(run(&root, "$.*[7]").unwrap().is_empty());
        assert_eq!(paths(&root, "$.*.x"), vec!["$.O.x"]);
    }

    #[test]
    fn test_wildcard_on_primitive_is_empty() {
        let root = doc();
        assert!(run(&root, "$.B.*").unwrap().is_empty());
    }

    #[test]
    fn test_union_per_candidate_order() {
        let root = doc();
        assert_eq!(paths(&root, "$.O['y', 'x', 'y']"), vec!["$.O.y", "$.O.x", "$.O.y"]);
        assert_eq!(paths(&root, "$.A[0, -1, 9]"), vec!["$.A[0]", "$.A[5]"]);
        assert!(matches!(run(&root, "$.A['x', 0]"), Err(EvalError::InvalidKey { .. })));
        assert_eq!(paths(&root, "$.O[0, 'x']"), vec!["$.O.x"]);
        assert!(run(&root, "$.O[0, 1]").unwrap().is_empty());
    }

    #[test]
    fn test_recursive_descent_includes_self() {
        let root = Value::from_serde_json(serde_json::json!({"C": 1, "D": {"C": 2}})).unwrap();
        assert_eq!(paths(&root, "$..C"), vec!["$.C", "$.D.C"]);
        assert_eq!(paths(&root, "$..*"), vec!["$.C", "$.D", "$.D.C"]);
    }

    #[test]
    fn test_filter_keeps_matching_elements() {
        let root = Value::from_serde_json(serde_json::json!({"n": [1, 5, 2, 8]})).unwrap();
        let result = run(&root, "$.n[?(@ > 1)]").unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].0, "$.n");
        assert_eq!(
            result[0].1,
            Value::List(vec![Value::from(5i64), Value::from(2i64), Value::from(8i64)])
        );
        assert_eq!(paths(&root, "$.n[?(@ > 1)][*]"), vec!["$.n[1]", "$.n[2]", "$.n[3]"]);
        assert_eq!(paths(&root, "$.n[?(@ > 1)][-1]"), vec!["$.n[3]"]);
    }

    #[test]
    fn test_filter_with_no_survivors_is_empty() {
        let root = Value::from_serde_json(serde_json::json!({"n": [1, 2]})).unwrap();
        assert!(run(&root, "$.n[?(@ > 10)]").unwrap().is_empty());
    }

    #[test]
    fn test_depth_limit_is_not_swallowed() {
        let root = Value::from_serde_json(serde_json::json!({"a": {"b": {"c": 1}}})).unwrap();
        let path = parse_path("$.*.*.*").unwrap();
        let options = EvalOptions::default().with_max_depth(2);
        assert_eq!(
            evaluate_steps(path.steps(), &root, &root, &options).unwrap_err(),
            EvalError::DepthLimit { limit: 2 }
        );
    }

    #[test]
    fn test_size_limit() {
        let root = Value::from_serde_json(serde_json::json!([1, 2, 3, 4])).unwrap();
        let path = parse_path("$[*]").unwrap();
        let options = EvalOptions::default().with_max_results(3);
        assert_eq!(
            evaluate_steps(path.steps(), &root, &root, &options).unwrap_err(),
            EvalError::SizeLimit { limit: 3 }
        );
    }
}
