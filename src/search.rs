//! Query results and the compile-then-evaluate conveniences built on them.

use std::fmt;

use crate::error::{Error, EvalError, ValueError};
use crate::evaluator::{evaluate, matched_locations};
use crate::parser::parse_path;
use crate::parser::types::CompiledPath;
use crate::path::Path;
use crate::value::Value;

/// The matches of one evaluation: `values[i]` was found at `paths[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    values: Vec<Value>,
    paths: Vec<Path>,
}

impl QueryResult {
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &Value)> {
        self.paths.iter().zip(self.values.iter())
    }

    /// All matched values as one tuple, in match order.
    pub fn to_tuple(&self) -> Value {
        Value::Tuple(self.values.clone())
    }

    pub fn into_parts(self) -> (Vec<Value>, Vec<Path>) {
        (self.values, self.paths)
    }

    /// One line per match: `<path> → <value as compact JSON>`.
    pub fn render(&self) -> Result<String, ValueError> {
        let mut out = String::new();
        for (path, value) in self.iter() {
            out.push_str(&format!("{} → {}\n", path, value.to_json()?));
        }
        Ok(out)
    }
}

impl FromIterator<(Value, Path)> for QueryResult {
    fn from_iter<I: IntoIterator<Item = (Value, Path)>>(iter: I) -> Self {
        let (values, paths): (Vec<Value>, Vec<Path>) = iter.into_iter().unzip();
        QueryResult { values, paths }
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render().map_err(|_| fmt::Error)?)
    }
}

/// Compile `source` and evaluate it against `root`.
pub fn search(root: &Value, source: &str) -> Result<QueryResult, Error> {
    let path = parse_path(source)?;
    Ok(evaluate(&path, root)?)
}

impl CompiledPath {
    /// A copy of `root` with every matched location set to `new_value`.
    ///
    /// A filter match replaces each surviving element where it lives, not
    /// the filtered container. When both a location and one of its ancestors
    /// match, the ancestor is replaced and the nested match is ignored.
    pub fn replace(&self, root: &Value, new_value: Value) -> Result<Value, EvalError> {
        let paths = matched_locations(self, root)?;
        let mut result = root.clone();
        for path in &paths {
            let shadowed = paths
                .iter()
                .any(|other| other.len() < path.len() && path.starts_with(other));
            if shadowed {
                continue;
            }
            if let Some(slot) = path.get_mut(&mut result) {
                *slot = new_value.clone();
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cars() -> Value {
        Value::from_serde_json(serde_json::json!({
            "carOwners": {"A": {"has": ["Honda Accord", "VW Up", "Porsche 911"]}},
            "Cars": [
                {"Brand": "Honda", "Model": "Accord"},
                {"Brand": "VW", "Model": "Up"},
                {"Brand": "Honda", "Model": "Civic"}
            ]
        })).unwrap()
    }

    #[test]
    fn test_search_rendering() {
        let result = search(&cars(), "$.carOwners.A.has").unwrap();
        assert_eq!(
            result.to_string(),
            "$.carOwners.A.has → [\"Honda Accord\",\"VW Up\",\"Porsche 911\"]\n"
        );
    }

    #[test]
    fn test_search_propagates_both_error_kinds() {
        assert!(matches!(search(&cars(), "$."), Err(Error::Syntax(_))));
        assert!(matches!(search(&cars(), "$.ZZZ"), Err(Error::Eval(_))));
    }

    #[test]
    fn test_to_tuple() {
        let result = search(&cars(), "$.Cars[*].Brand").unwrap();
        assert_eq!(
            result.to_tuple(),
            Value::Tuple(vec!["Honda".into(), "VW".into(), "Honda".into()])
        );
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_replace_matched_locations() {
        let root = cars();
        let path = parse_path("$.Cars[*].Brand").unwrap();
        let replaced = path.replace(&root, "Audi".into()).unwrap();
        let brands = search(&replaced, "$.Cars[*].Brand").unwrap();
        assert!(brands.values().iter().all(|v| v == &Value::from("Audi")));
        // the original is untouched
        assert_eq!(search(&root, "$.Cars[1].Brand").unwrap().values()[0], Value::from("VW"));
    }

    #[test]
    fn test_replace_prefers_ancestors() {
        let root = Value::from_serde_json(serde_json::json!({"a": {"a": 1}})).unwrap();
        let path = parse_path("$..a").unwrap();
        let replaced = path
            .replace(&root, Value::from_serde_json(serde_json::json!({"a": 0})).unwrap())
            .unwrap();
        assert_eq!(replaced.to_serde_json().unwrap(), serde_json::json!({"a": {"a": 0}}));
    }

    #[test]
    fn test_replace_through_filter_touches_only_kept_elements() {
        let root = cars();
        let path = parse_path("$.Cars[?(@.Brand == 'Honda')]").unwrap();
        let replaced = path.replace(&root, "X".into()).unwrap();
        assert_eq!(
            replaced.to_serde_json().unwrap()["Cars"],
            serde_json::json!(["X", {"Brand": "VW", "Model": "Up"}, "X"])
        );
    }

    #[test]
    fn test_replace_below_filter_uses_source_locations() {
        let root = cars();
        let path = parse_path("$.Cars[?(@.Brand == 'Honda')][*].Model").unwrap();
        let replaced = path.replace(&root, "?".into()).unwrap();
        let models = search(&replaced, "$.Cars[*].Model").unwrap();
        assert_eq!(
            models.to_tuple(),
            Value::Tuple(vec!["?".into(), "Up".into(), "?".into()])
        );
    }

    #[test]
    fn test_replace_without_matches_is_identity() {
        let root = cars();
        let path = parse_path("$..nothing").unwrap();
        assert_eq!(path.replace(&root, Value::Null).unwrap(), root);
    }
}
