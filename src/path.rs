//! Concrete locations inside a value tree.
//!
//! A [`Path`] is the provenance of a query match: the sequence of attribute
//! names and indices that leads from the root to the matched value. Applying
//! it to the root it was produced from always yields that value again.

use serde::Serialize;
use std::fmt;

use crate::value::Value;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PathStep {
    Attr(String),
    Index(usize),
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Attr(name) if is_identifier(name) => write!(f, ".{}", name),
            PathStep::Attr(name) => {
                let quoted = serde_json::to_string(name).map_err(|_| fmt::Error)?;
                write!(f, "[{}]", quoted)
            }
            PathStep::Index(index) => write!(f, "[{}]", index),
        }
    }
}

impl From<&str> for PathStep {
    fn from(name: &str) -> Self {
        PathStep::Attr(name.to_string())
    }
}

impl From<usize> for PathStep {
    fn from(index: usize) -> Self {
        PathStep::Index(index)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Path {
    steps: Vec<PathStep>,
}

impl Path {
    /// The empty path, which designates the root itself.
    pub fn root() -> Self {
        Path { steps: Vec::new() }
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn push(&mut self, step: PathStep) {
        self.steps.push(step);
    }

    /// A new path extended by one step.
    pub fn join(&self, step: PathStep) -> Path {
        let mut steps = Vec::with_capacity(self.steps.len() + 1);
        steps.extend(self.steps.iter().cloned());
        steps.push(step);
        Path { steps }
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.steps.starts_with(&prefix.steps)
    }

    /// Walk the path from `root`. `None` when any step does not resolve.
    pub fn apply<'v>(&self, root: &'v Value) -> Option<&'v Value> {
        self.steps
            .iter()
            .try_fold(root, |current, step| current.get_step(step))
    }

    pub fn get_mut<'v>(&self, root: &'v mut Value) -> Option<&'v mut Value> {
        let mut current = root;
        for step in &self.steps {
            current = current.get_step_mut(step)?;
        }
        Some(current)
    }
}

impl From<Vec<PathStep>> for Path {
    fn from(steps: Vec<PathStep>) -> Self {
        Path { steps }
    }
}

impl FromIterator<PathStep> for Path {
    fn from_iter<I: IntoIterator<Item = PathStep>>(iter: I) -> Self {
        Path {
            steps: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for step in &self.steps {
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        Value::from_serde_json(serde_json::json!({"a": {"b": [10, 20, {"c d": true}]}})).unwrap()
    }

    #[test]
    fn test_apply_walks_steps() {
        let root = sample();
        let path = Path::from(vec!["a".into(), "b".into(), 1usize.into()]);
        assert_eq!(path.apply(&root), Some(&Value::from(20i64)));
    }

    #[test]
    fn test_apply_empty_path_is_root() {
        let root = sample();
        assert_eq!(Path::root().apply(&root), Some(&root));
    }

    #[test]
    fn test_apply_missing_step() {
        let root = sample();
        assert!(Path::from(vec!["zz".into()]).apply(&root).is_none());
        assert!(Path::from(vec!["a".into(), 0usize.into()]).apply(&root).is_none());
    }

    #[test]
    fn test_get_mut_replaces_in_place() {
        let mut root = sample();
        let path = Path::from(vec!["a".into(), "b".into(), 0usize.into()]);
        if let Some(slot) = path.get_mut(&mut root) {
            *slot = Value::from("ten");
        }
        assert_eq!(path.apply(&root), Some(&Value::from("ten")));
    }

    #[test]
    fn test_display() {
        assert_eq!(Path::root().to_string(), "$");
        let path = Path::from(vec!["a".into(), "b".into(), 2usize.into(), "c d".into()]);
        assert_eq!(path.to_string(), r#"$.a.b[2]["c d"]"#);
    }

    #[test]
    fn test_join_and_starts_with() {
        let parent = Path::from(vec!["a".into()]);
        let child = parent.join(PathStep::Index(3));
        assert_eq!(child.len(), 2);
        assert!(child.starts_with(&parent));
        assert!(!parent.starts_with(&child));
    }

    #[test]
    fn test_serialize_untagged() {
        let path = Path::from(vec!["a".into(), 1usize.into()]);
        assert_eq!(serde_json::to_value(&path).unwrap(), serde_json::json!(["a", 1]));
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("abc_1"));
        assert!(is_identifier("_x"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a-b"));
    }
}
