//! The `(value, path)` pairs that flow between steps.
//!
//! Values reached by plain navigation borrow from the root. The list built
//! by a filter step is owned, and remembers where each of its elements came
//! from so that anything reached through it still reports a real location.

use std::borrow::Cow;
use std::rc::Rc;

use crate::error::EvalError;
use crate::options::EvalOptions;
use crate::path::{Path, PathStep};
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct Node<'a> {
    pub value: Cow<'a, Value>,
    pub path: Path,
    /// Source location of each element, for lists assembled by a filter
    origins: Option<Rc<Vec<Path>>>,
}

pub type WorkingSet<'a> = Vec<Node<'a>>;

impl<'a> Node<'a> {
    /// The starting point of an evaluation, at the empty path.
    pub fn start(value: &'a Value) -> Self {
        Node {
            value: Cow::Borrowed(value),
            path: Path::root(),
            origins: None,
        }
    }

    /// A list of filter survivors located at the filtered container's path.
    pub fn filtered(elements: Vec<Value>, path: Path, origins: Vec<Path>) -> Self {
        Node {
            value: Cow::Owned(Value::List(elements)),
            path,
            origins: Some(Rc::new(origins)),
        }
    }

    fn child_path(&self, step: &PathStep) -> Path {
        if let (Some(origins), PathStep::Index(i)) = (&self.origins, step) {
            if let Some(origin) = origins.get(*i) {
                return origin.clone();
            }
        }
        self.path.join(step.clone())
    }

    fn wrap(&self, step: &PathStep, child: Cow<'a, Value>) -> Node<'a> {
        Node {
            value: child,
            path: self.child_path(step),
            origins: None,
        }
    }

    /// The child at `step`, if it exists.
    pub fn child(&self, step: PathStep) -> Option<Node<'a>> {
        let child = match &self.value {
            Cow::Borrowed(value) => {
                let value: &'a Value = *value;
                Cow::Borrowed(value.get_step(&step)?)
            }
            Cow::Owned(value) => Cow::Owned(value.get_step(&step)?.clone()),
        };
        Some(self.wrap(&step, child))
    }

    /// Every immediate child, in the container's natural order.
    pub fn children(&self) -> WorkingSet<'a> {
        match &self.value {
            Cow::Borrowed(value) => {
                let value: &'a Value = *value;
                value
                    .entries()
                    .into_iter()
                    .map(|(step, child)| self.wrap(&step, Cow::Borrowed(child)))
                    .collect()
            }
            Cow::Owned(value) => value
                .entries()
                .into_iter()
                .map(|(step, child)| self.wrap(&step, Cow::Owned(child.clone())))
                .collect(),
        }
    }

    /// The locations in the root that this node stands for: its own path,
    /// or the source of every element when it is a filtered list.
    pub fn locations(&self) -> Vec<Path> {
        match &self.origins {
            Some(origins) => origins.as_ref().clone(),
            None => vec![self.path.clone()],
        }
    }

    pub fn check_depth(&self, options: &EvalOptions) -> Result<(), EvalError> {
        if self.path.len() > options.max_depth {
            return Err(EvalError::DepthLimit {
                limit: options.max_depth,
            });
        }
        Ok(())
    }
}

/// `node` followed by all of its descendants in depth-first pre-order.
pub fn descendants<'a>(node: Node<'a>, options: &EvalOptions) -> Result<WorkingSet<'a>, EvalError> {
    let mut out = Vec::new();
    let mut pending = vec![node];
    while let Some(current) = pending.pop() {
        current.check_depth(options)?;
        pending.extend(current.children().into_iter().rev());
        out.push(current);
        if out.len() > options.max_results {
            return Err(EvalError::SizeLimit {
                limit: options.max_results,
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Value {
        Value::from_serde_json(serde_json::json!({"a": [1, {"b": 2}], "c": "x"})).unwrap()
    }

    fn paths(nodes: &[Node]) -> Vec<String> {
        nodes.iter().map(|n| n.path.to_string()).collect()
    }

    #[test]
    fn test_children_follow_entries() {
        let root = doc();
        let start = Node::start(&root);
        assert_eq!(paths(&start.children()), vec!["$.a", "$.c"]);
        assert!(matches!(start.children()[0].value, Cow::Borrowed(_)));
    }

    #[test]
    fn test_child_lookup() {
        let root = doc();
        let a = Node::start(&root).child(PathStep::Attr("a".into())).unwrap();
        let b = a.child(PathStep::Index(1)).unwrap();
        assert_eq!(b.path.to_string(), "$.a[1]");
        assert!(a.child(PathStep::Index(5)).is_none());
    }

    #[test]
    fn test_descendants_pre_order() {
        let root = doc();
        let all = descendants(Node::start(&root), &EvalOptions::default()).unwrap();
        assert_eq!(
            paths(&all),
            vec!["$", "$.a", "$.a[0]", "$.a[1]", "$.a[1].b", "$.c"]
        );
    }

    #[test]
    fn test_descendants_respect_limits() {
        let root = doc();
        let shallow = EvalOptions::default().with_max_depth(1);
        assert_eq!(
            descendants(Node::start(&root), &shallow).unwrap_err(),
            EvalError::DepthLimit { limit: 1 }
        );
        let small = EvalOptions::default().with_max_results(3);
        assert_eq!(
            descendants(Node::start(&root), &small).unwrap_err(),
            EvalError::SizeLimit { limit: 3 }
        );
    }

    #[test]
    fn test_filtered_children_keep_origins() {
        let root = doc();
        let origins = vec![Path::from(vec!["a".into(), 1usize.into()])];
        let kept = vec![root.get_attr("a").unwrap().get_index(1).unwrap().clone()];
        let list = Node::filtered(kept, Path::from(vec!["a".into()]), origins);

        let children = list.children();
        assert_eq!(paths(&children), vec!["$.a[1]"]);
        let b = children[0].child(PathStep::Attr("b".into())).unwrap();
        assert_eq!(b.path.to_string(), "$.a[1].b");
        assert_eq!(b.path.apply(&root), Some(&*b.value));
        assert_eq!(list.child(PathStep::Index(0)).unwrap().path.to_string(), "$.a[1]");
    }
}
