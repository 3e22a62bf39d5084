//! treepath - JSONPath-style queries over generic value trees
//!
//! A path such as `$.Cars[?(@.Brand == 'Honda')]` is compiled once into a
//! [`CompiledPath`] and can then be evaluated against any number of roots.
//! Every match comes back with the [`Path`] it was found at, so applying
//! that path to the root yields the matched value again.
//!
//! ```
//! use treepath::{compile, Value};
//!
//! let root = Value::from_serde_json(serde_json::json!({"A": [1, 2, 3]})).unwrap();
//! let path = compile("$.A[-2:]").unwrap();
//! let result = path.evaluate(&root).unwrap();
//! assert_eq!(result.paths()[0].to_string(), "$.A[1]");
//! ```

pub mod error;
pub mod evaluator;
pub mod options;
pub mod parser;
pub mod path;
pub mod search;
pub mod value;

pub use error::{CompileError, Error, EvalError, SyntaxError, ValueError};
pub use evaluator::{evaluate, evaluate_with};
pub use options::{EvalOptions, DEFAULT_MAX_DEPTH, DEFAULT_MAX_RESULTS};
pub use parser::{CompiledPath, Step, UnionKey};
pub use path::{Path, PathStep};
pub use search::{search, QueryResult};
pub use value::Value;

/// Compile `$`-rooted path text. Fails with a syntax error for malformed text
/// and a compile error for unknown filter names or bad regex literals.
pub fn compile(source: &str) -> Result<CompiledPath, Error> {
    parser::parse_path(source)
}
