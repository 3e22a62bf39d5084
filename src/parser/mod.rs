//! Parser module for path expressions
//!
//! This module contains the lexer, the path parser and the filter compiler.

pub mod types;
pub mod lexer;
pub mod filter_compiler;
pub mod path_parser;

// Re-exports
pub use lexer::{Lexer, Token, TokenType};
pub use path_parser::parse_path;
pub use types::{CompiledPath, FilterExpr, Instruction, PathScope, Step, UnionKey};
