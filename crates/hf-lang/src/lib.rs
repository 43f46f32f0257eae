//! Front end for hotfix scripts: a lexer and a recursive-descent parser for the subset of
//! Rust syntax that patch scripts are written in.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use parser::{parse_expression, parse_file, ParseError};
