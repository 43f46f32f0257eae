//! Hotfix script interpreter
//!
//! Loads a script written in a Rust syntax subset, resolves it against the base symbol
//! sets and a caller-supplied [`SymbolTable`], and evaluates a trailing expression to a
//! single [`Value`]. Every call builds a fresh interpreter; nothing survives between calls
//! except the values (and script functions) that the caller keeps.

pub mod engine;
pub mod error;
pub mod stdlib;

pub use engine::{EvalOptions, Interpreter, Script, ScriptFunction};

use hf_core::{Result, SymbolTable, Value};
use std::path::Path;

/// Load `script_path` and evaluate `expr` in its root module with default limits.
pub fn evaluate(script_path: impl AsRef<Path>, expr: &str, symbols: &SymbolTable) -> Result<Value> {
    evaluate_with(script_path, expr, symbols, EvalOptions::default())
}

pub fn evaluate_with(
    script_path: impl AsRef<Path>,
    expr: &str,
    symbols: &SymbolTable,
    options: EvalOptions,
) -> Result<Value> {
    let interpreter = Interpreter::with_options(symbols, options)?;
    let script = interpreter.load_file(script_path)?;
    script.eval(expr)
}
