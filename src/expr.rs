#![forbid(unsafe_code)]

//! The expression language evaluated by declarations
//!
//! A small Python-flavoured language: literals, names, attribute access,
//! calls, indexing and slicing, arithmetic and boolean operators, chained
//! comparisons, conditional expressions and list comprehensions.
//! Expressions are parsed to an [`Expr`] tree and walked by an
//! interpreter over a [`GlobalScope`] and a local namespace.

pub mod ast;
mod builtins;
mod interpreter;
mod modules;
mod ops;
mod parser;
mod scope;
mod value;

pub use ast::Expr;
pub use interpreter::Interpreter;
pub use modules::ModuleRegistry;
pub use parser::parse;
pub use scope::GlobalScope;
pub use value::{Args, Function, Module, NativeFn, Value, format_float, quote_literal};

use crate::rules::Abort;
use std::collections::BTreeMap;

/// Parse and evaluate `source` in one step
///
/// # Errors
///
/// Syntax errors surface as `Abort::Error`; evaluation may fail or raise a
/// flow-control signal.
pub fn evaluate(
    source: &str,
    globals: &GlobalScope,
    locals: &BTreeMap<String, Value>,
) -> Result<Value, Abort> {
    let expr = parse(source)?;
    Interpreter::new(globals, locals).eval(&expr)
}
