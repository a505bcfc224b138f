#![forbid(unsafe_code)]

//! Spork: a little language for extracting data from XML and HTML
//!
//! A Spork program is a stylesheet whose rulesets pair a CSS selector with
//! `name: expression;` declarations. Running a program over a document
//! evaluates the declarations for every matching element and accumulates
//! the values into a namespace of variables.
//!
//! ```no_run
//! use spork::Spork;
//!
//! let mut program = Spork::new("title { title: _TEXT; }")?;
//! let root = program.get_root(std::io::stdin(), &Default::default())?;
//! let variables = program.run(Some(&root))?;
//! # Ok::<(), spork::SporkError>(())
//! ```

pub mod cli;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod expr;
pub mod output;
pub mod rules;
pub mod script;
pub mod selector;
pub mod types;

// Re-export error types for convenient access
pub use error::{ConfigError, DocumentError, EvalError, ScriptError, SelectorError, SporkError};

// Re-export core domain types for convenient access
pub use engine::{EngineOptions, Selection, Spork};
pub use expr::{ModuleRegistry, Value};
pub use rules::{FlowControl, Namespace};
pub use types::{Format, ParserOptions};
