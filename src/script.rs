#![forbid(unsafe_code)]

//! Rule-script reading
//!
//! A Spork program uses CSS syntax: rulesets pair a selector with a block of
//! `name: expression;` declarations, `@import` brings a module into scope,
//! and `/* ... */` comments are ignored. This module only splits the text
//! into statements; selectors and expressions stay raw text here.

mod parser;

pub use parser::parse_script;

use crate::error::ScriptError;

/// One `name: expression` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Variable name (the CSS property)
    pub name: String,
    /// Raw expression text, trimmed, with any `!important` removed
    pub value: String,
    /// 1-indexed source line of the declaration
    pub line: usize,
}

impl Declaration {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Declaration {
            name: name.into(),
            value: value.into(),
            line: 0,
        }
    }
}

/// A top-level statement of a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `selector { declarations }`
    Ruleset {
        selector: String,
        declarations: Vec<Declaration>,
        line: usize,
    },
    /// `@keyword prelude;` or `@keyword prelude { ... }`
    AtRule {
        keyword: String,
        prelude: String,
        line: usize,
    },
}

impl Statement {
    /// The at-keyword (without `@`) for at-rules
    pub fn at_keyword(&self) -> Option<&str> {
        match self {
            Statement::AtRule { keyword, .. } => Some(keyword),
            Statement::Ruleset { .. } => None,
        }
    }

    /// The imported name of an `@import` rule
    pub fn import_uri(&self) -> Option<String> {
        match self {
            Statement::AtRule {
                keyword, prelude, ..
            } if keyword.eq_ignore_ascii_case("import") => parser::import_target(prelude),
            _ => None,
        }
    }

    /// 1-indexed source line where the statement starts
    pub fn line(&self) -> usize {
        match self {
            Statement::Ruleset { line, .. } | Statement::AtRule { line, .. } => *line,
        }
    }
}

/// The result of reading a script: statements plus recoverable errors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stylesheet {
    pub statements: Vec<Statement>,
    pub errors: Vec<ScriptError>,
}
