#![forbid(unsafe_code)]

//! CSS selector compilation and matching
//!
//! A selector string is compiled once into a [`MatchExpr`]; the expression is
//! then resolved against a context element to yield matching elements in
//! document order. Resolution is relative: every element of a selector chain
//! must lie inside the context element's subtree (the context itself
//! included), mirroring a `descendant-or-self::` location path.

mod matcher;
mod parser;

use crate::error::SelectorError;

/// How a type selector constrains the element namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NsConstraint {
    /// No prefix written: any namespace
    Unspecified,
    /// `*|name`
    Any,
    /// `|name`
    NoNamespace,
    /// `prefix|name`, resolved against the document's declarations
    Prefix(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TypeTest {
    Universal(NsConstraint),
    Name(NsConstraint, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttrOp {
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Suffix,
    Substring,
}

/// `an+b` of the `:nth-*` pseudo-classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Nth {
    pub(crate) a: i64,
    pub(crate) b: i64,
}

impl Nth {
    /// Whether the 1-based `index` is selected
    pub(crate) fn matches(&self, index: i64) -> bool {
        if self.a == 0 {
            return index == self.b;
        }
        let diff = index - self.b;
        diff % self.a == 0 && diff / self.a >= 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Pseudo {
    FirstChild,
    LastChild,
    OnlyChild,
    FirstOfType,
    LastOfType,
    OnlyOfType,
    NthChild(Nth),
    NthLastChild(Nth),
    NthOfType(Nth),
    NthLastOfType(Nth),
    Empty,
    Root,
    Contains(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Filter {
    Id(String),
    Class(String),
    Attribute {
        name: String,
        test: Option<(AttrOp, String)>,
    },
    Pseudo(Pseudo),
    Not(Box<Compound>),
}

/// A sequence of simple selectors without combinators, e.g. `a.ext[href]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Compound {
    pub(crate) type_test: Option<TypeTest>,
    pub(crate) filters: Vec<Filter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Combinator {
    Descendant,
    Child,
    Adjacent,
    Sibling,
}

/// Compounds joined by combinators, stored left to right
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Complex {
    pub(crate) compounds: Vec<Compound>,
    pub(crate) combinators: Vec<Combinator>,
}

/// A compiled selector group (`a, b > c`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchExpr {
    source: String,
    selectors: Vec<Complex>,
}

impl MatchExpr {
    /// Compile a CSS selector
    ///
    /// # Errors
    ///
    /// Returns `SelectorError::Syntax` for malformed or unsupported selectors.
    pub fn compile(selector: &str) -> Result<Self, SelectorError> {
        let selectors = parser::parse(selector)?;
        Ok(MatchExpr {
            source: selector.trim().to_string(),
            selectors,
        })
    }

    /// The selector text this expression was compiled from
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl std::fmt::Display for MatchExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}
