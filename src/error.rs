//! Error types for Spork
//!
//! Each concern (script, selector, document, expression, configuration) has
//! its own error enum; `SporkError` unifies them for callers of the engine.
//!
//! Flow-control signals are deliberately absent from this module: they are
//! carried by [`crate::rules::Abort`] and never reach callers as errors.

use std::path::PathBuf;

/// Errors reported while reading a Spork program
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    /// Syntax error in the rule script
    #[error("line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    /// `@import` named a module the registry does not provide
    #[error("No module named '{0}'")]
    UnknownModule(String),

    /// At-rule other than `@import`
    #[error("Unknown at-rule: @{0}")]
    UnknownAtRule(String),
}

/// Selector compilation and matching errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SelectorError {
    /// The selector text is not valid CSS
    #[error("Invalid selector '{selector}': {message}")]
    Syntax { selector: String, message: String },

    /// A namespace prefix that the document does not declare
    #[error("Undeclared namespace prefix '{0}'")]
    UnknownPrefix(String),
}

/// Document loading errors
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Malformed XML
    #[error("XML parse error: {0}")]
    Xml(String),

    /// The input is not valid UTF-8
    #[error("Document is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// The document contained no root element
    #[error("Document has no root element")]
    NoRoot,

    /// The engine was configured with an empty format list
    #[error("No document formats configured")]
    NoFormats,

    /// I/O error while reading the document
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Expression evaluation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// The expression text could not be parsed
    #[error("Syntax error in '{expression}': {message}")]
    Syntax { expression: String, message: String },

    /// A name that is bound in neither scope
    #[error("name '{0}' is not defined")]
    UnboundName(String),

    /// An operation was applied to a value of the wrong type
    #[error("TypeError: {0}")]
    Type(String),

    /// Sequence index out of range
    #[error("IndexError: {0}")]
    Index(String),

    /// Missing dictionary key
    #[error("KeyError: {0}")]
    Key(String),

    /// Division or modulo by zero
    #[error("ZeroDivisionError: {0}")]
    ZeroDivision(String),

    /// A value of the right type but unacceptable content
    #[error("ValueError: {0}")]
    Value(String),

    /// Attribute or method not available on a value
    #[error("AttributeError: {0}")]
    Attribute(String),

    /// Selector error raised while resolving matches
    #[error("{0}")]
    Selector(#[from] SelectorError),
}

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// spork.toml could not be read
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// spork.toml is not valid TOML or does not match the schema
    #[error("Invalid configuration syntax: {0}")]
    Parse(#[from] toml::de::Error),

    /// A semantically invalid configuration value
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Top-level error type for Spork
#[derive(Debug, thiserror::Error)]
pub enum SporkError {
    /// Program could not be loaded
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    /// Selector compilation error
    #[error("Selector error: {0}")]
    Selector(#[from] SelectorError),

    /// Document could not be parsed in any configured format
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// Expression evaluation failed during a run
    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// `run` or `select` called before any document was loaded
    #[error("No document: call get_root() first or pass a document")]
    NoDocument,

    /// I/O error on an input file
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
