//! Result formatters (JSON and JSONL)

pub mod json;
pub mod jsonl;

pub use json::JsonFormatter;
pub use jsonl::JsonlFormatter;

use crate::rules::Namespace;

/// The results of one input document
///
/// A whole-document run has exactly one result; a selection run has one
/// per selected element that was not skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Path of the input, or `-` for standard input
    pub source: String,
    pub results: Vec<Namespace>,
}

impl Report {
    pub fn new(source: impl Into<String>, results: Vec<Namespace>) -> Self {
        Report {
            source: source.into(),
            results,
        }
    }
}
