#![forbid(unsafe_code)]

//! Document trees
//!
//! Both input formats are loaded into the same immutable arena tree, so the
//! selector matcher and the rule engine never see which parser produced it.
//! Nodes are addressed through [`NodeRef`], a cheap handle holding a shared
//! reference to the whole document.

mod html;
mod serialize;
mod tree;
mod xml;

pub use tree::{Attribute, Document, NodeRef, QName};

use crate::error::DocumentError;
use crate::types::{Format, ParserOptions};

/// Parse `input` as `format`, returning the document element
pub fn parse(input: &[u8], format: Format, options: &ParserOptions) -> Result<NodeRef, DocumentError> {
    let unsupported = options.unsupported();
    if !unsupported.is_empty() {
        log::warn!(
            "Parser option(s) not supported for {}: {}",
            format,
            unsupported.join(", ")
        );
    }
    match format {
        Format::Xml => xml::parse(input, options),
        Format::Html => html::parse(input, options),
    }
}

/// Parse `input` trying each of `formats` in order
///
/// The first format that yields a document element wins. When every format
/// fails, the last failure is returned.
pub fn parse_any(input: &[u8], formats: &[Format], options: &ParserOptions) -> Result<NodeRef, DocumentError> {
    let mut last = DocumentError::NoFormats;
    for &format in formats {
        match parse(input, format, options) {
            Ok(root) => return Ok(root),
            Err(err) => {
                log::debug!("{} parse failed, trying next format: {}", format, err);
                last = err;
            }
        }
    }
    Err(last)
}
