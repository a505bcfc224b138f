#![forbid(unsafe_code)]

//! Core domain types for Spork
//!
//! This module defines the small value types shared by the document loader,
//! the selector matcher, the configuration file and the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Document formats Spork can parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Strict, namespace-aware XML
    Xml,
    /// Lenient HTML
    Html,
}

impl Format {
    /// The default fallback order: a strict XML attempt, then lenient HTML
    pub fn default_order() -> Vec<Format> {
        vec![Format::Xml, Format::Html]
    }

    /// Whether element and attribute names compare case-insensitively
    pub fn is_case_insensitive(self) -> bool {
        matches!(self, Format::Html)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Xml => write!(f, "XML"),
            Format::Html => write!(f, "HTML"),
        }
    }
}

/// Options forwarded to the document parser
///
/// The names follow the command-line flags. Options the backing parser has
/// no equivalent for are accepted and reported by [`ParserOptions::unsupported`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserOptions {
    /// Read the DTD and add its default attributes
    pub attribute_defaults: bool,
    /// Validate against the referenced DTD while parsing
    pub dtd_validation: bool,
    /// Allow network access when looking up external documents
    pub allow_network: bool,
    /// Try hard to parse through broken XML
    pub recover: bool,
    /// Discard whitespace-only text nodes between tags
    pub remove_blank_text: bool,
    /// Keep CDATA sections instead of normalizing them to text
    pub leave_cdata: bool,
    /// Keep entity references unresolved
    pub leave_entities: bool,
    /// Skip collection of XML IDs
    pub forget_ids: bool,
    /// Lift the safety limits on tree size
    pub huge_tree: bool,
}

impl ParserOptions {
    /// Names of enabled options that have no effect with the current parsers
    pub fn unsupported(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.attribute_defaults {
            names.push("attribute_defaults");
        }
        if self.dtd_validation {
            names.push("dtd_validation");
        }
        if self.recover {
            names.push("recover");
        }
        if self.leave_cdata {
            names.push("leave_cdata");
        }
        if self.leave_entities {
            names.push("leave_entities");
        }
        names
    }

    /// Merge flags set elsewhere (e.g. on the command line) into these options
    pub fn merge(self, other: ParserOptions) -> ParserOptions {
        ParserOptions {
            attribute_defaults: self.attribute_defaults || other.attribute_defaults,
            dtd_validation: self.dtd_validation || other.dtd_validation,
            allow_network: self.allow_network || other.allow_network,
            recover: self.recover || other.recover,
            remove_blank_text: self.remove_blank_text || other.remove_blank_text,
            leave_cdata: self.leave_cdata || other.leave_cdata,
            leave_entities: self.leave_entities || other.leave_entities,
            forget_ids: self.forget_ids || other.forget_ids,
            huge_tree: self.huge_tree || other.huge_tree,
        }
    }
}
