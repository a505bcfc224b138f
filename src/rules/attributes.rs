#![forbid(unsafe_code)]

//! Attribute lookup for `$key` placeholders

use crate::document::NodeRef;
use crate::expr::quote_literal;
use std::collections::HashMap;

/// Value of one of the `_TEXT`, `_TAG` or `_XML` pseudo-attributes
pub fn pseudo_attribute(node: &NodeRef, key: &str) -> Option<String> {
    match key {
        "_TEXT" => Some(node.flattened_text()),
        "_TAG" => Some(node.tag()),
        "_XML" => Some(node.serialize()),
        _ => None,
    }
}

/// Memoizing view of the effective attributes of one element
///
/// A key the element does not carry is looked up on its parent, and so on
/// up to the document element. Keys starting with `_` are never read from
/// the element's own attributes; only the pseudo-attributes are. A mapping
/// over no element resolves every key to `''`.
#[derive(Debug)]
pub struct AttributeMapping {
    node: Option<NodeRef>,
    cache: HashMap<String, String>,
    parent: Option<Box<AttributeMapping>>,
}

impl AttributeMapping {
    pub fn new(node: Option<NodeRef>) -> Self {
        AttributeMapping {
            node,
            cache: HashMap::new(),
            parent: None,
        }
    }

    pub fn node(&self) -> Option<&NodeRef> {
        self.node.as_ref()
    }

    /// Source form of `key`
    ///
    /// Attribute values come back as quoted string literals, pseudo-attribute
    /// values as raw text.
    pub fn resolve(&mut self, key: &str) -> String {
        if let Some(cached) = self.cache.get(key) {
            return cached.clone();
        }
        let Some(node) = &self.node else {
            return "''".to_string();
        };
        let own = if key.starts_with('_') {
            pseudo_attribute(node, key)
        } else {
            node.attribute(key).map(quote_literal)
        };
        let resolved = match own {
            Some(value) => value,
            None => {
                let parent = self
                    .parent
                    .get_or_insert_with(|| Box::new(AttributeMapping::new(node.parent())));
                parent.resolve(key)
            }
        };
        self.cache.insert(key.to_string(), resolved.clone());
        resolved
    }
}
