//! Strict XML loading through roxmltree

use super::tree::{Attribute, QName, TreeBuilder};
use super::NodeRef;
use crate::error::DocumentError;
use crate::types::{Format, ParserOptions};

/// Node-count ceiling applied unless `huge_tree` is set
const DEFAULT_NODES_LIMIT: u32 = 10_000_000;

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

pub(crate) fn parse(input: &[u8], options: &ParserOptions) -> Result<NodeRef, DocumentError> {
    let text = std::str::from_utf8(input)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut parsing = roxmltree::ParsingOptions::default();
    parsing.allow_dtd = true;
    parsing.nodes_limit = if options.huge_tree {
        u32::MAX
    } else {
        DEFAULT_NODES_LIMIT
    };

    let document = roxmltree::Document::parse_with_options(text, parsing)
        .map_err(|e| DocumentError::Xml(e.to_string()))?;

    let mut builder = TreeBuilder::new(*options);
    for child in document.root().children() {
        convert(&mut builder, TreeBuilder::ROOT, child);
    }
    builder.finish(Format::Xml)
}

fn prefix_for(node: roxmltree::Node<'_, '_>, namespace: Option<&str>) -> Option<String> {
    let uri = namespace?;
    node.lookup_prefix(uri)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
}

fn convert(builder: &mut TreeBuilder, parent: usize, node: roxmltree::Node<'_, '_>) {
    match node.node_type() {
        roxmltree::NodeType::Element => {
            let tag = node.tag_name();
            let name = QName {
                namespace: tag.namespace().map(str::to_string),
                prefix: prefix_for(node, tag.namespace()),
                local: tag.name().to_string(),
            };

            let attributes = node
                .attributes()
                .map(|attr| Attribute {
                    name: QName {
                        namespace: attr.namespace().map(str::to_string),
                        prefix: prefix_for(node, attr.namespace()),
                        local: attr.name().to_string(),
                    },
                    value: attr.value().to_string(),
                })
                .collect();

            let inherited: Vec<(Option<&str>, &str)> = node
                .parent_element()
                .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
                .unwrap_or_default();
            let declarations = node
                .namespaces()
                .filter(|ns| ns.uri() != XML_NAMESPACE)
                .filter(|ns| !inherited.contains(&(ns.name(), ns.uri())))
                .map(|ns| (ns.name().map(str::to_string), ns.uri().to_string()))
                .collect();

            let id = builder.push_element(parent, name, attributes, declarations);
            for child in node.children() {
                convert(builder, id, child);
            }
        }
        roxmltree::NodeType::Text => {
            if let Some(text) = node.text() {
                builder.push_text(parent, text);
            }
        }
        roxmltree::NodeType::Comment => {
            builder.push_comment(parent, node.text().unwrap_or_default());
        }
        roxmltree::NodeType::PI => {
            if let Some(pi) = node.pi() {
                builder.push_pi(parent, pi.target, pi.value);
            }
        }
        roxmltree::NodeType::Root => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_document() {
        let root = parse(b"<doc><a x=\"1\">hi</a></doc>", &ParserOptions::default()).unwrap();
        assert_eq!(root.tag(), "doc");
        let a = &root.children()[0];
        assert_eq!(a.attribute("x"), Some("1"));
        assert_eq!(a.text(), Some("hi"));
        assert_eq!(root.document().format(), Format::Xml);
    }

    #[test]
    fn test_namespaced_tags_use_clark_notation() {
        let root = parse(
            br#"<feed xmlns="urn:atom" xmlns:m="urn:media"><m:thumb/></feed>"#,
            &ParserOptions::default(),
        )
        .unwrap();
        assert_eq!(root.tag(), "{urn:atom}feed");
        assert_eq!(root.local_name(), "feed");
        assert_eq!(root.children()[0].tag(), "{urn:media}thumb");
        assert_eq!(
            root.document().namespaces().get("m").map(String::as_str),
            Some("urn:media")
        );
        assert!(!root.document().namespaces().contains_key(""));
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        let err = parse(b"<p>unclosed", &ParserOptions::default()).unwrap_err();
        assert!(matches!(err, DocumentError::Xml(_)));
    }

    #[test]
    fn test_invalid_utf8_is_an_error() {
        let err = parse(b"<p>\xff</p>", &ParserOptions::default()).unwrap_err();
        assert!(matches!(err, DocumentError::Encoding(_)));
    }

    #[test]
    fn test_doctype_is_accepted() {
        let root = parse(
            b"<!DOCTYPE note [<!ENTITY who \"world\">]><note>hello &who;</note>",
            &ParserOptions::default(),
        )
        .unwrap();
        assert_eq!(root.flattened_text(), "hello world");
    }
}
