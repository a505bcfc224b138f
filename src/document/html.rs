//! Lenient HTML loading through scraper (html5ever)

use super::tree::{Attribute, QName, TreeBuilder};
use super::NodeRef;
use crate::error::DocumentError;
use crate::types::{Format, ParserOptions};
use scraper::{ElementRef, Html, Node};

pub(crate) fn parse(input: &[u8], options: &ParserOptions) -> Result<NodeRef, DocumentError> {
    let text = String::from_utf8_lossy(input);
    let html = Html::parse_document(&text);

    let mut builder = TreeBuilder::new(*options);
    convert(&mut builder, TreeBuilder::ROOT, html.root_element());
    builder.finish(Format::Html)
}

fn convert(builder: &mut TreeBuilder, parent: usize, element: ElementRef<'_>) {
    let value = element.value();
    let attributes = value
        .attrs()
        .map(|(name, value)| Attribute {
            name: QName::local(name),
            value: value.to_string(),
        })
        .collect();
    let id = builder.push_element(parent, QName::local(value.name()), attributes, Vec::new());

    for child in element.children() {
        match child.value() {
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    convert(builder, id, child);
                }
            }
            Node::Text(text) => builder.push_text(id, text),
            Node::Comment(comment) => builder.push_comment(id, comment),
            _ => {}
        }
    }
}
