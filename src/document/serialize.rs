//! Markup serialization of subtrees (the `_XML` pseudo-attribute)

use super::tree::{NodeKind, NodeRef};

/// Serialize `node` and its descendants
///
/// The outermost element carries every namespace declaration in scope, so
/// the output is well-formed on its own.
pub(crate) fn serialize(node: &NodeRef) -> String {
    let mut out = String::new();
    let in_scope = in_scope_declarations(node);
    write_node(node, Some(in_scope.as_slice()), &mut out);
    out
}

fn in_scope_declarations(node: &NodeRef) -> Vec<(Option<String>, String)> {
    let mut chain = Vec::new();
    let mut current = Some(node.clone());
    while let Some(n) = current {
        chain.push(n.clone());
        current = n.parent();
    }
    let mut scope: Vec<(Option<String>, String)> = Vec::new();
    for element in chain.iter().rev() {
        for (prefix, uri) in element.declarations() {
            scope.retain(|(p, _)| p != prefix);
            scope.push((prefix.clone(), uri.clone()));
        }
    }
    scope
}

fn write_node(node: &NodeRef, declarations: Option<&[(Option<String>, String)]>, out: &mut String) {
    match node.kind() {
        NodeKind::Element {
            name, attributes, ..
        } => {
            let tag = name.prefixed();
            out.push('<');
            out.push_str(&tag);
            for (prefix, uri) in declarations.unwrap_or(node.declarations()) {
                match prefix {
                    Some(p) => out.push_str(&format!(" xmlns:{}=\"", p)),
                    None => out.push_str(" xmlns=\""),
                }
                escape_into(uri, true, out);
                out.push('"');
            }
            for attr in attributes {
                out.push(' ');
                out.push_str(&attr.name.prefixed());
                out.push_str("=\"");
                escape_into(&attr.value, true, out);
                out.push('"');
            }
            let children = node.child_nodes();
            if children.is_empty() {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in &children {
                write_node(child, None, out);
            }
            out.push_str("</");
            out.push_str(&tag);
            out.push('>');
        }
        NodeKind::Text(text) => escape_into(text, false, out),
        NodeKind::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeKind::ProcessingInstruction { target, data } => {
            out.push_str("<?");
            out.push_str(target);
            if let Some(data) = data {
                out.push(' ');
                out.push_str(data);
            }
            out.push_str("?>");
        }
        NodeKind::Root => {
            for child in node.child_nodes() {
                write_node(&child, None, out);
            }
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\n' if attribute => out.push_str("&#10;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::document::parse;
    use crate::types::{Format, ParserOptions};

    #[test]
    fn test_serialize_escapes_text_and_attributes() {
        let root = parse(
            br#"<a title="x &quot;y&quot;">1 &lt; 2</a>"#,
            Format::Xml,
            &ParserOptions::default(),
        )
        .unwrap();
        assert_eq!(root.serialize(), r#"<a title="x &quot;y&quot;">1 &lt; 2</a>"#);
    }

    #[test]
    fn test_serialize_subtree_carries_namespaces() {
        let root = parse(
            br#"<r xmlns:x="urn:x"><x:item id="1"/></r>"#,
            Format::Xml,
            &ParserOptions::default(),
        )
        .unwrap();
        let item = &root.children()[0];
        assert_eq!(item.serialize(), r#"<x:item xmlns:x="urn:x" id="1"/>"#);
    }
}
