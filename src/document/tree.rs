//! Arena representation of a parsed document

use crate::error::DocumentError;
use crate::types::{Format, ParserOptions};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A qualified element or attribute name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    /// Namespace URI, if any
    pub namespace: Option<String>,
    /// Prefix used in the source document, if any
    pub prefix: Option<String>,
    /// Local part of the name
    pub local: String,
}

impl QName {
    /// A name without namespace
    pub fn local(local: impl Into<String>) -> Self {
        QName {
            namespace: None,
            prefix: None,
            local: local.into(),
        }
    }

    /// The name in Clark notation: `{uri}local`, or just `local`
    pub fn clark(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{{{}}}{}", ns, self.local),
            None => self.local.clone(),
        }
    }

    /// The name as written in markup: `prefix:local`, or just `local`
    pub fn prefixed(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local),
            None => self.local.clone(),
        }
    }
}

/// An attribute of an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Root,
    Element {
        name: QName,
        attributes: Vec<Attribute>,
        /// Namespace declarations made on this element (prefix, uri)
        declarations: Vec<(Option<String>, String)>,
    },
    Text(String),
    Comment(String),
    ProcessingInstruction {
        target: String,
        data: Option<String>,
    },
}

#[derive(Debug)]
pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
}

/// An immutable parsed document
///
/// Node ids are assigned in document order, so sorting by id sorts by
/// position in the document.
#[derive(Debug)]
pub struct Document {
    pub(crate) nodes: Vec<NodeData>,
    format: Format,
    namespaces: BTreeMap<String, String>,
}

impl Document {
    /// The format the document was parsed as
    pub fn format(&self) -> Format {
        self.format
    }

    /// Prefixed namespace declarations of the document element
    pub fn namespaces(&self) -> &BTreeMap<String, String> {
        &self.namespaces
    }

    /// Number of nodes in the arena, including the document node
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena holds only the document node
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub(crate) fn node(&self, id: usize) -> &NodeData {
        &self.nodes[id]
    }
}

/// Incremental builder used by the format-specific loaders
pub(crate) struct TreeBuilder {
    nodes: Vec<NodeData>,
    options: ParserOptions,
}

impl TreeBuilder {
    pub(crate) const ROOT: usize = 0;

    pub(crate) fn new(options: ParserOptions) -> Self {
        TreeBuilder {
            nodes: vec![NodeData {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
            options,
        }
    }

    fn push(&mut self, parent: usize, kind: NodeKind) -> usize {
        let id = self.nodes.len();
        self.nodes.push(NodeData {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    pub(crate) fn push_element(
        &mut self,
        parent: usize,
        name: QName,
        attributes: Vec<Attribute>,
        declarations: Vec<(Option<String>, String)>,
    ) -> usize {
        self.push(
            parent,
            NodeKind::Element {
                name,
                attributes,
                declarations,
            },
        )
    }

    /// Append text, merging with a preceding text sibling
    pub(crate) fn push_text(&mut self, parent: usize, text: &str) {
        if self.options.remove_blank_text && text.trim().is_empty() {
            return;
        }
        if let Some(&last) = self.nodes[parent].children.last()
            && let NodeKind::Text(existing) = &mut self.nodes[last].kind
        {
            existing.push_str(text);
            return;
        }
        self.push(parent, NodeKind::Text(text.to_string()));
    }

    pub(crate) fn push_comment(&mut self, parent: usize, text: &str) {
        self.push(parent, NodeKind::Comment(text.to_string()));
    }

    pub(crate) fn push_pi(&mut self, parent: usize, target: &str, data: Option<&str>) {
        self.push(
            parent,
            NodeKind::ProcessingInstruction {
                target: target.to_string(),
                data: data.map(str::to_string),
            },
        );
    }

    /// Freeze the tree and return its document element
    pub(crate) fn finish(self, format: Format) -> Result<NodeRef, DocumentError> {
        let root_id = self.nodes[Self::ROOT]
            .children
            .iter()
            .copied()
            .find(|&id| matches!(self.nodes[id].kind, NodeKind::Element { .. }))
            .ok_or(DocumentError::NoRoot)?;

        let namespaces = match &self.nodes[root_id].kind {
            NodeKind::Element { declarations, .. } if format == Format::Xml => declarations
                .iter()
                .filter_map(|(prefix, uri)| prefix.clone().map(|p| (p, uri.clone())))
                .collect(),
            _ => BTreeMap::new(),
        };

        let document = Document {
            nodes: self.nodes,
            format,
            namespaces,
        };
        Ok(NodeRef {
            doc: Arc::new(document),
            id: root_id,
        })
    }
}

/// A handle to one node of a shared [`Document`]
///
/// Two handles are equal when they point at the same node of the same
/// document instance.
#[derive(Clone)]
pub struct NodeRef {
    doc: Arc<Document>,
    id: usize,
}

impl NodeRef {
    fn at(&self, id: usize) -> NodeRef {
        NodeRef {
            doc: Arc::clone(&self.doc),
            id,
        }
    }

    fn data(&self) -> &NodeData {
        self.doc.node(self.id)
    }

    /// The document this node belongs to
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Position of this node in document order
    pub fn position(&self) -> usize {
        self.id
    }

    /// Whether this node is an element
    pub fn is_element(&self) -> bool {
        matches!(self.data().kind, NodeKind::Element { .. })
    }

    /// The qualified name of an element
    pub fn name(&self) -> Option<&QName> {
        match &self.data().kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// The raw tag: Clark notation for namespaced elements
    pub fn tag(&self) -> String {
        self.name().map(QName::clark).unwrap_or_default()
    }

    /// The local part of the element name
    pub fn local_name(&self) -> &str {
        self.name().map(|n| n.local.as_str()).unwrap_or("")
    }

    /// The namespace URI of the element
    pub fn namespace(&self) -> Option<&str> {
        self.name().and_then(|n| n.namespace.as_deref())
    }

    /// All attributes of the element, in source order
    pub fn attributes(&self) -> &[Attribute] {
        match &self.data().kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Attribute value by Clark name (`name` or `{uri}name`)
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes()
            .iter()
            .find(|a| (a.name.namespace.is_none() && a.name.local == name) || a.name.clark() == name)
            .map(|a| a.value.as_str())
    }

    /// Namespace declarations made on this element
    pub(crate) fn declarations(&self) -> &[(Option<String>, String)] {
        match &self.data().kind {
            NodeKind::Element { declarations, .. } => declarations,
            _ => &[],
        }
    }

    /// The parent element; `None` for the document element
    pub fn parent(&self) -> Option<NodeRef> {
        let parent = self.data().parent?;
        match self.doc.node(parent).kind {
            NodeKind::Element { .. } => Some(self.at(parent)),
            _ => None,
        }
    }

    /// Child elements in document order
    pub fn children(&self) -> Vec<NodeRef> {
        self.data()
            .children
            .iter()
            .filter(|&&id| matches!(self.doc.node(id).kind, NodeKind::Element { .. }))
            .map(|&id| self.at(id))
            .collect()
    }

    /// Sibling elements including this one, in document order
    pub fn siblings(&self) -> Vec<NodeRef> {
        match self.data().parent {
            Some(parent) => self.at(parent).children(),
            None => vec![self.clone()],
        }
    }

    /// Whether the element has neither child elements nor text
    pub fn is_empty(&self) -> bool {
        self.data()
            .children
            .iter()
            .all(|&id| match &self.doc.node(id).kind {
                NodeKind::Element { .. } => false,
                NodeKind::Text(t) => t.is_empty(),
                _ => true,
            })
    }

    /// Text before the first child node, if any
    pub fn text(&self) -> Option<&str> {
        let first = *self.data().children.first()?;
        match &self.doc.node(first).kind {
            NodeKind::Text(t) => Some(t),
            _ => None,
        }
    }

    /// All descendant text nodes in document order
    pub fn itertext(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_text(self.id, &mut out);
        out
    }

    fn collect_text<'a>(&'a self, id: usize, out: &mut Vec<&'a str>) {
        for &child in &self.doc.node(id).children {
            match &self.doc.node(child).kind {
                NodeKind::Text(t) => out.push(t),
                NodeKind::Element { .. } => self.collect_text(child, out),
                _ => {}
            }
        }
    }

    /// Descendant text joined with single spaces
    pub fn flattened_text(&self) -> String {
        self.itertext().join(" ")
    }

    /// Whether `self` is `other` or one of its ancestors
    pub fn contains(&self, other: &NodeRef) -> bool {
        if !Arc::ptr_eq(&self.doc, &other.doc) {
            return false;
        }
        let mut current = Some(other.id);
        while let Some(id) = current {
            if id == self.id {
                return true;
            }
            current = self.doc.node(id).parent;
        }
        false
    }

    /// This element and all descendant elements in document order
    pub fn descendants_or_self(&self) -> Vec<NodeRef> {
        let mut out = Vec::new();
        let mut stack = vec![self.id];
        while let Some(id) = stack.pop() {
            let node = self.doc.node(id);
            if matches!(node.kind, NodeKind::Element { .. }) {
                out.push(self.at(id));
            }
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// The subtree serialized as markup
    pub fn serialize(&self) -> String {
        super::serialize::serialize(self)
    }

    pub(crate) fn kind(&self) -> &NodeKind {
        &self.data().kind
    }

    pub(crate) fn child_nodes(&self) -> Vec<NodeRef> {
        self.data().children.iter().map(|&id| self.at(id)).collect()
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.doc, &other.doc) && self.id == other.id
    }
}

impl Eq for NodeRef {}

impl Hash for NodeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.doc) as usize).hash(state);
        self.id.hash(state);
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            NodeKind::Element { name, .. } => write!(f, "<Element {} #{}>", name.clark(), self.id),
            _ => write!(f, "<Node #{}>", self.id),
        }
    }
}
