#![forbid(unsafe_code)]

//! Rules and the namespace they populate

use crate::document::NodeRef;
use crate::expr::Value;
use crate::script::Declaration;
use crate::selector::MatchExpr;
use std::collections::BTreeMap;

/// Name → value bindings of one run
pub type Namespace = BTreeMap<String, Value>;

/// Namespace key of the empty-list sentinel
pub const EMPTY_KEY: &str = "[]";
/// Namespace key of the run root
pub const ROOT_KEY: &str = "__";
/// Namespace key of the node being processed; also the discard name
pub const NODE_KEY: &str = "_";

/// One compiled rule of a program
///
/// A rule without a match expression runs its declarations once per run,
/// unbound to any node.
#[derive(Debug, Clone)]
pub struct Rule {
    pub match_expr: Option<MatchExpr>,
    pub declarations: Vec<Declaration>,
}

impl Rule {
    pub fn new(match_expr: Option<MatchExpr>, declarations: Vec<Declaration>) -> Self {
        Rule {
            match_expr,
            declarations,
        }
    }

    /// Whether the rule runs exactly once, with no node bound
    pub fn is_unconditional(&self) -> bool {
        self.match_expr.is_none()
    }
}

/// A fresh namespace for a run rooted at `root`
pub fn seed_namespace(root: &NodeRef) -> Namespace {
    let mut namespace = Namespace::new();
    namespace.insert(EMPTY_KEY.to_string(), Value::List(Vec::new()));
    namespace.insert(ROOT_KEY.to_string(), Value::Node(root.clone()));
    namespace
}

/// Remove the reserved bindings before a namespace is handed back
pub fn strip_reserved(namespace: &mut Namespace) {
    for key in [NODE_KEY, EMPTY_KEY, ROOT_KEY] {
        namespace.remove(key);
    }
}

/// The variable a `_` declaration on `node` binds: the element's local
/// name with `-` and other separators mapped to `_`
pub fn tag_identifier(node: &NodeRef) -> String {
    node.local_name()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
