#![forbid(unsafe_code)]

//! Compiled rules, attribute lookup and flow-control signals

mod attributes;
mod flow;
mod rule;

pub use attributes::{AttributeMapping, pseudo_attribute};
pub use flow::{Abort, FlowControl, engine_module};
pub use rule::{
    EMPTY_KEY, NODE_KEY, Namespace, ROOT_KEY, Rule, seed_namespace, strip_reserved,
    tag_identifier,
};
