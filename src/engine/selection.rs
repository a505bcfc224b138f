#![forbid(unsafe_code)]

//! Per-element runs of a program

use crate::document::NodeRef;
use crate::engine::executor::Spork;
use crate::error::SporkError;
use crate::rules::{Abort, FlowControl, Namespace};
use std::vec::IntoIter;

/// Iterator over `(element, namespace)` pairs, one run per selected element
///
/// `Element` drops the current pair, `Program` and `Default` end the
/// sequence. An evaluation error is yielded once and ends the sequence.
pub struct Selection<'a> {
    spork: &'a Spork,
    matches: IntoIter<NodeRef>,
    done: bool,
}

impl<'a> Selection<'a> {
    pub(crate) fn new(spork: &'a Spork, matches: Vec<NodeRef>) -> Self {
        Selection {
            spork,
            matches: matches.into_iter(),
            done: false,
        }
    }
}

impl Iterator for Selection<'_> {
    type Item = Result<(NodeRef, Namespace), SporkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        for node in self.matches.by_ref() {
            match self.spork.run_element(&node) {
                Ok(namespace) => return Some(Ok((node, namespace))),
                Err(Abort::Signal(FlowControl::Element)) => {
                    log::debug!("element {} skipped", node.tag());
                }
                Err(Abort::Signal(signal)) => {
                    log::debug!("selection stopped by {}", signal);
                    break;
                }
                Err(Abort::Error(err)) => {
                    self.done = true;
                    return Some(Err(err.into()));
                }
            }
        }
        self.done = true;
        None
    }
}
