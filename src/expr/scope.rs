#![forbid(unsafe_code)]

//! The process-lifetime global scope of an engine

use super::Value;
use super::builtins;
use std::collections::BTreeMap;

/// Global bindings: builtins, the engine module and imported modules
///
/// Constructed once per engine and only extended while the program is
/// loaded; runs read it without mutation.
#[derive(Debug, Clone)]
pub struct GlobalScope {
    bindings: BTreeMap<String, Value>,
}

impl Default for GlobalScope {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalScope {
    /// A scope holding the builtin functions
    pub fn new() -> Self {
        GlobalScope {
            bindings: builtins::all()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}
