#![forbid(unsafe_code)]

//! Runtime values of the expression language

use crate::document::NodeRef;
use crate::error::EvalError;
use crate::rules::{Abort, FlowControl};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Signature of natively implemented callables
pub type NativeFn = dyn Fn(Args<'_>) -> Result<Value, Abort> + Send + Sync;

/// A callable value: builtins, module members and bound helpers
#[derive(Clone)]
pub struct Function {
    name: String,
    call: Arc<NativeFn>,
}

impl Function {
    pub fn new(
        name: impl Into<String>,
        call: impl Fn(Args<'_>) -> Result<Value, Abort> + Send + Sync + 'static,
    ) -> Self {
        Function {
            name: name.into(),
            call: Arc::new(call),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: Args<'_>) -> Result<Value, Abort> {
        (self.call)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<built-in function {}>", self.name)
    }
}

/// A named bundle of members, reached with attribute syntax (`re.sub`)
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    members: BTreeMap<String, Value>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            members: BTreeMap::new(),
        }
    }

    /// Builder-style member registration
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.members.insert(name.into(), value);
        self
    }

    /// Register a native function as a member
    pub fn function(
        self,
        name: &str,
        call: impl Fn(Args<'_>) -> Result<Value, Abort> + Send + Sync + 'static,
    ) -> Self {
        let qualified = format!("{}.{}", self.name, name);
        self.with(name, Value::Function(Function::new(qualified, call)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn member(&self, name: &str) -> Option<&Value> {
        self.members.get(name)
    }

    pub fn members(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.members.iter()
    }
}

/// Call arguments
///
/// Positional arguments borrow the caller's values where it can lend them.
#[derive(Debug, Clone, Default)]
pub struct Args<'v> {
    pub positional: Vec<Cow<'v, Value>>,
    pub keywords: Vec<(String, Value)>,
}

impl<'v> Args<'v> {
    pub fn new(positional: Vec<Value>) -> Self {
        Args {
            positional: positional.into_iter().map(Cow::Owned).collect(),
            keywords: Vec::new(),
        }
    }

    pub fn with_keyword(mut self, name: impl Into<String>, value: Value) -> Self {
        self.keywords.push((name.into(), value));
        self
    }

    /// Positional argument `index`
    pub fn at(&self, index: usize) -> Option<&Value> {
        self.positional.get(index).map(|v| v.as_ref())
    }

    /// Positional arguments as owned values
    pub fn to_vec(&self) -> Vec<Value> {
        self.positional.iter().map(|v| v.as_ref().clone()).collect()
    }

    /// Argument by position, falling back to keyword `name`
    pub fn get(&self, index: usize, name: &str) -> Option<&Value> {
        self.at(index).or_else(|| self.keyword(name))
    }

    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keywords.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Required argument by position or keyword
    pub fn require(&self, func: &str, index: usize, name: &str) -> Result<&Value, EvalError> {
        self.get(index, name).ok_or_else(|| {
            EvalError::Type(format!(
                "{}() missing required argument '{}' (pos {})",
                func,
                name,
                index + 1
            ))
        })
    }

    /// Check the total argument count against `min..=max`
    pub fn check(&self, func: &str, min: usize, max: usize) -> Result<(), EvalError> {
        let count = self.positional.len() + self.keywords.len();
        if count < min || count > max {
            let expected = if min == max {
                format!("exactly {}", min)
            } else {
                format!("from {} to {}", min, max)
            };
            return Err(EvalError::Type(format!(
                "{}() takes {} arguments ({} given)",
                func, expected, count
            )));
        }
        Ok(())
    }
}

/// A runtime value
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// Insertion-ordered mapping; keys are hashable scalars
    Dict(Vec<(Value, Value)>),
    /// A document element
    Node(NodeRef),
    Signal(FlowControl),
    Module(Arc<Module>),
    Function(Function),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<NodeRef> for Value {
    fn from(node: NodeRef) -> Self {
        Value::Node(node)
    }
}

impl From<Module> for Value {
    fn from(module: Module) -> Self {
        Value::Module(Arc::new(module))
    }
}

/// A number after bool promotion
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(f) => f,
        }
    }
}

impl Value {
    /// Python type name, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Node(_) => "Element",
            Value::Signal(_) => "FlowControl",
            Value::Module(_) => "module",
            Value::Function(_) => "builtin_function_or_method",
        }
    }

    pub(crate) fn as_num(&self) -> Option<Num> {
        match self {
            Value::Bool(b) => Some(Num::Int(i64::from(*b))),
            Value::Int(n) => Some(Num::Int(*n)),
            Value::Float(f) => Some(Num::Float(*f)),
            _ => None,
        }
    }

    /// Integer value of ints and bools
    pub fn as_int(&self) -> Option<i64> {
        match self.as_num()? {
            Num::Int(n) => Some(n),
            Num::Float(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Python truthiness
    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Dict(pairs) => !pairs.is_empty(),
            Value::Node(node) => !node.children().is_empty(),
            Value::Signal(_) | Value::Module(_) | Value::Function(_) => true,
        }
    }

    /// The copy taken when a declaration aliases an existing variable
    ///
    /// Mirrors a full slice: an element copies to the list of its child
    /// elements, strings and lists to an independent clone.
    ///
    /// # Errors
    ///
    /// `TypeError` for values that cannot be sliced.
    pub fn shallow_copy(&self) -> Result<Value, EvalError> {
        match self {
            Value::Node(node) => Ok(Value::List(node.children().into_iter().map(Value::Node).collect())),
            Value::Str(_) | Value::List(_) => Ok(self.clone()),
            Value::Dict(_) => Err(EvalError::Type("unhashable type: 'slice'".to_string())),
            other => Err(EvalError::Type(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            ))),
        }
    }

    /// `len(value)`
    pub fn len(&self) -> Result<usize, EvalError> {
        match self {
            Value::Str(s) => Ok(s.chars().count()),
            Value::List(items) => Ok(items.len()),
            Value::Dict(pairs) => Ok(pairs.len()),
            Value::Node(node) => Ok(node.children().len()),
            other => Err(EvalError::Type(format!(
                "object of type '{}' has no len()",
                other.type_name()
            ))),
        }
    }

    /// Items produced by iterating over the value
    pub fn iterate(&self) -> Result<Vec<Value>, EvalError> {
        match self {
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            Value::List(items) => Ok(items.clone()),
            Value::Dict(pairs) => Ok(pairs.iter().map(|(k, _)| k.clone()).collect()),
            Value::Node(node) => Ok(node.children().into_iter().map(Value::Node).collect()),
            other => Err(EvalError::Type(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Whether the value may be used as a dictionary key
    pub fn is_hashable(&self) -> bool {
        matches!(
            self,
            Value::None
                | Value::Bool(_)
                | Value::Int(_)
                | Value::Float(_)
                | Value::Str(_)
                | Value::Node(_)
                | Value::Signal(_)
        )
    }

    /// Python `==`
    pub fn equals(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.as_num(), other.as_num()) {
            return match (a, b) {
                (Num::Int(x), Num::Int(y)) => x == y,
                _ => a.as_f64() == b.as_f64(),
            };
        }
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| dict_get(b, k).is_some_and(|other| other.equals(v)))
            }
            (Value::Node(a), Value::Node(b)) => a == b,
            (Value::Signal(a), Value::Signal(b)) => a == b,
            (Value::Module(a), Value::Module(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(&a.call, &b.call),
            _ => false,
        }
    }

    /// Python `is`, for the values where identity is observable
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Signal(a), Value::Signal(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => a == b,
            (Value::Module(a), Value::Module(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Python ordering (`<` and friends, `sorted`, `min`, `max`)
    pub fn compare(&self, other: &Value) -> Result<Ordering, EvalError> {
        if let (Some(a), Some(b)) = (self.as_num(), other.as_num()) {
            return match (a, b) {
                (Num::Int(x), Num::Int(y)) => Ok(x.cmp(&y)),
                _ => a.as_f64().partial_cmp(&b.as_f64()).ok_or_else(|| {
                    EvalError::Value("cannot order NaN".to_string())
                }),
            };
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    if !x.equals(y) {
                        return x.compare(y);
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }
            _ => Err(EvalError::Type(format!(
                "'<' not supported between instances of '{}' and '{}'",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// Python `str()`
    pub fn to_str(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.repr(),
        }
    }

    /// Python `repr()`: the literal form that evaluates back to the value
    pub fn repr(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => quote_literal(s),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::repr).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Dict(pairs) => {
                let inner: Vec<String> = pairs
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.repr(), v.repr()))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
            Value::Node(node) => format!("<Element {}>", node.tag()),
            Value::Signal(signal) => signal.to_string(),
            Value::Module(module) => format!("<module '{}'>", module.name()),
            Value::Function(function) => format!("{:?}", function),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.equals(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

/// Look `key` up in dict pairs
pub fn dict_get<'a>(pairs: &'a [(Value, Value)], key: &Value) -> Option<&'a Value> {
    pairs.iter().find(|(k, _)| k.equals(key)).map(|(_, v)| v)
}

/// Insert or overwrite `key` in dict pairs
pub fn dict_insert(pairs: &mut Vec<(Value, Value)>, key: Value, value: Value) -> Result<(), EvalError> {
    if !key.is_hashable() {
        return Err(EvalError::Type(format!(
            "unhashable type: '{}'",
            key.type_name()
        )));
    }
    match pairs.iter_mut().find(|(k, _)| k.equals(&key)) {
        Some((_, slot)) => *slot = value,
        None => pairs.push((key, value)),
    }
    Ok(())
}

/// Quote `s` as a string literal of the expression language
///
/// Single quotes are preferred; double quotes are used when the text holds a
/// single quote but no double quote.
pub fn quote_literal(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Format a float the way Python's `repr` does
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let magnitude = f.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let formatted = format!("{:e}", f);
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) => {
                let (sign, digits) = match exponent.strip_prefix('-') {
                    Some(d) => ('-', d),
                    None => ('+', exponent),
                };
                format!("{}e{}{:0>2}", mantissa, sign, digits)
            }
            None => formatted,
        };
    }
    if f.fract() == 0.0 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::None => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Dict(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for (key, value) in pairs {
                    map.serialize_entry(&key.to_str(), value)?;
                }
                map.end()
            }
            Value::Node(node) => serializer.serialize_str(&node.serialize()),
            other => serializer.serialize_str(&other.repr()),
        }
    }
}

/// Convert parsed JSON into a value
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Dict(
                map.into_iter()
                    .map(|(k, v)| (Value::Str(k), Value::from(v)))
                    .collect(),
            ),
        }
    }
}
