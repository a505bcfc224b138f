#![forbid(unsafe_code)]

//! Tree-walking evaluator

use super::ast::{Argument, BoolOp, CmpOp, Comprehension, Expr, Target, UnaryOp};
use super::builtins;
use super::ops;
use super::scope::GlobalScope;
use super::value::{Args, Value, dict_get, dict_insert};
use crate::error::EvalError;
use crate::rules::{Abort, pseudo_attribute};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Evaluates expressions against a global scope and a run's namespace
///
/// Name lookup order: comprehension frames (innermost first), the local
/// namespace, the global scope, and finally the pseudo-attributes (`_TEXT`,
/// `_TAG`, `_XML`) of the element bound to `_`.
pub struct Interpreter<'a> {
    globals: &'a GlobalScope,
    locals: &'a BTreeMap<String, Value>,
    frames: Vec<BTreeMap<String, Value>>,
}

impl<'a> Interpreter<'a> {
    pub fn new(globals: &'a GlobalScope, locals: &'a BTreeMap<String, Value>) -> Self {
        Interpreter {
            globals,
            locals,
            frames: Vec::new(),
        }
    }

    /// Namespace and global bindings are lent out, frame bindings copied
    fn lookup(&self, name: &str) -> Result<Cow<'a, Value>, EvalError> {
        for frame in self.frames.iter().rev() {
            if let Some(value) = frame.get(name) {
                return Ok(Cow::Owned(value.clone()));
            }
        }
        let locals: &'a BTreeMap<String, Value> = self.locals;
        let globals: &'a GlobalScope = self.globals;
        if let Some(value) = locals.get(name).or_else(|| globals.get(name)) {
            return Ok(Cow::Borrowed(value));
        }
        if let Some(Value::Node(node)) = locals.get("_")
            && let Some(text) = pseudo_attribute(node, name)
        {
            return Ok(Cow::Owned(Value::Str(text)));
        }
        Err(EvalError::UnboundName(name.to_string()))
    }

    /// Evaluate `expr`
    ///
    /// # Errors
    ///
    /// `Abort::Error` for evaluation failures, `Abort::Signal` when a
    /// called function raises a flow-control signal.
    pub fn eval(&mut self, expr: &Expr) -> Result<Value, Abort> {
        Ok(self.eval_ref(expr)?.into_owned())
    }

    /// Evaluate `expr` for reading; bare names borrow their binding
    fn eval_ref(&mut self, expr: &Expr) -> Result<Cow<'a, Value>, Abort> {
        match expr {
            Expr::Name(name) => Ok(self.lookup(name)?),
            other => self.eval_owned(other).map(Cow::Owned),
        }
    }

    fn eval_owned(&mut self, expr: &Expr) -> Result<Value, Abort> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Name(name) => Ok(self.lookup(name)?.into_owned()),
            Expr::List(items) | Expr::Tuple(items) => Ok(Value::List(
                items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<_, _>>()?,
            )),
            Expr::Dict(entries) => {
                let mut pairs = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = self.eval(key)?;
                    let value = self.eval(value)?;
                    dict_insert(&mut pairs, key, value)?;
                }
                Ok(Value::Dict(pairs))
            }
            Expr::Attribute(object, name) => {
                let object = self.eval_ref(object)?;
                Ok(builtins::attribute(&object, name)?)
            }
            Expr::Call { func, args } => self.call(func, args),
            Expr::Index(value, index) => {
                let value = self.eval_ref(value)?;
                let index = self.eval_ref(index)?;
                Ok(subscript(&value, &index)?)
            }
            Expr::Slice {
                value,
                lower,
                upper,
                step,
            } => {
                let value = self.eval_ref(value)?;
                let lower = self.bound(lower.as_deref())?;
                let upper = self.bound(upper.as_deref())?;
                let step = self.bound(step.as_deref())?;
                Ok(slice(&value, lower, upper, step)?)
            }
            Expr::Unary(op, operand) => {
                let operand = self.eval_ref(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!operand.truthy()),
                    UnaryOp::Neg => ops::negate(&operand)?,
                    UnaryOp::Pos => ops::positive(&operand)?,
                })
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval_ref(left)?;
                let right = self.eval_ref(right)?;
                Ok(ops::binary(*op, &left, &right)?)
            }
            Expr::BoolOp(op, left, right) => {
                let left = self.eval_ref(left)?;
                match (op, left.truthy()) {
                    (BoolOp::And, false) | (BoolOp::Or, true) => Ok(left.into_owned()),
                    _ => self.eval(right),
                }
            }
            Expr::Compare(first, links) => {
                let mut left = self.eval_ref(first)?;
                for (op, operand) in links {
                    let right = self.eval_ref(operand)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::Conditional { test, body, orelse } => {
                if self.eval_ref(test)?.truthy() {
                    self.eval(body)
                } else {
                    self.eval(orelse)
                }
            }
            Expr::ListComp { element, clauses } => {
                self.frames.push(BTreeMap::new());
                let mut out = Vec::new();
                let result = self.comprehension(element, clauses, &mut out);
                self.frames.pop();
                result.map(|()| Value::List(out))
            }
        }
    }

    fn bound(&mut self, expr: Option<&Expr>) -> Result<Option<i64>, Abort> {
        let Some(expr) = expr else {
            return Ok(None);
        };
        match self.eval_ref(expr)?.as_ref() {
            Value::None => Ok(None),
            value => value.as_int().map(Some).ok_or_else(|| {
                Abort::Error(EvalError::Type(
                    "slice indices must be integers or None".to_string(),
                ))
            }),
        }
    }

    fn arguments(&mut self, args: &[Argument]) -> Result<Args<'a>, Abort> {
        let mut out = Args::default();
        for arg in args {
            match arg {
                Argument::Positional(expr) => out.positional.push(self.eval_ref(expr)?),
                Argument::Keyword(name, expr) => {
                    let value = self.eval(expr)?;
                    out.keywords.push((name.clone(), value));
                }
            }
        }
        Ok(out)
    }

    fn call(&mut self, func: &Expr, args: &[Argument]) -> Result<Value, Abort> {
        if let Expr::Attribute(object, name) = func {
            let object = self.eval_ref(object)?;
            if !matches!(*object, Value::Module(_)) && builtins::has_method(&object, name) {
                let args = self.arguments(args)?;
                return Ok(builtins::call_method(&object, name, args)?);
            }
            let callee = builtins::attribute(&object, name)?;
            let args = self.arguments(args)?;
            return call_value(&callee, args);
        }
        let callee = self.eval_ref(func)?;
        let args = self.arguments(args)?;
        call_value(&callee, args)
    }

    fn bind(&mut self, target: &Target, value: Value) -> Result<(), Abort> {
        match target {
            Target::Name(name) => {
                if let Some(frame) = self.frames.last_mut() {
                    frame.insert(name.clone(), value);
                }
                Ok(())
            }
            Target::Tuple(targets) => {
                let items = value.iterate()?;
                if items.len() != targets.len() {
                    let message = if items.len() < targets.len() {
                        format!(
                            "not enough values to unpack (expected {}, got {})",
                            targets.len(),
                            items.len()
                        )
                    } else {
                        format!("too many values to unpack (expected {})", targets.len())
                    };
                    return Err(Abort::Error(EvalError::Value(message)));
                }
                for (target, item) in targets.iter().zip(items) {
                    self.bind(target, item)?;
                }
                Ok(())
            }
        }
    }

    fn comprehension(
        &mut self,
        element: &Expr,
        clauses: &[Comprehension],
        out: &mut Vec<Value>,
    ) -> Result<(), Abort> {
        let Some((clause, rest)) = clauses.split_first() else {
            out.push(self.eval(element)?);
            return Ok(());
        };
        let items = self.eval_ref(&clause.iter)?.iterate()?;
        'items: for item in items {
            self.bind(&clause.target, item)?;
            for condition in &clause.conditions {
                if !self.eval(condition)?.truthy() {
                    continue 'items;
                }
            }
            self.comprehension(element, rest, out)?;
        }
        Ok(())
    }
}

fn call_value(callee: &Value, args: Args<'_>) -> Result<Value, Abort> {
    match callee {
        Value::Function(function) => function.call(args),
        other => Err(Abort::Error(EvalError::Type(format!(
            "'{}' object is not callable",
            other.type_name()
        )))),
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
    use std::cmp::Ordering::{Greater, Less};
    Ok(match op {
        CmpOp::Eq => left.equals(right),
        CmpOp::NotEq => !left.equals(right),
        CmpOp::Lt => left.compare(right)? == Less,
        CmpOp::LtE => left.compare(right)? != Greater,
        CmpOp::Gt => left.compare(right)? == Greater,
        CmpOp::GtE => left.compare(right)? != Less,
        CmpOp::In => ops::contains(right, left)?,
        CmpOp::NotIn => !ops::contains(right, left)?,
        CmpOp::Is => left.identical(right),
        CmpOp::IsNot => !left.identical(right),
    })
}

/// Resolve a possibly negative index against `len`
fn normalize_index(index: i64, len: usize, kind: &str) -> Result<usize, EvalError> {
    let len = len as i64;
    let resolved = if index < 0 { index + len } else { index };
    if (0..len).contains(&resolved) {
        Ok(resolved as usize)
    } else {
        Err(EvalError::Index(format!("{} index out of range", kind)))
    }
}

fn integer_index(value: &Value, index: &Value) -> Result<i64, EvalError> {
    index.as_int().ok_or_else(|| {
        EvalError::Type(format!(
            "{} indices must be integers or slices, not {}",
            value.type_name(),
            index.type_name()
        ))
    })
}

/// `value[index]`
pub fn subscript(value: &Value, index: &Value) -> Result<Value, EvalError> {
    match value {
        Value::List(items) => {
            let i = normalize_index(integer_index(value, index)?, items.len(), "list")?;
            Ok(items[i].clone())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = normalize_index(integer_index(value, index)?, chars.len(), "string")?;
            Ok(Value::Str(chars[i].to_string()))
        }
        Value::Dict(pairs) => dict_get(pairs, index)
            .cloned()
            .ok_or_else(|| EvalError::Key(index.repr())),
        Value::Node(node) => {
            let children = node.children();
            let i = normalize_index(integer_index(value, index)?, children.len(), "child")?;
            Ok(Value::Node(children[i].clone()))
        }
        other => Err(EvalError::Type(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// Positions selected by a slice over a sequence of `len` items
fn slice_positions(
    len: usize,
    lower: Option<i64>,
    upper: Option<i64>,
    step: Option<i64>,
) -> Result<Vec<usize>, EvalError> {
    let len = len as i64;
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(EvalError::Value("slice step cannot be zero".to_string()));
    }
    let mut positions = Vec::new();
    if step > 0 {
        let clamp = |x: i64| {
            if x < 0 { (x + len).max(0) } else { x.min(len) }
        };
        let start = lower.map_or(0, clamp);
        let stop = upper.map_or(len, clamp);
        let mut i = start;
        while i < stop {
            positions.push(i as usize);
            i += step;
        }
    } else {
        let clamp = |x: i64| {
            if x < 0 { (x + len).max(-1) } else { x.min(len - 1) }
        };
        let start = lower.map_or(len - 1, clamp);
        let stop = upper.map_or(-1, clamp);
        let mut i = start;
        while i > stop {
            positions.push(i as usize);
            i += step;
        }
    }
    Ok(positions)
}

/// `value[lower:upper:step]`
pub fn slice(
    value: &Value,
    lower: Option<i64>,
    upper: Option<i64>,
    step: Option<i64>,
) -> Result<Value, EvalError> {
    match value {
        Value::List(items) => Ok(Value::List(
            slice_positions(items.len(), lower, upper, step)?
                .into_iter()
                .map(|i| items[i].clone())
                .collect(),
        )),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(
                slice_positions(chars.len(), lower, upper, step)?
                    .into_iter()
                    .map(|i| chars[i])
                    .collect(),
            ))
        }
        Value::Node(node) => {
            let children = node.children();
            Ok(Value::List(
                slice_positions(children.len(), lower, upper, step)?
                    .into_iter()
                    .map(|i| Value::Node(children[i].clone()))
                    .collect(),
            ))
        }
        other => Err(EvalError::Type(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}
