#![forbid(unsafe_code)]

//! Builtin functions and methods of the expression language

use super::ops;
use super::value::{Args, Function, Value, dict_get, dict_insert};
use crate::error::EvalError;
use crate::rules::Abort;
use crate::selector::MatchExpr;
use std::cmp::Ordering;
use std::io::Write;

type Builtin = fn(Args<'_>) -> Result<Value, EvalError>;

const BUILTINS: &[(&str, Builtin)] = &[
    ("abs", builtin_abs),
    ("all", builtin_all),
    ("any", builtin_any),
    ("bool", builtin_bool),
    ("dict", builtin_dict),
    ("enumerate", builtin_enumerate),
    ("float", builtin_float),
    ("int", builtin_int),
    ("len", builtin_len),
    ("list", builtin_list),
    ("max", builtin_max),
    ("min", builtin_min),
    ("print", builtin_print),
    ("range", builtin_range),
    ("repr", builtin_repr),
    ("reversed", builtin_reversed),
    ("round", builtin_round),
    ("set", builtin_set),
    ("sorted", builtin_sorted),
    ("str", builtin_str),
    ("sum", builtin_sum),
    ("tuple", builtin_list),
    ("zip", builtin_zip),
];

/// Largest list `range()` will build
const RANGE_LIMIT: i64 = 10_000_000;

/// All builtin functions as values
pub fn all() -> impl Iterator<Item = (&'static str, Value)> {
    BUILTINS.iter().map(|&(name, f)| (name, Value::Function(wrap(name, f))))
}

fn wrap(name: &str, f: Builtin) -> Function {
    Function::new(name, move |args: Args<'_>| f(args).map_err(Abort::from))
}

fn type_error(message: impl Into<String>) -> EvalError {
    EvalError::Type(message.into())
}

fn str_arg<'a>(args: &'a Args, func: &str, index: usize, name: &str) -> Result<&'a str, EvalError> {
    let value = args.require(func, index, name)?;
    value.as_str().ok_or_else(|| {
        type_error(format!(
            "{}() argument '{}' must be str, not {}",
            func,
            name,
            value.type_name()
        ))
    })
}

fn int_arg(args: &Args, func: &str, index: usize, name: &str) -> Result<Option<i64>, EvalError> {
    match args.get(index, name) {
        None | Some(Value::None) => Ok(None),
        Some(value) => value.as_int().map(Some).ok_or_else(|| {
            type_error(format!(
                "{}() argument '{}' must be int, not {}",
                func,
                name,
                value.type_name()
            ))
        }),
    }
}

fn builtin_len(args: Args) -> Result<Value, EvalError> {
    args.check("len", 1, 1)?;
    let n = args.positional[0].len()?;
    Ok(Value::Int(n as i64))
}

fn builtin_str(args: Args) -> Result<Value, EvalError> {
    args.check("str", 0, 1)?;
    Ok(Value::Str(
        args.at(0).map(Value::to_str).unwrap_or_default(),
    ))
}

fn builtin_repr(args: Args) -> Result<Value, EvalError> {
    args.check("repr", 1, 1)?;
    Ok(Value::Str(args.positional[0].repr()))
}

fn builtin_bool(args: Args) -> Result<Value, EvalError> {
    args.check("bool", 0, 1)?;
    Ok(Value::Bool(args.at(0).is_some_and(Value::truthy)))
}

fn builtin_int(args: Args) -> Result<Value, EvalError> {
    args.check("int", 0, 2)?;
    let Some(value) = args.get(0, "x") else {
        return Ok(Value::Int(0));
    };
    let base = int_arg(&args, "int", 1, "base")?;
    match (value, base) {
        (Value::Str(s), base) => {
            let text = s.trim().replace('_', "");
            let radix = base.unwrap_or(10);
            let (negative, digits) = match text.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, text.strip_prefix('+').unwrap_or(&text)),
            };
            let digits = match radix {
                16 => digits.trim_start_matches("0x").trim_start_matches("0X"),
                8 => digits.trim_start_matches("0o").trim_start_matches("0O"),
                2 => digits.trim_start_matches("0b").trim_start_matches("0B"),
                _ => digits,
            };
            let radix = u32::try_from(radix)
                .ok()
                .filter(|r| (2..=36).contains(r))
                .ok_or_else(|| EvalError::Value("int() base must be >= 2 and <= 36".to_string()))?;
            i64::from_str_radix(digits, radix)
                .map(|n| Value::Int(if negative { -n } else { n }))
                .map_err(|_| {
                    EvalError::Value(format!(
                        "invalid literal for int() with base {}: {}",
                        radix,
                        super::value::quote_literal(s)
                    ))
                })
        }
        (_, Some(_)) => Err(type_error("int() can't convert non-string with explicit base")),
        (other, None) => match other.as_num() {
            Some(super::value::Num::Int(n)) => Ok(Value::Int(n)),
            Some(super::value::Num::Float(f)) => {
                if f.is_finite() {
                    Ok(Value::Int(f.trunc() as i64))
                } else {
                    Err(EvalError::Value(format!(
                        "cannot convert float {} to integer",
                        super::value::format_float(f)
                    )))
                }
            }
            None => Err(type_error(format!(
                "int() argument must be a string or a number, not '{}'",
                other.type_name()
            ))),
        },
    }
}

fn builtin_float(args: Args) -> Result<Value, EvalError> {
    args.check("float", 0, 1)?;
    let Some(value) = args.at(0) else {
        return Ok(Value::Float(0.0));
    };
    match value {
        Value::Str(s) => {
            let text = s.trim().to_ascii_lowercase();
            let parsed = match text.as_str() {
                "inf" | "+inf" | "infinity" => Some(f64::INFINITY),
                "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
                "nan" | "+nan" | "-nan" => Some(f64::NAN),
                _ => text.parse::<f64>().ok(),
            };
            parsed.map(Value::Float).ok_or_else(|| {
                EvalError::Value(format!(
                    "could not convert string to float: {}",
                    super::value::quote_literal(s)
                ))
            })
        }
        other => other
            .as_num()
            .map(|n| Value::Float(n.as_f64()))
            .ok_or_else(|| {
                type_error(format!(
                    "float() argument must be a string or a number, not '{}'",
                    other.type_name()
                ))
            }),
    }
}

fn builtin_list(args: Args) -> Result<Value, EvalError> {
    args.check("list", 0, 1)?;
    match args.at(0) {
        Some(value) => Ok(Value::List(value.iterate()?)),
        None => Ok(Value::List(Vec::new())),
    }
}

fn builtin_dict(args: Args) -> Result<Value, EvalError> {
    let mut pairs = Vec::new();
    if let Some(source) = args.at(0) {
        match source {
            Value::Dict(existing) => pairs = existing.clone(),
            other => {
                for item in other.iterate()? {
                    let pair = item.iterate()?;
                    if pair.len() != 2 {
                        return Err(EvalError::Value(format!(
                            "dictionary update sequence element has length {}; 2 is required",
                            pair.len()
                        )));
                    }
                    let mut pair = pair.into_iter();
                    if let (Some(k), Some(v)) = (pair.next(), pair.next()) {
                        dict_insert(&mut pairs, k, v)?;
                    }
                }
            }
        }
    }
    for (key, value) in args.keywords {
        dict_insert(&mut pairs, Value::Str(key), value)?;
    }
    Ok(Value::Dict(pairs))
}

fn builtin_set(args: Args) -> Result<Value, EvalError> {
    args.check("set", 0, 1)?;
    let mut unique: Vec<Value> = Vec::new();
    if let Some(value) = args.at(0) {
        for item in value.iterate()? {
            if !item.is_hashable() {
                return Err(type_error(format!("unhashable type: '{}'", item.type_name())));
            }
            if !unique.iter().any(|u| u.equals(&item)) {
                unique.push(item);
            }
        }
    }
    Ok(Value::List(unique))
}

/// Sort with Python comparisons, surfacing the first incomparable pair
fn sort_values(items: &mut [Value]) -> Result<(), EvalError> {
    let mut failure = None;
    items.sort_by(|a, b| match a.compare(b) {
        Ok(ordering) => ordering,
        Err(err) => {
            failure.get_or_insert(err);
            Ordering::Equal
        }
    });
    failure.map_or(Ok(()), Err)
}

fn builtin_sorted(args: Args) -> Result<Value, EvalError> {
    let iterable = args.require("sorted", 0, "iterable")?;
    let mut items = iterable.iterate()?;
    sort_values(&mut items)?;
    if args.keyword("reverse").is_some_and(Value::truthy) {
        items.reverse();
    }
    Ok(Value::List(items))
}

fn builtin_reversed(args: Args) -> Result<Value, EvalError> {
    args.check("reversed", 1, 1)?;
    let mut items = args.positional[0].iterate()?;
    items.reverse();
    Ok(Value::List(items))
}

fn builtin_sum(args: Args) -> Result<Value, EvalError> {
    args.check("sum", 1, 2)?;
    let mut total = args.get(1, "start").cloned().unwrap_or(Value::Int(0));
    if total.as_str().is_some() {
        return Err(type_error("sum() can't sum strings [use ''.join(seq) instead]"));
    }
    for item in args.positional[0].iterate()? {
        total = ops::binary(super::ast::BinaryOp::Add, &total, &item)?;
    }
    Ok(total)
}

fn extreme(args: Args, func: &str, wanted: Ordering) -> Result<Value, EvalError> {
    let items = if args.positional.len() == 1 {
        args.positional[0].iterate()?
    } else {
        args.to_vec()
    };
    let mut best: Option<Value> = None;
    for item in items {
        best = match best {
            Some(current) if item.compare(&current)? != wanted => Some(current),
            _ => Some(item),
        };
    }
    match (best, args.keyword("default")) {
        (Some(value), _) => Ok(value),
        (None, Some(default)) => Ok(default.clone()),
        (None, None) => Err(EvalError::Value(format!("{}() arg is an empty sequence", func))),
    }
}

fn builtin_min(args: Args) -> Result<Value, EvalError> {
    extreme(args, "min", Ordering::Less)
}

fn builtin_max(args: Args) -> Result<Value, EvalError> {
    extreme(args, "max", Ordering::Greater)
}

fn builtin_abs(args: Args) -> Result<Value, EvalError> {
    args.check("abs", 1, 1)?;
    match args.positional[0].as_num() {
        Some(super::value::Num::Int(n)) => n
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| EvalError::Value("integer overflow".to_string())),
        Some(super::value::Num::Float(f)) => Ok(Value::Float(f.abs())),
        None => Err(type_error(format!(
            "bad operand type for abs(): '{}'",
            args.positional[0].type_name()
        ))),
    }
}

fn builtin_round(args: Args) -> Result<Value, EvalError> {
    args.check("round", 1, 2)?;
    let number = args.positional[0].as_num().ok_or_else(|| {
        type_error(format!(
            "type {} doesn't define __round__ method",
            args.positional[0].type_name()
        ))
    })?;
    let digits = int_arg(&args, "round", 1, "ndigits")?;
    match (number, digits) {
        (super::value::Num::Int(n), _) => Ok(Value::Int(n)),
        (super::value::Num::Float(f), None) => Ok(Value::Int(f.round_ties_even() as i64)),
        (super::value::Num::Float(f), Some(d)) => {
            let scale = 10f64.powi(i32::try_from(d).unwrap_or(0));
            Ok(Value::Float((f * scale).round_ties_even() / scale))
        }
    }
}

fn builtin_range(args: Args) -> Result<Value, EvalError> {
    args.check("range", 1, 3)?;
    let ints: Vec<i64> = args
        .positional
        .iter()
        .map(|v| {
            v.as_int().ok_or_else(|| {
                type_error(format!("'{}' object cannot be interpreted as an integer", v.type_name()))
            })
        })
        .collect::<Result<_, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(type_error("range expected integer arguments")),
    };
    if step == 0 {
        return Err(EvalError::Value("range() arg 3 must not be zero".to_string()));
    }
    let count = if step > 0 {
        (stop - start).max(0).saturating_add(step - 1) / step
    } else {
        (start - stop).max(0).saturating_add(-step - 1) / -step
    };
    if count > RANGE_LIMIT {
        return Err(EvalError::Value(format!("range() of {} items is too large", count)));
    }
    Ok(Value::List(
        (0..count).map(|i| Value::Int(start + i * step)).collect(),
    ))
}

fn builtin_enumerate(args: Args) -> Result<Value, EvalError> {
    args.check("enumerate", 1, 2)?;
    let start = int_arg(&args, "enumerate", 1, "start")?.unwrap_or(0);
    let items = args.positional[0].iterate()?;
    Ok(Value::List(
        items
            .into_iter()
            .zip(start..)
            .map(|(item, i)| Value::List(vec![Value::Int(i), item]))
            .collect(),
    ))
}

fn builtin_zip(args: Args) -> Result<Value, EvalError> {
    let columns: Vec<Vec<Value>> = args
        .positional
        .iter()
        .map(|v| v.iterate())
        .collect::<Result<_, _>>()?;
    let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
    Ok(Value::List(
        (0..rows)
            .map(|i| Value::List(columns.iter().map(|c| c[i].clone()).collect()))
            .collect(),
    ))
}

fn builtin_any(args: Args) -> Result<Value, EvalError> {
    args.check("any", 1, 1)?;
    Ok(Value::Bool(args.positional[0].iterate()?.iter().any(Value::truthy)))
}

fn builtin_all(args: Args) -> Result<Value, EvalError> {
    args.check("all", 1, 1)?;
    Ok(Value::Bool(args.positional[0].iterate()?.iter().all(Value::truthy)))
}

fn builtin_print(args: Args) -> Result<Value, EvalError> {
    let sep = match args.keyword("sep") {
        Some(Value::Str(s)) => s.clone(),
        _ => " ".to_string(),
    };
    let end = match args.keyword("end") {
        Some(Value::Str(s)) => s.clone(),
        _ => "\n".to_string(),
    };
    let line: Vec<String> = args.positional.iter().map(|v| v.to_str()).collect();
    let mut stdout = std::io::stdout().lock();
    write!(stdout, "{}{}", line.join(&sep), end)
        .map_err(|e| EvalError::Value(format!("print failed: {}", e)))?;
    Ok(Value::None)
}

const STR_METHODS: &[&str] = &[
    "capitalize", "count", "endswith", "find", "format", "isalpha", "isdigit", "isspace", "join",
    "lower", "lstrip", "replace", "rstrip", "split", "splitlines", "startswith", "strip", "title",
    "upper",
];
const LIST_METHODS: &[&str] = &["count", "index"];
const DICT_METHODS: &[&str] = &["get", "items", "keys", "values"];
const NODE_METHODS: &[&str] = &["cssselect", "get", "getchildren", "getparent", "items", "itertext", "keys"];

/// Whether `name` is a method of `receiver`'s type
pub fn has_method(receiver: &Value, name: &str) -> bool {
    let table = match receiver {
        Value::Str(_) => STR_METHODS,
        Value::List(_) => LIST_METHODS,
        Value::Dict(_) => DICT_METHODS,
        Value::Node(_) => NODE_METHODS,
        _ => return false,
    };
    table.contains(&name)
}

fn no_attribute(receiver: &Value, name: &str) -> EvalError {
    EvalError::Attribute(format!(
        "'{}' object has no attribute '{}'",
        receiver.type_name(),
        name
    ))
}

/// Non-method attribute access (`node.tag`, `module.member`)
///
/// Method names evaluate to a bound function so they can be passed around.
pub fn attribute(receiver: &Value, name: &str) -> Result<Value, EvalError> {
    match receiver {
        Value::Module(module) => {
            return module.member(name).cloned().ok_or_else(|| {
                EvalError::Attribute(format!(
                    "module '{}' has no attribute '{}'",
                    module.name(),
                    name
                ))
            });
        }
        Value::Node(node) => match name {
            "tag" => return Ok(Value::Str(node.tag())),
            "text" => return Ok(node.text().map_or(Value::None, Value::from)),
            "attrib" => {
                return Ok(Value::Dict(
                    node.attributes()
                        .iter()
                        .map(|a| (Value::Str(a.name.clark()), Value::Str(a.value.clone())))
                        .collect(),
                ));
            }
            _ => {}
        },
        _ => {}
    }
    if has_method(receiver, name) {
        let bound = receiver.clone();
        let method = name.to_string();
        let qualified = format!("{}.{}", receiver.type_name(), name);
        return Ok(Value::Function(Function::new(qualified, move |args| {
            call_method(&bound, &method, args).map_err(Abort::from)
        })));
    }
    Err(no_attribute(receiver, name))
}

/// Call method `name` on `receiver`
pub fn call_method(receiver: &Value, name: &str, args: Args) -> Result<Value, EvalError> {
    match receiver {
        Value::Str(s) => str_method(s, name, args),
        Value::List(items) => list_method(items, name, args),
        Value::Dict(pairs) => dict_method(pairs, name, args),
        Value::Node(node) => node_method(node, name, args),
        other => match attribute(other, name)? {
            Value::Function(f) => f.call(args).map_err(|abort| match abort {
                Abort::Error(err) => err,
                Abort::Signal(signal) => {
                    EvalError::Value(format!("unexpected signal {} from method", signal))
                }
            }),
            value => Err(type_error(format!("'{}' object is not callable", value.type_name()))),
        },
    }
}

fn strip_chars(args: &Args, func: &str) -> Result<Option<Vec<char>>, EvalError> {
    args.check(func, 0, 1)?;
    match args.get(0, "chars") {
        None | Some(Value::None) => Ok(None),
        Some(Value::Str(chars)) => Ok(Some(chars.chars().collect())),
        Some(other) => Err(type_error(format!(
            "{} arg must be None or str, not {}",
            func,
            other.type_name()
        ))),
    }
}

fn prefix_test(s: &str, args: &Args, func: &str, test: fn(&str, &str) -> bool) -> Result<Value, EvalError> {
    args.check(func, 1, 1)?;
    match args.positional[0].as_ref() {
        Value::Str(p) => Ok(Value::Bool(test(s, p))),
        Value::List(options) => Ok(Value::Bool(options.iter().any(|o| {
            o.as_str().is_some_and(|p| test(s, p))
        }))),
        other => Err(type_error(format!(
            "{} arg must be str or a tuple of str, not {}",
            func,
            other.type_name()
        ))),
    }
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut previous_cased = false;
    for c in s.chars() {
        if previous_cased {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        previous_cased = c.is_alphabetic();
    }
    out
}

fn str_method(s: &str, name: &str, args: Args) -> Result<Value, EvalError> {
    match name {
        "strip" => Ok(Value::Str(match strip_chars(&args, "strip")? {
            Some(chars) => s.trim_matches(chars.as_slice()).to_string(),
            None => s.trim().to_string(),
        })),
        "lstrip" => Ok(Value::Str(match strip_chars(&args, "lstrip")? {
            Some(chars) => s.trim_start_matches(chars.as_slice()).to_string(),
            None => s.trim_start().to_string(),
        })),
        "rstrip" => Ok(Value::Str(match strip_chars(&args, "rstrip")? {
            Some(chars) => s.trim_end_matches(chars.as_slice()).to_string(),
            None => s.trim_end().to_string(),
        })),
        "lower" => Ok(Value::Str(s.to_lowercase())),
        "upper" => Ok(Value::Str(s.to_uppercase())),
        "title" => Ok(Value::Str(title_case(s))),
        "capitalize" => {
            let mut chars = s.chars();
            Ok(Value::Str(match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }))
        }
        "isdigit" => Ok(Value::Bool(!s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))),
        "isalpha" => Ok(Value::Bool(!s.is_empty() && s.chars().all(char::is_alphabetic))),
        "isspace" => Ok(Value::Bool(!s.is_empty() && s.chars().all(char::is_whitespace))),
        "split" => {
            args.check("split", 0, 2)?;
            let limit = int_arg(&args, "split", 1, "maxsplit")?.filter(|&n| n >= 0);
            let parts: Vec<Value> = match args.get(0, "sep") {
                None | Some(Value::None) => {
                    let mut parts = Vec::new();
                    let mut rest = s.trim_start();
                    while !rest.is_empty() {
                        if limit.is_some_and(|n| parts.len() as i64 >= n) {
                            parts.push(Value::from(rest.trim_end()));
                            break;
                        }
                        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                        parts.push(Value::from(&rest[..end]));
                        rest = rest[end..].trim_start();
                    }
                    parts
                }
                Some(Value::Str(sep)) => {
                    if sep.is_empty() {
                        return Err(EvalError::Value("empty separator".to_string()));
                    }
                    match limit {
                        Some(n) => s
                            .splitn(usize::try_from(n).unwrap_or(0) + 1, sep.as_str())
                            .map(Value::from)
                            .collect(),
                        None => s.split(sep.as_str()).map(Value::from).collect(),
                    }
                }
                Some(other) => {
                    return Err(type_error(format!(
                        "must be str or None, not {}",
                        other.type_name()
                    )));
                }
            };
            Ok(Value::List(parts))
        }
        "splitlines" => Ok(Value::List(s.lines().map(Value::from).collect())),
        "join" => {
            args.check("join", 1, 1)?;
            let mut pieces = Vec::new();
            for (i, item) in args.positional[0].iterate()?.into_iter().enumerate() {
                match item {
                    Value::Str(piece) => pieces.push(piece),
                    other => {
                        return Err(type_error(format!(
                            "sequence item {}: expected str instance, {} found",
                            i,
                            other.type_name()
                        )));
                    }
                }
            }
            Ok(Value::Str(pieces.join(s)))
        }
        "replace" => {
            args.check("replace", 2, 3)?;
            let old = str_arg(&args, "replace", 0, "old")?;
            let new = str_arg(&args, "replace", 1, "new")?;
            Ok(Value::Str(match int_arg(&args, "replace", 2, "count")? {
                Some(n) if n >= 0 => s.replacen(old, new, usize::try_from(n).unwrap_or(0)),
                _ => s.replace(old, new),
            }))
        }
        "startswith" => prefix_test(s, &args, "startswith", |s, p| s.starts_with(p)),
        "endswith" => prefix_test(s, &args, "endswith", |s, p| s.ends_with(p)),
        "find" => {
            args.check("find", 1, 1)?;
            let needle = str_arg(&args, "find", 0, "sub")?;
            Ok(Value::Int(match s.find(needle) {
                Some(byte) => s[..byte].chars().count() as i64,
                None => -1,
            }))
        }
        "count" => {
            args.check("count", 1, 1)?;
            let needle = str_arg(&args, "count", 0, "sub")?;
            let n = if needle.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(needle).count()
            };
            Ok(Value::Int(n as i64))
        }
        "format" => format_method(s, &args).map(Value::Str),
        _ => Err(no_attribute(&Value::Str(String::new()), name)),
    }
}

fn list_method(items: &[Value], name: &str, args: Args) -> Result<Value, EvalError> {
    match name {
        "count" => {
            args.check("count", 1, 1)?;
            let target = &args.positional[0];
            Ok(Value::Int(items.iter().filter(|v| v.equals(target)).count() as i64))
        }
        "index" => {
            args.check("index", 1, 1)?;
            let target = &args.positional[0];
            items
                .iter()
                .position(|v| v.equals(target))
                .map(|i| Value::Int(i as i64))
                .ok_or_else(|| EvalError::Value(format!("{} is not in list", target.repr())))
        }
        _ => Err(no_attribute(&Value::List(Vec::new()), name)),
    }
}

fn dict_method(pairs: &[(Value, Value)], name: &str, args: Args) -> Result<Value, EvalError> {
    match name {
        "get" => {
            args.check("get", 1, 2)?;
            let default = args.at(1).cloned().unwrap_or(Value::None);
            Ok(dict_get(pairs, &args.positional[0]).cloned().unwrap_or(default))
        }
        "keys" => Ok(Value::List(pairs.iter().map(|(k, _)| k.clone()).collect())),
        "values" => Ok(Value::List(pairs.iter().map(|(_, v)| v.clone()).collect())),
        "items" => Ok(Value::List(
            pairs
                .iter()
                .map(|(k, v)| Value::List(vec![k.clone(), v.clone()]))
                .collect(),
        )),
        _ => Err(no_attribute(&Value::Dict(Vec::new()), name)),
    }
}

fn node_method(node: &crate::document::NodeRef, name: &str, args: Args) -> Result<Value, EvalError> {
    match name {
        "get" => {
            args.check("get", 1, 2)?;
            let key = str_arg(&args, "get", 0, "key")?;
            Ok(match node.attribute(key) {
                Some(value) => Value::from(value),
                None => args.get(1, "default").cloned().unwrap_or(Value::None),
            })
        }
        "getparent" => Ok(node.parent().map_or(Value::None, Value::Node)),
        "getchildren" => Ok(Value::List(node.children().into_iter().map(Value::Node).collect())),
        "itertext" => Ok(Value::List(node.itertext().into_iter().map(Value::from).collect())),
        "keys" => Ok(Value::List(
            node.attributes().iter().map(|a| Value::Str(a.name.clark())).collect(),
        )),
        "items" => Ok(Value::List(
            node.attributes()
                .iter()
                .map(|a| Value::List(vec![Value::Str(a.name.clark()), Value::Str(a.value.clone())]))
                .collect(),
        )),
        "cssselect" => {
            args.check("cssselect", 1, 1)?;
            let css = str_arg(&args, "cssselect", 0, "expr")?;
            let expr = MatchExpr::compile(css)?;
            let matches = expr.select(node, node.document().namespaces())?;
            Ok(Value::List(matches.into_iter().map(Value::Node).collect()))
        }
        _ => Err(no_attribute(&Value::Node(node.clone()), name)),
    }
}

/// `str.format`: `{}`, `{0}`, `{name}`, `!r`/`!s` and a format spec
fn format_method(template: &str, args: &Args) -> Result<String, EvalError> {
    let mut out = String::new();
    let mut auto_index = 0;
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                let mut closed = false;
                for ch in chars.by_ref() {
                    if ch == '}' {
                        closed = true;
                        break;
                    }
                    field.push(ch);
                }
                if !closed {
                    return Err(EvalError::Value("unmatched '{' in format string".to_string()));
                }
                let (field, spec) = match field.split_once(':') {
                    Some((f, s)) => (f.to_string(), s.to_string()),
                    None => (field, String::new()),
                };
                let (field, conversion) = match field.split_once('!') {
                    Some((f, c)) => (f.to_string(), c.chars().next()),
                    None => (field, None),
                };
                let value = if field.is_empty() {
                    let v = args.at(auto_index);
                    auto_index += 1;
                    v
                } else if let Ok(index) = field.parse::<usize>() {
                    args.at(index)
                } else {
                    args.keyword(&field)
                };
                let value = value.ok_or_else(|| {
                    if field.is_empty() || field.parse::<usize>().is_ok() {
                        EvalError::Index("Replacement index out of range for positional args tuple".to_string())
                    } else {
                        EvalError::Key(super::value::quote_literal(&field))
                    }
                })?;
                let value = match conversion {
                    Some('r') => Value::Str(value.repr()),
                    Some('s') => Value::Str(value.to_str()),
                    _ => value.clone(),
                };
                out.push_str(&apply_spec(&value, &spec)?);
            }
            '}' => return Err(EvalError::Value("single '}' encountered in format string".to_string())),
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Decimal run of a format spec starting at `*i`, zero when there is none
fn spec_number(chars: &[char], i: &mut usize) -> Result<usize, EvalError> {
    let mut n = 0usize;
    while let Some(d) = chars.get(*i).and_then(|c| c.to_digit(10)) {
        n = n
            .checked_mul(10)
            .and_then(|n| n.checked_add(d as usize))
            .ok_or_else(|| EvalError::Value("Too many decimal digits in format string".to_string()))?;
        *i += 1;
    }
    Ok(n)
}

/// Apply a `[[fill]align][sign][0][width][.precision][type]` spec
fn apply_spec(value: &Value, spec: &str) -> Result<String, EvalError> {
    if spec.is_empty() {
        return Ok(value.to_str());
    }
    let chars: Vec<char> = spec.chars().collect();
    let mut i = 0;
    let mut fill = ' ';
    let mut align = None;
    if chars.len() >= 2 && matches!(chars[1], '<' | '>' | '^') {
        fill = chars[0];
        align = Some(chars[1]);
        i = 2;
    } else if matches!(chars.first(), Some('<' | '>' | '^')) {
        align = Some(chars[0]);
        i = 1;
    }
    let plus = chars.get(i) == Some(&'+');
    if matches!(chars.get(i), Some('+' | '-' | ' ')) {
        i += 1;
    }
    if chars.get(i) == Some(&'0') && align.is_none() {
        fill = '0';
        align = Some('=');
        i += 1;
    }
    let width = spec_number(&chars, &mut i)?;
    if chars.get(i) == Some(&',') {
        i += 1;
    }
    let mut precision = None;
    if chars.get(i) == Some(&'.') {
        i += 1;
        precision = Some(spec_number(&chars, &mut i)?);
    }
    let kind = chars.get(i).copied();
    if i + usize::from(kind.is_some()) != chars.len() {
        return Err(EvalError::Value(format!("Invalid format specifier '{}'", spec)));
    }

    let numeric = value.as_num().is_some() && !matches!(value, Value::Bool(_));
    let body = match kind {
        Some('%') => {
            let f = value.as_num().map(|n| n.as_f64() * 100.0).ok_or_else(|| {
                type_error(format!("unknown format code '%' for {}", value.type_name()))
            })?;
            format!("{:.*}%", precision.unwrap_or(6), f)
        }
        Some(code) => ops::convert(code, value, precision, plus)?,
        None if numeric && precision.is_some() => ops::convert('g', value, precision, plus)?,
        None => match precision {
            Some(p) if !numeric => value.to_str().chars().take(p).collect(),
            _ if plus && numeric => ops::convert('d', value, None, true)
                .ok()
                .filter(|_| value.as_int().is_some())
                .unwrap_or_else(|| value.to_str()),
            _ => value.to_str(),
        },
    };

    let len = body.chars().count();
    if len >= width {
        return Ok(body);
    }
    let pad = width - len;
    let padding = |n: usize| std::iter::repeat_n(fill, n).collect::<String>();
    let align = align.unwrap_or(if numeric { '>' } else { '<' });
    Ok(match align {
        '<' => format!("{}{}", body, padding(pad)),
        '^' => format!("{}{}{}", padding(pad / 2), body, padding(pad - pad / 2)),
        '=' => match body.strip_prefix('-') {
            Some(rest) => format!("-{}{}", padding(pad), rest),
            None => format!("{}{}", padding(pad), body),
        },
        _ => format!("{}{}", padding(pad), body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, positional: Vec<Value>) -> Result<Value, EvalError> {
        let (_, f) = BUILTINS
            .iter()
            .find(|(n, _)| *n == name)
            .unwrap_or_else(|| panic!("no builtin {}", name));
        f(Args::new(positional))
    }

    fn strs(items: &[&str]) -> Value {
        Value::List(items.iter().map(|s| Value::from(*s)).collect())
    }

    #[test]
    fn test_len_and_str() {
        assert_eq!(call("len", vec!["héllo".into()]).unwrap(), Value::Int(5));
        assert_eq!(call("str", vec![Value::Float(2.0)]).unwrap(), Value::from("2.0"));
        assert!(call("len", vec![Value::Int(1)]).is_err());
    }

    #[test]
    fn test_int_conversions() {
        assert_eq!(call("int", vec![" 42 ".into()]).unwrap(), Value::Int(42));
        assert_eq!(call("int", vec![Value::Float(-2.7)]).unwrap(), Value::Int(-2));
        assert_eq!(
            call("int", vec!["ff".into(), Value::Int(16)]).unwrap(),
            Value::Int(255)
        );
        assert!(matches!(call("int", vec!["x".into()]), Err(EvalError::Value(_))));
    }

    #[test]
    fn test_float_conversion() {
        assert_eq!(call("float", vec!["1.5".into()]).unwrap(), Value::Float(1.5));
        assert!(call("float", vec!["abc".into()]).is_err());
    }

    #[test]
    fn test_sorted_and_reverse() {
        let args = Args::new(vec![Value::List(vec![Value::Int(3), Value::Int(1), Value::Int(2)])])
            .with_keyword("reverse", Value::Bool(true));
        assert_eq!(
            builtin_sorted(args).unwrap(),
            Value::List(vec![Value::Int(3), Value::Int(2), Value::Int(1)])
        );
        assert!(call("sorted", vec![Value::List(vec![Value::Int(1), "a".into()])]).is_err());
    }

    #[test]
    fn test_min_max_sum() {
        let nums = Value::List(vec![Value::Int(4), Value::Float(1.5), Value::Int(9)]);
        assert_eq!(call("min", vec![nums.clone()]).unwrap(), Value::Float(1.5));
        assert_eq!(call("max", vec![Value::Int(1), Value::Int(7)]).unwrap(), Value::Int(7));
        assert_eq!(call("sum", vec![nums]).unwrap(), Value::Float(14.5));
        assert!(call("max", vec![Value::List(vec![])]).is_err());
    }

    #[test]
    fn test_round_is_half_even() {
        assert_eq!(call("round", vec![Value::Float(2.5)]).unwrap(), Value::Int(2));
        assert_eq!(call("round", vec![Value::Float(3.5)]).unwrap(), Value::Int(4));
        assert_eq!(
            call("round", vec![Value::Float(1.234), Value::Int(2)]).unwrap(),
            Value::Float(1.23)
        );
    }

    #[test]
    fn test_range_enumerate_zip() {
        assert_eq!(
            call("range", vec![Value::Int(5), Value::Int(0), Value::Int(-2)]).unwrap(),
            Value::List(vec![Value::Int(5), Value::Int(3), Value::Int(1)])
        );
        assert_eq!(
            call("enumerate", vec![strs(&["a"])]).unwrap(),
            Value::List(vec![Value::List(vec![Value::Int(0), "a".into()])])
        );
        assert_eq!(
            call("zip", vec![strs(&["a", "b"]), Value::List(vec![Value::Int(1)])]).unwrap(),
            Value::List(vec![Value::List(vec!["a".into(), Value::Int(1)])])
        );
    }

    #[test]
    fn test_set_keeps_first_occurrence_order() {
        assert_eq!(call("set", vec![strs(&["b", "a", "b"])]).unwrap(), strs(&["b", "a"]));
    }

    #[test]
    fn test_string_methods() {
        let s = Value::from("  Hello, World  ");
        assert_eq!(call_method(&s, "strip", Args::default()).unwrap(), Value::from("Hello, World"));
        assert_eq!(
            call_method(&"a,b,,c".into(), "split", Args::new(vec![",".into()])).unwrap(),
            strs(&["a", "b", "", "c"])
        );
        assert_eq!(
            call_method(&" a  b ".into(), "split", Args::default()).unwrap(),
            strs(&["a", "b"])
        );
        assert_eq!(
            call_method(&"-".into(), "join", Args::new(vec![strs(&["x", "y"])])).unwrap(),
            Value::from("x-y")
        );
        assert_eq!(
            call_method(&"hello world".into(), "title", Args::default()).unwrap(),
            Value::from("Hello World")
        );
        assert_eq!(
            call_method(&"xyz".into(), "find", Args::new(vec!["z".into()])).unwrap(),
            Value::Int(2)
        );
        assert_eq!(
            call_method(&"abc".into(), "startswith", Args::new(vec![strs(&["x", "a"])])).unwrap(),
            Value::Bool(true)
        );
        assert!(call_method(&"abc".into(), "nope", Args::default()).is_err());
    }

    #[test]
    fn test_str_format() {
        let args = Args::new(vec![Value::from("x"), Value::Float(3.14159)]).with_keyword("n", Value::Int(7));
        assert_eq!(
            format_method("{} {1:.2f} {n:03d} {{}} {0!r}", &args).unwrap(),
            "x 3.14 007 {} 'x'"
        );
        assert_eq!(format_method("[{:>4}]", &Args::new(vec!["ab".into()])).unwrap(), "[  ab]");
        assert_eq!(format_method("[{:*^6}]", &Args::new(vec!["ab".into()])).unwrap(), "[**ab**]");
        assert!(format_method("{2}", &Args::new(vec![])).is_err());
    }

    #[test]
    fn test_str_format_rejects_oversized_width() {
        let args = Args::new(vec![Value::Int(1)]);
        let err = format_method("{:99999999999999999999999}", &args).unwrap_err();
        assert!(matches!(err, EvalError::Value(ref m) if m == "Too many decimal digits in format string"));
        assert!(format_method("{:.99999999999999999999999f}", &args).is_err());
    }

    #[test]
    fn test_list_and_dict_methods() {
        let list = strs(&["a", "b", "a"]);
        assert_eq!(call_method(&list, "count", Args::new(vec!["a".into()])).unwrap(), Value::Int(2));
        assert_eq!(call_method(&list, "index", Args::new(vec!["b".into()])).unwrap(), Value::Int(1));
        let dict = Value::Dict(vec![("k".into(), Value::Int(1))]);
        assert_eq!(
            call_method(&dict, "get", Args::new(vec!["missing".into(), Value::Int(0)])).unwrap(),
            Value::Int(0)
        );
        assert_eq!(call_method(&dict, "keys", Args::default()).unwrap(), strs(&["k"]));
    }

    #[test]
    fn test_bound_method_attribute() {
        let bound = attribute(&"abc".into(), "upper").unwrap();
        match bound {
            Value::Function(f) => assert_eq!(f.call(Args::default()).unwrap(), Value::from("ABC")),
            other => panic!("expected a function, got {:?}", other),
        }
        assert!(matches!(attribute(&Value::Int(1), "real"), Err(EvalError::Attribute(_))));
    }
}
