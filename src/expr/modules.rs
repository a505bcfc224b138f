#![forbid(unsafe_code)]

//! Modules available to `@import`
//!
//! Imports never reach outside the process: a script can only import what
//! the engine's [`ModuleRegistry`] provides. The standard registry carries
//! `re`, `json` and `math`; embedding applications may register their own.

use super::value::{Args, Module, Value, format_float};
use crate::error::EvalError;
use crate::rules::Abort;
use regex::{Captures, Regex, RegexBuilder};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Named modules a script may import
#[derive(Debug, Clone)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, Arc<Module>>,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl ModuleRegistry {
    /// A registry with no modules
    pub fn empty() -> Self {
        ModuleRegistry {
            modules: BTreeMap::new(),
        }
    }

    /// The `re`, `json` and `math` modules
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(re_module());
        registry.register(json_module());
        registry.register(math_module());
        registry
    }

    /// Add or replace a module under its own name
    pub fn register(&mut self, module: Module) {
        self.modules
            .insert(module.name().to_string(), Arc::new(module));
    }

    /// The module named `name`, as a value ready to bind
    pub fn get(&self, name: &str) -> Option<Value> {
        self.modules.get(name).map(|m| Value::Module(Arc::clone(m)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }
}

fn type_error(message: impl Into<String>) -> Abort {
    Abort::Error(EvalError::Type(message.into()))
}

fn str_argument<'a>(args: &'a Args, func: &str, index: usize, name: &str) -> Result<&'a str, Abort> {
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

fn number_argument(args: &Args, func: &str) -> Result<f64, Abort> {
    let value = args.require(func, 0, "x")?;
    value
        .as_num()
        .map(|n| n.as_f64())
        .ok_or_else(|| type_error(format!("must be real number, not {}", value.type_name())))
}

// ---- re ----------------------------------------------------------------

const IGNORECASE: i64 = 2;
const MULTILINE: i64 = 8;
const DOTALL: i64 = 16;
const VERBOSE: i64 = 64;

enum Anchor {
    Search,
    Start,
    Full,
}

fn compile(pattern: &str, flags: i64, anchor: Anchor) -> Result<Regex, Abort> {
    let anchored = match anchor {
        Anchor::Search => pattern.to_string(),
        Anchor::Start => format!(r"\A(?:{})", pattern),
        Anchor::Full => format!(r"\A(?:{})\z", pattern),
    };
    RegexBuilder::new(&anchored)
        .case_insensitive(flags & IGNORECASE != 0)
        .multi_line(flags & MULTILINE != 0)
        .dot_matches_new_line(flags & DOTALL != 0)
        .ignore_whitespace(flags & VERBOSE != 0)
        .build()
        .map_err(|e| Abort::Error(EvalError::Value(format!("invalid regular expression: {}", e))))
}

fn flags_argument(args: &Args, index: usize) -> Result<i64, Abort> {
    match args.get(index, "flags") {
        None => Ok(0),
        Some(value) => value
            .as_int()
            .ok_or_else(|| type_error("flags must be an integer")),
    }
}

/// A match result exposed as a module-like value with `group()` and friends
fn match_value(regex: &Regex, caps: &Captures<'_>, subject: &str) -> Value {
    let groups: Vec<Option<String>> = caps
        .iter()
        .map(|g| g.map(|m| m.as_str().to_string()))
        .collect();
    let spans: Vec<Option<(i64, i64)>> = caps
        .iter()
        .map(|g| {
            g.map(|m| {
                (
                    subject[..m.start()].chars().count() as i64,
                    subject[..m.end()].chars().count() as i64,
                )
            })
        })
        .collect();
    let names: BTreeMap<String, usize> = regex
        .capture_names()
        .enumerate()
        .filter_map(|(i, name)| name.map(|n| (n.to_string(), i)))
        .collect();

    let group_index = {
        let names = names.clone();
        let count = groups.len();
        move |value: Option<&Value>| -> Result<usize, Abort> {
            let index = match value {
                None => 0,
                Some(Value::Str(name)) => *names
                    .get(name)
                    .ok_or_else(|| Abort::Error(EvalError::Index("no such group".to_string())))?,
                Some(other) => other
                    .as_int()
                    .and_then(|n| usize::try_from(n).ok())
                    .ok_or_else(|| Abort::Error(EvalError::Index("no such group".to_string())))?,
            };
            if index >= count {
                return Err(Abort::Error(EvalError::Index("no such group".to_string())));
            }
            Ok(index)
        }
    };
    let as_value = |g: &Option<String>| g.clone().map_or(Value::None, Value::Str);

    let group = {
        let groups = groups.clone();
        let group_index = group_index.clone();
        move |args: Args<'_>| -> Result<Value, Abort> {
            if args.positional.len() > 1 {
                return args
                    .positional
                    .iter()
                    .map(|v| group_index(Some(v.as_ref())).map(|i| as_value(&groups[i])))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List);
            }
            let index = group_index(args.at(0))?;
            Ok(as_value(&groups[index]))
        }
    };
    let all_groups = {
        let groups = groups.clone();
        move |_args: Args<'_>| -> Result<Value, Abort> {
            Ok(Value::List(groups.iter().skip(1).map(as_value).collect()))
        }
    };
    let group_dict = {
        let groups = groups.clone();
        move |_args: Args<'_>| -> Result<Value, Abort> {
            Ok(Value::Dict(
                names
                    .iter()
                    .map(|(name, &i)| (Value::Str(name.clone()), as_value(&groups[i])))
                    .collect(),
            ))
        }
    };
    let span_of = move |args: Args<'_>, pick: fn((i64, i64)) -> Value| -> Result<Value, Abort> {
        let index = group_index(args.at(0))?;
        Ok(spans[index].map_or(Value::Int(-1), pick))
    };
    let start = {
        let span_of = span_of.clone();
        move |args: Args<'_>| span_of(args, |(s, _)| Value::Int(s))
    };
    let end = {
        let span_of = span_of.clone();
        move |args: Args<'_>| span_of(args, |(_, e)| Value::Int(e))
    };
    let span = move |args: Args<'_>| {
        span_of(args, |(s, e)| Value::List(vec![Value::Int(s), Value::Int(e)]))
    };

    Value::from(
        Module::new("re.Match")
            .with("string", Value::from(subject))
            .function("group", group)
            .function("groups", all_groups)
            .function("groupdict", group_dict)
            .function("start", start)
            .function("end", end)
            .function("span", span),
    )
}

fn re_find(args: Args, func: &'static str, anchor: Anchor) -> Result<Value, Abort> {
    args.check(func, 2, 3)?;
    let pattern = str_argument(&args, func, 0, "pattern")?;
    let subject = str_argument(&args, func, 1, "string")?;
    let regex = compile(pattern, flags_argument(&args, 2)?, anchor)?;
    Ok(match regex.captures(subject) {
        Some(caps) => match_value(&regex, &caps, subject),
        None => Value::None,
    })
}

fn re_findall(args: Args) -> Result<Value, Abort> {
    args.check("findall", 2, 3)?;
    let pattern = str_argument(&args, "findall", 0, "pattern")?;
    let subject = str_argument(&args, "findall", 1, "string")?;
    let regex = compile(pattern, flags_argument(&args, 2)?, Anchor::Search)?;
    let text = |m: Option<regex::Match<'_>>| Value::from(m.map_or("", |m| m.as_str()));
    let found = regex
        .captures_iter(subject)
        .map(|caps| match caps.len() {
            1 => text(caps.get(0)),
            2 => text(caps.get(1)),
            n => Value::List((1..n).map(|i| text(caps.get(i))).collect()),
        })
        .collect();
    Ok(Value::List(found))
}

/// Translate a Python replacement template (`\1`, `\g<name>`) to regex syntax
fn replacement_template(repl: &str) -> String {
    let mut out = String::with_capacity(repl.len());
    let mut chars = repl.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.peek().copied() {
                Some(d) if d.is_ascii_digit() => {
                    let mut digits = String::new();
                    while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                        digits.push(d);
                        chars.next();
                    }
                    out.push_str(&format!("${{{}}}", digits));
                }
                Some('g') => {
                    chars.next();
                    if chars.peek() == Some(&'<') {
                        chars.next();
                        let name: String = chars.by_ref().take_while(|&ch| ch != '>').collect();
                        out.push_str(&format!("${{{}}}", name));
                    } else {
                        out.push_str("\\g");
                    }
                }
                Some('n') => {
                    chars.next();
                    out.push('\n');
                }
                Some('t') => {
                    chars.next();
                    out.push('\t');
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                _ => out.push('\\'),
            },
            other => out.push(other),
        }
    }
    out
}

fn re_sub(args: Args) -> Result<Value, Abort> {
    args.check("sub", 3, 5)?;
    let pattern = str_argument(&args, "sub", 0, "pattern")?;
    let repl = str_argument(&args, "sub", 1, "repl")?;
    let subject = str_argument(&args, "sub", 2, "string")?;
    let count = match args.get(3, "count") {
        None => 0,
        Some(value) => value
            .as_int()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| type_error("count must be a non-negative integer"))?,
    };
    let regex = compile(pattern, flags_argument(&args, 4)?, Anchor::Search)?;
    let template = replacement_template(repl);
    Ok(Value::Str(
        regex
            .replacen(subject, count, template.as_str())
            .into_owned(),
    ))
}

fn re_split(args: Args) -> Result<Value, Abort> {
    args.check("split", 2, 4)?;
    let pattern = str_argument(&args, "split", 0, "pattern")?;
    let subject = str_argument(&args, "split", 1, "string")?;
    let limit = match args.get(2, "maxsplit") {
        None => 0,
        Some(value) => value
            .as_int()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| type_error("maxsplit must be a non-negative integer"))?,
    };
    let regex = compile(pattern, flags_argument(&args, 3)?, Anchor::Search)?;
    let parts: Vec<Value> = if limit == 0 {
        regex.split(subject).map(Value::from).collect()
    } else {
        regex.splitn(subject, limit + 1).map(Value::from).collect()
    };
    Ok(Value::List(parts))
}

fn re_escape(args: Args) -> Result<Value, Abort> {
    args.check("escape", 1, 1)?;
    let pattern = str_argument(&args, "escape", 0, "pattern")?;
    Ok(Value::Str(regex::escape(pattern)))
}

fn re_module() -> Module {
    Module::new("re")
        .with("IGNORECASE", Value::Int(IGNORECASE))
        .with("I", Value::Int(IGNORECASE))
        .with("MULTILINE", Value::Int(MULTILINE))
        .with("M", Value::Int(MULTILINE))
        .with("DOTALL", Value::Int(DOTALL))
        .with("S", Value::Int(DOTALL))
        .with("VERBOSE", Value::Int(VERBOSE))
        .with("X", Value::Int(VERBOSE))
        .function("search", |args| re_find(args, "search", Anchor::Search))
        .function("match", |args| re_find(args, "match", Anchor::Start))
        .function("fullmatch", |args| re_find(args, "fullmatch", Anchor::Full))
        .function("findall", re_findall)
        .function("sub", re_sub)
        .function("split", re_split)
        .function("escape", re_escape)
}

// ---- json --------------------------------------------------------------

/// Serialize with Python's default `json.dumps` separators
fn dump_compact(value: &Value, sort_keys: bool, out: &mut String) -> Result<(), Abort> {
    match value {
        Value::None => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Float(f) => out.push_str(&match format_float(*f).as_str() {
            "nan" => "NaN".to_string(),
            "inf" => "Infinity".to_string(),
            "-inf" => "-Infinity".to_string(),
            other => other.to_string(),
        }),
        Value::Str(s) => out.push_str(&json_string(s)?),
        Value::Node(node) => out.push_str(&json_string(&node.serialize())?),
        Value::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                dump_compact(item, sort_keys, out)?;
            }
            out.push(']');
        }
        Value::Dict(pairs) => {
            let mut entries: Vec<(String, &Value)> =
                pairs.iter().map(|(k, v)| (k.to_str(), v)).collect();
            if sort_keys {
                entries.sort_by(|a, b| a.0.cmp(&b.0));
            }
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&json_string(&key)?);
                out.push_str(": ");
                dump_compact(item, sort_keys, out)?;
            }
            out.push('}');
        }
        other => {
            return Err(type_error(format!(
                "Object of type {} is not JSON serializable",
                other.type_name()
            )));
        }
    }
    Ok(())
}

fn json_string(s: &str) -> Result<String, Abort> {
    serde_json::to_string(s).map_err(|e| Abort::Error(EvalError::Value(e.to_string())))
}

fn json_dumps(args: Args) -> Result<Value, Abort> {
    let value = args.require("dumps", 0, "obj")?;
    let sort_keys = args.keyword("sort_keys").is_some_and(Value::truthy);
    match args.keyword("indent") {
        None | Some(Value::None) => {
            let mut out = String::new();
            dump_compact(value, sort_keys, &mut out)?;
            Ok(Value::Str(out))
        }
        Some(indent) => {
            let width = indent
                .as_int()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| type_error("indent must be a non-negative integer"))?;
            // round-trip through the compact form so sort_keys applies
            let mut compact = String::new();
            dump_compact(value, sort_keys, &mut compact)?;
            let parsed: serde_json::Value = serde_json::from_str(&compact)
                .map_err(|e| Abort::Error(EvalError::Value(e.to_string())))?;
            let indent_text = " ".repeat(width);
            let formatter = serde_json::ser::PrettyFormatter::with_indent(indent_text.as_bytes());
            let mut buffer = Vec::new();
            let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
            serde::Serialize::serialize(&parsed, &mut serializer)
                .map_err(|e| Abort::Error(EvalError::Value(e.to_string())))?;
            String::from_utf8(buffer)
                .map(Value::Str)
                .map_err(|e| Abort::Error(EvalError::Value(e.to_string())))
        }
    }
}

fn json_loads(args: Args) -> Result<Value, Abort> {
    args.check("loads", 1, 1)?;
    let text = str_argument(&args, "loads", 0, "s")?;
    let parsed: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| Abort::Error(EvalError::Value(format!("JSONDecodeError: {}", e))))?;
    Ok(Value::from(parsed))
}

fn json_module() -> Module {
    Module::new("json")
        .function("dumps", json_dumps)
        .function("loads", json_loads)
}

// ---- math --------------------------------------------------------------

fn to_int(f: f64) -> Result<Value, Abort> {
    if f.is_finite() {
        Ok(Value::Int(f as i64))
    } else {
        Err(Abort::Error(EvalError::Value(format!(
            "cannot convert float {} to integer",
            format_float(f)
        ))))
    }
}

fn math_module() -> Module {
    Module::new("math")
        .with("pi", Value::Float(std::f64::consts::PI))
        .with("e", Value::Float(std::f64::consts::E))
        .function("floor", |args| {
            args.check("floor", 1, 1)?;
            match args.positional[0].as_ref() {
                Value::Int(n) => Ok(Value::Int(*n)),
                _ => to_int(number_argument(&args, "floor")?.floor()),
            }
        })
        .function("ceil", |args| {
            args.check("ceil", 1, 1)?;
            match args.positional[0].as_ref() {
                Value::Int(n) => Ok(Value::Int(*n)),
                _ => to_int(number_argument(&args, "ceil")?.ceil()),
            }
        })
        .function("sqrt", |args| {
            args.check("sqrt", 1, 1)?;
            let x = number_argument(&args, "sqrt")?;
            if x < 0.0 {
                return Err(Abort::Error(EvalError::Value("math domain error".to_string())));
            }
            Ok(Value::Float(x.sqrt()))
        })
        .function("log", |args| {
            args.check("log", 1, 2)?;
            let x = number_argument(&args, "log")?;
            if x <= 0.0 {
                return Err(Abort::Error(EvalError::Value("math domain error".to_string())));
            }
            match args.get(1, "base").and_then(|b| b.as_num()) {
                Some(base) => Ok(Value::Float(x.ln() / base.as_f64().ln())),
                None => Ok(Value::Float(x.ln())),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(module: &str, name: &str, positional: Vec<Value>) -> Result<Value, Abort> {
        let registry = ModuleRegistry::standard();
        let Some(Value::Module(m)) = registry.get(module) else {
            panic!("missing module {}", module);
        };
        match m.member(name) {
            Some(Value::Function(f)) => f.call(Args::new(positional)),
            other => panic!("{}.{} is not a function: {:?}", module, name, other),
        }
    }

    fn call_member(value: &Value, name: &str, positional: Vec<Value>) -> Result<Value, Abort> {
        let Value::Module(m) = value else {
            panic!("not a match object: {:?}", value);
        };
        match m.member(name) {
            Some(Value::Function(f)) => f.call(Args::new(positional)),
            other => panic!("{} is not a function: {:?}", name, other),
        }
    }

    #[test]
    fn test_registry_contents() {
        let registry = ModuleRegistry::standard();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["json", "math", "re"]);
        assert!(registry.get("os").is_none());
        assert!(ModuleRegistry::empty().get("re").is_none());
    }

    #[test]
    fn test_re_search_groups() {
        let m = call("re", "search", vec![r"(\d+)-(?P<b>\d+)".into(), "id 12-34".into()]).unwrap();
        assert_eq!(call_member(&m, "group", vec![]).unwrap(), Value::from("12-34"));
        assert_eq!(call_member(&m, "group", vec![Value::Int(1)]).unwrap(), Value::from("12"));
        assert_eq!(call_member(&m, "group", vec!["b".into()]).unwrap(), Value::from("34"));
        assert_eq!(call_member(&m, "start", vec![]).unwrap(), Value::Int(3));
        assert!(call_member(&m, "group", vec![Value::Int(5)]).is_err());
    }

    #[test]
    fn test_re_match_is_anchored() {
        assert_eq!(
            call("re", "match", vec![r"\d".into(), "a1".into()]).unwrap(),
            Value::None
        );
        assert!(matches!(
            call("re", "match", vec![r"a".into(), "a1".into()]).unwrap(),
            Value::Module(_)
        ));
    }

    #[test]
    fn test_re_findall_shapes() {
        assert_eq!(
            call("re", "findall", vec![r"\d".into(), "a1b2".into()]).unwrap(),
            Value::List(vec!["1".into(), "2".into()])
        );
        assert_eq!(
            call("re", "findall", vec![r"(\w)=(\d)".into(), "a=1 b=2".into()]).unwrap(),
            Value::List(vec![
                Value::List(vec!["a".into(), "1".into()]),
                Value::List(vec!["b".into(), "2".into()])
            ])
        );
    }

    #[test]
    fn test_re_sub_with_python_backreferences() {
        assert_eq!(
            call("re", "sub", vec![r"(\w+)@(\w+)".into(), r"\2 at \1 $".into(), "me@host".into()])
                .unwrap(),
            Value::from("host at me $")
        );
    }

    #[test]
    fn test_re_split_and_flags() {
        assert_eq!(
            call("re", "split", vec![r"\s*,\s*".into(), "a , b,c".into()]).unwrap(),
            Value::List(vec!["a".into(), "b".into(), "c".into()])
        );
        let m = call(
            "re",
            "search",
            vec!["HELLO".into(), "say hello".into(), Value::Int(IGNORECASE)],
        )
        .unwrap();
        assert!(matches!(m, Value::Module(_)));
    }

    #[test]
    fn test_invalid_regex_is_value_error() {
        assert!(matches!(
            call("re", "search", vec!["(".into(), "x".into()]),
            Err(Abort::Error(EvalError::Value(_)))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let value = Value::Dict(vec![
            ("a".into(), Value::List(vec![Value::Int(1), Value::Float(2.0)])),
            ("b".into(), Value::None),
        ]);
        let dumped = call("json", "dumps", vec![value.clone()]).unwrap();
        assert_eq!(dumped, Value::from(r#"{"a": [1, 2.0], "b": null}"#));
        assert_eq!(call("json", "loads", vec![dumped]).unwrap(), value);
    }

    #[test]
    fn test_json_rejects_signals() {
        assert!(call("json", "dumps", vec![Value::Signal(crate::rules::FlowControl::Program)]).is_err());
    }

    #[test]
    fn test_math() {
        assert_eq!(call("math", "floor", vec![Value::Float(-1.5)]).unwrap(), Value::Int(-2));
        assert_eq!(call("math", "ceil", vec![Value::Float(1.2)]).unwrap(), Value::Int(2));
        assert_eq!(call("math", "sqrt", vec![Value::Int(9)]).unwrap(), Value::Float(3.0));
        assert!(call("math", "sqrt", vec![Value::Int(-1)]).is_err());
    }
}
