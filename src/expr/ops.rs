#![forbid(unsafe_code)]

//! Arithmetic and membership operators with Python semantics

use super::ast::BinaryOp;
use super::value::{Num, Value, dict_get};
use crate::error::EvalError;

fn unsupported(op: BinaryOp, left: &Value, right: &Value) -> EvalError {
    EvalError::Type(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

fn overflow() -> EvalError {
    EvalError::Value("integer overflow".to_string())
}

/// Apply a binary arithmetic operator
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    if let (Some(a), Some(b)) = (left.as_num(), right.as_num()) {
        return numeric(op, a, b);
    }
    match (op, left, right) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        (BinaryOp::Mul, Value::Str(s), n) | (BinaryOp::Mul, n, Value::Str(s)) if n.as_int().is_some() => {
            let count = usize::try_from(n.as_int().unwrap_or(0)).unwrap_or(0);
            Ok(Value::Str(s.repeat(count)))
        }
        (BinaryOp::Mul, Value::List(items), n) | (BinaryOp::Mul, n, Value::List(items))
            if n.as_int().is_some() =>
        {
            let count = usize::try_from(n.as_int().unwrap_or(0)).unwrap_or(0);
            let mut out = Vec::with_capacity(items.len() * count);
            for _ in 0..count {
                out.extend(items.iter().cloned());
            }
            Ok(Value::List(out))
        }
        (BinaryOp::Mod, Value::Str(template), args) => percent_format(template, args),
        _ => Err(unsupported(op, left, right)),
    }
}

fn numeric(op: BinaryOp, a: Num, b: Num) -> Result<Value, EvalError> {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => match op {
            BinaryOp::Add => x.checked_add(y).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Sub => x.checked_sub(y).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Mul => x.checked_mul(y).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Div => {
                if y == 0 {
                    return Err(EvalError::ZeroDivision("division by zero".to_string()));
                }
                Ok(Value::Float(x as f64 / y as f64))
            }
            BinaryOp::FloorDiv => {
                if y == 0 {
                    return Err(EvalError::ZeroDivision(
                        "integer division or modulo by zero".to_string(),
                    ));
                }
                let q = x.checked_div(y).ok_or_else(overflow)?;
                let floored = if (x % y != 0) && ((x < 0) != (y < 0)) { q - 1 } else { q };
                Ok(Value::Int(floored))
            }
            BinaryOp::Mod => {
                if y == 0 {
                    return Err(EvalError::ZeroDivision(
                        "integer division or modulo by zero".to_string(),
                    ));
                }
                let r = x.checked_rem(y).ok_or_else(overflow)?;
                Ok(Value::Int(if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r }))
            }
            BinaryOp::Pow => {
                if y < 0 {
                    return Ok(Value::Float((x as f64).powf(y as f64)));
                }
                let exp = u32::try_from(y).map_err(|_| overflow())?;
                x.checked_pow(exp).map(Value::Int).ok_or_else(overflow)
            }
        },
        _ => {
            let (x, y) = (a.as_f64(), b.as_f64());
            let result = match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::Div => {
                    if y == 0.0 {
                        return Err(EvalError::ZeroDivision("float division by zero".to_string()));
                    }
                    x / y
                }
                BinaryOp::FloorDiv => {
                    if y == 0.0 {
                        return Err(EvalError::ZeroDivision(
                            "float floor division by zero".to_string(),
                        ));
                    }
                    (x / y).floor()
                }
                BinaryOp::Mod => {
                    if y == 0.0 {
                        return Err(EvalError::ZeroDivision("float modulo".to_string()));
                    }
                    x - y * (x / y).floor()
                }
                BinaryOp::Pow => x.powf(y),
            };
            Ok(Value::Float(result))
        }
    }
}

/// Unary minus
pub fn negate(value: &Value) -> Result<Value, EvalError> {
    match value.as_num() {
        Some(Num::Int(n)) => n.checked_neg().map(Value::Int).ok_or_else(overflow),
        Some(Num::Float(f)) => Ok(Value::Float(-f)),
        None => Err(EvalError::Type(format!(
            "bad operand type for unary -: '{}'",
            value.type_name()
        ))),
    }
}

/// Unary plus
pub fn positive(value: &Value) -> Result<Value, EvalError> {
    match value.as_num() {
        Some(Num::Int(n)) => Ok(Value::Int(n)),
        Some(Num::Float(f)) => Ok(Value::Float(f)),
        None => Err(EvalError::Type(format!(
            "bad operand type for unary +: '{}'",
            value.type_name()
        ))),
    }
}

/// `item in container`
pub fn contains(container: &Value, item: &Value) -> Result<bool, EvalError> {
    match container {
        Value::Str(haystack) => match item {
            Value::Str(needle) => Ok(haystack.contains(needle.as_str())),
            other => Err(EvalError::Type(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(items) => Ok(items.iter().any(|v| v.equals(item))),
        Value::Dict(pairs) => Ok(dict_get(pairs, item).is_some()),
        Value::Node(node) => Ok(match item {
            Value::Node(child) => node.children().contains(child),
            _ => false,
        }),
        other => Err(EvalError::Type(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

/// printf-style `template % args`
///
/// Supports the `s r d i f e g x %` conversions with optional flags, width
/// and precision, and `%(name)s` lookups when `args` is a dict.
pub fn percent_format(template: &str, args: &Value) -> Result<Value, EvalError> {
    let positional: Vec<Value> = match args {
        Value::List(items) => items.clone(),
        Value::Dict(_) => Vec::new(),
        other => vec![other.clone()],
    };
    let mut next = positional.iter();
    let mut out = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut key = None;
        if chars.peek() == Some(&'(') {
            chars.next();
            let name: String = chars.by_ref().take_while(|&ch| ch != ')').collect();
            key = Some(name);
        }
        let mut flags = String::new();
        while let Some(&f) = chars.peek().filter(|f| matches!(f, '-' | '+' | ' ' | '0' | '#')) {
            flags.push(f);
            chars.next();
        }
        let mut width = String::new();
        while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
            width.push(d);
            chars.next();
        }
        let mut precision = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut digits = String::new();
            while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                digits.push(d);
                chars.next();
            }
            precision = Some(digits.parse::<usize>().unwrap_or(0));
        }
        let Some(conversion) = chars.next() else {
            return Err(EvalError::Value("incomplete format".to_string()));
        };
        if conversion == '%' {
            out.push('%');
            continue;
        }

        let value = match (&key, args) {
            (Some(name), Value::Dict(pairs)) => dict_get(pairs, &Value::Str(name.clone()))
                .cloned()
                .ok_or_else(|| EvalError::Key(super::value::quote_literal(name)))?,
            (Some(_), _) => {
                return Err(EvalError::Type("format requires a mapping".to_string()));
            }
            (None, _) => next
                .next()
                .cloned()
                .ok_or_else(|| EvalError::Type("not enough arguments for format string".to_string()))?,
        };

        let body = convert(conversion, &value, precision, flags.contains('+'))?;
        let width: usize = width.parse().unwrap_or(0);
        let padded = if body.chars().count() >= width {
            body
        } else if flags.contains('-') {
            format!("{:<width$}", body, width = width)
        } else if flags.contains('0') && !matches!(conversion, 's' | 'r') {
            let (sign, digits) = match body.strip_prefix('-') {
                Some(rest) => ("-", rest.to_string()),
                None => ("", body.clone()),
            };
            format!("{}{:0>width$}", sign, digits, width = width - sign.len())
        } else {
            format!("{:>width$}", body, width = width)
        };
        out.push_str(&padded);
    }

    if key_free(args) && next.next().is_some() {
        return Err(EvalError::Type(
            "not all arguments converted during string formatting".to_string(),
        ));
    }
    Ok(Value::Str(out))
}

fn key_free(args: &Value) -> bool {
    !matches!(args, Value::Dict(_))
}

/// Render one `%` conversion
pub(crate) fn convert(
    conversion: char,
    value: &Value,
    precision: Option<usize>,
    plus: bool,
) -> Result<String, EvalError> {
    let number = |v: &Value| {
        v.as_num().ok_or_else(|| {
            EvalError::Type(format!(
                "%{} format: a real number is required, not {}",
                conversion,
                v.type_name()
            ))
        })
    };
    let signed = |s: String, negative: bool| {
        if plus && !negative { format!("+{}", s) } else { s }
    };
    match conversion {
        's' => Ok(match precision {
            Some(p) => value.to_str().chars().take(p).collect(),
            None => value.to_str(),
        }),
        'r' => Ok(value.repr()),
        'd' | 'i' => {
            let n = match number(value)? {
                Num::Int(n) => n,
                Num::Float(f) => f.trunc() as i64,
            };
            Ok(signed(n.to_string(), n < 0))
        }
        'f' | 'F' => {
            let f = number(value)?.as_f64();
            Ok(signed(format!("{:.*}", precision.unwrap_or(6), f), f < 0.0))
        }
        'e' | 'E' => {
            let f = number(value)?.as_f64();
            let formatted = format!("{:.*e}", precision.unwrap_or(6), f);
            let formatted = match formatted.split_once('e') {
                Some((m, e)) => {
                    let (sign, digits) = match e.strip_prefix('-') {
                        Some(d) => ('-', d),
                        None => ('+', e),
                    };
                    format!("{}e{}{:0>2}", m, sign, digits)
                }
                None => formatted,
            };
            let formatted = if conversion == 'E' {
                formatted.to_uppercase()
            } else {
                formatted
            };
            Ok(signed(formatted, f < 0.0))
        }
        'g' | 'G' => {
            let f = number(value)?.as_f64();
            Ok(signed(super::value::format_float(f), f < 0.0))
        }
        'x' | 'X' => {
            let n = value.as_int().ok_or_else(|| {
                EvalError::Type(format!("%x format: an integer is required, not {}", value.type_name()))
            })?;
            let hex = if n < 0 {
                format!("-{:x}", n.unsigned_abs())
            } else {
                format!("{:x}", n)
            };
            Ok(if conversion == 'X' { hex.to_uppercase() } else { hex })
        }
        other => Err(EvalError::Value(format!(
            "unsupported format character '{}'",
            other
        ))),
    }
}
