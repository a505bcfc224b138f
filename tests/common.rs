//! Shared helpers for the Spork integration tests

#![allow(dead_code)]

use spork::document::{NodeRef, parse};
use spork::{Format, ParserOptions, Value};

/// Parse `text` as XML
pub fn xml(text: &str) -> NodeRef {
    parse(text.as_bytes(), Format::Xml, &ParserOptions::default()).expect("valid XML")
}

/// Parse `text` as HTML
pub fn html(text: &str) -> NodeRef {
    parse(text.as_bytes(), Format::Html, &ParserOptions::default()).expect("HTML never fails")
}

/// A list of strings
pub fn strs(items: &[&str]) -> Value {
    Value::List(items.iter().map(|s| Value::from(*s)).collect())
}

/// A list of integers
pub fn ints(items: &[i64]) -> Value {
    Value::List(items.iter().map(|&n| Value::Int(n)).collect())
}

/// Result type alias for tests
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Extract Ok value or panic with context
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("assertion failed: expected Ok, got Err({:?})", e),
        }
    };
    ($expr:expr, $msg:literal) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Extract Some value or panic with context
#[macro_export]
macro_rules! assert_some {
    ($expr:expr) => {
        match $expr {
            Some(v) => v,
            None => panic!("assertion failed: expected Some, got None"),
        }
    };
    ($expr:expr, $msg:literal) => {
        match $expr {
            Some(v) => v,
            None => panic!("{}: got None", $msg),
        }
    };
}
