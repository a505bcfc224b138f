#![forbid(unsafe_code)]

//! Evaluation of a single declaration
//!
//! Before an expression is parsed its text goes through the shorthand
//! rewrites of the rule language: aliases, `[]`, `#` and `[:]`, then the
//! `$key` attribute placeholders.

use crate::expr::{GlobalScope, Interpreter, Value, parse};
use crate::rules::{Abort, AttributeMapping, NODE_KEY, Namespace};
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Outcome of evaluating a declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: Value,
    /// Replace the variable instead of appending to it
    pub replace: bool,
}

/// Evaluate the declaration `name: raw` against `namespace`
///
/// The namespace is never modified here; merging the result is up to the
/// caller.
///
/// # Errors
///
/// Evaluation errors and flow-control signals raised by the expression.
pub fn evaluate(
    name: &str,
    raw: &str,
    namespace: &Namespace,
    attributes: &mut AttributeMapping,
    globals: &GlobalScope,
) -> Result<Evaluation, Abort> {
    if let Some(value) = namespace.get(raw) {
        return Ok(Evaluation {
            value: value.shallow_copy()?,
            replace: true,
        });
    }

    let mut text = raw.replace("[]", "[-1]");
    let mut replace = false;
    if name != NODE_KEY {
        if namespace.contains_key(name) && text.contains('#') {
            let item = format!("__{}__", name);
            text = format!("[ ({}) for {} in {} ]", text.replace('#', &item), item, name);
            replace = true;
        } else if text.ends_with("[:]") {
            replace = true;
        }
    }
    if attributes.node().is_some() {
        text = substitute(&text, attributes);
    }

    log::debug!("{} <- {}", name, text);
    let expr = parse(&text)?;
    let value = Interpreter::new(globals, namespace).eval(&expr)?;
    Ok(Evaluation { value, replace })
}

/// `$$`, `$id` and `${id}`
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:(\$)|([_A-Za-z][_A-Za-z0-9]*)|\{([_A-Za-z][_A-Za-z0-9]*)\})")
        .expect("placeholder pattern is valid")
});

/// Replace `$key` and `${key}` with attribute source forms
///
/// `$$` becomes `$`; a `$` that starts no valid placeholder is kept as is.
pub fn substitute(text: &str, attributes: &mut AttributeMapping) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| {
            match caps.get(2).or_else(|| caps.get(3)) {
                Some(key) => attributes.resolve(key.as_str()),
                None => "$".to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{NodeRef, parse as parse_document};
    use crate::error::EvalError;
    use crate::types::{Format, ParserOptions};

    fn root(xml: &str) -> NodeRef {
        parse_document(xml.as_bytes(), Format::Xml, &ParserOptions::default()).unwrap()
    }

    fn eval(name: &str, raw: &str, namespace: &Namespace, node: Option<NodeRef>) -> Evaluation {
        let mut attributes = AttributeMapping::new(node);
        evaluate(name, raw, namespace, &mut attributes, &GlobalScope::new()).unwrap()
    }

    #[test]
    fn test_plain_expression_appends() {
        let result = eval("x", "1 + 1", &Namespace::new(), None);
        assert_eq!(result, Evaluation { value: Value::Int(2), replace: false });
    }

    #[test]
    fn test_alias_copies_and_replaces() {
        let mut namespace = Namespace::new();
        namespace.insert("a".to_string(), Value::List(vec![Value::Int(1)]));
        let result = eval("b", "a", &namespace, None);
        assert_eq!(result.value, Value::List(vec![Value::Int(1)]));
        assert!(result.replace);
    }

    #[test]
    fn test_empty_brackets_mean_last_item() {
        let mut namespace = Namespace::new();
        namespace.insert("a".to_string(), Value::List(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(eval("x", "a[]", &namespace, None).value, Value::Int(2));
    }

    #[test]
    fn test_hash_maps_over_existing_variable() {
        let mut namespace = Namespace::new();
        namespace.insert("n".to_string(), Value::List(vec![Value::Int(1), Value::Int(2)]));
        let result = eval("n", "# * 10", &namespace, None);
        assert_eq!(result.value, Value::List(vec![Value::Int(10), Value::Int(20)]));
        assert!(result.replace);
    }

    #[test]
    fn test_hash_on_unbound_name_is_not_rewritten() {
        let result = eval("fresh", "'#'", &Namespace::new(), None);
        assert_eq!(result.value, Value::from("#"));
        assert!(!result.replace);
    }

    #[test]
    fn test_full_slice_replaces() {
        let mut namespace = Namespace::new();
        namespace.insert("a".to_string(), Value::List(vec![Value::Int(3)]));
        let result = eval("x", "a[:]", &namespace, None);
        assert!(result.replace);
        assert_eq!(result.value, Value::List(vec![Value::Int(3)]));
    }

    #[test]
    fn test_discard_name_skips_rewrites() {
        let result = eval("_", "[1][:]", &Namespace::new(), None);
        assert!(!result.replace);
    }

    #[test]
    fn test_placeholders_use_attributes() {
        let doc = root(r#"<a href="/x"><b/></a>"#);
        let b = doc.children()[0].clone();
        let result = eval("link", "$href + '?' + ${href}", &Namespace::new(), Some(b));
        assert_eq!(result.value, Value::from("/x?/x"));
    }

    #[test]
    fn test_placeholders_are_ignored_without_node() {
        let err = evaluate(
            "x",
            "$href",
            &Namespace::new(),
            &mut AttributeMapping::new(None),
            &GlobalScope::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Abort::Error(EvalError::Syntax { .. })));
    }

    #[test]
    fn test_pseudo_placeholders_are_spliced_raw() {
        let doc = root(r#"<doc><h1 id="t">Hi</h1></doc>"#);
        let h1 = doc.children()[0].clone();
        let text = eval("t", "\"$_TEXT\"", &Namespace::new(), Some(h1.clone()));
        assert_eq!(text.value, Value::from("Hi"));
        let tag = eval("g", "\"<${_TAG}>\" + $id", &Namespace::new(), Some(h1));
        assert_eq!(tag.value, Value::from("<h1>t"));
    }

    #[test]
    fn test_substitute_escapes_and_invalid_placeholders() {
        let doc = root(r#"<a n="1"/>"#);
        let mut attributes = AttributeMapping::new(Some(doc));
        assert_eq!(substitute("'$$' + $n", &mut attributes), "'$' + '1'");
        assert_eq!(substitute("'$1 ${}'", &mut attributes), "'$1 ${}'");
        assert_eq!(substitute("$missing", &mut attributes), "''");
    }
}
