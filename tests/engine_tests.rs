//! Integration tests for program runs through the public API
//!
//! These tests cover:
//! - Whole-document runs (accumulation, aliases, unconditional rules)
//! - Attribute placeholders, pseudo-key placeholders and their parent fallback
//! - Flow-control signals at each scope
//! - Selection runs
//! - Imports and namespaced documents

mod common;

use common::{TestResult, html, ints, strs, xml};
use spork::engine::UNCONDITIONAL;
use spork::{EngineOptions, EvalError, FlowControl, Format, ParserOptions, Spork, SporkError, Value};

#[test]
fn test_heading_text_is_collected() -> TestResult {
    let spork = Spork::new("h1 { title: _TEXT }")?;
    let root = html("<html><body><h1>Hi</h1></body></html>");
    let result = spork.run(Some(&root))?;
    assert_eq!(result.len(), 1);
    assert_eq!(result["title"], strs(&["Hi"]));
    Ok(())
}

#[test]
fn test_unconditional_rule_sees_accumulated_values() -> TestResult {
    let spork = Spork::new("h1 { title: _TEXT }\n_ { count: len(title) }")?;
    let root = html("<h1>One</h1><p>text</p><h1>Two</h1>");
    let result = spork.run(Some(&root))?;
    assert_eq!(result["title"], strs(&["One", "Two"]));
    assert_eq!(result["count"], ints(&[2]));
    Ok(())
}

#[test]
fn test_attribute_placeholder_prefers_own_value() -> TestResult {
    let spork = Spork::new("item { vals: $x }")?;
    let root = xml(r#"<list x="parent"><item x="own"/><item/></list>"#);
    let result = spork.run(Some(&root))?;
    assert_eq!(result["vals"], strs(&["own", "parent"]));
    Ok(())
}

#[test]
fn test_attribute_absent_everywhere_is_empty_string() -> TestResult {
    let spork = Spork::new("item { vals: $nowhere }")?;
    let result = spork.run(Some(&xml("<list><item/></list>")))?;
    assert_eq!(result["vals"], strs(&[""]));
    Ok(())
}

#[test]
fn test_pseudo_placeholders_splice_raw_text() -> TestResult {
    let spork = Spork::new(r#"h1 { t: "$_TEXT"; g: "<$_TAG>"; }"#)?;
    let result = spork.run(Some(&xml("<doc><h1>Hi</h1></doc>")))?;
    assert_eq!(result["t"], strs(&["Hi"]));
    assert_eq!(result["g"], strs(&["<h1>"]));
    Ok(())
}

#[test]
fn test_xml_placeholder_inside_a_string() -> TestResult {
    let spork = Spork::new("b { markup: '$_XML'; }")?;
    let result = spork.run(Some(&xml(r#"<a><b k="1">one</b></a>"#)))?;
    assert_eq!(result["markup"], strs(&[r#"<b k="1">one</b>"#]));
    Ok(())
}

#[test]
fn test_bare_xml_placeholder_is_not_an_expression() -> TestResult {
    let spork = Spork::new("b { markup: $_XML; }")?;
    let result = spork.run(Some(&xml("<a><b>one</b></a>")));
    assert!(matches!(result, Err(SporkError::Eval(EvalError::Syntax { .. }))));
    Ok(())
}

#[test]
fn test_hash_rewrite_applies_to_tag_identifier_target() -> TestResult {
    let spork = Spork::new("item { _: _TEXT; _: # + '!'; }")?;
    let result = spork.run(Some(&xml("<list><item>a</item><item>b</item></list>")))?;
    assert_eq!(result["item"], strs(&["a!!", "b!"]));
    Ok(())
}

#[test]
fn test_run_once_rule_has_no_match_expression() -> TestResult {
    let spork = Spork::new(&format!("{} {{ x: 1 }}\nitem {{ y: 2 }}", UNCONDITIONAL))?;
    assert!(spork.rules()[0].match_expr.is_none());
    assert!(spork.rules()[1].match_expr.is_some());
    Ok(())
}

#[test]
fn test_accumulation_yields_one_entry_per_match() -> TestResult {
    let spork = Spork::new("li { items: _TEXT; n: 1 }")?;
    let root = xml("<ul><li>a</li><li>b</li><li>c</li><li>d</li></ul>");
    let result = spork.run(Some(&root))?;
    assert_eq!(result["items"], strs(&["a", "b", "c", "d"]));
    assert_eq!(result["n"], ints(&[1, 1, 1, 1]));
    Ok(())
}

#[test]
fn test_alias_is_an_independent_copy() -> TestResult {
    let spork = Spork::new(
        "li { items: _TEXT }\n\
         _ { snapshot: items }\n\
         li { items: _TEXT.upper() }",
    )?;
    let root = xml("<ul><li>a</li><li>b</li></ul>");
    let result = spork.run(Some(&root))?;
    assert_eq!(result["snapshot"], strs(&["a", "b"]));
    assert_eq!(result["items"], strs(&["a", "b", "A", "B"]));
    Ok(())
}

#[test]
fn test_alias_of_replaced_value_then_append() -> TestResult {
    let spork = Spork::new(
        "_ { base: 1; copy: base }\n\
         _ { copy: 2 }",
    )?;
    let result = spork.run(Some(&xml("<a/>")))?;
    assert_eq!(result["base"], ints(&[1]));
    assert_eq!(result["copy"], ints(&[1, 2]));
    Ok(())
}

#[test]
fn test_empty_sentinel_and_last_item() -> TestResult {
    let spork = Spork::new(
        "_ { none: [] }\n\
         li { items: _TEXT }\n\
         _ { last: items[] }",
    )?;
    let result = spork.run(Some(&xml("<ul><li>a</li><li>b</li></ul>")))?;
    assert_eq!(result["none"], Value::List(vec![]));
    assert_eq!(result["last"], strs(&["b"]));
    Ok(())
}

#[test]
fn test_hash_maps_over_existing_variable() -> TestResult {
    let spork = Spork::new(
        "li { items: _TEXT }\n\
         _ { items: # + '!' }",
    )?;
    let result = spork.run(Some(&xml("<ul><li>a</li><li>b</li></ul>")))?;
    assert_eq!(result["items"], strs(&["a!", "b!"]));
    Ok(())
}

#[test]
fn test_full_slice_replaces_with_expression() -> TestResult {
    let spork = Spork::new(
        "li { items: int(_TEXT) }\n\
         _ { items: sorted(items, reverse=True)[:] }",
    )?;
    let result = spork.run(Some(&xml("<ul><li>2</li><li>3</li><li>1</li></ul>")))?;
    assert_eq!(result["items"], ints(&[3, 2, 1]));
    Ok(())
}

#[test]
fn test_runs_are_idempotent() -> TestResult {
    let spork = Spork::new("li { items: _TEXT }\n_ { n: len(items) }")?;
    let root = xml("<ul><li>a</li><li>b</li></ul>");
    let first = spork.run(Some(&root))?;
    let second = spork.run(Some(&root))?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_selector_signal_only_skips_current_match() -> TestResult {
    let spork = Spork::new(
        "li { _: self.exit(self.SELECTOR) if _TEXT == 'skip' else None; kept: _TEXT }\n\
         _ { after: True }",
    )?;
    let root = xml("<ul><li>a</li><li>skip</li><li>c</li></ul>");
    let result = spork.run(Some(&root))?;
    assert_eq!(result["kept"], strs(&["a", "c"]));
    assert_eq!(result["after"], Value::List(vec![Value::Bool(true)]));
    Ok(())
}

#[test]
fn test_element_signal_in_whole_run_empties_result() -> TestResult {
    let spork = Spork::new("_ { x: 1 }\n_ { _: Spork.exit(Spork.ELEMENT) }")?;
    assert!(spork.run(Some(&xml("<a/>")))?.is_empty());
    Ok(())
}

#[test]
fn test_selection_with_element_and_program_signals() -> TestResult {
    let program = "\
        entry { id: $id }\n\
        entry[draft] { _: self.exit(self.ELEMENT) }\n\
        entry[last] { _: self.exit(self.PROGRAM) }\n";
    let spork = Spork::new(program)?;
    let root = xml(
        r#"<feed>
            <entry id="1"/>
            <entry id="2" draft="yes"/>
            <entry id="3"/>
            <entry id="4" last="yes"/>
            <entry id="5"/>
        </feed>"#,
    );
    let results = spork.select("entry", Some(&root))?;
    let ids: Vec<&Value> = results.iter().map(|(_, ns)| &ns["id"]).collect();
    assert_eq!(ids, vec![&strs(&["1"]), &strs(&["3"])]);
    assert_eq!(results[1].0.attribute("id"), Some("3"));
    Ok(())
}

#[test]
fn test_selection_scopes_rules_to_the_element() -> TestResult {
    let spork = Spork::new("li { items: _TEXT }")?;
    let root = xml("<doc><ul><li>a</li><li>b</li></ul><ul><li>c</li></ul></doc>");
    let results = spork.select("ul", Some(&root))?;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].1["items"], strs(&["a", "b"]));
    assert_eq!(results[1].1["items"], strs(&["c"]));
    Ok(())
}

#[test]
fn test_root_binding_is_available() -> TestResult {
    let spork = Spork::new("_ { root: __.tag }")?;
    let result = spork.run(Some(&xml("<catalog/>")))?;
    assert_eq!(result["root"], strs(&["catalog"]));
    Ok(())
}

#[test]
fn test_imported_modules() -> TestResult {
    let spork = Spork::new(
        "@import 're';\n@import \"math\";\n\
         price { cents: re.sub('[^0-9]', '', _TEXT); whole: math.floor(float(_TEXT[1:])) }",
    )?;
    let result = spork.run(Some(&xml("<p><price>$12.50</price></p>")))?;
    assert_eq!(result["cents"], strs(&["1250"]));
    assert_eq!(result["whole"], ints(&[12]));
    Ok(())
}

#[test]
fn test_unknown_import_is_an_error() {
    let err = Spork::new("@import 'os';").unwrap_err();
    assert!(matches!(err, SporkError::Script(_)));
}

#[test]
fn test_namespaced_documents() -> TestResult {
    let spork = Spork::new("atom|title { t: _TEXT; tag: _TAG }\nentry { _: 1 }")?;
    let root = xml(
        r#"<feed xmlns:atom="http://www.w3.org/2005/Atom"><entry><atom:title>Hello</atom:title></entry></feed>"#,
    );
    let result = spork.run(Some(&root))?;
    assert_eq!(result["t"], strs(&["Hello"]));
    assert_eq!(result["tag"], strs(&["{http://www.w3.org/2005/Atom}title"]));
    assert_eq!(result["entry"], ints(&[1]));
    Ok(())
}

#[test]
fn test_get_root_format_order() -> TestResult {
    let markup = b"<p>unclosed<br></p>";
    let mut spork = Spork::new("br { n: 1 }")?;
    let root = spork.get_root(&markup[..], &ParserOptions::default())?;
    assert_eq!(root.document().format(), Format::Html);

    let options = EngineOptions {
        formats: vec![Format::Xml],
        ..EngineOptions::default()
    };
    let mut strict = Spork::with_options("br { n: 1 }", options)?;
    assert!(matches!(
        strict.get_root(&markup[..], &ParserOptions::default()),
        Err(SporkError::Document(_))
    ));
    Ok(())
}

#[test]
fn test_evaluation_errors_surface_from_selection() -> TestResult {
    let spork = Spork::new("item { v: undefined_name }")?;
    let root = xml("<list><item/></list>");
    assert!(matches!(spork.select("item", Some(&root)), Err(SporkError::Eval(_))));
    assert!(matches!(spork.run(Some(&root)), Err(SporkError::Eval(_))));
    Ok(())
}

#[test]
fn test_flow_control_names() {
    assert_eq!(FlowControl::Selector.to_string(), "Spork.SELECTOR");
    assert!(FlowControl::Default.is_terminal());
    assert!(!FlowControl::Element.is_terminal());
}
