//! Resolution of compiled selectors against a document subtree

use super::{AttrOp, Combinator, Complex, Compound, Filter, MatchExpr, NsConstraint, Pseudo, TypeTest};
use crate::document::NodeRef;
use crate::error::SelectorError;
use std::collections::BTreeMap;

/// Matching parameters shared by one resolution
struct Context<'a> {
    scope: &'a NodeRef,
    namespaces: &'a BTreeMap<String, String>,
    fold_case: bool,
}

impl MatchExpr {
    /// Resolve this expression against `context`
    ///
    /// Returns the matching elements of the context's descendant-or-self
    /// subtree in document order. `namespaces` maps the prefixes usable in
    /// `prefix|name` selectors to namespace URIs.
    ///
    /// # Errors
    ///
    /// Returns `SelectorError::UnknownPrefix` if the selector uses a prefix
    /// missing from `namespaces`.
    pub fn select(
        &self,
        context: &NodeRef,
        namespaces: &BTreeMap<String, String>,
    ) -> Result<Vec<NodeRef>, SelectorError> {
        for complex in &self.selectors {
            for compound in &complex.compounds {
                check_prefixes(compound, namespaces)?;
            }
        }

        let ctx = Context {
            scope: context,
            namespaces,
            fold_case: context.document().format().is_case_insensitive(),
        };
        Ok(context
            .descendants_or_self()
            .into_iter()
            .filter(|el| self.selectors.iter().any(|s| matches_complex(s, s.compounds.len() - 1, el, &ctx)))
            .collect())
    }

    /// Whether `element` matches, with the whole document as scope
    pub fn matches(&self, element: &NodeRef) -> bool {
        let mut root = element.clone();
        while let Some(parent) = root.parent() {
            root = parent;
        }
        let namespaces = element.document().namespaces();
        let ctx = Context {
            scope: &root,
            namespaces,
            fold_case: element.document().format().is_case_insensitive(),
        };
        self.selectors
            .iter()
            .any(|s| matches_complex(s, s.compounds.len() - 1, element, &ctx))
    }
}

fn check_prefixes(compound: &Compound, namespaces: &BTreeMap<String, String>) -> Result<(), SelectorError> {
    if let Some(TypeTest::Name(NsConstraint::Prefix(p), _) | TypeTest::Universal(NsConstraint::Prefix(p))) =
        &compound.type_test
        && !namespaces.contains_key(p)
    {
        return Err(SelectorError::UnknownPrefix(p.clone()));
    }
    for filter in &compound.filters {
        if let Filter::Not(inner) = filter {
            check_prefixes(inner, namespaces)?;
        }
    }
    Ok(())
}

fn matches_complex(complex: &Complex, index: usize, element: &NodeRef, ctx: &Context<'_>) -> bool {
    if !ctx.scope.contains(element) || !matches_compound(&complex.compounds[index], element, ctx) {
        return false;
    }
    if index == 0 {
        return true;
    }
    let previous = index - 1;
    match complex.combinators[previous] {
        Combinator::Child => element
            .parent()
            .is_some_and(|parent| matches_complex(complex, previous, &parent, ctx)),
        Combinator::Descendant => {
            let mut ancestor = element.parent();
            while let Some(candidate) = ancestor {
                if matches_complex(complex, previous, &candidate, ctx) {
                    return true;
                }
                ancestor = candidate.parent();
            }
            false
        }
        Combinator::Adjacent => preceding_siblings(element)
            .last()
            .is_some_and(|sibling| matches_complex(complex, previous, sibling, ctx)),
        Combinator::Sibling => preceding_siblings(element)
            .iter()
            .any(|sibling| matches_complex(complex, previous, sibling, ctx)),
    }
}

fn preceding_siblings(element: &NodeRef) -> Vec<NodeRef> {
    let siblings = element.siblings();
    let position = siblings.iter().position(|s| s == element).unwrap_or(0);
    siblings[..position].to_vec()
}

fn names_equal(a: &str, b: &str, fold_case: bool) -> bool {
    if fold_case {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}

fn namespace_matches(ns: &NsConstraint, element: &NodeRef, ctx: &Context<'_>) -> bool {
    match ns {
        NsConstraint::Unspecified | NsConstraint::Any => true,
        NsConstraint::NoNamespace => element.namespace().is_none(),
        NsConstraint::Prefix(p) => ctx.namespaces.get(p).map(String::as_str) == element.namespace(),
    }
}

fn attribute_value<'n>(element: &'n NodeRef, name: &str, fold_case: bool) -> Option<&'n str> {
    if fold_case {
        element
            .attributes()
            .iter()
            .find(|a| a.name.local.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    } else {
        element.attribute(name)
    }
}

fn matches_compound(compound: &Compound, element: &NodeRef, ctx: &Context<'_>) -> bool {
    let type_ok = match &compound.type_test {
        None => true,
        Some(TypeTest::Universal(ns)) => namespace_matches(ns, element, ctx),
        Some(TypeTest::Name(ns, local)) => {
            names_equal(element.local_name(), local, ctx.fold_case) && namespace_matches(ns, element, ctx)
        }
    };
    type_ok && compound.filters.iter().all(|f| matches_filter(f, element, ctx))
}

fn matches_filter(filter: &Filter, element: &NodeRef, ctx: &Context<'_>) -> bool {
    match filter {
        Filter::Id(id) => element.attribute("id") == Some(id.as_str()),
        Filter::Class(class) => element
            .attribute("class")
            .is_some_and(|v| v.split_whitespace().any(|c| c == class)),
        Filter::Attribute { name, test } => {
            let Some(value) = attribute_value(element, name, ctx.fold_case) else {
                return false;
            };
            match test {
                None => true,
                Some((op, expected)) => attribute_test(*op, value, expected),
            }
        }
        Filter::Pseudo(pseudo) => matches_pseudo(pseudo, element),
        Filter::Not(inner) => !matches_compound(inner, element, ctx),
    }
}

fn attribute_test(op: AttrOp, value: &str, expected: &str) -> bool {
    match op {
        AttrOp::Equals => value == expected,
        AttrOp::Includes => value.split_whitespace().any(|v| v == expected),
        AttrOp::DashMatch => value == expected || value.starts_with(&format!("{}-", expected)),
        AttrOp::Prefix => !expected.is_empty() && value.starts_with(expected),
        AttrOp::Suffix => !expected.is_empty() && value.ends_with(expected),
        AttrOp::Substring => !expected.is_empty() && value.contains(expected),
    }
}

/// 1-based position of `element` among `siblings`, and the sibling count
fn position_in(element: &NodeRef, siblings: &[NodeRef]) -> (i64, i64) {
    let index = siblings.iter().position(|s| s == element).unwrap_or(0);
    (index as i64 + 1, siblings.len() as i64)
}

fn same_type(element: &NodeRef) -> Vec<NodeRef> {
    let tag = element.tag();
    element
        .siblings()
        .into_iter()
        .filter(|s| s.tag() == tag)
        .collect()
}

fn matches_pseudo(pseudo: &Pseudo, element: &NodeRef) -> bool {
    match pseudo {
        Pseudo::Root => element.parent().is_none(),
        Pseudo::Empty => element.is_empty(),
        Pseudo::Contains(text) => element.itertext().concat().contains(text.as_str()),
        Pseudo::FirstChild | Pseudo::LastChild | Pseudo::OnlyChild | Pseudo::NthChild(_) | Pseudo::NthLastChild(_) => {
            let (index, count) = position_in(element, &element.siblings());
            match pseudo {
                Pseudo::FirstChild => index == 1,
                Pseudo::LastChild => index == count,
                Pseudo::OnlyChild => count == 1,
                Pseudo::NthChild(nth) => nth.matches(index),
                Pseudo::NthLastChild(nth) => nth.matches(count - index + 1),
                _ => false,
            }
        }
        Pseudo::FirstOfType
        | Pseudo::LastOfType
        | Pseudo::OnlyOfType
        | Pseudo::NthOfType(_)
        | Pseudo::NthLastOfType(_) => {
            let (index, count) = position_in(element, &same_type(element));
            match pseudo {
                Pseudo::FirstOfType => index == 1,
                Pseudo::LastOfType => index == count,
                Pseudo::OnlyOfType => count == 1,
                Pseudo::NthOfType(nth) => nth.matches(index),
                Pseudo::NthLastOfType(nth) => nth.matches(count - index + 1),
                _ => false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::document::{parse, NodeRef};
    use crate::error::SelectorError;
    use crate::selector::MatchExpr;
    use crate::types::{Format, ParserOptions};

    fn xml(src: &str) -> NodeRef {
        parse(src.as_bytes(), Format::Xml, &ParserOptions::default()).unwrap()
    }

    fn ids(root: &NodeRef, selector: &str) -> Vec<String> {
        MatchExpr::compile(selector)
            .unwrap()
            .select(root, root.document().namespaces())
            .unwrap()
            .iter()
            .map(|n| n.attribute("id").unwrap_or("?").to_string())
            .collect()
    }

    const LIST: &str = r#"<ul id="u">
        <li id="a" class="x first"/>
        <li id="b"/>
        <p id="c"/>
        <li id="d" class="x"><li id="e"/></li>
    </ul>"#;

    #[test]
    fn test_descendant_or_self_scope() {
        let root = xml(LIST);
        assert_eq!(ids(&root, "ul"), vec!["u"]);
        assert_eq!(ids(&root, "li"), vec!["a", "b", "d", "e"]);
    }

    #[test]
    fn test_child_and_descendant_combinators() {
        let root = xml(LIST);
        assert_eq!(ids(&root, "ul > li"), vec!["a", "b", "d"]);
        assert_eq!(ids(&root, "li li"), vec!["e"]);
    }

    #[test]
    fn test_sibling_combinators() {
        let root = xml(LIST);
        assert_eq!(ids(&root, "li + li"), vec!["b"]);
        assert_eq!(ids(&root, "p ~ li"), vec!["d"]);
        assert_eq!(ids(&root, "p + li"), vec!["d"]);
    }

    #[test]
    fn test_class_id_and_attributes() {
        let root = xml(LIST);
        assert_eq!(ids(&root, ".x"), vec!["a", "d"]);
        assert_eq!(ids(&root, "#c"), vec!["c"]);
        assert_eq!(ids(&root, "[class~=first]"), vec!["a"]);
        assert_eq!(ids(&root, "li:not(.x)"), vec!["b", "e"]);
    }

    #[test]
    fn test_structural_pseudo_classes() {
        let root = xml(LIST);
        assert_eq!(ids(&root, "li:first-child"), vec!["a", "e"]);
        assert_eq!(ids(&root, "li:last-child"), vec!["d", "e"]);
        assert_eq!(ids(&root, "li:only-child"), vec!["e"]);
        assert_eq!(ids(&root, "ul > :nth-child(odd)"), vec!["a", "c"]);
        assert_eq!(ids(&root, "ul > li:nth-of-type(3)"), vec!["d"]);
        assert_eq!(ids(&root, ":root"), vec!["u"]);
        assert_eq!(ids(&root, "p:empty"), vec!["c"]);
    }

    #[test]
    fn test_chain_must_stay_inside_context() {
        let root = xml(LIST);
        let d = MatchExpr::compile("#d").unwrap().select(&root, root.document().namespaces()).unwrap();
        let inner = MatchExpr::compile("ul li").unwrap();
        assert!(inner.select(&d[0], root.document().namespaces()).unwrap().is_empty());
        let nested = MatchExpr::compile("li").unwrap();
        assert_eq!(nested.select(&d[0], root.document().namespaces()).unwrap().len(), 2);
    }

    #[test]
    fn test_namespaced_selectors() {
        let root = xml(r#"<r xmlns:a="urn:a" xmlns:b="urn:b"><a:x id="1"/><b:x id="2"/><x id="3"/></r>"#);
        assert_eq!(ids(&root, "x"), vec!["1", "2", "3"]);
        assert_eq!(ids(&root, "a|x"), vec!["1"]);
        assert_eq!(ids(&root, "|x"), vec!["3"]);
        let err = MatchExpr::compile("c|x")
            .unwrap()
            .select(&root, root.document().namespaces())
            .unwrap_err();
        assert_eq!(err, SelectorError::UnknownPrefix("c".to_string()));
    }

    #[test]
    fn test_html_matching_is_case_insensitive() {
        let root = parse(b"<DIV ID='k' Data-X='1'>t</DIV>", Format::Html, &ParserOptions::default()).unwrap();
        let found = MatchExpr::compile("Div[DATA-X]").unwrap().select(&root, &Default::default()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].attribute("id"), Some("k"));
    }

    #[test]
    fn test_xml_matching_is_case_sensitive() {
        let root = xml("<Doc><Item/></Doc>");
        let found = MatchExpr::compile("item").unwrap().select(&root, &Default::default()).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_contains() {
        let root = xml("<r><p id='1'>alpha <b>beta</b></p><p id='2'>gamma</p></r>");
        assert_eq!(ids(&root, "p:contains('beta')"), vec!["1"]);
    }

    #[test]
    fn test_matches_whole_document() {
        let root = xml(LIST);
        let e = &MatchExpr::compile("#e").unwrap().select(&root, &Default::default()).unwrap()[0];
        assert!(MatchExpr::compile("ul li li").unwrap().matches(e));
        assert!(!MatchExpr::compile("p li").unwrap().matches(e));
    }
}
