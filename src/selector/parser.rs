//! A `nom`-based parser for CSS selector groups

use super::{AttrOp, Combinator, Complex, Compound, Filter, NsConstraint, Nth, Pseudo, TypeTest};
use crate::error::SelectorError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, tag_no_case},
    character::complete::{anychar, char, digit1, multispace0, multispace1, one_of, satisfy},
    combinator::{map, map_res, not, opt, recognize, success, value},
    multi::{fold_many0, many0, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
};

pub(super) fn parse(selector: &str) -> Result<Vec<Complex>, SelectorError> {
    let syntax = |message: String| SelectorError::Syntax {
        selector: selector.to_string(),
        message,
    };
    match separated_list1(ws(char(',')), complex).parse(selector.trim()) {
        Ok(("", group)) => Ok(group),
        Ok((rem, _)) => Err(syntax(format!("unexpected input: '{}'", rem))),
        Err(e) => Err(syntax(e.to_string())),
    }
}

// --- Combinators & Helpers ---

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

/// `( inner )` directly after a functional pseudo-class name
fn parenthesized<'a, F, O>(inner: F) -> impl Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>
where
    F: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    delimited(pair(char('('), multispace0), inner, pair(multispace0, char(')')))
}

fn reject<O>(input: &str) -> IResult<&str, O> {
    Err(nom::Err::Failure(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Verify,
    )))
}

fn push(mut text: String, c: char) -> String {
    text.push(c);
    text
}

// --- Lexical Parsers ---

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '-' || !c.is_ascii()
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c.is_ascii_digit()
}

fn escaped(input: &str) -> IResult<&str, char> {
    preceded(char('\\'), anychar).parse(input)
}

/// An identifier; `\x` escapes any character
fn ident(input: &str) -> IResult<&str, String> {
    let (input, first) = alt((satisfy(is_name_start), escaped)).parse(input)?;
    fold_many0(
        alt((satisfy(is_name_char), escaped)),
        move || first.to_string(),
        push,
    )
    .parse(input)
}

fn quoted<'a>(quote: char) -> impl Parser<&'a str, Output = String, Error = nom::error::Error<&'a str>> {
    delimited(
        char(quote),
        fold_many0(
            alt((
                preceded(char('\\'), anychar),
                satisfy(move |c| c != quote && c != '\\'),
            )),
            String::new,
            push,
        ),
        char(quote),
    )
}

fn string_literal(input: &str) -> IResult<&str, String> {
    alt((quoted('"'), quoted('\''))).parse(input)
}

// --- Selector Parsers ---

fn complex(input: &str) -> IResult<&str, Complex> {
    let (input, first) = compound(input)?;
    let (input, rest) = many0(pair(combinator, compound)).parse(input)?;
    let (combinators, tail): (Vec<_>, Vec<_>) = rest.into_iter().unzip();
    let mut compounds = vec![first];
    compounds.extend(tail);
    Ok((
        input,
        Complex {
            compounds,
            combinators,
        },
    ))
}

fn combinator(input: &str) -> IResult<&str, Combinator> {
    alt((
        ws(alt((
            value(Combinator::Child, char('>')),
            value(Combinator::Adjacent, char('+')),
            value(Combinator::Sibling, char('~')),
        ))),
        value(Combinator::Descendant, multispace1),
    ))
    .parse(input)
}

fn compound(input: &str) -> IResult<&str, Compound> {
    let (rest, type_test) = opt(type_test).parse(input)?;
    let (rest, filters) = many0(filter).parse(rest)?;
    if type_test.is_none() && filters.is_empty() {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }
    Ok((rest, Compound { type_test, filters }))
}

/// `*` or a name
fn name_or_universal(input: &str) -> IResult<&str, Option<String>> {
    alt((value(None, char('*')), map(ident, Some))).parse(input)
}

fn type_test(input: &str) -> IResult<&str, TypeTest> {
    let namespace_bar = terminated(char('|'), not(char('=')));
    let prefix = alt((
        value(NsConstraint::Any, char('*')),
        map(ident, NsConstraint::Prefix),
    ));
    let (input, ns) = alt((
        map(terminated(opt(prefix), namespace_bar), |prefix| {
            prefix.unwrap_or(NsConstraint::NoNamespace)
        }),
        success(NsConstraint::Unspecified),
    ))
    .parse(input)?;
    let (input, name) = name_or_universal(input)?;
    Ok((
        input,
        match name {
            None => TypeTest::Universal(ns),
            Some(name) => TypeTest::Name(ns, name),
        },
    ))
}

fn filter(input: &str) -> IResult<&str, Filter> {
    alt((
        map(preceded(char('#'), ident), Filter::Id),
        map(preceded(char('.'), ident), Filter::Class),
        attribute,
        pseudo,
    ))
    .parse(input)
}

fn attr_op(input: &str) -> IResult<&str, AttrOp> {
    alt((
        value(AttrOp::Equals, tag("=")),
        value(AttrOp::Includes, tag("~=")),
        value(AttrOp::DashMatch, tag("|=")),
        value(AttrOp::Prefix, tag("^=")),
        value(AttrOp::Suffix, tag("$=")),
        value(AttrOp::Substring, tag("*=")),
    ))
    .parse(input)
}

fn attribute(input: &str) -> IResult<&str, Filter> {
    let (input, name) = preceded(char('['), ws(ident)).parse(input)?;
    let (input, test) = opt(pair(attr_op, ws(alt((string_literal, ident))))).parse(input)?;
    let (input, _) = char(']').parse(input)?;
    Ok((input, Filter::Attribute { name, test }))
}

fn pseudo(input: &str) -> IResult<&str, Filter> {
    let (rest, name) = preceded(char(':'), ident).parse(input)?;
    let name = name.to_ascii_lowercase();
    let simple = match name.as_str() {
        "first-child" => Some(Pseudo::FirstChild),
        "last-child" => Some(Pseudo::LastChild),
        "only-child" => Some(Pseudo::OnlyChild),
        "first-of-type" => Some(Pseudo::FirstOfType),
        "last-of-type" => Some(Pseudo::LastOfType),
        "only-of-type" => Some(Pseudo::OnlyOfType),
        "empty" => Some(Pseudo::Empty),
        "root" => Some(Pseudo::Root),
        _ => None,
    };
    if let Some(pseudo) = simple {
        return Ok((rest, Filter::Pseudo(pseudo)));
    }

    match name.as_str() {
        "not" => map(parenthesized(compound), |inner| Filter::Not(Box::new(inner))).parse(rest),
        "contains" => map(parenthesized(alt((string_literal, ident))), |text| {
            Filter::Pseudo(Pseudo::Contains(text))
        })
        .parse(rest),
        "nth-child" => map(parenthesized(nth), |n| Filter::Pseudo(Pseudo::NthChild(n))).parse(rest),
        "nth-last-child" => {
            map(parenthesized(nth), |n| Filter::Pseudo(Pseudo::NthLastChild(n))).parse(rest)
        }
        "nth-of-type" => map(parenthesized(nth), |n| Filter::Pseudo(Pseudo::NthOfType(n))).parse(rest),
        "nth-last-of-type" => {
            map(parenthesized(nth), |n| Filter::Pseudo(Pseudo::NthLastOfType(n))).parse(rest)
        }
        // unsupported pseudo-classes fail the whole selector
        _ => reject(input),
    }
}

// --- an+b ---

fn integer(input: &str) -> IResult<&str, i64> {
    map_res(recognize(pair(opt(one_of("+-")), digit1)), str::parse::<i64>).parse(input)
}

/// The `an` part; a bare `n` is `1n`
fn nth_step(input: &str) -> IResult<&str, i64> {
    let coefficient = alt((
        integer,
        value(1, char('+')),
        value(-1, char('-')),
    ));
    map(terminated(opt(coefficient), one_of("nN")), |a| a.unwrap_or(1)).parse(input)
}

fn nth_offset(input: &str) -> IResult<&str, i64> {
    let (input, sign) = ws(one_of("+-")).parse(input)?;
    let (input, b) = map_res(digit1, str::parse::<i64>).parse(input)?;
    Ok((input, if sign == '-' { -b } else { b }))
}

fn nth(input: &str) -> IResult<&str, Nth> {
    alt((
        value(Nth { a: 2, b: 1 }, tag_no_case("odd")),
        value(Nth { a: 2, b: 0 }, tag_no_case("even")),
        map(pair(nth_step, opt(nth_offset)), |(a, b)| Nth {
            a,
            b: b.unwrap_or(0),
        }),
        map(integer, |b| Nth { a: 0, b }),
    ))
    .parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(selector: &str) -> Complex {
        let mut group = parse(selector).unwrap();
        assert_eq!(group.len(), 1);
        group.remove(0)
    }

    fn nth_of(text: &str) -> Option<Nth> {
        match nth(text) {
            Ok(("", n)) => Some(n),
            _ => None,
        }
    }

    #[test]
    fn test_type_and_class() {
        let complex = single("div.note");
        assert_eq!(complex.compounds.len(), 1);
        let compound = &complex.compounds[0];
        assert_eq!(
            compound.type_test,
            Some(TypeTest::Name(NsConstraint::Unspecified, "div".to_string()))
        );
        assert_eq!(compound.filters, vec![Filter::Class("note".to_string())]);
    }

    #[test]
    fn test_combinators() {
        let complex = single("ul > li + li ~ p a");
        assert_eq!(
            complex.combinators,
            vec![
                Combinator::Child,
                Combinator::Adjacent,
                Combinator::Sibling,
                Combinator::Descendant
            ]
        );
    }

    #[test]
    fn test_group() {
        assert_eq!(parse("h1, h2 ,h3").unwrap().len(), 3);
    }

    #[test]
    fn test_namespace_prefixes() {
        let complex = single("atom|entry");
        assert_eq!(
            complex.compounds[0].type_test,
            Some(TypeTest::Name(
                NsConstraint::Prefix("atom".to_string()),
                "entry".to_string()
            ))
        );
        let complex = single("*|*");
        assert_eq!(
            complex.compounds[0].type_test,
            Some(TypeTest::Universal(NsConstraint::Any))
        );
        let complex = single("|p");
        assert_eq!(
            complex.compounds[0].type_test,
            Some(TypeTest::Name(NsConstraint::NoNamespace, "p".to_string()))
        );
    }

    #[test]
    fn test_attribute_operators() {
        let complex = single("a[href^='http'][lang|=en][ rel ]");
        assert_eq!(
            complex.compounds[0].filters,
            vec![
                Filter::Attribute {
                    name: "href".to_string(),
                    test: Some((AttrOp::Prefix, "http".to_string()))
                },
                Filter::Attribute {
                    name: "lang".to_string(),
                    test: Some((AttrOp::DashMatch, "en".to_string()))
                },
                Filter::Attribute {
                    name: "rel".to_string(),
                    test: None
                },
            ]
        );
    }

    #[test]
    fn test_escaped_identifiers() {
        let complex = single(r"#a\.b");
        assert_eq!(complex.compounds[0].filters, vec![Filter::Id("a.b".to_string())]);
        let complex = single(r#"[title="say \"hi\""]"#);
        assert_eq!(
            complex.compounds[0].filters,
            vec![Filter::Attribute {
                name: "title".to_string(),
                test: Some((AttrOp::Equals, "say \"hi\"".to_string()))
            }]
        );
    }

    #[test]
    fn test_pseudo_classes() {
        let complex = single("tr:nth-child(2n+1):not(.hidden):contains('x')");
        let filters = &complex.compounds[0].filters;
        assert_eq!(filters[0], Filter::Pseudo(Pseudo::NthChild(Nth { a: 2, b: 1 })));
        assert!(matches!(filters[1], Filter::Not(_)));
        assert_eq!(filters[2], Filter::Pseudo(Pseudo::Contains("x".to_string())));
    }

    #[test]
    fn test_nth_forms() {
        assert_eq!(nth_of("odd"), Some(Nth { a: 2, b: 1 }));
        assert_eq!(nth_of("EVEN"), Some(Nth { a: 2, b: 0 }));
        assert_eq!(nth_of("3"), Some(Nth { a: 0, b: 3 }));
        assert_eq!(nth_of("-n+3"), Some(Nth { a: -1, b: 3 }));
        assert_eq!(nth_of("2n - 1"), Some(Nth { a: 2, b: -1 }));
        assert_eq!(nth_of("n"), Some(Nth { a: 1, b: 0 }));
        assert_eq!(nth_of("x"), None);
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse("").is_err());
        assert!(parse("div >").is_err());
        assert!(parse("a[href").is_err());
        assert!(parse("p::before").is_err());
        assert!(parse("p:hover").is_err());
        assert!(parse("a,,b").is_err());
        assert!(parse("li:nth-child(3n+)").is_err());
    }
}
