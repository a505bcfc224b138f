#![forbid(unsafe_code)]

//! A `nom`-based parser for the expression language
//!
//! Precedence, loosest first: conditional, `or`, `and`, `not`, comparisons,
//! `+ -`, `* / // %`, unary `- +`, `**`, then postfix attribute access,
//! calls and subscripts.

use super::Value;
use super::ast::{Argument, BinaryOp, BoolOp, CmpOp, Comprehension, Expr, Target, UnaryOp};
use crate::error::EvalError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while_m_n, take_while1},
    character::complete::{anychar, char, digit1, multispace0, one_of, satisfy},
    combinator::{map, not, opt, peek, recognize, value, verify},
    error::{ErrorKind, ParseError},
    multi::{many0, many1, separated_list0},
    sequence::{delimited, pair, preceded, separated_pair, terminated},
};

const KEYWORDS: &[&str] = &[
    "and", "or", "not", "in", "is", "if", "else", "for", "None", "True", "False", "lambda",
];

// --- Main Public Parser ---

/// Parse one expression (a bare `a, b` list is accepted as a tuple)
///
/// # Errors
///
/// Returns `EvalError::Syntax` carrying the source text.
pub fn parse(source: &str) -> Result<Expr, EvalError> {
    let syntax = |message: String| EvalError::Syntax {
        expression: source.to_string(),
        message,
    };
    let offset = |rest: &str| source.len() - rest.len();
    if source.trim().is_empty() {
        return Err(syntax("empty expression".to_string()));
    }
    match terminated(expression_list, multispace0).parse(source) {
        Ok(("", expr)) => Ok(expr),
        Ok((rest, _)) => Err(syntax(format!("unexpected input at offset {}", offset(rest)))),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
            Err(syntax(format!("{} at offset {}", e.message, offset(e.input))))
        }
        Err(nom::Err::Incomplete(_)) => Err(syntax("incomplete expression".to_string())),
    }
}

/// Parse failure: the unparsed input and what went wrong there
#[derive(Debug, Clone, Copy, PartialEq)]
struct SyntaxError<'a> {
    input: &'a str,
    message: &'static str,
}

impl<'a> SyntaxError<'a> {
    fn new(input: &'a str, message: &'static str) -> Self {
        SyntaxError { input, message }
    }
}

impl<'a> ParseError<&'a str> for SyntaxError<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        SyntaxError::new(input, "invalid syntax")
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

type PResult<'a, O> = IResult<&'a str, O, SyntaxError<'a>>;

fn failure<'a, O>(input: &'a str, message: &'static str) -> PResult<'a, O> {
    Err(nom::Err::Failure(SyntaxError::new(input, message)))
}

// --- Combinators & Helpers ---

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(is_word_char),
    ))
    .parse(input)
}

/// A non-keyword identifier
fn name(input: &str) -> PResult<'_, String> {
    map(
        ws(verify(identifier, |word: &str| !KEYWORDS.contains(&word))),
        str::to_string,
    )
    .parse(input)
}

fn keyword<'a>(word: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = SyntaxError<'a>> {
    ws(terminated(tag(word), not(satisfy(is_word_char))))
}

fn symbol<'a>(text: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = SyntaxError<'a>> {
    ws(tag(text))
}

/// Whether `op` followed by `next` spells a longer operator
fn extends(op: &str, next: char) -> bool {
    matches!((op, next), ("*", '*') | ("/", '/') | ("<" | ">" | "=" | "!", '='))
}

/// An operator not immediately continued into a longer one (`*` is not `**`)
fn operator<'a>(op: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = SyntaxError<'a>> {
    ws(terminated(
        tag(op),
        not(verify(anychar, move |next: &char| extends(op, *next))),
    ))
}

fn fold_binary(first: Expr, rest: Vec<(BinaryOp, Expr)>) -> Expr {
    rest.into_iter()
        .fold(first, |left, (op, right)| Expr::Binary(op, Box::new(left), Box::new(right)))
}

fn fold_bool(first: Expr, rest: Vec<Expr>, op: BoolOp) -> Expr {
    rest.into_iter()
        .fold(first, |left, right| Expr::BoolOp(op, Box::new(left), Box::new(right)))
}

// --- Expression Parsers (in order of precedence) ---

fn expression_list(input: &str) -> PResult<'_, Expr> {
    let (input, first) = expression(input)?;
    let (input, rest) = many0(preceded(symbol(","), expression)).parse(input)?;
    let (input, trailing) = opt(symbol(",")).parse(input)?;
    if rest.is_empty() && trailing.is_none() {
        return Ok((input, first));
    }
    let mut items = vec![first];
    items.extend(rest);
    Ok((input, Expr::Tuple(items)))
}

fn expression(input: &str) -> PResult<'_, Expr> {
    let (input, body) = or_expr(input)?;
    let (input, branch) = opt(pair(
        preceded(keyword("if"), or_expr),
        preceded(keyword("else"), expression),
    ))
    .parse(input)?;
    match branch {
        Some((test, orelse)) => Ok((
            input,
            Expr::Conditional {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            },
        )),
        None => Ok((input, body)),
    }
}

fn or_expr(input: &str) -> PResult<'_, Expr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(keyword("or"), and_expr)).parse(input)?;
    Ok((input, fold_bool(first, rest, BoolOp::Or)))
}

fn and_expr(input: &str) -> PResult<'_, Expr> {
    let (input, first) = not_expr(input)?;
    let (input, rest) = many0(preceded(keyword("and"), not_expr)).parse(input)?;
    Ok((input, fold_bool(first, rest, BoolOp::And)))
}

fn not_expr(input: &str) -> PResult<'_, Expr> {
    alt((
        map(preceded(keyword("not"), not_expr), |operand| {
            Expr::Unary(UnaryOp::Not, Box::new(operand))
        }),
        comparison,
    ))
    .parse(input)
}

fn comparison_op(input: &str) -> PResult<'_, CmpOp> {
    alt((
        value(CmpOp::Eq, operator("==")),
        value(CmpOp::NotEq, operator("!=")),
        value(CmpOp::LtE, operator("<=")),
        value(CmpOp::GtE, operator(">=")),
        value(CmpOp::Lt, operator("<")),
        value(CmpOp::Gt, operator(">")),
        value(CmpOp::NotIn, pair(keyword("not"), keyword("in"))),
        value(CmpOp::IsNot, pair(keyword("is"), keyword("not"))),
        value(CmpOp::In, keyword("in")),
        value(CmpOp::Is, keyword("is")),
    ))
    .parse(input)
}

fn comparison(input: &str) -> PResult<'_, Expr> {
    let (input, first) = arith(input)?;
    let (input, links) = many0(pair(comparison_op, arith)).parse(input)?;
    if links.is_empty() {
        Ok((input, first))
    } else {
        Ok((input, Expr::Compare(Box::new(first), links)))
    }
}

fn arith(input: &str) -> PResult<'_, Expr> {
    let (input, first) = term(input)?;
    let (input, rest) = many0(pair(
        alt((
            value(BinaryOp::Add, operator("+")),
            value(BinaryOp::Sub, operator("-")),
        )),
        term,
    ))
    .parse(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn term(input: &str) -> PResult<'_, Expr> {
    let (input, first) = factor(input)?;
    let (input, rest) = many0(pair(
        alt((
            value(BinaryOp::Mul, operator("*")),
            value(BinaryOp::FloorDiv, operator("//")),
            value(BinaryOp::Div, operator("/")),
            value(BinaryOp::Mod, operator("%")),
        )),
        factor,
    ))
    .parse(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn factor(input: &str) -> PResult<'_, Expr> {
    alt((
        map(preceded(operator("-"), factor), |operand| {
            Expr::Unary(UnaryOp::Neg, Box::new(operand))
        }),
        map(preceded(operator("+"), factor), |operand| {
            Expr::Unary(UnaryOp::Pos, Box::new(operand))
        }),
        power,
    ))
    .parse(input)
}

fn power(input: &str) -> PResult<'_, Expr> {
    let (input, base) = postfix(input)?;
    // right-associative, and binds tighter than a unary minus on its left
    let (input, exponent) = opt(preceded(operator("**"), factor)).parse(input)?;
    match exponent {
        Some(exponent) => Ok((
            input,
            Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)),
        )),
        None => Ok((input, base)),
    }
}

enum Trailer {
    Attribute(String),
    Call(Vec<Argument>),
    Index(Expr),
    Slice(Option<Expr>, Option<Expr>, Option<Expr>),
}

fn postfix(input: &str) -> PResult<'_, Expr> {
    let (input, base) = atom(input)?;
    let (input, trailers) = many0(alt((
        map(preceded(symbol("."), ws(identifier)), |attr| {
            Trailer::Attribute(attr.to_string())
        }),
        map(call_arguments, Trailer::Call),
        subscript,
    )))
    .parse(input)?;

    let expr = trailers.into_iter().fold(base, |expr, trailer| match trailer {
        Trailer::Attribute(attr) => Expr::Attribute(Box::new(expr), attr),
        Trailer::Call(args) => Expr::Call {
            func: Box::new(expr),
            args,
        },
        Trailer::Index(index) => Expr::Index(Box::new(expr), Box::new(index)),
        Trailer::Slice(lower, upper, step) => Expr::Slice {
            value: Box::new(expr),
            lower: lower.map(Box::new),
            upper: upper.map(Box::new),
            step: step.map(Box::new),
        },
    });
    Ok((input, expr))
}

fn call_arguments(input: &str) -> PResult<'_, Vec<Argument>> {
    delimited(
        symbol("("),
        terminated(separated_list0(symbol(","), argument), opt(symbol(","))),
        symbol(")"),
    )
    .parse(input)
}

fn argument(input: &str) -> PResult<'_, Argument> {
    alt((
        map(
            separated_pair(name, operator("="), expression),
            |(name, value)| Argument::Keyword(name, value),
        ),
        // a bare generator expression as an argument
        map(
            pair(expression, many0(comprehension_clause)),
            |(value, clauses)| {
                if clauses.is_empty() {
                    Argument::Positional(value)
                } else {
                    Argument::Positional(Expr::ListComp {
                        element: Box::new(value),
                        clauses,
                    })
                }
            },
        ),
    ))
    .parse(input)
}

fn subscript(input: &str) -> PResult<'_, Trailer> {
    let (rest, _) = symbol("[").parse(input)?;
    let (rest, lower) = opt(expression_list).parse(rest)?;
    let (rest, bounds) = opt(preceded(
        symbol(":"),
        pair(opt(expression), opt(preceded(symbol(":"), opt(expression)))),
    ))
    .parse(rest)?;
    let (rest, _) = symbol("]").parse(rest)?;
    match (lower, bounds) {
        (Some(index), None) => Ok((rest, Trailer::Index(index))),
        (None, None) => failure(input, "expected an index"),
        (lower, Some((upper, step))) => Ok((rest, Trailer::Slice(lower, upper, step.flatten()))),
    }
}

fn comprehension_clause(input: &str) -> PResult<'_, Comprehension> {
    let (input, _) = keyword("for").parse(input)?;
    let (input, target) = target_list(input)?;
    let (input, _) = keyword("in").parse(input)?;
    let (input, iter) = or_expr(input)?;
    let (input, conditions) = many0(preceded(keyword("if"), or_expr)).parse(input)?;
    Ok((
        input,
        Comprehension {
            target,
            iter,
            conditions,
        },
    ))
}

fn target_list(input: &str) -> PResult<'_, Target> {
    let (input, first) = single_target(input)?;
    let (input, rest) = many0(preceded(symbol(","), single_target)).parse(input)?;
    let (input, _) = opt(symbol(",")).parse(input)?;
    if rest.is_empty() {
        return Ok((input, first));
    }
    let mut targets = vec![first];
    targets.extend(rest);
    Ok((input, Target::Tuple(targets)))
}

fn single_target(input: &str) -> PResult<'_, Target> {
    alt((
        delimited(symbol("("), target_list, symbol(")")),
        map(name, Target::Name),
    ))
    .parse(input)
}

// --- Atoms ---

fn atom(input: &str) -> PResult<'_, Expr> {
    ws(alt((
        // adjacent literals concatenate
        map(many1(ws(string_literal)), |parts| {
            Expr::Literal(Value::Str(parts.concat()))
        }),
        number,
        constant,
        lambda,
        map(name, Expr::Name),
        parenthesized,
        list_display,
        dict_display,
    )))
    .parse(input)
}

fn constant(input: &str) -> PResult<'_, Expr> {
    map(
        alt((
            value(Value::None, keyword("None")),
            value(Value::Bool(true), keyword("True")),
            value(Value::Bool(false), keyword("False")),
        )),
        Expr::Literal,
    )
    .parse(input)
}

fn lambda(input: &str) -> PResult<'_, Expr> {
    let _ = keyword("lambda").parse(input)?;
    failure(input, "lambda expressions are not supported")
}

/// Contents of a bracketed display up to `close`
enum Display {
    Items { items: Vec<Expr>, trailing_comma: bool },
    Comprehension(Expr, Vec<Comprehension>),
}

fn display_items<'a>(input: &'a str, close: &'static str) -> PResult<'a, Display> {
    if let Ok((rest, _)) = symbol(close).parse(input) {
        return Ok((
            rest,
            Display::Items {
                items: Vec::new(),
                trailing_comma: false,
            },
        ));
    }
    let (input, first) = expression(input)?;
    let (input, clauses) = many0(comprehension_clause).parse(input)?;
    if !clauses.is_empty() {
        let (input, _) = symbol(close).parse(input)?;
        return Ok((input, Display::Comprehension(first, clauses)));
    }
    let (input, rest) = many0(preceded(symbol(","), expression)).parse(input)?;
    let (input, trailing) = opt(symbol(",")).parse(input)?;
    let (input, _) = symbol(close).parse(input)?;
    let mut items = vec![first];
    items.extend(rest);
    Ok((
        input,
        Display::Items {
            items,
            trailing_comma: trailing.is_some(),
        },
    ))
}

fn parenthesized(input: &str) -> PResult<'_, Expr> {
    let (input, _) = char('(').parse(input)?;
    let (input, display) = display_items(input, ")")?;
    let expr = match display {
        Display::Comprehension(element, clauses) => Expr::ListComp {
            element: Box::new(element),
            clauses,
        },
        Display::Items {
            mut items,
            trailing_comma: false,
        } if items.len() == 1 => items.remove(0),
        Display::Items { items, .. } => Expr::Tuple(items),
    };
    Ok((input, expr))
}

fn list_display(input: &str) -> PResult<'_, Expr> {
    let (input, _) = char('[').parse(input)?;
    let (input, display) = display_items(input, "]")?;
    let expr = match display {
        Display::Comprehension(element, clauses) => Expr::ListComp {
            element: Box::new(element),
            clauses,
        },
        Display::Items { items, .. } => Expr::List(items),
    };
    Ok((input, expr))
}

fn dict_display(input: &str) -> PResult<'_, Expr> {
    map(
        delimited(
            symbol("{"),
            terminated(
                separated_list0(
                    symbol(","),
                    separated_pair(expression, symbol(":"), expression),
                ),
                opt(symbol(",")),
            ),
            symbol("}"),
        ),
        Expr::Dict,
    )
    .parse(input)
}

// --- Literal Parsers ---

fn digits(input: &str) -> PResult<'_, &str> {
    recognize(pair(digit1, take_while(|c: char| c.is_ascii_digit() || c == '_'))).parse(input)
}

fn number(input: &str) -> PResult<'_, Expr> {
    alt((radix_integer, decimal_number)).parse(input)
}

/// `0x1f`, `0o17`, `0b101`
fn radix_integer(input: &str) -> PResult<'_, Expr> {
    let (rest, (marker, body)) = preceded(
        char('0'),
        pair(
            one_of("xXoObB"),
            take_while1(|c: char| c.is_ascii_hexdigit() || c == '_'),
        ),
    )
    .parse(input)?;
    let radix = match marker {
        'x' | 'X' => 16,
        'o' | 'O' => 8,
        _ => 2,
    };
    let cleaned: String = body.chars().filter(|&c| c != '_').collect();
    match i64::from_str_radix(&cleaned, radix) {
        Ok(n) => Ok((rest, Expr::Literal(Value::Int(n)))),
        Err(_) => failure(input, "invalid number literal"),
    }
}

fn decimal_number(input: &str) -> PResult<'_, Expr> {
    let (rest, text) = recognize((
        alt((
            recognize((digits, opt((char('.'), opt(digits))))),
            recognize((char('.'), digits)),
        )),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)?;
    let cleaned: String = text.chars().filter(|&c| c != '_').collect();
    if cleaned.contains(['.', 'e', 'E']) {
        match cleaned.parse::<f64>() {
            Ok(f) => Ok((rest, Expr::Literal(Value::Float(f)))),
            Err(_) => failure(input, "invalid number literal"),
        }
    } else {
        match cleaned.parse::<i64>() {
            Ok(n) => Ok((rest, Expr::Literal(Value::Int(n)))),
            Err(_) => failure(input, "integer literal too large"),
        }
    }
}

/// A quoted string with an optional `r`, `b` or `u` prefix
fn string_literal(input: &str) -> PResult<'_, String> {
    let (input, prefix) = terminated(
        take_while_m_n(0, 2, |c: char| matches!(c, 'r' | 'R' | 'b' | 'B' | 'u' | 'U')),
        peek(one_of("'\"")),
    )
    .parse(input)?;
    quoted(input, prefix.contains(['r', 'R']))
}

fn quoted(input: &str, raw: bool) -> PResult<'_, String> {
    let (body, close) = alt((tag("'''"), tag("\"\"\""), tag("'"), tag("\""))).parse(input)?;
    let triple = close.len() == 3;
    let mut out = String::new();
    let mut chars = body.char_indices();

    while let Some((i, c)) = chars.next() {
        if body[i..].starts_with(close) {
            return Ok((&body[i + close.len()..], out));
        }
        if c == '\n' && !triple {
            break;
        }
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some((_, next)) = chars.next() else {
            break;
        };
        if raw {
            out.push('\\');
            out.push(next);
            continue;
        }
        match next {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            '\\' | '\'' | '"' => out.push(next),
            '\n' => {}
            'x' | 'u' | 'U' => {
                let width = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let hex: String = chars.by_ref().take(width).map(|(_, h)| h).collect();
                let decoded = (hex.chars().count() == width)
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(ch) => out.push(ch),
                    None => return failure(&body[i..], "invalid escape sequence"),
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    failure(input, "unterminated string literal")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> Expr {
        Expr::Name(n.to_string())
    }

    fn int(n: i64) -> Expr {
        Expr::Literal(Value::Int(n))
    }

    fn literal(source: &str) -> Value {
        match parse(source) {
            Ok(Expr::Literal(value)) => value,
            other => panic!("{}: expected a literal, got {:?}", source, other),
        }
    }

    #[test]
    fn test_numbers() {
        assert_eq!(literal("1"), Value::Int(1));
        assert_eq!(literal("2.5"), Value::Float(2.5));
        assert_eq!(literal(".5"), Value::Float(0.5));
        assert_eq!(literal("1e3"), Value::Float(1000.0));
        assert_eq!(literal("0x1f"), Value::Int(31));
        assert_eq!(literal("0b101"), Value::Int(5));
        assert_eq!(literal("1_000"), Value::Int(1000));
    }

    #[test]
    fn test_integer_overflow_is_a_syntax_error() {
        match parse("99999999999999999999") {
            Err(EvalError::Syntax { message, .. }) => {
                assert!(message.starts_with("integer literal too large"), "{}", message)
            }
            other => panic!("expected a syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_method_call_on_subscript() {
        assert_eq!(
            parse("x[1].y").unwrap(),
            Expr::Attribute(
                Box::new(Expr::Index(Box::new(name("x")), Box::new(int(1)))),
                "y".to_string()
            )
        );
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(literal(r#"'a\'b'"#), Value::from("a'b"));
        assert_eq!(literal(r#""x\ty""#), Value::from("x\ty"));
        assert_eq!(literal(r"'\x41é'"), Value::from("Aé"));
        assert_eq!(literal(r"'é'"), Value::from("é"));
    }

    #[test]
    fn test_raw_strings_keep_backslashes() {
        assert_eq!(literal(r"r'\d+'"), Value::from(r"\d+"));
        assert_eq!(literal(r"u'x'"), Value::from("x"));
    }

    #[test]
    fn test_triple_quoted_string() {
        assert_eq!(literal("'''a\nb'''"), Value::from("a\nb"));
        assert_eq!(literal(r#""""it's""""#), Value::from("it's"));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(parse("'abc"), Err(EvalError::Syntax { .. })));
        assert!(matches!(parse("'a\nb'"), Err(EvalError::Syntax { .. })));
    }

    #[test]
    fn test_operators_longest_match() {
        assert_eq!(
            parse("a**b//c").unwrap(),
            Expr::Binary(
                BinaryOp::FloorDiv,
                Box::new(Expr::Binary(BinaryOp::Pow, Box::new(name("a")), Box::new(name("b")))),
                Box::new(name("c"))
            )
        );
    }

    #[test]
    fn test_keywords_need_word_boundaries() {
        assert_eq!(parse("format").unwrap(), name("format"));
        assert_eq!(parse("index").unwrap(), name("index"));
        assert_eq!(parse("nothing").unwrap(), name("nothing"));
        assert!(matches!(parse("x.is_done").unwrap(), Expr::Attribute(_, ref a) if a == "is_done"));
    }

    #[test]
    fn test_precedence() {
        let expr = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(int(1)),
                Box::new(Expr::Binary(BinaryOp::Mul, Box::new(int(2)), Box::new(int(3))))
            )
        );
    }

    #[test]
    fn test_subtraction_is_left_associative() {
        assert_eq!(
            parse("1 - 2 - 3").unwrap(),
            Expr::Binary(
                BinaryOp::Sub,
                Box::new(Expr::Binary(BinaryOp::Sub, Box::new(int(1)), Box::new(int(2)))),
                Box::new(int(3))
            )
        );
    }

    #[test]
    fn test_unary_minus_binds_looser_than_power() {
        let expr = parse("-2 ** 2").unwrap();
        assert!(matches!(expr, Expr::Unary(UnaryOp::Neg, _)));
    }

    #[test]
    fn test_negative_index() {
        let expr = parse("title[-1]").unwrap();
        assert_eq!(
            expr,
            Expr::Index(
                Box::new(name("title")),
                Box::new(Expr::Unary(UnaryOp::Neg, Box::new(int(1))))
            )
        );
    }

    #[test]
    fn test_slices() {
        assert!(matches!(
            parse("x[:]").unwrap(),
            Expr::Slice {
                lower: None,
                upper: None,
                step: None,
                ..
            }
        ));
        assert!(matches!(
            parse("x[1:-1]").unwrap(),
            Expr::Slice {
                lower: Some(_),
                upper: Some(_),
                step: None,
                ..
            }
        ));
        assert!(matches!(
            parse("x[::2]").unwrap(),
            Expr::Slice {
                lower: None,
                upper: None,
                step: Some(_),
                ..
            }
        ));
        assert!(matches!(parse("x[]"), Err(EvalError::Syntax { .. })));
    }

    #[test]
    fn test_comprehension() {
        let expr = parse("[ (__t__.upper()) for __t__ in t if __t__ ]").unwrap();
        match expr {
            Expr::ListComp { clauses, .. } => {
                assert_eq!(clauses.len(), 1);
                assert_eq!(clauses[0].target, Target::Name("__t__".to_string()));
                assert_eq!(clauses[0].conditions.len(), 1);
            }
            other => panic!("expected a comprehension, got {:?}", other),
        }
    }

    #[test]
    fn test_tuple_target() {
        let expr = parse("[k for k, v in d.items()]").unwrap();
        match expr {
            Expr::ListComp { clauses, .. } => assert!(matches!(clauses[0].target, Target::Tuple(_))),
            other => panic!("expected a comprehension, got {:?}", other),
        }
    }

    #[test]
    fn test_generator_argument() {
        let expr = parse("sum(x for x in xs)").unwrap();
        match expr {
            Expr::Call { args, .. } => {
                assert!(matches!(args[0], Argument::Positional(Expr::ListComp { .. })))
            }
            other => panic!("expected a call, got {:?}", other),
        }
    }

    #[test]
    fn test_keyword_arguments() {
        let expr = parse("self.exit(how=self.ELEMENT)").unwrap();
        match expr {
            Expr::Call { func, args } => {
                assert!(matches!(*func, Expr::Attribute(_, ref m) if m == "exit"));
                assert!(matches!(args[0], Argument::Keyword(ref k, _) if k == "how"));
            }
            other => panic!("expected a call, got {:?}", other),
        }
    }

    #[test]
    fn test_equality_argument_is_positional() {
        match parse("f(a == b)").unwrap() {
            Expr::Call { args, .. } => {
                assert!(matches!(args[0], Argument::Positional(Expr::Compare(..))))
            }
            other => panic!("expected a call, got {:?}", other),
        }
    }

    #[test]
    fn test_chained_comparison() {
        match parse("0 < x <= 10").unwrap() {
            Expr::Compare(_, links) => {
                assert_eq!(links.len(), 2);
                assert_eq!(links[0].0, CmpOp::Lt);
                assert_eq!(links[1].0, CmpOp::LtE);
            }
            other => panic!("expected a comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_not_in_and_is_not() {
        assert!(matches!(
            parse("a not in b").unwrap(),
            Expr::Compare(_, ref links) if links[0].0 == CmpOp::NotIn
        ));
        assert!(matches!(
            parse("a is not None").unwrap(),
            Expr::Compare(_, ref links) if links[0].0 == CmpOp::IsNot
        ));
    }

    #[test]
    fn test_conditional() {
        assert!(matches!(
            parse("a if b else c").unwrap(),
            Expr::Conditional { .. }
        ));
    }

    #[test]
    fn test_tuples() {
        assert_eq!(parse("(1,)").unwrap(), Expr::Tuple(vec![int(1)]));
        assert_eq!(parse("1, 2").unwrap(), Expr::Tuple(vec![int(1), int(2)]));
        assert_eq!(parse("(1)").unwrap(), int(1));
        assert_eq!(parse("()").unwrap(), Expr::Tuple(vec![]));
    }

    #[test]
    fn test_dict_display() {
        match parse("{'a': 1, 'b': [2]}").unwrap() {
            Expr::Dict(pairs) => assert_eq!(pairs.len(), 2),
            other => panic!("expected a dict, got {:?}", other),
        }
    }

    #[test]
    fn test_adjacent_strings_concatenate() {
        assert_eq!(
            parse("'a' \"b\"").unwrap(),
            Expr::Literal(Value::Str("ab".to_string()))
        );
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(parse("1 +"), Err(EvalError::Syntax { .. })));
        assert!(matches!(parse("(1"), Err(EvalError::Syntax { .. })));
        assert!(matches!(parse("a b"), Err(EvalError::Syntax { .. })));
        assert!(matches!(parse(""), Err(EvalError::Syntax { .. })));
        assert!(matches!(parse("a ? b"), Err(EvalError::Syntax { .. })));
        assert!(matches!(parse("$href"), Err(EvalError::Syntax { .. })));
    }

    #[test]
    fn test_lambda_is_rejected() {
        match parse("lambda x: x") {
            Err(EvalError::Syntax { message, .. }) => {
                assert!(message.starts_with("lambda expressions are not supported"))
            }
            other => panic!("expected a syntax error, got {:?}", other),
        }
    }
}
