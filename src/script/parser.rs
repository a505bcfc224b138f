//! Statement splitter for CSS-syntax Spork scripts
//!
//! Parsing is error-tolerant in the way CSS parsers are: a malformed
//! declaration or statement is recorded as an error and skipped, and parsing
//! resumes at the next `;` or block boundary.

use super::{Declaration, Statement, Stylesheet};
use crate::error::ScriptError;

/// Split `source` into statements
pub fn parse_script(source: &str) -> Stylesheet {
    let mut errors = Vec::new();
    let chars = strip_comments(source, &mut errors);
    let mut parser = Parser {
        chars,
        pos: 0,
        errors,
    };
    let statements = parser.statements();
    Stylesheet {
        statements,
        errors: parser.errors,
    }
}

/// Extract the module name from an `@import` prelude
pub(super) fn import_target(prelude: &str) -> Option<String> {
    let prelude = prelude.trim();
    let inner = match prelude.strip_prefix("url(") {
        Some(rest) => rest.strip_suffix(')')?.trim(),
        None => prelude,
    };
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|&q| inner.strip_prefix(q).and_then(|s| s.strip_suffix(q)));
    match unquoted {
        Some(name) => Some(name.to_string()),
        None if prelude.starts_with("url(") && !inner.is_empty() => Some(inner.to_string()),
        None => None,
    }
}

/// Replace comments by spaces, keeping newlines so positions stay valid
fn strip_comments(source: &str, errors: &mut Vec<ScriptError>) -> Vec<char> {
    let input: Vec<char> = source.chars().collect();
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    let mut quote: Option<char> = None;
    while i < input.len() {
        let c = input[i];
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' && i + 1 < input.len() {
                out.push(input[i + 1]);
                i += 2;
                continue;
            }
            if c == q || c == '\n' {
                quote = None;
            }
            i += 1;
            continue;
        }
        if c == '"' || c == '\'' {
            quote = Some(c);
            out.push(c);
            i += 1;
            continue;
        }
        if c == '/' && input.get(i + 1) == Some(&'*') {
            let start = i;
            i += 2;
            out.extend_from_slice(&[' ', ' ']);
            loop {
                if i >= input.len() {
                    let (line, column) = position(&input, start);
                    errors.push(ScriptError::Syntax {
                        line,
                        column,
                        message: "unterminated comment".to_string(),
                    });
                    return out;
                }
                if input[i] == '*' && input.get(i + 1) == Some(&'/') {
                    out.extend_from_slice(&[' ', ' ']);
                    i += 2;
                    break;
                }
                out.push(if input[i] == '\n' { '\n' } else { ' ' });
                i += 1;
            }
            continue;
        }
        out.push(c);
        i += 1;
    }
    out
}

fn position(chars: &[char], pos: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;
    for &c in &chars[..pos.min(chars.len())] {
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => false,
        Some(c) if is_name_char(c) => chars.all(is_name_char),
        _ => false,
    }
}

/// Remove a trailing `!important` priority marker
fn strip_priority(value: &str) -> &str {
    let trimmed = value.trim_end();
    let lower = trimmed.to_ascii_lowercase();
    if let Some(head) = lower.strip_suffix("important") {
        let head = head.trim_end();
        if let Some(head) = head.strip_suffix('!') {
            return trimmed[..head.len()].trim_end();
        }
    }
    trimmed
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    errors: Vec<ScriptError>,
}

/// Where a raw scan stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Char(char),
    Eof,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn error_at(&mut self, pos: usize, message: impl Into<String>) {
        let (line, column) = position(&self.chars, pos);
        self.errors.push(ScriptError::Syntax {
            line,
            column,
            message: message.into(),
        });
    }

    fn line_at(&self, pos: usize) -> usize {
        position(&self.chars, pos).0
    }

    /// Read raw text up to one of `stops` at bracket depth zero
    ///
    /// Strings and `()`, `[]`, `{}` nest; the stop character is not consumed.
    fn scan_until(&mut self, stops: &[char]) -> (String, Stop) {
        let mut out = String::new();
        let mut depth: Vec<char> = Vec::new();
        while let Some(c) = self.peek() {
            if depth.is_empty() && stops.contains(&c) {
                return (out, Stop::Char(c));
            }
            match c {
                '"' | '\'' => {
                    out.push_str(&self.scan_string(c));
                    continue;
                }
                '(' => depth.push(')'),
                '[' => depth.push(']'),
                '{' => depth.push('}'),
                ')' | ']' | '}' => {
                    if depth.last() == Some(&c) {
                        depth.pop();
                    } else if depth.is_empty() {
                        // unbalanced closer at depth zero ends the scan
                        return (out, Stop::Char(c));
                    }
                }
                _ => {}
            }
            out.push(c);
            self.pos += 1;
        }
        (out, Stop::Eof)
    }

    /// Consume a quoted string, returning it with its quotes
    fn scan_string(&mut self, quote: char) -> String {
        let start = self.pos;
        let mut out = String::new();
        out.push(quote);
        self.pos += 1;
        while let Some(c) = self.peek() {
            out.push(c);
            self.pos += 1;
            if c == '\\' {
                if let Some(next) = self.peek() {
                    out.push(next);
                    self.pos += 1;
                }
                continue;
            }
            if c == quote {
                return out;
            }
            if c == '\n' {
                break;
            }
        }
        self.error_at(start, "unterminated string");
        out
    }

    /// Skip a `{ ... }` block whose opening brace is at the cursor
    fn skip_block(&mut self) {
        self.pos += 1;
        let (_, stop) = self.scan_until(&['}']);
        if stop == Stop::Char('}') {
            self.pos += 1;
        }
    }

    fn statements(&mut self) -> Vec<Statement> {
        let mut statements = Vec::new();
        let mut seen_ruleset = false;
        loop {
            self.skip_ws();
            let Some(c) = self.peek() else {
                break;
            };
            let start = self.pos;
            if c == '@' {
                self.pos += 1;
                if let Some(statement) = self.at_rule(start) {
                    if statement.at_keyword().is_some_and(|k| k.eq_ignore_ascii_case("import")) && seen_ruleset {
                        self.error_at(start, "@import rule not allowed after a ruleset");
                        continue;
                    }
                    statements.push(statement);
                }
            } else if c == '}' || c == ';' {
                self.error_at(start, format!("unexpected '{}'", c));
                self.pos += 1;
            } else if let Some(statement) = self.ruleset(start) {
                seen_ruleset = true;
                statements.push(statement);
            }
        }
        statements
    }

    fn at_rule(&mut self, start: usize) -> Option<Statement> {
        let mut keyword = String::new();
        while let Some(c) = self.peek().filter(|&c| is_name_char(c)) {
            keyword.push(c);
            self.pos += 1;
        }
        let (prelude, stop) = self.scan_until(&[';', '{']);
        match stop {
            Stop::Char(';') => self.pos += 1,
            Stop::Char('{') => self.skip_block(),
            Stop::Char(_) | Stop::Eof => {}
        }
        if keyword.is_empty() {
            self.error_at(start, "expected an at-keyword after '@'");
            return None;
        }
        let statement = Statement::AtRule {
            keyword,
            prelude: prelude.trim().to_string(),
            line: self.line_at(start),
        };
        if statement.at_keyword().is_some_and(|k| k.eq_ignore_ascii_case("import"))
            && statement.import_uri().is_none()
        {
            self.error_at(start, "invalid @import rule: expected a string or url()");
            return None;
        }
        Some(statement)
    }

    fn ruleset(&mut self, start: usize) -> Option<Statement> {
        let (selector, stop) = self.scan_until(&['{', ';']);
        match stop {
            Stop::Char('{') => {}
            Stop::Char(c) => {
                self.error_at(start, format!("expected '{{' before '{}'", c));
                self.pos += 1;
                return None;
            }
            Stop::Eof => {
                self.error_at(start, "expected '{' after selector");
                return None;
            }
        }
        self.pos += 1;
        let declarations = self.declarations(start);
        let selector = selector.trim().to_string();
        if selector.is_empty() {
            self.error_at(start, "empty selector");
            return None;
        }
        Some(Statement::Ruleset {
            selector,
            declarations,
            line: self.line_at(start),
        })
    }

    fn declarations(&mut self, block_start: usize) -> Vec<Declaration> {
        let mut declarations = Vec::new();
        loop {
            self.skip_ws();
            let start = self.pos;
            match self.peek() {
                None => {
                    self.error_at(block_start, "unterminated block");
                    return declarations;
                }
                Some('}') => {
                    self.pos += 1;
                    return declarations;
                }
                Some(';') => {
                    self.pos += 1;
                    continue;
                }
                Some(_) => {}
            }

            let (head, stop) = self.scan_until(&[':', ';', '}']);
            if stop != Stop::Char(':') {
                self.error_at(start, "expected ':' in declaration");
                if stop == Stop::Char(';') {
                    self.pos += 1;
                }
                continue;
            }
            self.pos += 1;
            let name = head.trim().to_string();

            let (value, stop) = self.scan_until(&[';', '}']);
            if stop == Stop::Char(';') {
                self.pos += 1;
            }
            if !is_valid_name(&name) {
                self.error_at(start, format!("invalid declaration name '{}'", name));
                continue;
            }
            let value = strip_priority(value.trim());
            if value.is_empty() {
                self.error_at(start, format!("expected a value for '{}'", name));
                continue;
            }
            declarations.push(Declaration {
                name,
                value: value.to_string(),
                line: self.line_at(start),
            });
        }
    }
}
