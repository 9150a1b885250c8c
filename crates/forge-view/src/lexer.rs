//! Template lexer (tokenizer).
//!
//! Converts raw template source into a flat stream of [`Lexeme`]s: literal
//! text, comments, interpolations (`{{ }}`), block tags (`{#name}`,
//! `{:branch}`, `{/name}`), call tags (`{name(args)}`), component tags
//! (`<include-name>`), and attribute spreads (`<tag $attrs>`).
//!
//! Lexing never fails. Anything that looks like a directive but does not
//! complete its syntax stays in the surrounding text.

use std::sync::OnceLock;

use regex::Regex;

/// A token produced by the template lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A literal text segment.
    Text(String),
    /// A comment: `{# ... #}`.
    Comment(String),
    /// An interpolation: `{{ expression }}`. Holds the trimmed inner text.
    Interpolation(String),
    /// A block opener: `{#if $x}`. Holds the name and the trimmed arguments.
    BlockOpen { name: String, args: String },
    /// A block branch: `{:else if $y}`, `{:noitems}`, `{:default}`.
    BlockBranch { name: String, args: String },
    /// A block closer: `{/if}`.
    BlockClose(String),
    /// A call tag: `{name(args)}` or `{Ns\Class::method(args)}`.
    Call { callee: String, args: String },
    /// A component start tag: `<include-name a="v">` or `<include-name />`.
    ComponentOpen {
        name: String,
        attributes: Vec<(String, Option<String>)>,
        self_closing: bool,
    },
    /// A component end tag: `</include-name>`.
    ComponentClose(String),
    /// A `$name` attribute spread inside an HTML start tag.
    AttributeSpread(String),
}

/// A token together with the source text it was lexed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    /// The token.
    pub token: Token,
    /// The exact source text of the token.
    pub source: String,
    /// The 1-based line the token starts on.
    pub line: usize,
}

/// Tokenizes a template source string.
pub fn tokenize(source: &str) -> Vec<Lexeme> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    text: String,
    text_line: usize,
    lexemes: Vec<Lexeme>,
    /// Set while inside an ordinary HTML start tag; holds the open quote, if any.
    in_tag: Option<Option<char>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            text: String::new(),
            text_line: 1,
            lexemes: Vec::new(),
            in_tag: None,
        }
    }

    fn run(mut self) -> Vec<Lexeme> {
        while self.pos < self.input.len() {
            let rest = &self.input[self.pos..];

            if rest.starts_with('{') {
                if let Some((token, len)) = lex_brace(rest) {
                    self.emit(token, len);
                    continue;
                }
            } else if rest.starts_with('<') && self.in_tag.is_none() {
                if let Some((token, len)) = lex_component(rest) {
                    self.emit(token, len);
                    continue;
                }
                if rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
                    self.in_tag = Some(None);
                }
            } else if let Some(quote) = self.in_tag {
                match (quote, rest.chars().next()) {
                    (None, Some('$')) if self.text.ends_with(char::is_whitespace) => {
                        if let Some((token, len)) = lex_spread(rest) {
                            self.emit(token, len);
                            continue;
                        }
                    }
                    (None, Some(q @ ('"' | '\''))) => self.in_tag = Some(Some(q)),
                    (Some(q), Some(c)) if c == q => self.in_tag = Some(None),
                    (None, Some('>')) => self.in_tag = None,
                    _ => {}
                }
            }

            self.push_char();
        }

        self.flush_text();
        self.lexemes
    }

    fn push_char(&mut self) {
        let Some(ch) = self.input[self.pos..].chars().next() else {
            return;
        };
        if self.text.is_empty() {
            self.text_line = self.line;
        }
        self.text.push(ch);
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
        }
    }

    fn emit(&mut self, token: Token, len: usize) {
        self.flush_text();
        let source = self.input[self.pos..self.pos + len].to_string();
        let line = self.line;
        self.line += source.matches('\n').count();
        self.pos += len;
        self.lexemes.push(Lexeme {
            token,
            source,
            line,
        });
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let text = std::mem::take(&mut self.text);
            self.lexemes.push(Lexeme {
                token: Token::Text(text.clone()),
                source: text,
                line: self.text_line,
            });
        }
    }
}

/// Lexes a directive starting with `{`. Returns the token and its byte length.
fn lex_brace(rest: &str) -> Option<(Token, usize)> {
    let second = rest[1..].chars().next()?;
    let starts_ident = |offset: usize| {
        rest[offset..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
    };

    match second {
        '{' => {
            let end = rest[2..].find("}}")? + 2;
            Some((Token::Interpolation(rest[2..end].trim().to_string()), end + 2))
        }
        '#' => {
            if starts_ident(2) {
                if let Some(end) = find_closing(rest, 0).filter(|&end| closes_brace(rest, end)) {
                    if !rest[..end].ends_with('#') {
                        let (name, args) = split_name(&rest[2..end]);
                        return Some((Token::BlockOpen { name, args }, end + 1));
                    }
                }
            }
            let end = rest[2..].find("#}")? + 2;
            Some((Token::Comment(rest[2..end].trim().to_string()), end + 2))
        }
        ':' if starts_ident(2) => {
            let end = find_closing(rest, 0).filter(|&end| closes_brace(rest, end))?;
            let (name, args) = split_name(&rest[2..end]);
            Some((Token::BlockBranch { name, args }, end + 1))
        }
        '/' if starts_ident(2) => {
            let end = rest.find('}')?;
            let name = rest[2..end].trim();
            if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                Some((Token::BlockClose(name.to_string()), end + 1))
            } else {
                None
            }
        }
        _ => lex_call(rest),
    }
}

/// Lexes `{callee(args)}`.
fn lex_call(rest: &str) -> Option<(Token, usize)> {
    static CALL_HEAD: OnceLock<Regex> = OnceLock::new();
    let head = CALL_HEAD.get_or_init(|| {
        Regex::new(r"^\{(\\?[A-Za-z_][A-Za-z0-9_]*(?:(?:\\|::)[A-Za-z_][A-Za-z0-9_]*)*)\(")
            .expect("valid call regex")
    });

    let caps = head.captures(rest)?;
    let callee = caps.get(1)?.as_str().to_string();
    let open = caps.get(0)?.end() - 1;
    let close = find_closing(rest, open)?;
    let after = &rest[close + 1..];
    let trimmed = after.trim_start();
    if !trimmed.starts_with('}') {
        return None;
    }
    let len = close + 1 + (after.len() - trimmed.len()) + 1;
    let args = rest[open + 1..close].trim().to_string();
    Some((Token::Call { callee, args }, len))
}

/// Lexes `<include-name ...>` and `</include-name>`.
fn lex_component(rest: &str) -> Option<(Token, usize)> {
    static OPEN: OnceLock<Regex> = OnceLock::new();
    static CLOSE: OnceLock<Regex> = OnceLock::new();
    static ATTR: OnceLock<Regex> = OnceLock::new();

    let close = CLOSE.get_or_init(|| {
        Regex::new(r"^</include-([A-Za-z0-9_][A-Za-z0-9_.\-]*)\s*>").expect("valid close regex")
    });
    if let Some(caps) = close.captures(rest) {
        let len = caps.get(0)?.end();
        return Some((Token::ComponentClose(caps[1].to_string()), len));
    }

    let open = OPEN.get_or_init(|| {
        Regex::new(r"^<include-([A-Za-z0-9_][A-Za-z0-9_.\-]*)").expect("valid open regex")
    });
    let caps = open.captures(rest)?;
    let name = caps[1].trim_end_matches('.').to_string();
    let name_end = caps.get(0)?.end();

    let tag_end = find_tag_end(rest, name_end)?;
    let mut inner = rest[name_end..tag_end].trim_end();
    let self_closing = inner.ends_with('/');
    if self_closing {
        inner = &inner[..inner.len() - 1];
    }
    if !inner.is_empty() && !inner.starts_with(char::is_whitespace) {
        return None;
    }

    let attr = ATTR.get_or_init(|| {
        Regex::new(r#"([A-Za-z_:@][A-Za-z0-9_:.\-]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'))?"#)
            .expect("valid attribute regex")
    });
    let attributes = attr
        .captures_iter(inner)
        .map(|c| {
            let value = c.get(2).or_else(|| c.get(3)).map(|m| m.as_str().to_string());
            (c[1].to_string(), value)
        })
        .collect();

    Some((
        Token::ComponentOpen {
            name,
            attributes,
            self_closing,
        },
        tag_end + 1,
    ))
}

/// Lexes `$name` inside an HTML start tag.
fn lex_spread(rest: &str) -> Option<(Token, usize)> {
    let ident_len = rest[1..]
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len() - 1);
    if ident_len == 0 || !rest[1..].starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        return None;
    }
    let len = 1 + ident_len;
    match rest[len..].chars().next() {
        Some(c) if c.is_whitespace() || c == '>' || c == '/' => {
            Some((Token::AttributeSpread(rest[1..len].to_string()), len))
        }
        _ => None,
    }
}

/// Splits `name rest of args` into its leading identifier and trimmed remainder.
fn split_name(inner: &str) -> (String, String) {
    let end = inner
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(inner.len());
    (inner[..end].to_string(), inner[end..].trim().to_string())
}

/// Finds the bracket closing the one at `open`, skipping quoted strings and
/// nested brackets of any kind. Returns its byte index.
pub(crate) fn find_closing(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, ch) in s[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            '{' | '(' | '[' => depth += 1,
            '}' | ')' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// `find_closing` stops at the first unbalanced bracket of any kind, which
/// only ends a tag if it is a `}`.
fn closes_brace(s: &str, end: usize) -> bool {
    s.as_bytes().get(end) == Some(&b'}')
}

/// Finds the `>` ending a start tag, skipping quoted attribute values.
fn find_tag_end(s: &str, from: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, ch) in s[from..].char_indices() {
        match (quote, ch) {
            (None, '"' | '\'') => quote = Some(ch),
            (Some(q), c) if c == q => quote = None,
            (None, '>') => return Some(from + i),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(source).into_iter().map(|l| l.token).collect()
    }

    fn text(s: &str) -> Token {
        Token::Text(s.to_string())
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(tokens("Hello world"), vec![text("Hello world")]);
    }

    #[test]
    fn test_empty_template() {
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_interpolation() {
        assert_eq!(
            tokens("Hi {{ $name }}!"),
            vec![
                text("Hi "),
                Token::Interpolation("$name".to_string()),
                text("!")
            ]
        );
    }

    #[test]
    fn test_unclosed_interpolation_is_text() {
        assert_eq!(tokens("{{ $name "), vec![text("{{ $name ")]);
    }

    #[test]
    fn test_comment_multiline() {
        assert_eq!(
            tokens("a{# line one\nline two #}b"),
            vec![
                text("a"),
                Token::Comment("line one\nline two".to_string()),
                text("b")
            ]
        );
    }

    #[test]
    fn test_comment_starting_with_letter() {
        assert_eq!(
            tokens("{#TODO tidy#}x"),
            vec![Token::Comment("TODO tidy".to_string()), text("x")]
        );
    }

    #[test]
    fn test_comment_with_stray_brackets() {
        assert_eq!(
            tokens("x{#Steps: a) lex b] parse #}y"),
            vec![
                text("x"),
                Token::Comment("Steps: a) lex b] parse".to_string()),
                text("y")
            ]
        );
    }

    #[test]
    fn test_comment_starting_with_block_keyword() {
        assert_eq!(
            tokens("{#if you change this #}{#each (sorted) row #}"),
            vec![
                Token::Comment("if you change this".to_string()),
                Token::Comment("each (sorted) row".to_string()),
            ]
        );
    }

    #[test]
    fn test_block_tags() {
        assert_eq!(
            tokens("{#if $a}y{:else if $b}z{:else}w{/if}"),
            vec![
                Token::BlockOpen {
                    name: "if".to_string(),
                    args: "$a".to_string()
                },
                text("y"),
                Token::BlockBranch {
                    name: "else".to_string(),
                    args: "if $b".to_string()
                },
                text("z"),
                Token::BlockBranch {
                    name: "else".to_string(),
                    args: String::new()
                },
                text("w"),
                Token::BlockClose("if".to_string()),
            ]
        );
    }

    #[test]
    fn test_block_open_with_nested_braces() {
        assert_eq!(
            tokens(r#"{#include "card" with {"title": "}"}}"#),
            vec![Token::BlockOpen {
                name: "include".to_string(),
                args: r#""card" with {"title": "}"}"#.to_string()
            }]
        );
    }

    #[test]
    fn test_call_tags() {
        assert_eq!(
            tokens(r"{date('Y', now)}{App\Helpers\Str::upper($x)}"),
            vec![
                Token::Call {
                    callee: "date".to_string(),
                    args: "'Y', now".to_string()
                },
                Token::Call {
                    callee: r"App\Helpers\Str::upper".to_string(),
                    args: "$x".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_call_requires_closing_brace() {
        assert_eq!(tokens("{foo(1) x}"), vec![text("{foo(1) x}")]);
    }

    #[test]
    fn test_lone_braces_are_text() {
        assert_eq!(
            tokens("a { b } c {/ d}"),
            vec![text("a { b } c {/ d}")]
        );
    }

    #[test]
    fn test_component_tags() {
        assert_eq!(
            tokens(r#"<include-ui.card title="X" compact>slot</include-ui.card>"#),
            vec![
                Token::ComponentOpen {
                    name: "ui.card".to_string(),
                    attributes: vec![
                        ("title".to_string(), Some("X".to_string())),
                        ("compact".to_string(), None),
                    ],
                    self_closing: false,
                },
                text("slot"),
                Token::ComponentClose("ui.card".to_string()),
            ]
        );
    }

    #[test]
    fn test_self_closing_component() {
        assert_eq!(
            tokens(r#"<include-alert type='warn' />"#),
            vec![Token::ComponentOpen {
                name: "alert".to_string(),
                attributes: vec![("type".to_string(), Some("warn".to_string()))],
                self_closing: true,
            }]
        );
    }

    #[test]
    fn test_attribute_spread() {
        assert_eq!(
            tokens(r#"<div class="a $b" $attrs>x</div>"#),
            vec![
                text(r#"<div class="a $b" "#),
                Token::AttributeSpread("attrs".to_string()),
                text(">x</div>"),
            ]
        );
    }

    #[test]
    fn test_dollar_outside_tag_is_text() {
        assert_eq!(tokens("costs $5 or $price"), vec![text("costs $5 or $price")]);
    }

    #[test]
    fn test_interpolation_inside_attribute() {
        assert_eq!(
            tokens(r#"<a href="{{ $url }}">"#),
            vec![
                text(r#"<a href=""#),
                Token::Interpolation("$url".to_string()),
                text(r#"">"#),
            ]
        );
    }

    #[test]
    fn test_line_numbers() {
        let lexemes = tokenize("one\ntwo {{ $x }}\n{/if}");
        assert_eq!(lexemes[1].line, 2);
        assert_eq!(lexemes[3].line, 3);
    }

    #[test]
    fn test_source_is_preserved() {
        let lexemes = tokenize("{#if  $a }");
        assert_eq!(lexemes[0].source, "{#if  $a }");
    }

    #[test]
    fn test_find_closing_skips_quotes() {
        assert_eq!(find_closing("(a, ')', (b))", 0), Some(12));
        assert_eq!(find_closing("(unclosed", 0), None);
    }
}
