//! `{{ expr | filter(args) }}` interpolation.
//!
//! Covers plain variables, array and property access, escaping via
//! `escape(...)`, the `default(...)` fallback, and any registered callable
//! used as a filter.

use forge_core::error::ForgeResult;

use super::DirectiveHandler;
use crate::context::Value;
use crate::expr::Expr;
use crate::lexer::{Lexeme, Token};
use crate::parser::{FilterCall, Node, Parser};

/// Compiles interpolations.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterpolationHandler;

impl DirectiveHandler for InterpolationHandler {
    fn name(&self) -> &'static str {
        "interpolation"
    }

    fn compile(&self, lexeme: &Lexeme, _parser: &mut Parser<'_>) -> ForgeResult<Option<Node>> {
        let Token::Interpolation(inner) = &lexeme.token else {
            return Ok(None);
        };
        Ok(parse_interpolation(inner).map(|(expr, filters)| Node::Output { expr, filters }))
    }
}

fn parse_interpolation(inner: &str) -> Option<(Expr, Vec<FilterCall>)> {
    let segments = split_on_pipes(inner);
    let (first, rest) = segments.split_first()?;
    let expr = Expr::parse(first).ok()?;
    let filters = rest
        .iter()
        .map(|segment| parse_filter(segment))
        .collect::<Option<Vec<_>>>()?;
    Some((expr, filters))
}

/// Parses `name` or `name(args)`.
fn parse_filter(segment: &str) -> Option<FilterCall> {
    match Expr::parse(segment).ok()? {
        Expr::Call { callee, args } => Some(FilterCall { name: callee, args }),
        Expr::Literal(Value::String(name)) if !segment.trim_start().starts_with(['"', '\'']) => {
            Some(FilterCall {
                name,
                args: Vec::new(),
            })
        }
        _ => None,
    }
}

/// Splits on single `|` outside quotes and brackets, leaving `||` alone.
fn split_on_pipes(s: &str) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut result = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 1;
            } else if b == q {
                quote = None;
            }
        } else {
            match b {
                b'\'' | b'"' => quote = Some(b),
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                b'|' if bytes.get(i + 1) == Some(&b'|') => i += 1,
                b'|' if depth == 0 => {
                    result.push(&s[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        i += 1;
    }
    result.push(&s[start..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_on_pipes() {
        assert_eq!(split_on_pipes("$a | upper"), vec!["$a ", " upper"]);
        assert_eq!(split_on_pipes("$a || $b"), vec!["$a || $b"]);
        assert_eq!(split_on_pipes("'x|y' | f('|')"), vec!["'x|y' ", " f('|')"]);
    }

    #[test]
    fn test_plain_variable() {
        let (expr, filters) = parse_interpolation("$name").unwrap();
        assert_eq!(expr, Expr::Variable("name".to_string()));
        assert!(filters.is_empty());
    }

    #[test]
    fn test_filters() {
        let (_, filters) = parse_interpolation("$title | default('Untitled') | upper").unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].name, "default");
        assert_eq!(filters[0].args, vec![Expr::Literal(Value::from("Untitled"))]);
        assert_eq!(filters[1].name, "upper");
        assert!(filters[1].args.is_empty());
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(parse_interpolation("").is_none());
        assert!(parse_interpolation("$a |").is_none());
        assert!(parse_interpolation("$a | 'quoted'").is_none());
        assert!(parse_interpolation("$a | 3").is_none());
    }
}
